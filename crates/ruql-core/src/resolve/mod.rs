//! Resolution façade
//!
//! Resolves one resource id under the applied context, folding in the
//! pending overlay and field-level edits. Precedence for the composed
//! value: a stored edit wins unconditionally, then the best-matching
//! overlay candidate, then the best-matching base candidate. Candidate
//! selection itself is the backend's contract.

pub mod backend;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::context::QualifierContext;
use crate::error::RuqlError;
use crate::manager::ResourceManager;
use crate::overlay::OverlayStore;
use crate::resource::{Condition, ResourceDecl, ResourceId};
use self::backend::ResolverBackend;

/// How much of the candidate set a resolution surfaces
///
/// View modes shape the report only; the resolution algorithm is the same
/// for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Final merged value only (default)
    #[default]
    Composed,
    /// The winning candidate's raw value, unmerged
    Best,
    /// Every candidate with its match state
    All,
    /// The stored declaration, untouched
    Raw,
}

impl FromStr for ViewMode {
    type Err = RuqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "composed" => Ok(ViewMode::Composed),
            "best" => Ok(ViewMode::Best),
            "all" => Ok(ViewMode::All),
            "raw" => Ok(ViewMode::Raw),
            other => Err(RuqlError::UsageError(format!(
                "unknown view mode: {} (expected: composed, best, all, or raw)",
                other
            ))),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Composed => write!(f, "composed"),
            ViewMode::Best => write!(f, "best"),
            ViewMode::All => write!(f, "all"),
            ViewMode::Raw => write!(f, "raw"),
        }
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// A field-level edit override
    Edit,
    /// A pending overlay candidate
    Pending,
    /// A base collection candidate
    Base,
}

/// Match state of one candidate, for `All` views
#[derive(Debug, Clone, Serialize)]
pub struct CandidateTrace {
    /// Position in the declaration
    pub index: usize,
    /// Whether every condition matched the applied context
    pub matched: bool,
    /// Number of matched conditions
    pub specificity: usize,
    /// The candidate's conditions
    pub conditions: Vec<Condition>,
    /// Whether the candidate is a partial value
    pub is_partial: bool,
    /// The candidate's stored value
    pub value: Value,
}

/// Outcome of resolving one resource id
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    /// The id that was resolved
    pub id: String,
    /// Whether a value was produced
    pub success: bool,
    /// View mode the report was shaped for
    pub view: ViewMode,
    /// The resolved value, per the view mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Failure message when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provenance of the value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ResolutionSource>,
    /// Whether a field-level edit is stored for the id
    pub has_edit: bool,
    /// Per-candidate match states (populated for `All` views)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateTrace>,
}

impl ResolutionReport {
    fn failure(id: &ResourceId, view: ViewMode, message: String) -> Self {
        ResolutionReport {
            id: id.to_string(),
            success: false,
            view,
            value: None,
            error: Some(message),
            source: None,
            has_edit: false,
            candidates: Vec::new(),
        }
    }
}

/// The resolution façade: selected resource plus the backend
#[derive(Debug, Default)]
pub struct Resolver {
    backend: ResolverBackend,
    selected: Option<ResourceId>,
}

impl Resolver {
    /// Create a façade with nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently selected resource id, if any
    pub fn selected_resource_id(&self) -> Option<&ResourceId> {
        self.selected.as_ref()
    }

    /// Invalidate the backend's condition-evaluation memo
    ///
    /// Must be called whenever the applied context changes; stale
    /// evaluations are never trusted across an apply.
    pub fn reset_resolution_cache(&mut self) {
        self.backend.clear_condition_cache();
    }

    /// Select a resource and resolve it under the applied context
    ///
    /// The selected id is updated even when resolution fails, so a caller
    /// tracking selection state stays consistent with what was asked for.
    pub fn select_resource(
        &mut self,
        manager: &ResourceManager,
        overlay: &OverlayStore,
        applied: &QualifierContext,
        id: &ResourceId,
        view: ViewMode,
    ) -> ResolutionReport {
        self.selected = Some(id.clone());
        self.resolve(manager, overlay, applied, id, view)
    }

    /// Re-resolve the selected resource, if one is selected
    pub fn resolve_selected(
        &mut self,
        manager: &ResourceManager,
        overlay: &OverlayStore,
        applied: &QualifierContext,
        view: ViewMode,
    ) -> Option<ResolutionReport> {
        let id = self.selected.clone()?;
        Some(self.resolve(manager, overlay, applied, &id, view))
    }

    /// Resolve one id without changing the selection
    #[tracing::instrument(skip(self, manager, overlay, applied), fields(id = %id, view = %view))]
    pub fn resolve(
        &mut self,
        manager: &ResourceManager,
        overlay: &OverlayStore,
        applied: &QualifierContext,
        id: &ResourceId,
        view: ViewMode,
    ) -> ResolutionReport {
        if overlay.is_tombstoned(id) {
            return ResolutionReport::failure(
                id,
                view,
                format!("resource {} not found (marked for deletion)", id),
            );
        }

        let (decl, source) = match overlay.pending_for(id) {
            Some(pending) => (pending.to_decl(), ResolutionSource::Pending),
            None => match manager.get_built_resource(id) {
                Ok(decl) => (decl.clone(), ResolutionSource::Base),
                Err(_) => {
                    return ResolutionReport::failure(id, view, format!("resource {} not found", id))
                }
            },
        };

        let has_edit = overlay.has_edit(id);
        let candidates = match view {
            ViewMode::All => self.trace_candidates(&decl, applied),
            _ => Vec::new(),
        };

        // A stored edit wins unconditionally over any candidate.
        if has_edit && matches!(view, ViewMode::Composed | ViewMode::Best) {
            let value = overlay.get_edited_value(id).cloned();
            return ResolutionReport {
                id: id.to_string(),
                success: true,
                view,
                value,
                error: None,
                source: Some(ResolutionSource::Edit),
                has_edit,
                candidates,
            };
        }

        let value = match view {
            ViewMode::Composed => self.backend.compose(&decl.candidates, applied),
            ViewMode::Best => self
                .backend
                .best(&decl.candidates, applied)
                .map(|idx| decl.candidates[idx].value.clone()),
            ViewMode::All => None,
            ViewMode::Raw => serde_json::to_value(&decl).ok(),
        };

        let success = match view {
            ViewMode::Composed | ViewMode::Best => value.is_some(),
            ViewMode::All => candidates.iter().any(|c| c.matched),
            ViewMode::Raw => value.is_some(),
        };
        let error = if success {
            None
        } else {
            Some(format!("no candidate of {} matches the applied context", id))
        };

        ResolutionReport {
            id: id.to_string(),
            success,
            view,
            value,
            error,
            source: success.then_some(source),
            has_edit,
            candidates,
        }
    }

    fn trace_candidates(
        &mut self,
        decl: &ResourceDecl,
        applied: &QualifierContext,
    ) -> Vec<CandidateTrace> {
        self.backend
            .rank(&decl.candidates, applied)
            .into_iter()
            .map(|m| {
                let candidate = &decl.candidates[m.index];
                CandidateTrace {
                    index: m.index,
                    matched: m.matched,
                    specificity: m.specificity,
                    conditions: candidate.conditions.clone(),
                    is_partial: candidate.is_partial,
                    value: candidate.value.clone(),
                }
            })
            .collect()
    }
}
