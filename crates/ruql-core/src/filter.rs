//! Partial-context filtering
//!
//! Narrows a resource collection to the candidates compatible with a
//! possibly-incomplete context. A condition on a qualifier the context does
//! not set is unknown, not false: the candidate survives unless a condition
//! actively contradicts a set value. At most one filter runs at a time per
//! engine; the latch is an explicit two-state field, not a side flag.

use serde::Serialize;

use crate::context::QualifierContext;
use crate::error::{Result, RuqlError};
use crate::manager::{Bundle, ResourceManager};
use crate::resolve::backend::{evaluate_condition, ConditionMatch};
use crate::resource::{Candidate, ResourceDecl};

/// Filtering options
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    /// Treat unset qualifiers as unknown rather than mismatching
    pub partial_context_match: bool,
    /// Drop conditions the context now guarantees from surviving candidates
    pub reduce_qualifiers: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            partial_context_match: true,
            reduce_qualifiers: false,
        }
    }
}

/// In-flight state of the filter engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterState {
    /// No filter running
    #[default]
    Idle,
    /// A collection scan is in progress
    Filtering,
}

/// Per-resource filtering statistics
#[derive(Debug, Clone, Serialize)]
pub struct FilteredResource {
    /// Resource id
    pub id: String,
    /// Candidate count before filtering
    pub original_candidate_count: usize,
    /// Candidates surviving the context
    pub filtered_candidate_count: usize,
    /// True when no candidate survived (unresolvable under this context)
    pub has_warning: bool,
}

/// Outcome of one filtering pass
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    /// Per-resource statistics, in id order
    pub filtered_resources: Vec<FilteredResource>,
    /// Ids left unresolvable by this context slice
    pub warnings: Vec<String>,
    /// Recoverable per-resource problems (malformed conditions)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
    /// Number of resources scanned
    pub processed_resources: usize,
    /// The reduced collection view; the base is never mutated
    pub collection: Bundle,
}

/// The filter engine and its single-flight latch
#[derive(Debug, Default)]
pub struct FilterEngine {
    state: FilterState,
}

impl FilterEngine {
    /// Create an idle filter engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Current latch state
    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Filter the base collection against a (possibly partial) context
    ///
    /// Rejects overlapping invocations: if a scan is already in flight the
    /// call fails without touching anything. Per-resource problems are
    /// collected into the report; they never abort the scan.
    #[tracing::instrument(skip(self, manager, context), fields(resources = manager.len()))]
    pub fn filter(
        &mut self,
        manager: &ResourceManager,
        context: &QualifierContext,
        options: FilterOptions,
    ) -> Result<FilterReport> {
        if self.state == FilterState::Filtering {
            return Err(RuqlError::FilterInProgress);
        }
        self.state = FilterState::Filtering;
        let report = self.run(manager, context, options);
        self.state = FilterState::Idle;
        Ok(report)
    }

    fn run(
        &mut self,
        manager: &ResourceManager,
        context: &QualifierContext,
        options: FilterOptions,
    ) -> FilterReport {
        let mut report = FilterReport {
            filtered_resources: Vec::with_capacity(manager.len()),
            warnings: Vec::new(),
            problems: Vec::new(),
            processed_resources: 0,
            collection: Bundle::default(),
        };

        for decl in manager.resources() {
            report.processed_resources += 1;
            let original = decl.candidates.len();
            let mut surviving: Vec<Candidate> = Vec::new();

            for (index, candidate) in decl.candidates.iter().enumerate() {
                match candidate_survives(candidate, context, options) {
                    Ok(true) => surviving.push(candidate.clone()),
                    Ok(false) => {}
                    Err(reason) => {
                        report
                            .problems
                            .push(format!("{} candidate {}: {}", decl.id, index, reason));
                    }
                }
            }

            if options.reduce_qualifiers {
                for candidate in &mut surviving {
                    reduce_candidate(candidate, context);
                }
            }

            let filtered = surviving.len();
            let has_warning = filtered == 0;
            if has_warning {
                report.warnings.push(decl.id.to_string());
            } else {
                report.collection.resources.push(ResourceDecl {
                    id: decl.id.clone(),
                    resource_type_name: decl.resource_type_name.clone(),
                    candidates: surviving,
                });
            }

            report.filtered_resources.push(FilteredResource {
                id: decl.id.to_string(),
                original_candidate_count: original,
                filtered_candidate_count: filtered,
                has_warning,
            });
        }

        tracing::debug!(
            processed = report.processed_resources,
            warnings = report.warnings.len(),
            "filter pass complete"
        );
        report
    }
}

/// Whether a candidate is compatible with the context
///
/// Returns Err with a reason for malformed conditions so the caller can
/// report them against the owning resource.
fn candidate_survives(
    candidate: &Candidate,
    context: &QualifierContext,
    options: FilterOptions,
) -> std::result::Result<bool, String> {
    for condition in &candidate.conditions {
        if condition.qualifier_name.is_empty() || condition.value.is_empty() {
            return Err("malformed condition (empty qualifier or value)".to_string());
        }
        match evaluate_condition(condition, context) {
            ConditionMatch::Matched => {}
            ConditionMatch::Mismatched => return Ok(false),
            ConditionMatch::Unspecified => {
                if !options.partial_context_match {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// Drop conditions the context now guarantees
///
/// A condition whose qualifier is set in the context and matched by the
/// candidate no longer discriminates after filtering; removing it yields a
/// smaller, context-specialized declaration.
fn reduce_candidate(candidate: &mut Candidate, context: &QualifierContext) {
    candidate.conditions.retain(|condition| {
        !(context.is_set(&condition.qualifier_name)
            && evaluate_condition(condition, context) == ConditionMatch::Matched)
    });
}
