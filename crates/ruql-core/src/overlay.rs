//! Pending overlay store
//!
//! Holds resources that have been created, modified, or marked for deletion
//! but not yet merged into the base collection, plus field-level edits for
//! existing resources. The base manager is never touched until
//! [`OverlayStore::apply_pending`] commits the whole overlay in one batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::context::QualifierContext;
use crate::error::{Result, RuqlError};
use crate::manager::{CommitBatch, ResourceManager};
use crate::resource::{Candidate, Condition, ResourceDecl, ResourceId};

/// Lifecycle state of an overlay entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingKind {
    /// Created in this session; no base counterpart
    New,
    /// A base resource duplicated into the overlay for editing
    Modified,
    /// A base resource tombstoned until commit
    Deleted,
}

/// One uncommitted resource in the overlay
#[derive(Debug, Clone, Serialize)]
pub struct PendingResource {
    /// Resource id, unique across base and overlay
    pub id: ResourceId,
    /// Resource type that produced the declaration
    pub resource_type_name: String,
    /// Candidate variants
    pub candidates: Vec<Candidate>,
    /// New, modified, or tombstone
    pub kind: PendingKind,
    /// When the entry was added to the overlay
    pub created_at: DateTime<Utc>,
}

impl PendingResource {
    /// View the entry as a plain declaration
    pub fn to_decl(&self) -> ResourceDecl {
        ResourceDecl {
            id: self.id.clone(),
            resource_type_name: self.resource_type_name.clone(),
            candidates: self.candidates.clone(),
        }
    }
}

/// A field-level value override for an existing resource
#[derive(Debug, Clone, Serialize)]
pub struct EditedResourceInfo {
    /// The edited JSON value; wins over any candidate during resolution
    pub value: Value,
    /// When the edit was last saved
    pub edited_at: DateTime<Utc>,
}

/// Request payload for the atomic creation path
#[derive(Debug, Clone)]
pub struct CreatePendingRequest {
    /// Raw id string; validated against the dotted-path grammar
    pub id: String,
    /// Must resolve to a configured resource type
    pub resource_type_name: String,
    /// Initial value; the type's template is used when omitted
    pub json: Option<Value>,
}

/// Summary of a successful overlay commit
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    /// Resources upserted into the base collection
    pub committed: usize,
    /// Resources removed from the base collection
    pub deleted: usize,
    /// Edits folded into candidates
    pub edits_folded: usize,
}

/// Stamp conditions from the applied context
///
/// Every qualifier with a defined value becomes one `matches` condition on
/// the new candidate; unset qualifiers are omitted. Stamping happens at
/// candidate-creation time only and is never revisited when the context
/// later changes.
pub fn stamp_conditions(applied: &QualifierContext) -> Vec<Condition> {
    applied
        .set_values()
        .map(|(name, value)| Condition::matches(name, value))
        .collect()
}

/// The in-memory overlay of uncommitted resources and edits
#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    pending: BTreeMap<ResourceId, PendingResource>,
    edits: BTreeMap<ResourceId, EditedResourceInfo>,
}

impl OverlayStore {
    /// Create an empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic creation path: validate, stamp, insert
    ///
    /// Validates the id grammar and uniqueness across base and overlay, and
    /// resolves the resource type; the new entry carries exactly one
    /// candidate whose conditions are stamped from the applied context.
    #[tracing::instrument(skip(self, manager, config, applied, request), fields(id = %request.id))]
    pub fn create_pending_resource(
        &mut self,
        manager: &ResourceManager,
        config: &EngineConfig,
        applied: &QualifierContext,
        request: CreatePendingRequest,
    ) -> Result<&PendingResource> {
        let id = ResourceId::new(&request.id)?;
        if manager.contains(&id) || self.pending.contains_key(&id) {
            return Err(RuqlError::ResourceExists { id: id.to_string() });
        }

        let resource_type = config
            .resource_type(&request.resource_type_name)
            .ok_or_else(|| RuqlError::UnknownResourceType {
                name: request.resource_type_name.clone(),
            })?;

        let value = request.json.unwrap_or_else(|| resource_type.template.clone());
        let candidate = Candidate::with_conditions(value, stamp_conditions(applied));

        let entry = PendingResource {
            id: id.clone(),
            resource_type_name: request.resource_type_name,
            candidates: vec![candidate],
            kind: PendingKind::New,
            created_at: Utc::now(),
        };
        tracing::debug!(conditions = entry.candidates[0].conditions.len(), "pending resource created");
        self.pending.insert(id.clone(), entry);
        Ok(&self.pending[&id])
    }

    /// Promote an already-built pending resource into the overlay
    ///
    /// Used by the draft builder after its own validation; collision rules
    /// are re-checked here so the overlay invariant cannot be bypassed.
    pub fn insert_pending(
        &mut self,
        manager: &ResourceManager,
        entry: PendingResource,
    ) -> Result<()> {
        if entry.kind == PendingKind::New
            && (manager.contains(&entry.id) || self.pending.contains_key(&entry.id))
        {
            return Err(RuqlError::ResourceExists {
                id: entry.id.to_string(),
            });
        }
        self.pending.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Duplicate a base resource into the overlay for editing
    ///
    /// The returned entry has kind `Modified` and shadows the base
    /// declaration during resolution. Calling it again for the same id
    /// returns the existing overlay entry.
    pub fn edit_resource_as_pending(
        &mut self,
        manager: &ResourceManager,
        id: &ResourceId,
    ) -> Result<&PendingResource> {
        if let Some(existing) = self.pending.get(id) {
            if existing.kind == PendingKind::Deleted {
                return Err(RuqlError::ResourceNotFound { id: id.to_string() });
            }
            return Ok(&self.pending[id]);
        }

        let base = manager.get_built_resource(id)?;
        let entry = PendingResource {
            id: id.clone(),
            resource_type_name: base.resource_type_name.clone(),
            candidates: base.candidates.clone(),
            kind: PendingKind::Modified,
            created_at: Utc::now(),
        };
        self.pending.insert(id.clone(), entry);
        Ok(&self.pending[id])
    }

    /// Store a field-level edit for an existing resource
    ///
    /// Fails with not-found when the id is neither a base resource nor a
    /// live overlay entry. The underlying candidates are untouched; the
    /// edit is folded in only on commit.
    pub fn save_edit(
        &mut self,
        manager: &ResourceManager,
        id: &ResourceId,
        value: Value,
    ) -> Result<()> {
        if !self.is_resolvable(manager, id) {
            return Err(RuqlError::ResourceNotFound { id: id.to_string() });
        }
        self.edits.insert(
            id.clone(),
            EditedResourceInfo {
                value,
                edited_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// The edited value for an id, if one is stored
    pub fn get_edited_value(&self, id: &ResourceId) -> Option<&Value> {
        self.edits.get(id).map(|e| &e.value)
    }

    /// Whether an edit is stored for an id
    pub fn has_edit(&self, id: &ResourceId) -> bool {
        self.edits.contains_key(id)
    }

    /// Discard one overlay entry
    ///
    /// Removes a `New` resource outright, or reverts a `Modified` or
    /// `Deleted` entry back to its base declaration.
    pub fn remove_pending_resource(&mut self, id: &ResourceId) -> Result<PendingResource> {
        self.pending
            .remove(id)
            .ok_or_else(|| RuqlError::ResourceNotFound { id: id.to_string() })
    }

    /// Tombstone an existing base resource
    ///
    /// The resource disappears from resolution and listing but the base is
    /// untouched; reversible via [`OverlayStore::remove_pending_resource`]
    /// until committed. A `Modified` entry for the same id is replaced.
    pub fn mark_resource_for_deletion(
        &mut self,
        manager: &ResourceManager,
        id: &ResourceId,
    ) -> Result<()> {
        if !manager.contains(id) {
            if self.pending.contains_key(id) {
                return Err(RuqlError::NotDeletable { id: id.to_string() });
            }
            return Err(RuqlError::ResourceNotFound { id: id.to_string() });
        }
        let base = manager.get_built_resource(id)?;
        self.pending.insert(
            id.clone(),
            PendingResource {
                id: id.clone(),
                resource_type_name: base.resource_type_name.clone(),
                candidates: Vec::new(),
                kind: PendingKind::Deleted,
                created_at: Utc::now(),
            },
        );
        self.edits.remove(id);
        Ok(())
    }

    /// Whether the id is excluded from resolution by a tombstone
    pub fn is_tombstoned(&self, id: &ResourceId) -> bool {
        matches!(
            self.pending.get(id),
            Some(PendingResource {
                kind: PendingKind::Deleted,
                ..
            })
        )
    }

    /// The live overlay entry for an id, if any (tombstones excluded)
    pub fn pending_for(&self, id: &ResourceId) -> Option<&PendingResource> {
        self.pending
            .get(id)
            .filter(|p| p.kind != PendingKind::Deleted)
    }

    /// All overlay entries, tombstones included, in id order
    pub fn pending_resources(&self) -> impl Iterator<Item = &PendingResource> {
        self.pending.values()
    }

    /// Whether an id resolves to something (base or overlay, not tombstoned)
    pub fn is_resolvable(&self, manager: &ResourceManager, id: &ResourceId) -> bool {
        if self.is_tombstoned(id) {
            return false;
        }
        self.pending_for(id).is_some() || manager.contains(id)
    }

    /// Ids visible to listing: base minus tombstones, plus overlay entries
    pub fn visible_ids(&self, manager: &ResourceManager) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = manager
            .resource_ids()
            .filter(|id| !self.is_tombstoned(id))
            .cloned()
            .collect();
        for (id, entry) in &self.pending {
            if entry.kind == PendingKind::New {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }

    /// Whether the overlay holds any uncommitted entries or edits
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty() || !self.edits.is_empty()
    }

    /// Merge the whole overlay into the base collection, all-or-nothing
    ///
    /// Edits are folded into the first candidate of their resource; edits
    /// on resources with no overlay entry produce a `Modified`-style upsert
    /// of the base declaration. Any invalid entry aborts the commit with
    /// the base untouched. On success the overlay and edit maps are
    /// cleared.
    #[tracing::instrument(skip(self, manager))]
    pub fn apply_pending(&mut self, manager: &mut ResourceManager) -> Result<ApplySummary> {
        let mut batch = CommitBatch::default();
        let mut summary = ApplySummary::default();
        let mut edits = self.edits.clone();

        for (id, entry) in &self.pending {
            match entry.kind {
                PendingKind::New => {
                    if manager.contains(id) {
                        return Err(RuqlError::ResourceExists { id: id.to_string() });
                    }
                    let mut decl = entry.to_decl();
                    summary.edits_folded += fold_edit(&mut decl, edits.remove(id))?;
                    batch.upserts.push(decl);
                    summary.committed += 1;
                }
                PendingKind::Modified => {
                    if !manager.contains(id) {
                        return Err(RuqlError::ResourceNotFound { id: id.to_string() });
                    }
                    let mut decl = entry.to_decl();
                    summary.edits_folded += fold_edit(&mut decl, edits.remove(id))?;
                    batch.upserts.push(decl);
                    summary.committed += 1;
                }
                PendingKind::Deleted => {
                    batch.deletes.push(id.clone());
                    summary.deleted += 1;
                }
            }
        }

        // Edits on resources that were never duplicated into the overlay.
        for (id, edit) in edits {
            let base = manager.get_built_resource(&id)?;
            let mut decl = base.clone();
            summary.edits_folded += fold_edit(&mut decl, Some(edit))?;
            batch.upserts.push(decl);
            summary.committed += 1;
        }

        manager.commit_batch(batch)?;
        self.pending.clear();
        self.edits.clear();
        tracing::info!(
            committed = summary.committed,
            deleted = summary.deleted,
            "overlay applied"
        );
        Ok(summary)
    }

    /// Drop all overlay entries without touching the base
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Drop all field-level edits without touching the base
    pub fn clear_edits(&mut self) {
        self.edits.clear();
    }
}

fn fold_edit(decl: &mut ResourceDecl, edit: Option<EditedResourceInfo>) -> Result<usize> {
    let Some(edit) = edit else {
        return Ok(0);
    };
    match decl.candidates.first_mut() {
        Some(candidate) => {
            candidate.value = edit.value;
            Ok(1)
        }
        None => Err(RuqlError::InvalidCondition {
            id: decl.id.to_string(),
            reason: "edit on a resource with no candidates".to_string(),
        }),
    }
}
