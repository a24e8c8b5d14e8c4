//! Engine orchestration
//!
//! One [`Engine`] per editing session composes the context store, pending
//! overlay, draft builder, resolution façade, and filter engine behind a
//! single surface. All state is owned here; nothing is process-global, so
//! independent engines can coexist (and be tested) in one process.

use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::context::{ContextStore, QualifierContext};
use crate::draft::{Draft, DraftBuilder};
use crate::error::Result;
use crate::filter::{FilterEngine, FilterOptions, FilterReport};
use crate::manager::ResourceManager;
use crate::overlay::{
    ApplySummary, CreatePendingRequest, OverlayStore, PendingKind, PendingResource,
};
use crate::resolve::{ResolutionReport, Resolver, ViewMode};
use crate::resource::ResourceId;
use crate::tree::ResourceTree;

/// Outcome of applying the pending context
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    /// Whether the applied context actually changed
    pub changed: bool,
    /// Validation warnings for applied values (invalid or unknown
    /// qualifiers); the values are applied regardless
    pub warnings: Vec<String>,
    /// Re-resolution of the selected resource, when one is selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionReport>,
}

/// One row of the visible-resource listing
#[derive(Debug, Clone, Serialize)]
pub struct ResourceListEntry {
    /// Resource id
    pub id: String,
    /// Candidate count of the declaration that resolution would use
    pub candidate_count: usize,
    /// Overlay state, if the resource has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingKind>,
    /// Whether a field-level edit is stored
    pub has_edit: bool,
}

/// A qualifier-driven resource editing session
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    manager: ResourceManager,
    context: ContextStore,
    overlay: OverlayStore,
    draft: DraftBuilder,
    resolver: Resolver,
    filter: FilterEngine,
}

impl Engine {
    /// Create an engine over a base collection with an explicit config
    pub fn new(config: EngineConfig, manager: ResourceManager) -> Self {
        let context = ContextStore::new(config.qualifier_names());
        Engine {
            config,
            manager,
            context,
            overlay: OverlayStore::new(),
            draft: DraftBuilder::new(),
            resolver: Resolver::new(),
            filter: FilterEngine::new(),
        }
    }

    /// Create an engine with the default qualifier/type configuration
    pub fn with_default_config(manager: ResourceManager) -> Self {
        Self::new(EngineConfig::default(), manager)
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The base collection
    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    // --- context ---

    /// Set a pending context value; never fails
    ///
    /// Values are normalized through the qualifier's rules when possible;
    /// an invalid value is stored as given and reported when the context is
    /// applied.
    pub fn update_context_value(&mut self, qualifier: &str, value: Option<String>) {
        let value = match (value, self.config.qualifier(qualifier)) {
            (Some(raw), Some(config)) if !raw.is_empty() => {
                match config.kind.normalize(qualifier, &raw) {
                    Ok(normalized) => Some(normalized),
                    Err(err) => {
                        tracing::debug!(qualifier, %err, "pending context value failed validation");
                        Some(raw)
                    }
                }
            }
            (value, _) => value,
        };
        self.context.update_value(qualifier, value);
    }

    /// Whether the pending context differs from the applied one
    pub fn has_pending_context_changes(&self) -> bool {
        self.context.has_pending_changes()
    }

    /// The context being edited
    pub fn pending_context(&self) -> &QualifierContext {
        self.context.pending()
    }

    /// The context resolution runs against
    pub fn applied_context(&self) -> &QualifierContext {
        self.context.applied()
    }

    /// Commit the pending context and re-resolve the selected resource
    ///
    /// Always succeeds: validation problems are surfaced as warnings, and
    /// an empty collection is not an error at this layer. The resolver's
    /// condition cache is invalidated unconditionally; stale evaluations
    /// are never carried across an apply.
    #[tracing::instrument(skip(self))]
    pub fn apply_context(&mut self) -> ApplyOutcome {
        let changed = self.context.apply();
        self.resolver.reset_resolution_cache();

        let mut warnings = Vec::new();
        for (name, value) in self.context.applied().set_values() {
            match self.config.qualifier(name) {
                Some(config) => {
                    if let Err(err) = config.kind.normalize(name, value) {
                        warnings.push(err.to_string());
                    }
                }
                None => warnings.push(
                    crate::error::RuqlError::UnknownQualifier {
                        name: name.to_string(),
                    }
                    .to_string(),
                ),
            }
        }

        let resolution = self.resolver.resolve_selected(
            &self.manager,
            &self.overlay,
            self.context.applied(),
            ViewMode::Composed,
        );

        ApplyOutcome {
            changed,
            warnings,
            resolution,
        }
    }

    // --- resolution ---

    /// Select a resource and resolve it under the applied context
    ///
    /// A failure (unknown or malformed id) is reported inside the result,
    /// and the selection is updated regardless so the caller's selection
    /// state tracks what was asked for.
    pub fn select_resource(&mut self, id: &str, view: ViewMode) -> ResolutionReport {
        match ResourceId::new(id) {
            Ok(id) => self.resolver.select_resource(
                &self.manager,
                &self.overlay,
                self.context.applied(),
                &id,
                view,
            ),
            Err(err) => ResolutionReport {
                id: id.to_string(),
                success: false,
                view,
                value: None,
                error: Some(err.to_string()),
                source: None,
                has_edit: false,
                candidates: Vec::new(),
            },
        }
    }

    /// The currently selected resource id, if any
    pub fn selected_resource_id(&self) -> Option<&ResourceId> {
        self.resolver.selected_resource_id()
    }

    /// Re-resolve the selected resource without changing the selection
    pub fn resolve_selected(&mut self, view: ViewMode) -> Option<ResolutionReport> {
        self.resolver
            .resolve_selected(&self.manager, &self.overlay, self.context.applied(), view)
    }

    /// Drop memoized condition evaluations
    pub fn reset_resolution_cache(&mut self) {
        self.resolver.reset_resolution_cache();
    }

    // --- draft workflow ---

    /// Open a draft for a new resource; one draft at a time
    pub fn start_new_resource(&mut self, default_type: Option<&str>) -> Result<&Draft> {
        self.draft.start(&self.config, default_type)
    }

    /// The open draft, if any
    pub fn current_draft(&self) -> Option<&Draft> {
        self.draft.current()
    }

    /// Change the open draft's resource type
    pub fn select_resource_type(&mut self, name: &str) -> Result<()> {
        self.draft.select_resource_type(&self.config, name)
    }

    /// Assign the open draft's id
    pub fn update_new_resource_id(&mut self, id: &str) -> Result<()> {
        self.draft.update_id(id)
    }

    /// Store working content for the open draft
    pub fn update_new_resource_json(&mut self, value: Value) -> Result<()> {
        self.draft.update_json(value)
    }

    /// Promote the open draft into the pending overlay
    pub fn save_new_resource_as_pending(&mut self) -> Result<ResourceId> {
        self.draft.save_as_pending(
            &self.config,
            &self.manager,
            &mut self.overlay,
            self.context.applied(),
        )
    }

    /// Discard the open draft
    pub fn cancel_new_resource(&mut self) -> Result<()> {
        self.draft.cancel()
    }

    // --- overlay ---

    /// Atomic creation path: validate, stamp, insert into the overlay
    pub fn create_pending_resource(
        &mut self,
        request: CreatePendingRequest,
    ) -> Result<PendingResource> {
        self.overlay
            .create_pending_resource(
                &self.manager,
                &self.config,
                self.context.applied(),
                request,
            )
            .map(|entry| entry.clone())
    }

    /// Duplicate a base resource into the overlay for editing
    pub fn edit_resource_as_pending(&mut self, id: &ResourceId) -> Result<PendingResource> {
        self.overlay
            .edit_resource_as_pending(&self.manager, id)
            .map(|entry| entry.clone())
    }

    /// Store a field-level edit; re-resolves when the id is selected
    pub fn save_edit(&mut self, id: &ResourceId, value: Value) -> Result<Option<ResolutionReport>> {
        self.overlay.save_edit(&self.manager, id, value)?;
        if self.selected_resource_id() == Some(id) {
            return Ok(self.resolve_selected(ViewMode::Composed));
        }
        Ok(None)
    }

    /// The edited value for an id, if one is stored
    pub fn get_edited_value(&self, id: &ResourceId) -> Option<&Value> {
        self.overlay.get_edited_value(id)
    }

    /// Whether an edit is stored for an id
    pub fn has_edit(&self, id: &ResourceId) -> bool {
        self.overlay.has_edit(id)
    }

    /// Discard one overlay entry (new resource, modification, or tombstone)
    pub fn remove_pending_resource(&mut self, id: &ResourceId) -> Result<()> {
        self.overlay.remove_pending_resource(id).map(|_| ())
    }

    /// Tombstone a base resource until commit
    pub fn mark_resource_for_deletion(&mut self, id: &ResourceId) -> Result<()> {
        self.overlay.mark_resource_for_deletion(&self.manager, id)
    }

    /// Commit the whole overlay into the base collection, all-or-nothing
    pub fn apply_pending_resources(&mut self) -> Result<ApplySummary> {
        self.overlay.apply_pending(&mut self.manager)
    }

    /// Drop all overlay entries; the base is untouched
    pub fn discard_pending_resources(&mut self) {
        self.overlay.discard_pending();
    }

    /// Drop all field-level edits; the base is untouched
    pub fn clear_resource_edits(&mut self) {
        self.overlay.clear_edits();
    }

    /// Overlay entries in id order, tombstones included
    pub fn pending_resources(&self) -> impl Iterator<Item = &PendingResource> {
        self.overlay.pending_resources()
    }

    // --- filtering, listing, tree ---

    /// Filter the base collection against an explicit (partial) context
    pub fn filter_resources(
        &mut self,
        context: &QualifierContext,
        options: FilterOptions,
    ) -> Result<FilterReport> {
        self.filter.filter(&self.manager, context, options)
    }

    /// Filter against the applied context
    pub fn filter_with_applied_context(&mut self, options: FilterOptions) -> Result<FilterReport> {
        let context = self.context.applied().clone();
        self.filter.filter(&self.manager, &context, options)
    }

    /// Visible resources: base minus tombstones, plus overlay entries
    pub fn list_resources(&self) -> Vec<ResourceListEntry> {
        self.overlay
            .visible_ids(&self.manager)
            .into_iter()
            .map(|id| {
                let pending = self.overlay.pending_for(&id).map(|p| p.kind);
                let candidate_count = match self.overlay.pending_for(&id) {
                    Some(p) => p.candidates.len(),
                    None => self
                        .manager
                        .get_built_resource(&id)
                        .map(|d| d.candidates.len())
                        .unwrap_or(0),
                };
                ResourceListEntry {
                    id: id.to_string(),
                    candidate_count,
                    pending,
                    has_edit: self.overlay.has_edit(&id),
                }
            })
            .collect()
    }

    /// The folder tree over all visible resource ids
    pub fn resource_tree(&self) -> ResourceTree {
        let ids = self.overlay.visible_ids(&self.manager);
        ResourceTree::build(ids.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Candidate, Condition, ResourceDecl};
    use serde_json::json;

    fn engine() -> Engine {
        let manager = ResourceManager::from_declarations(vec![ResourceDecl {
            id: ResourceId::new("platform.title").unwrap(),
            resource_type_name: "json".to_string(),
            candidates: vec![
                Candidate::unconditional(json!({ "msg": "default" })),
                Candidate::with_conditions(
                    json!({ "msg": "english" }),
                    vec![Condition::matches("language", "en")],
                ),
            ],
        }])
        .unwrap();
        Engine::with_default_config(manager)
    }

    #[test]
    fn test_apply_context_re_resolves_selection() {
        let mut engine = engine();
        let report = engine.select_resource("platform.title", ViewMode::Composed);
        assert_eq!(report.value, Some(json!({ "msg": "default" })));

        engine.update_context_value("language", Some("en".into()));
        let outcome = engine.apply_context();
        assert!(outcome.changed);
        assert!(outcome.warnings.is_empty());
        let resolution = outcome.resolution.unwrap();
        assert_eq!(resolution.value, Some(json!({ "msg": "english" })));
    }

    #[test]
    fn test_apply_context_is_idempotent() {
        let mut engine = engine();
        engine.select_resource("platform.title", ViewMode::Composed);
        engine.update_context_value("language", Some("en".into()));

        let first = engine.apply_context();
        let second = engine.apply_context();
        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(
            serde_json::to_value(first.resolution.unwrap()).unwrap(),
            serde_json::to_value(second.resolution.unwrap()).unwrap()
        );
    }

    #[test]
    fn test_context_normalization_and_warnings() {
        let mut engine = engine();
        engine.update_context_value("territory", Some("us".into()));
        assert_eq!(engine.pending_context().get("territory"), Some("US"));

        engine.update_context_value("language", Some("not a language".into()));
        let outcome = engine.apply_context();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("language"));
    }

    #[test]
    fn test_draft_scenario_end_to_end() {
        let mut engine = engine();
        engine.start_new_resource(None).unwrap();
        engine.select_resource_type("json").unwrap();
        engine.update_new_resource_id("platform.test.x").unwrap();
        engine
            .update_new_resource_json(json!({ "msg": "hi" }))
            .unwrap();
        let id = engine.save_new_resource_as_pending().unwrap();

        assert_eq!(id.as_str(), "platform.test.x");
        assert!(engine.current_draft().is_none());

        let pending: Vec<_> = engine.pending_resources().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "platform.test.x");
        assert_eq!(pending[0].candidates.len(), 1);
        assert_eq!(pending[0].candidates[0].value, json!({ "msg": "hi" }));

        // The new resource resolves through the overlay.
        let report = engine.select_resource("platform.test.x", ViewMode::Composed);
        assert!(report.success);
        assert_eq!(report.value, Some(json!({ "msg": "hi" })));
    }

    #[test]
    fn test_stamping_uses_applied_context_at_creation_time() {
        let mut engine = engine();
        engine.update_context_value("language", Some("en-US".into()));
        engine.apply_context();

        let entry = engine
            .create_pending_resource(CreatePendingRequest {
                id: "platform.stamped".to_string(),
                resource_type_name: "json".to_string(),
                json: None,
            })
            .unwrap();
        assert_eq!(
            entry.candidates[0].conditions,
            vec![Condition::matches("language", "en-US")]
        );

        // Later context changes never restamp existing candidates.
        engine.update_context_value("language", Some("fr".into()));
        engine.apply_context();
        let still: Vec<_> = engine.pending_resources().collect();
        assert_eq!(
            still[0].candidates[0].conditions,
            vec![Condition::matches("language", "en-US")]
        );
    }

    #[test]
    fn test_edit_precedence_over_pending() {
        let mut engine = engine();
        let id = ResourceId::new("platform.title").unwrap();
        engine.edit_resource_as_pending(&id).unwrap();
        engine.select_resource("platform.title", ViewMode::Composed);

        let report = engine.save_edit(&id, json!({ "msg": "edited" })).unwrap();
        let report = report.unwrap();
        assert_eq!(report.value, Some(json!({ "msg": "edited" })));
        assert_eq!(report.source, Some(crate::resolve::ResolutionSource::Edit));
    }

    #[test]
    fn test_listing_and_tree_include_overlay() {
        let mut engine = engine();
        engine
            .create_pending_resource(CreatePendingRequest {
                id: "platform.extra".to_string(),
                resource_type_name: "json".to_string(),
                json: Some(json!(1)),
            })
            .unwrap();

        let listing = engine.list_resources();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, "platform.extra");
        assert_eq!(listing[0].pending, Some(PendingKind::New));
        assert_eq!(listing[1].id, "platform.title");
        assert_eq!(listing[1].pending, None);

        let tree = engine.resource_tree();
        assert!(tree.lookup("platform.extra").is_some());
        assert!(tree.lookup("platform").is_some());
    }

    #[test]
    fn test_commit_then_listing_reflects_base() {
        let mut engine = engine();
        engine
            .create_pending_resource(CreatePendingRequest {
                id: "platform.extra".to_string(),
                resource_type_name: "json".to_string(),
                json: Some(json!(1)),
            })
            .unwrap();
        let id = ResourceId::new("platform.title").unwrap();
        engine.mark_resource_for_deletion(&id).unwrap();

        let summary = engine.apply_pending_resources().unwrap();
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.deleted, 1);

        let listing = engine.list_resources();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, "platform.extra");
        assert_eq!(listing[0].pending, None);
    }

    #[test]
    fn test_filter_through_engine() {
        let mut engine = engine();
        let mut context = QualifierContext::new();
        context.set("language", Some("en".into()));
        let report = engine
            .filter_resources(&context, FilterOptions::default())
            .unwrap();
        assert_eq!(report.filtered_resources.len(), 1);
        assert_eq!(report.filtered_resources[0].filtered_candidate_count, 2);
    }
}
