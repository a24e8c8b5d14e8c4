//! Draft builder: the sequential new-resource workflow
//!
//! One draft at a time per session. A draft moves through
//! `TypeSelected → IdAssigned → ContentEdited` before promotion into the
//! pending overlay; `Idle` is the absence of a draft. The constraint is a
//! tagged state, not a bag of optional fields, so an operation on a missing
//! draft is a type-level impossibility rather than a null check.

use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::context::QualifierContext;
use crate::error::{Result, RuqlError};
use crate::manager::ResourceManager;
use crate::overlay::{stamp_conditions, OverlayStore, PendingKind, PendingResource};
use crate::resource::{is_placeholder, Candidate, ResourceId, PLACEHOLDER_PREFIX};

/// Milestones a draft passes through before it can be saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStage {
    /// A type is held (explicitly chosen or defaulted at start)
    TypeSelected,
    /// A valid, non-placeholder id has been assigned
    IdAssigned,
    /// Working content has been entered
    ContentEdited,
}

/// The in-progress draft
#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    /// Furthest milestone reached
    pub stage: DraftStage,
    /// Resource type the draft will instantiate
    pub resource_type_name: String,
    /// Current id: a placeholder until the user assigns one
    pub id: String,
    /// Working JSON content, if any has been entered
    pub json: Option<Value>,
}

impl Draft {
    /// Whether the current id is still the generated placeholder
    pub fn has_placeholder_id(&self) -> bool {
        is_placeholder(&self.id)
    }
}

/// Draft state: absent or active
#[derive(Debug, Clone, Default)]
enum DraftState {
    #[default]
    Idle,
    Active(Draft),
}

/// Sequential builder for composing one new resource
#[derive(Debug, Clone, Default)]
pub struct DraftBuilder {
    state: DraftState,
    placeholder_seq: u32,
}

impl DraftBuilder {
    /// Create a builder with no draft open
    pub fn new() -> Self {
        Self::default()
    }

    /// The open draft, if any
    pub fn current(&self) -> Option<&Draft> {
        match &self.state {
            DraftState::Idle => None,
            DraftState::Active(draft) => Some(draft),
        }
    }

    /// Whether a draft is open
    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    /// Open a new draft
    ///
    /// Fails if a draft is already open. The type defaults to the first
    /// configured resource type when none is given; the draft starts with a
    /// placeholder id that will not pass the save gate.
    pub fn start(&mut self, config: &EngineConfig, default_type: Option<&str>) -> Result<&Draft> {
        if let DraftState::Active(draft) = &self.state {
            return Err(RuqlError::DraftInProgress {
                id: draft.id.clone(),
            });
        }

        let resource_type_name = match default_type {
            Some(name) => {
                config
                    .resource_type(name)
                    .ok_or_else(|| RuqlError::UnknownResourceType {
                        name: name.to_string(),
                    })?;
                name.to_string()
            }
            None => config
                .resource_types
                .first()
                .map(|t| t.name.clone())
                .ok_or_else(|| RuqlError::Other("no resource types configured".to_string()))?,
        };

        self.placeholder_seq += 1;
        let draft = Draft {
            stage: DraftStage::TypeSelected,
            resource_type_name,
            id: format!("{}{}", PLACEHOLDER_PREFIX, self.placeholder_seq),
            json: None,
        };
        tracing::debug!(id = %draft.id, r#type = %draft.resource_type_name, "draft started");
        self.state = DraftState::Active(draft);
        match &self.state {
            DraftState::Active(draft) => Ok(draft),
            DraftState::Idle => Err(RuqlError::NoDraftInProgress),
        }
    }

    /// Change the draft's resource type
    ///
    /// Valid at any stage. Already-entered content is kept; a shape
    /// mismatch against the new type's template is logged, never fatal.
    pub fn select_resource_type(&mut self, config: &EngineConfig, name: &str) -> Result<()> {
        let resource_type = config
            .resource_type(name)
            .ok_or_else(|| RuqlError::UnknownResourceType {
                name: name.to_string(),
            })?;
        let draft = self.active_mut()?;

        if let Some(json) = &draft.json {
            if !same_shape(json, &resource_type.template) {
                tracing::warn!(
                    id = %draft.id,
                    r#type = name,
                    "draft content shape differs from the new type's template; content kept"
                );
            }
        }
        draft.resource_type_name = name.to_string();
        Ok(())
    }

    /// Assign the draft's id
    ///
    /// The id must satisfy the dotted-path grammar; empty strings and
    /// malformed paths are rejected outright.
    pub fn update_id(&mut self, raw: &str) -> Result<()> {
        ResourceId::validate(raw)?;
        let draft = self.active_mut()?;
        draft.id = raw.to_string();
        if draft.stage < DraftStage::IdAssigned {
            draft.stage = DraftStage::IdAssigned;
        }
        Ok(())
    }

    /// Store working content for the draft
    pub fn update_json(&mut self, value: Value) -> Result<()> {
        let draft = self.active_mut()?;
        draft.json = Some(value);
        if draft.stage < DraftStage::ContentEdited {
            draft.stage = DraftStage::ContentEdited;
        }
        Ok(())
    }

    /// Promote the draft into the pending overlay and reset to idle
    ///
    /// Fails with a temporary-id error while the placeholder is still in
    /// place. Conditions are stamped from the applied context exactly as in
    /// the atomic creation path; content falls back to the type template.
    #[tracing::instrument(skip_all)]
    pub fn save_as_pending(
        &mut self,
        config: &EngineConfig,
        manager: &ResourceManager,
        overlay: &mut OverlayStore,
        applied: &QualifierContext,
    ) -> Result<ResourceId> {
        let draft = self.active_mut()?;
        if draft.has_placeholder_id() {
            return Err(RuqlError::TemporaryId {
                id: draft.id.clone(),
            });
        }
        let id = ResourceId::new(&draft.id)?;

        let template = config
            .resource_type(&draft.resource_type_name)
            .map(|t| t.template.clone())
            .ok_or_else(|| RuqlError::UnknownResourceType {
                name: draft.resource_type_name.clone(),
            })?;
        let value = draft.json.clone().unwrap_or(template);

        let entry = PendingResource {
            id: id.clone(),
            resource_type_name: draft.resource_type_name.clone(),
            candidates: vec![Candidate::with_conditions(value, stamp_conditions(applied))],
            kind: PendingKind::New,
            created_at: chrono::Utc::now(),
        };
        overlay.insert_pending(manager, entry)?;

        tracing::debug!(id = %id, "draft saved as pending");
        self.state = DraftState::Idle;
        Ok(id)
    }

    /// Discard the draft and reset to idle; the overlay is untouched
    pub fn cancel(&mut self) -> Result<()> {
        self.active_mut()?;
        self.state = DraftState::Idle;
        Ok(())
    }

    fn active_mut(&mut self) -> Result<&mut Draft> {
        match &mut self.state {
            DraftState::Idle => Err(RuqlError::NoDraftInProgress),
            DraftState::Active(draft) => Ok(draft),
        }
    }
}

/// Whether two JSON values have the same top-level shape
fn same_shape(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
