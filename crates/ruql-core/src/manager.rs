//! Base resource manager
//!
//! The committed, immutably-compiled resource collection. The pending
//! overlay never mutates this collection directly; the only write path is
//! [`ResourceManager::commit_batch`], which applies a validated batch
//! all-or-nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuqlError};
use crate::resource::{ResourceDecl, ResourceId};
use crate::tree::ResourceTree;

/// A JSON-serializable collection of resource declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    /// Declarations in bundle order
    pub resources: Vec<ResourceDecl>,
}

impl Bundle {
    /// Parse a bundle from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A batch of changes committed into the base collection atomically
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    /// New or replacing declarations
    pub upserts: Vec<ResourceDecl>,
    /// Ids to remove from the collection
    pub deletes: Vec<ResourceId>,
}

impl CommitBatch {
    /// Whether the batch carries no changes
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// The base (committed) resource collection
#[derive(Debug, Clone, Default)]
pub struct ResourceManager {
    resources: BTreeMap<ResourceId, ResourceDecl>,
}

impl ResourceManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from a set of declarations, rejecting duplicate ids
    pub fn from_declarations(decls: Vec<ResourceDecl>) -> Result<Self> {
        let mut resources = BTreeMap::new();
        for decl in decls {
            let id = decl.id.clone();
            if resources.insert(id.clone(), decl).is_some() {
                return Err(RuqlError::ResourceExists { id: id.to_string() });
            }
        }
        Ok(ResourceManager { resources })
    }

    /// Build a manager from a parsed bundle
    pub fn from_bundle(bundle: Bundle) -> Result<Self> {
        Self::from_declarations(bundle.resources)
    }

    /// Fetch the built declaration for an id
    pub fn get_built_resource(&self, id: &ResourceId) -> Result<&ResourceDecl> {
        self.resources
            .get(id)
            .ok_or_else(|| RuqlError::ResourceNotFound { id: id.to_string() })
    }

    /// Whether the collection contains an id
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    /// Ids in the collection, in sorted order
    pub fn resource_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.resources.keys()
    }

    /// Declarations in the collection, in id order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDecl> {
        self.resources.values()
    }

    /// Number of resources in the collection
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Export the collection as a bundle
    pub fn to_bundle(&self) -> Bundle {
        Bundle {
            resources: self.resources.values().cloned().collect(),
        }
    }

    /// Build the folder tree implied by the dotted resource ids
    pub fn build_resource_tree(&self) -> ResourceTree {
        ResourceTree::build(self.resources.keys())
    }

    /// Apply a batch of changes atomically
    ///
    /// The whole batch is validated before any entry is applied: every
    /// delete must name an existing resource, and upsert ids must be unique
    /// within the batch. On any validation failure the collection is left
    /// untouched.
    #[tracing::instrument(skip(self, batch), fields(upserts = batch.upserts.len(), deletes = batch.deletes.len()))]
    pub fn commit_batch(&mut self, batch: CommitBatch) -> Result<()> {
        for id in &batch.deletes {
            if !self.resources.contains_key(id) {
                return Err(RuqlError::ResourceNotFound { id: id.to_string() });
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for decl in &batch.upserts {
            if !seen.insert(&decl.id) {
                return Err(RuqlError::ResourceExists {
                    id: decl.id.to_string(),
                });
            }
        }

        for id in &batch.deletes {
            self.resources.remove(id);
        }
        for decl in batch.upserts {
            self.resources.insert(decl.id.clone(), decl);
        }

        tracing::debug!(total = self.resources.len(), "commit_batch applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Candidate;
    use serde_json::json;

    fn decl(id: &str) -> ResourceDecl {
        ResourceDecl::single(
            ResourceId::new(id).unwrap(),
            "json",
            Candidate::unconditional(json!({ "id": id })),
        )
    }

    #[test]
    fn test_from_declarations_rejects_duplicates() {
        let result = ResourceManager::from_declarations(vec![decl("a.b"), decl("a.b")]);
        assert!(matches!(result, Err(RuqlError::ResourceExists { .. })));
    }

    #[test]
    fn test_get_built_resource() {
        let manager = ResourceManager::from_declarations(vec![decl("a.b")]).unwrap();
        assert!(manager.get_built_resource(&ResourceId::new("a.b").unwrap()).is_ok());
        assert!(matches!(
            manager.get_built_resource(&ResourceId::new("a.c").unwrap()),
            Err(RuqlError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_commit_batch_applies_all() {
        let mut manager = ResourceManager::from_declarations(vec![decl("a.b")]).unwrap();
        let batch = CommitBatch {
            upserts: vec![decl("a.c")],
            deletes: vec![ResourceId::new("a.b").unwrap()],
        };
        manager.commit_batch(batch).unwrap();
        assert!(!manager.contains(&ResourceId::new("a.b").unwrap()));
        assert!(manager.contains(&ResourceId::new("a.c").unwrap()));
    }

    #[test]
    fn test_commit_batch_is_all_or_nothing() {
        let mut manager = ResourceManager::from_declarations(vec![decl("a.b")]).unwrap();
        let before = manager.to_bundle();

        let batch = CommitBatch {
            upserts: vec![decl("a.c")],
            deletes: vec![ResourceId::new("ghost").unwrap()],
        };
        assert!(manager.commit_batch(batch).is_err());

        let after = manager.to_bundle();
        assert_eq!(
            serde_json::to_value(&before.resources).unwrap(),
            serde_json::to_value(&after.resources).unwrap()
        );
    }

    #[test]
    fn test_bundle_round_trip() {
        let manager =
            ResourceManager::from_declarations(vec![decl("a.b"), decl("a.c")]).unwrap();
        let text = serde_json::to_string(&manager.to_bundle()).unwrap();
        let reloaded = ResourceManager::from_bundle(Bundle::from_json_str(&text).unwrap()).unwrap();
        assert_eq!(reloaded.len(), 2);
    }
}
