//! Qualifier context handling
//!
//! Two context instances are tracked per session: `pending` (being edited)
//! and `applied` (last committed, used for resolution and stamping). A
//! qualifier value of `None` or the empty string counts as unset; the two
//! are indistinguishable when comparing pending against applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A qualifier-name → value mapping, where absent and empty both mean unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifierContext(BTreeMap<String, Option<String>>);

impl QualifierContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with every named qualifier present but unset
    pub fn with_qualifiers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QualifierContext(names.into_iter().map(|n| (n.into(), None)).collect())
    }

    /// Set (or unset) a qualifier value
    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.insert(name.into(), value);
    }

    /// The raw value for a qualifier, if one is set
    ///
    /// Empty strings are treated as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Whether the qualifier has a defined, non-empty value
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over qualifiers with a defined, non-empty value
    pub fn set_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name.as_str(), v))
        })
    }

    /// Number of qualifiers with a defined value
    pub fn set_count(&self) -> usize {
        self.set_values().count()
    }

    /// All qualifier names present in this context, set or not
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The normalized view used for change comparison: set values only
    fn normalized(&self) -> BTreeMap<&str, &str> {
        self.set_values().collect()
    }
}

/// Pending vs applied context state for one engine session
#[derive(Debug, Clone)]
pub struct ContextStore {
    pending: QualifierContext,
    applied: QualifierContext,
}

impl ContextStore {
    /// Create a store with every configured qualifier unset in both states
    pub fn new<I, S>(qualifier_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = QualifierContext::with_qualifiers(qualifier_names);
        let applied = pending.clone();
        ContextStore { pending, applied }
    }

    /// Set a pending qualifier value; never fails
    pub fn update_value(&mut self, name: impl Into<String>, value: Option<String>) {
        self.pending.set(name, value);
    }

    /// Whether the pending context differs from the applied one
    ///
    /// Compared under normalization: unset and empty-string values are
    /// ignored on both sides.
    pub fn has_pending_changes(&self) -> bool {
        self.pending.normalized() != self.applied.normalized()
    }

    /// Copy pending → applied; returns whether the applied context changed
    pub fn apply(&mut self) -> bool {
        let changed = self.has_pending_changes();
        self.applied = self.pending.clone();
        changed
    }

    /// The context being edited
    pub fn pending(&self) -> &QualifierContext {
        &self.pending
    }

    /// The last committed context, used for resolution and stamping
    pub fn applied(&self) -> &QualifierContext {
        &self.applied
    }
}
