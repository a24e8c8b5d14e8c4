//! Resource identifiers
//!
//! A resource id is a dotted path: `segment(.segment)*`, where each segment
//! starts with a letter or underscore and continues with letters, digits,
//! underscores, or hyphens. Examples: `platform.login.title`,
//! `app.errors.not-found`. Ids are unique across the committed collection
//! and the pending overlay combined.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuqlError};

/// Prefix used for draft placeholder ids before a real id is assigned.
pub const PLACEHOLDER_PREFIX: &str = "new-resource-";

/// A validated, dotted-path resource id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a new ResourceId from a raw string (with validation)
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(ResourceId(id))
    }

    /// Validate an id string against the dotted-path grammar
    pub fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(RuqlError::InvalidResourceId { id: id.to_string() });
        }

        for segment in id.split('.') {
            if !valid_segment(segment) {
                return Err(RuqlError::InvalidResourceId { id: id.to_string() });
            }
        }

        Ok(())
    }

    /// Whether a string is a syntactically valid resource id
    pub fn is_valid(id: &str) -> bool {
        Self::validate(id).is_ok()
    }

    /// Get the id string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dotted segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The id of the implied parent folder, if any
    ///
    /// `platform.login.title` → `platform.login`; single-segment ids have
    /// no parent.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('.').map(|idx| &self.0[..idx])
    }

    /// The final segment of the id
    pub fn leaf(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

fn valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Whether an id is a draft placeholder rather than a user-assigned id
pub fn is_placeholder(id: &str) -> bool {
    id.strip_prefix(PLACEHOLDER_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

impl FromStr for ResourceId {
    type Err = RuqlError;

    fn from_str(s: &str) -> Result<Self> {
        ResourceId::new(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
