//! Qualifier kinds and context value validation
//!
//! Each qualifier declared in the engine configuration has a kind that
//! governs which values a context may carry for it. Validation here is
//! syntactic only; semantics (matching, priority) belong to the resolver.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuqlError};

/// Value rules for one qualifier dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QualifierKind {
    /// BCP-47-shaped language tag: `en`, `en-US`, `zh-Hans-CN`
    LanguageTag,
    /// Two-letter territory code, normalized to uppercase
    Territory,
    /// Any non-empty string
    Literal,
    /// One of a fixed set of values
    OneOf { values: Vec<String> },
}

fn language_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("language tag pattern")
    })
}

impl QualifierKind {
    /// Validate and normalize a raw context value for this kind
    ///
    /// Returns the normalized value on success. Normalization is limited to
    /// case folding; it never changes which candidates a value can match.
    pub fn normalize(&self, qualifier: &str, raw: &str) -> Result<String> {
        match self {
            QualifierKind::LanguageTag => {
                if language_tag_re().is_match(raw) {
                    Ok(raw.to_string())
                } else {
                    Err(invalid(qualifier, raw, "not a valid language tag"))
                }
            }
            QualifierKind::Territory => {
                if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
                    Ok(raw.to_ascii_uppercase())
                } else {
                    Err(invalid(qualifier, raw, "expected a two-letter territory code"))
                }
            }
            QualifierKind::Literal => {
                if raw.is_empty() {
                    Err(invalid(qualifier, raw, "empty value"))
                } else {
                    Ok(raw.to_string())
                }
            }
            QualifierKind::OneOf { values } => values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(raw))
                .cloned()
                .ok_or_else(|| {
                    invalid(
                        qualifier,
                        raw,
                        &format!("expected one of: {}", values.join(", ")),
                    )
                }),
        }
    }
}

fn invalid(qualifier: &str, value: &str, reason: &str) -> RuqlError {
    RuqlError::InvalidQualifierValue {
        qualifier: qualifier.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
