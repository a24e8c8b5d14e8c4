//! Resource declarations, candidates, and conditions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuqlError;
use crate::resource::ResourceId;

/// How a candidate condition compares a qualifier value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    /// The context value must match the condition value
    #[default]
    Matches,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionOperator::Matches => write!(f, "matches"),
        }
    }
}

/// How a winning partial candidate combines with the next-best candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// The candidate value replaces any less specific value outright
    #[default]
    Replace,
    /// The candidate value is overlaid object-key-by-object-key onto the
    /// next-best full candidate
    Augment,
}

impl FromStr for MergeMethod {
    type Err = RuqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(MergeMethod::Replace),
            "augment" => Ok(MergeMethod::Augment),
            other => Err(RuqlError::Other(format!("unknown merge method: {}", other))),
        }
    }
}

/// One qualifier constraint on a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Qualifier name this condition constrains
    pub qualifier_name: String,
    /// Comparison operator
    #[serde(default)]
    pub operator: ConditionOperator,
    /// Value the context must provide
    pub value: String,
}

impl Condition {
    /// Create a `matches` condition
    pub fn matches(qualifier_name: impl Into<String>, value: impl Into<String>) -> Self {
        Condition {
            qualifier_name: qualifier_name.into(),
            operator: ConditionOperator::Matches,
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qualifier_name, self.operator, self.value)
    }
}

/// One conditional variant of a resource's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// The JSON payload this candidate supplies
    pub value: Value,
    /// Ordered qualifier constraints; empty means unconditional
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Whether this candidate holds a partial value meant to be merged
    #[serde(default)]
    pub is_partial: bool,
    /// Merge behavior when this candidate wins
    #[serde(default)]
    pub merge_method: MergeMethod,
}

impl Candidate {
    /// Create an unconditional, full candidate
    pub fn unconditional(value: Value) -> Self {
        Candidate {
            value,
            conditions: Vec::new(),
            is_partial: false,
            merge_method: MergeMethod::Replace,
        }
    }

    /// Create a full candidate with the given conditions
    pub fn with_conditions(value: Value, conditions: Vec<Condition>) -> Self {
        Candidate {
            value,
            conditions,
            is_partial: false,
            merge_method: MergeMethod::Replace,
        }
    }

    /// Find the condition constraining a qualifier, if present
    pub fn condition_for(&self, qualifier_name: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.qualifier_name == qualifier_name)
    }
}

/// A resource declaration: an id, a type, and its candidate set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Globally unique dotted-path id
    pub id: ResourceId,
    /// Name of the resource type that produced this declaration
    pub resource_type_name: String,
    /// Candidate variants, in declaration order
    pub candidates: Vec<Candidate>,
}

impl ResourceDecl {
    /// Create a declaration with a single candidate
    pub fn single(
        id: ResourceId,
        resource_type_name: impl Into<String>,
        candidate: Candidate,
    ) -> Self {
        ResourceDecl {
            id,
            resource_type_name: resource_type_name.into(),
            candidates: vec![candidate],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_display() {
        let cond = Condition::matches("language", "en-US");
        assert_eq!(cond.to_string(), "language matches en-US");
    }

    #[test]
    fn test_merge_method_parsing() {
        assert_eq!("replace".parse::<MergeMethod>().unwrap(), MergeMethod::Replace);
        assert_eq!("Augment".parse::<MergeMethod>().unwrap(), MergeMethod::Augment);
        assert!("overlay".parse::<MergeMethod>().is_err());
    }

    #[test]
    fn test_candidate_serde_defaults() {
        let candidate: Candidate =
            serde_json::from_value(json!({ "value": { "msg": "hi" } })).unwrap();
        assert!(candidate.conditions.is_empty());
        assert!(!candidate.is_partial);
        assert_eq!(candidate.merge_method, MergeMethod::Replace);
    }

    #[test]
    fn test_condition_lookup() {
        let candidate = Candidate::with_conditions(
            json!("hello"),
            vec![
                Condition::matches("language", "en"),
                Condition::matches("territory", "US"),
            ],
        );
        assert_eq!(
            candidate.condition_for("territory").map(|c| c.value.as_str()),
            Some("US")
        );
        assert!(candidate.condition_for("density").is_none());
    }
}
