//! Resource model: validated ids, conditions, candidates, declarations

mod id;
mod types;

pub use id::{is_placeholder, ResourceId, PLACEHOLDER_PREFIX};
pub use types::{Candidate, Condition, ConditionOperator, MergeMethod, ResourceDecl};
