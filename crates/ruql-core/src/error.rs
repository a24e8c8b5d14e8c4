//! Error types and exit codes for ruql
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure
//! - 2: Usage error (bad flags/args)
//! - 3: Data error (invalid id, missing resource, bad bundle)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the ruql CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data error - invalid id, unknown resource, bad bundle (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur during ruql operations
#[derive(Error, Debug)]
pub enum RuqlError {
    // Usage errors (exit code 2)
    #[error("unknown format: {0} (expected: human, json, or records)")]
    UnknownFormat(String),

    #[error("invalid context assignment: {0} (expected: qualifier=value)")]
    InvalidContextArg(String),

    #[error("{0}")]
    UsageError(String),

    // Data errors (exit code 3)
    #[error("invalid resource id: {id}")]
    InvalidResourceId { id: String },

    #[error("resource already exists: {id}")]
    ResourceExists { id: String },

    #[error("resource not found: {id}")]
    ResourceNotFound { id: String },

    #[error("resource type not found: {name}")]
    UnknownResourceType { name: String },

    #[error("resource id {id} is a temporary placeholder; assign an id before saving")]
    TemporaryId { id: String },

    #[error("no draft in progress")]
    NoDraftInProgress,

    #[error("a draft is already in progress for {id}")]
    DraftInProgress { id: String },

    #[error("a filter operation is already in progress")]
    FilterInProgress,

    #[error("invalid value {value:?} for qualifier {qualifier}: {reason}")]
    InvalidQualifierValue {
        qualifier: String,
        value: String,
        reason: String,
    },

    #[error("unknown qualifier: {name}")]
    UnknownQualifier { name: String },

    #[error("invalid condition on {id}: {reason}")]
    InvalidCondition { id: String, reason: String },

    #[error("cannot delete {id}: not a committed resource")]
    NotDeletable { id: String },

    #[error("invalid bundle {path:?}: {reason}")]
    InvalidBundle { path: PathBuf, reason: String },

    // Generic failures (exit code 1)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl RuqlError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RuqlError::UnknownFormat(_)
            | RuqlError::InvalidContextArg(_)
            | RuqlError::UsageError(_) => ExitCode::Usage,

            RuqlError::InvalidResourceId { .. }
            | RuqlError::ResourceExists { .. }
            | RuqlError::ResourceNotFound { .. }
            | RuqlError::UnknownResourceType { .. }
            | RuqlError::TemporaryId { .. }
            | RuqlError::NoDraftInProgress
            | RuqlError::DraftInProgress { .. }
            | RuqlError::FilterInProgress
            | RuqlError::InvalidQualifierValue { .. }
            | RuqlError::UnknownQualifier { .. }
            | RuqlError::InvalidCondition { .. }
            | RuqlError::NotDeletable { .. }
            | RuqlError::InvalidBundle { .. } => ExitCode::Data,

            RuqlError::Io(_) | RuqlError::Json(_) | RuqlError::Toml(_) | RuqlError::Other(_) => {
                ExitCode::Failure
            }
        }
    }

    /// Convert error to JSON representation for structured error output
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }

    /// Get the error type identifier
    fn error_type(&self) -> &'static str {
        match self {
            RuqlError::UnknownFormat(_) => "unknown_format",
            RuqlError::InvalidContextArg(_) => "invalid_context_arg",
            RuqlError::UsageError(_) => "usage_error",
            RuqlError::InvalidResourceId { .. } => "invalid_resource_id",
            RuqlError::ResourceExists { .. } => "resource_exists",
            RuqlError::ResourceNotFound { .. } => "resource_not_found",
            RuqlError::UnknownResourceType { .. } => "unknown_resource_type",
            RuqlError::TemporaryId { .. } => "temporary_id",
            RuqlError::NoDraftInProgress => "no_draft_in_progress",
            RuqlError::DraftInProgress { .. } => "draft_in_progress",
            RuqlError::FilterInProgress => "filter_in_progress",
            RuqlError::InvalidQualifierValue { .. } => "invalid_qualifier_value",
            RuqlError::UnknownQualifier { .. } => "unknown_qualifier",
            RuqlError::InvalidCondition { .. } => "invalid_condition",
            RuqlError::NotDeletable { .. } => "not_deletable",
            RuqlError::InvalidBundle { .. } => "invalid_bundle",
            RuqlError::Io(_) => "io_error",
            RuqlError::Json(_) => "json_error",
            RuqlError::Toml(_) => "toml_error",
            RuqlError::Other(_) => "other",
        }
    }
}

/// Result type alias for ruql operations
pub type Result<T> = std::result::Result<T, RuqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            RuqlError::InvalidResourceId { id: "x!".into() }.exit_code(),
            ExitCode::Data
        );
        assert_eq!(
            RuqlError::UnknownFormat("xml".into()).exit_code(),
            ExitCode::Usage
        );
        assert_eq!(
            RuqlError::Other("boom".into()).exit_code(),
            ExitCode::Failure
        );
    }

    #[test]
    fn test_error_json_envelope() {
        let err = RuqlError::ResourceNotFound {
            id: "platform.missing".into(),
        };
        let json = err.to_json();
        assert_eq!(json["error"]["code"], 3);
        assert_eq!(json["error"]["type"], "resource_not_found");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("platform.missing"));
    }
}
