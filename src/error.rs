//! Error types for journey
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, unknown goal/task)
//! - 3: Write reverted (an optimistic change was rolled back)
//! - 4: Operation failed (I/O, serialization, store failure)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the journey CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const WRITE_REVERTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for journey operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Goal not found: {0}")]
    GoalNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Milestone not found: {milestone} (goal {goal})")]
    MilestoneNotFound { goal: String, milestone: String },

    // Reverted writes (exit code 3)
    #[error("Change reverted: {0}")]
    WriteReverted(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Journey store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::GoalNotFound(_)
            | Error::TaskNotFound(_)
            | Error::MilestoneNotFound { .. } => exit_codes::USER_ERROR,

            Error::WriteReverted(_) => exit_codes::WRITE_REVERTED,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::Store(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::MilestoneNotFound { goal, milestone } => Some(serde_json::json!({
                "goal_id": goal,
                "milestone_id": milestone,
            })),
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for journey operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_categories() {
        assert_eq!(
            Error::TaskNotFound("t1".to_string()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::WriteReverted("offline".to_string()).exit_code(),
            exit_codes::WRITE_REVERTED
        );
        assert_eq!(
            Error::Store(anyhow::anyhow!("rejected")).exit_code(),
            exit_codes::OPERATION_FAILED
        );
    }

    #[test]
    fn milestone_details_name_both_ids() {
        let err = Error::MilestoneNotFound {
            goal: "g1".to_string(),
            milestone: "m9".to_string(),
        };
        let details = err.details().expect("details");
        assert_eq!(details["goal_id"], "g1");
        assert_eq!(details["milestone_id"], "m9");
    }
}
