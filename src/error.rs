//! Error types for pdm
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown artifact, bad name format)
//! - 3: Blocked by policy (already checked out, not the holder)
//! - 4: Operation failed (git error, lock timeout, publish failure)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Exit codes for the pdm CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for pdm operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Policy blocks (exit code 3)
    #[error("{path} is already checked out by {holder}")]
    AlreadyCheckedOut { path: String, holder: String },

    #[error("{path} is not checked out by {user}")]
    NotCheckedOut { path: String, user: String },

    // Operation failures (exit code 4)
    #[error("Repository lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Publish failed, working copy resynchronized to remote: {0}")]
    PublishFailed(String),

    #[error("Working copy at {path} unusable after {attempts} repair attempts: {detail}")]
    CorruptedWorkingCopy {
        path: PathBuf,
        attempts: u32,
        detail: String,
    },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidName(_)
            | Error::NotFound(_) => exit_codes::USER_ERROR,

            Error::AlreadyCheckedOut { .. } | Error::NotCheckedOut { .. } => {
                exit_codes::POLICY_BLOCKED
            }

            Error::LockTimeout(_)
            | Error::PublishFailed(_)
            | Error::CorruptedWorkingCopy { .. }
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable kind for JSON output and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidName(_) => "invalid_name",
            Error::NotFound(_) => "not_found",
            Error::AlreadyCheckedOut { .. } => "already_checked_out",
            Error::NotCheckedOut { .. } => "not_checked_out",
            Error::LockTimeout(_) => "lock_timeout",
            Error::PublishFailed(_) => "publish_failed",
            Error::CorruptedWorkingCopy { .. } => "corrupted_working_copy",
            Error::Git(_) => "git",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) | Error::TomlSerialize(_) => "toml",
            Error::OperationFailed(_) => "operation_failed",
        }
    }
}

/// Result type alias for pdm operations
pub type Result<T> = std::result::Result<T, Error>;
