//! Error types for the launchpad orchestrator

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for a successful run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for fatal or unclassified errors
pub const EXIT_FATAL: i32 = 1;
/// Exit code when required tooling is missing
pub const EXIT_PREREQUISITES: i32 = 2;
/// Exit code when an external command exhausted its retries
pub const EXIT_EXHAUSTED: i32 = 3;
/// Exit code for configuration errors and user cancellation
pub const EXIT_CONFIG_OR_CANCELLED: i32 = 4;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Prerequisites missing for {target}: {}", .tools.join(", "))]
    PrerequisiteMissing { target: String, tools: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("{description} failed after {attempts} attempt(s)")]
    ExecutionExhausted { description: String, attempts: u32 },

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Unable to open log file {path:?}: {source}")]
    LogUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LaunchError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::PrerequisiteMissing { .. } => EXIT_PREREQUISITES,
            LaunchError::ExecutionExhausted { .. } => EXIT_EXHAUSTED,
            LaunchError::Config(_) | LaunchError::Cancelled(_) => EXIT_CONFIG_OR_CANCELLED,
            LaunchError::VerificationFailed(_)
            | LaunchError::LogUnavailable { .. }
            | LaunchError::IoError(_)
            | LaunchError::JsonError(_)
            | LaunchError::HttpError(_)
            | LaunchError::Internal(_) => EXIT_FATAL,
        }
    }

    /// Whether the operator declined a confirmation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LaunchError::Cancelled(_))
    }
}
