//! Error types for treestash
//!
//! All modules use `TreestashResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for treestash operations
pub type TreestashResult<T> = Result<T, TreestashError>;

/// All errors that can occur in treestash
#[derive(Error, Debug)]
pub enum TreestashError {
    // Configuration errors
    #[error("Operation: {0} is invalid. Should be either cache or fetch")]
    InvalidOperation(String),

    #[error("Input required and not supplied: {0}")]
    MissingInput(&'static str),

    #[error("Invalid tree hash {value:?}: {reason}")]
    InvalidTreeHash { value: String, reason: &'static str },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Store backend 'local' requires [store].local_root to be set")]
    LocalRootMissing,

    // Version-control errors
    #[error("git rev-parse failed in {workdir}: {stderr}")]
    TreeHash { workdir: PathBuf, stderr: String },

    // Object-store errors
    #[error("Existence check for s3://{bucket}/{key} failed: {reason}")]
    ProbeFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Upload of s3://{bucket}/{key} failed: {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Download of s3://{bucket}/{key} failed: {reason}")]
    Download {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("AWS credentials not configured. Run: aws configure")]
    AwsNotConfigured,

    // Archive errors
    #[error("Archive error for {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Archive entry escapes working directory: {0}")]
    UnsafeEntry(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl TreestashError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an archive error for a path
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error was caused by bad inputs rather than an external service
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation(_)
                | Self::MissingInput(_)
                | Self::InvalidTreeHash { .. }
                | Self::ConfigInvalid { .. }
                | Self::LocalRootMissing
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AwsNotConfigured => Some("Run: aws configure, or set AWS_ACCESS_KEY_ID"),
            Self::TreeHash { .. } => Some("Run inside a git checkout (actions/checkout)"),
            Self::InvalidOperation(_) => Some("Set the operation input to cache or fetch"),
            Self::MissingInput("treeHash") => {
                Some("Pass the treeHash output of a previous cache step")
            }
            Self::LocalRootMissing => Some("Add local_root = \"/path\" under [store]"),
            _ => None,
        }
    }
}
