//! Configuration schema for treestash
//!
//! Optional file, `.treestash.toml` in the working directory or `--config`.
//! Action inputs override anything set here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object store settings
    pub store: StoreConfig,

    /// Archive settings
    pub archive: ArchiveConfig,
}

/// Which object store implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// S3 through the `aws` command line tool
    #[default]
    AwsCli,
    /// Plain directory tree, one subdirectory per bucket
    Local,
}

/// What the cache path does when the existence check itself fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeFailurePolicy {
    /// Treat as not cached and upload again
    #[default]
    Reupload,
    /// Fail the invocation
    Abort,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend
    pub backend: Backend,

    /// Default bucket when the s3Bucket input is empty
    pub bucket: Option<String>,

    /// AWS region
    pub region: Option<String>,

    /// AWS profile to use
    pub profile: Option<String>,

    /// Custom S3 endpoint (MinIO, R2, ...)
    pub endpoint_url: Option<String>,

    /// AWS CLI binary
    pub aws_cli: String,

    /// Root directory for the local backend
    pub local_root: Option<PathBuf>,

    /// Handling of failed existence checks
    pub probe_failure: ProbeFailurePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::AwsCli,
            bucket: None,
            region: None,
            profile: None,
            endpoint_url: None,
            aws_cli: "aws".to_string(),
            local_root: None,
            probe_failure: ProbeFailurePolicy::Reupload,
        }
    }
}

/// Archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Name of the archive written into the working directory
    pub file_name: String,

    /// Delete .git before archiving
    pub remove_git_dir: bool,

    /// Suppress per-file archive output
    pub quiet: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: "src.zip".to_string(),
            remove_git_dir: false,
            quiet: false,
        }
    }
}
