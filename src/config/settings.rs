//! Resolution of action inputs into validated settings
//!
//! Inputs come from the workflow as strings (`INPUT_*` variables or flags).
//! Empty strings count as unset, matching how runners pass omitted inputs.

use super::schema::{Config, StoreConfig};
use crate::error::{TreestashError, TreestashResult};
use crate::git::TreeHash;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which path the orchestrator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Archive and upload the tree unless already stored
    Cache,
    /// Download and expand a stored tree
    Fetch,
}

impl FromStr for Operation {
    type Err = TreestashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache" => Ok(Self::Cache),
            "fetch" => Ok(Self::Fetch),
            other => Err(TreestashError::InvalidOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Fetch => write!(f, "fetch"),
        }
    }
}

/// Raw action inputs, exactly as received
#[derive(Debug, Clone, Default)]
pub struct ActionInputs {
    pub s3_bucket: Option<String>,
    pub operation: Option<String>,
    pub remove_git_dir: Option<String>,
    pub quiet: Option<String>,
    pub tree_hash: Option<String>,
}

/// Validated settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub operation: Operation,
    pub bucket: String,
    pub remove_git_dir: bool,
    pub quiet: bool,
    /// Set only for fetch
    pub tree_hash: Option<TreeHash>,
    pub archive_file_name: String,
    pub workdir: PathBuf,
    pub store: StoreConfig,
}

impl Settings {
    /// Merge inputs over the config file and validate
    ///
    /// Performs no I/O, so every configuration error surfaces before the
    /// first external call.
    pub fn resolve(inputs: ActionInputs, config: Config, workdir: PathBuf) -> TreestashResult<Self> {
        let bucket = non_empty(inputs.s3_bucket)
            .or(config.store.bucket.clone())
            .ok_or(TreestashError::MissingInput("s3Bucket"))?;

        let operation: Operation = non_empty(inputs.operation)
            .ok_or(TreestashError::MissingInput("operation"))?
            .parse()?;

        let tree_hash = match operation {
            Operation::Fetch => Some(
                non_empty(inputs.tree_hash)
                    .ok_or(TreestashError::MissingInput("treeHash"))?
                    .parse::<TreeHash>()?,
            ),
            Operation::Cache => None,
        };

        Ok(Self {
            operation,
            bucket,
            remove_git_dir: parse_bool_input(inputs.remove_git_dir.as_deref())
                .unwrap_or(config.archive.remove_git_dir),
            quiet: parse_bool_input(inputs.quiet.as_deref()).unwrap_or(config.archive.quiet),
            tree_hash,
            archive_file_name: config.archive.file_name,
            workdir,
            store: config.store,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Boolean input: only the exact string `true` is true; unset or empty defers to config
pub fn parse_bool_input(value: Option<&str>) -> Option<bool> {
    match value.map(str::trim) {
        None | Some("") => None,
        Some(v) => Some(v == "true"),
    }
}
