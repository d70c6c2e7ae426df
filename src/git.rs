//! Tree identifier resolution
//!
//! The cache key is the hash of the checked-out tree object (`HEAD:`), not the
//! commit. Two commits with identical content share one archive.

use crate::error::{TreestashError, TreestashResult};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;
use tracing::debug;

/// Content hash of a source tree, used as the object key stem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeHash(String);

impl TreeHash {
    /// Object key for the archive of this tree
    pub fn object_key(&self) -> String {
        format!("{}.zip", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TreeHash {
    type Err = TreestashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| TreestashError::InvalidTreeHash {
            value: s.to_string(),
            reason,
        };

        if s.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("must not contain whitespace"));
        }
        // The hash names a file in the working directory on fetch
        if s.contains(['/', '\\']) || s == "." || s == ".." {
            return Err(invalid("must not contain path separators"));
        }

        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of tree identifiers
#[async_trait]
pub trait TreeResolver: Send + Sync {
    /// Resolve the tree hash of the checkout rooted at `workdir`
    async fn resolve(&self, workdir: &Path) -> TreestashResult<TreeHash>;
}

/// Resolves tree hashes with `git rev-parse HEAD:`
pub struct GitTreeResolver {
    git: String,
}

impl GitTreeResolver {
    pub fn new() -> Self {
        Self {
            git: "git".to_string(),
        }
    }

    /// Use a specific git binary
    pub fn with_binary(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }
}

impl Default for GitTreeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TreeResolver for GitTreeResolver {
    async fn resolve(&self, workdir: &Path) -> TreestashResult<TreeHash> {
        debug!("Executing: {} rev-parse HEAD: in {}", self.git, workdir.display());

        let output = Command::new(&self.git)
            .args(["rev-parse", "HEAD:"])
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TreestashError::command_failed(format!("{} rev-parse HEAD:", self.git), e))?;

        if !output.status.success() {
            return Err(TreestashError::TreeHash {
                workdir: workdir.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Resolved tree hash {}", hash);
        hash.parse()
    }
}
