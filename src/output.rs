//! Workflow outputs and failure reporting
//!
//! Outputs are appended to the file named by `$GITHUB_OUTPUT`. Outside a
//! runner they fall back to workflow commands on stdout.

use async_trait::async_trait;
use console::style;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{TreestashError, TreestashResult};

/// Delimiter for multi-line output values
const HEREDOC_DELIMITER: &str = "TREESTASH_EOF";

/// Destination for step outputs
#[async_trait]
pub trait OutputSink: Send {
    async fn set_output(&mut self, name: &str, value: &str) -> TreestashResult<()>;
}

/// Outputs for a GitHub Actions step
pub struct GithubOutput {
    path: Option<PathBuf>,
}

impl GithubOutput {
    /// Use `$GITHUB_OUTPUT` when present
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os("GITHUB_OUTPUT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn format_entry(name: &str, value: &str) -> String {
        if value.contains('\n') {
            format!("{name}<<{HEREDOC_DELIMITER}\n{value}\n{HEREDOC_DELIMITER}\n")
        } else {
            format!("{name}={value}\n")
        }
    }
}

#[async_trait]
impl OutputSink for GithubOutput {
    async fn set_output(&mut self, name: &str, value: &str) -> TreestashResult<()> {
        let Some(path) = &self.path else {
            println!("::set-output name={}::{}", name, escape_data(value));
            return Ok(());
        };

        debug!("Writing output {} to {}", name, path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| TreestashError::io(format!("opening {}", path.display()), e))?;
        file.write_all(Self::format_entry(name, value).as_bytes())
            .await
            .map_err(|e| TreestashError::io(format!("writing {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| TreestashError::io(format!("writing {}", path.display()), e))
    }
}

/// Escape a value for a workflow command
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Whether we are running as an Actions step
pub fn in_github_actions() -> bool {
    std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true")
}

/// Mark the invocation failed with the error's message
pub fn report_failure(err: &TreestashError) {
    let message = failure_message(err);

    if in_github_actions() {
        println!("::error::{}", escape_data(&message));
        if let Some(hint) = err.hint() {
            println!("::notice::{}", escape_data(hint));
        }
    } else {
        eprintln!("{} {}", style("Error:").red().bold(), message);
        if let Some(hint) = err.hint() {
            eprintln!("{} {}", style("Hint:").yellow(), hint);
        }
    }
}

/// Error message followed by each cause in its source chain
pub fn failure_message(err: &TreestashError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    message
}
