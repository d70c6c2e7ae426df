//! CLI argument definitions using clap derive
//!
//! Every input doubles as an `INPUT_*` variable so the binary can run as an
//! Actions step unchanged.

use crate::config::ActionInputs;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// treestash - cache git source trees in S3
///
/// Keys archives by the tree hash of HEAD, so identical content is stored
/// once no matter which commit produced it.
#[derive(Parser, Debug)]
#[command(name = "treestash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target bucket
    #[arg(long, env = "INPUT_S3BUCKET")]
    pub s3_bucket: Option<String>,

    /// Operation to perform: cache or fetch
    #[arg(long, env = "INPUT_OPERATION")]
    pub operation: Option<String>,

    /// Delete .git before archiving (cache only)
    #[arg(
        long,
        env = "INPUT_REMOVEGITDIR",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub remove_git_dir: Option<String>,

    /// Suppress per-file archive output
    #[arg(
        long,
        env = "INPUT_QUIET",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub quiet: Option<String>,

    /// Tree hash to restore (fetch only)
    #[arg(long, env = "INPUT_TREEHASH")]
    pub tree_hash: Option<String>,

    /// Working directory holding the checkout
    #[arg(short = 'C', long, default_value = ".")]
    pub workdir: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "TREESTASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Split off the action inputs for settings resolution
    pub fn inputs(&self) -> ActionInputs {
        ActionInputs {
            s3_bucket: self.s3_bucket.clone(),
            operation: self.operation.clone(),
            remove_git_dir: self.remove_git_dir.clone(),
            quiet: self.quiet.clone(),
            tree_hash: self.tree_hash.clone(),
        }
    }

    /// Log filter used when `RUST_LOG` is unset
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "treestash=info",
            1 => "treestash=debug",
            _ => "treestash=trace",
        }
    }
}
