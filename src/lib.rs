//! treestash - cache and restore git source trees in S3
//!
//! Archives the working tree keyed by the git tree hash of HEAD and restores
//! it on later jobs, so identical content is stored exactly once.

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod orchestrator;
pub mod output;
pub mod store;

pub use error::{TreestashError, TreestashResult};
