//! Object store access
//!
//! [`ObjectStore`] is the seam between the orchestrator and the storage
//! service. [`transfer`] holds the upload and download steps built on it.

pub mod aws_cli;
pub mod backend;
pub mod local;
pub mod transfer;

pub use aws_cli::AwsCliStore;
pub use backend::{ObjectStore, Probe};
pub use local::LocalStore;

use crate::config::{Backend, StoreConfig};
use crate::error::{TreestashError, TreestashResult};

/// Create the store selected in configuration
pub fn create_store(config: &StoreConfig) -> TreestashResult<Box<dyn ObjectStore>> {
    match config.backend {
        Backend::AwsCli => Ok(Box::new(AwsCliStore::new(config))),
        Backend::Local => {
            let root = config
                .local_root
                .clone()
                .ok_or(TreestashError::LocalRootMissing)?;
            Ok(Box::new(LocalStore::new(root)))
        }
    }
}
