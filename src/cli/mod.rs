//! Command-line interface
//!
//! One invocation is one action run: load config, validate inputs, then hand
//! off to the orchestrator.

pub mod args;

pub use args::Cli;

use crate::config::{ConfigManager, Settings};
use crate::error::TreestashResult;
use crate::git::GitTreeResolver;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::output::GithubOutput;
use crate::store::create_store;
use tracing::{debug, info};

/// Execute one cache or fetch run
pub async fn execute(cli: Cli) -> TreestashResult<Outcome> {
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::discover(&cli.workdir),
    };
    if let Some(path) = config_manager.path() {
        debug!("Using config file {}", path.display());
    }
    let config = config_manager.load().await?;

    let settings = Settings::resolve(cli.inputs(), config, cli.workdir.clone())?;
    debug!("Resolved settings: {:?}", settings);

    let store = create_store(&settings.store)?;
    let resolver = GitTreeResolver::new();
    let mut outputs = GithubOutput::from_env();

    let outcome = Orchestrator::new(&resolver, store.as_ref())
        .run(&settings, &mut outputs)
        .await?;

    match &outcome {
        Outcome::AlreadyCached(hash) => info!("Nothing to upload for {}", hash),
        Outcome::Uploaded { tree_hash, bytes } => {
            info!("Cached {} ({} bytes)", tree_hash, bytes)
        }
        Outcome::Restored { tree_hash, entries } => {
            info!("Restored {} ({} entries)", tree_hash, entries)
        }
    }

    Ok(outcome)
}
