//! Cache and fetch sequencing
//!
//! | Path | Steps |
//! |------|-------|
//! | cache | resolve tree hash, set output, probe, then archive and upload if needed |
//! | fetch | download `<hash>.zip`, expand it, delete it |
//!
//! Nothing is retried. The first error ends the invocation.

use crate::archive::Archiver;
use crate::config::{Operation, ProbeFailurePolicy, Settings};
use crate::error::{TreestashError, TreestashResult};
use crate::git::{TreeHash, TreeResolver};
use crate::output::OutputSink;
use crate::store::{transfer, ObjectStore, Probe};
use tracing::{info, warn};

/// Name of the output carrying the resolved tree hash
pub const TREE_HASH_OUTPUT: &str = "treeHash";

/// What an invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Archive already in the store, nothing uploaded
    AlreadyCached(TreeHash),
    /// Archive built and uploaded
    Uploaded { tree_hash: TreeHash, bytes: u64 },
    /// Archive downloaded and expanded into the working directory
    Restored { tree_hash: TreeHash, entries: usize },
}

/// Runs one cache or fetch invocation against a tree resolver and a store
pub struct Orchestrator<'a> {
    resolver: &'a dyn TreeResolver,
    store: &'a dyn ObjectStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(resolver: &'a dyn TreeResolver, store: &'a dyn ObjectStore) -> Self {
        Self { resolver, store }
    }

    /// Dispatch on the configured operation
    pub async fn run(
        &self,
        settings: &Settings,
        outputs: &mut dyn OutputSink,
    ) -> TreestashResult<Outcome> {
        match settings.operation {
            Operation::Cache => self.cache(settings, outputs).await,
            Operation::Fetch => self.fetch(settings).await,
        }
    }

    async fn cache(
        &self,
        settings: &Settings,
        outputs: &mut dyn OutputSink,
    ) -> TreestashResult<Outcome> {
        let bucket = settings.bucket.as_str();
        info!("Caching repo in {} store: {}", self.store.backend_name(), bucket);

        let tree_hash = self.resolver.resolve(&settings.workdir).await?;
        outputs.set_output(TREE_HASH_OUTPUT, tree_hash.as_str()).await?;

        let key = tree_hash.object_key();
        info!("Checking if {} is present in {}", key, bucket);

        match self.store.probe(bucket, &key).await {
            Probe::Present => {
                info!("Repo with tree hash {} has already been cached", tree_hash);
                return Ok(Outcome::AlreadyCached(tree_hash));
            }
            Probe::Absent => info!("{} is not present in {}", key, bucket),
            Probe::Unknown(reason) => match settings.store.probe_failure {
                ProbeFailurePolicy::Reupload => {
                    warn!("Could not check {} in {} ({}), uploading again", key, bucket, reason);
                }
                ProbeFailurePolicy::Abort => {
                    return Err(TreestashError::ProbeFailed {
                        bucket: bucket.to_string(),
                        key,
                        reason,
                    });
                }
            },
        }

        let archiver = Archiver::new(settings.archive_file_name.as_str(), settings.quiet);
        let archive = archiver
            .archive(&settings.workdir, settings.remove_git_dir)
            .await?;
        let bytes = transfer::upload(self.store, bucket, &tree_hash, &archive).await?;

        Ok(Outcome::Uploaded { tree_hash, bytes })
    }

    async fn fetch(&self, settings: &Settings) -> TreestashResult<Outcome> {
        let tree_hash = settings
            .tree_hash
            .clone()
            .ok_or(TreestashError::MissingInput("treeHash"))?;
        let bucket = settings.bucket.as_str();
        info!(
            "Restoring repo cache with tree hash {} from {} store: {}",
            tree_hash,
            self.store.backend_name(),
            bucket
        );

        let dest = settings.workdir.join(tree_hash.object_key());
        let archive = transfer::download(self.store, bucket, &tree_hash, &dest).await?;

        let archiver = Archiver::new(settings.archive_file_name.as_str(), settings.quiet);
        let expanded = archiver.unarchive(&archive, &settings.workdir).await;

        // Removed whether or not expansion worked
        let removed = tokio::fs::remove_file(&archive).await;
        let entries = expanded?;
        removed.map_err(|e| TreestashError::io(format!("removing {}", archive.display()), e))?;

        Ok(Outcome::Restored { tree_hash, entries })
    }
}
