//! Directory-backed object store
//!
//! Objects live at `<root>/<bucket>/<key>`. Useful on self-hosted runners
//! with a shared volume, and for exercising the action without S3.

use crate::error::{TreestashError, TreestashResult};
use crate::store::backend::{ObjectStore, Probe};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Object store rooted at a local directory
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path of an object
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn probe(&self, bucket: &str, key: &str) -> Probe {
        let path = self.object_path(bucket, key);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Probe::Present,
            Ok(_) => Probe::Unknown(format!("{} is not a regular file", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Probe::Absent,
            Err(e) => Probe::Unknown(format!("{}: {}", path.display(), e)),
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> TreestashResult<()> {
        let path = self.object_path(bucket, key);
        let bucket_dir = self.root.join(bucket);
        let upload_error = |reason: String| TreestashError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        fs::create_dir_all(&bucket_dir)
            .await
            .map_err(|e| upload_error(format!("creating {}: {}", bucket_dir.display(), e)))?;

        // Readers never observe a half-written object
        let staging = bucket_dir.join(format!(".{}.part", key));
        fs::write(&staging, &body)
            .await
            .map_err(|e| upload_error(format!("writing {}: {}", staging.display(), e)))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|e| upload_error(format!("renaming to {}: {}", path.display(), e)))?;

        debug!("Stored {} bytes at {}", body.len(), path.display());
        Ok(())
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> TreestashResult<u64> {
        let path = self.object_path(bucket, key);
        let download_error = |reason: String| TreestashError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                download_error("NoSuchKey".to_string())
            } else {
                download_error(format!("opening {}: {}", path.display(), e))
            }
        })?;

        let copied = tokio::io::copy(&mut file, &mut *writer)
            .await
            .map_err(|e| download_error(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| download_error(format!("flushing local file: {}", e)))?;

        Ok(copied)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
