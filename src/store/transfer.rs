//! Upload and download of archive objects
//!
//! Downloads are the first phase of a fetch: the object is copied to a local
//! file and the copy is awaited before anything expands it. The local file is
//! removed on every failure path.

use crate::error::{TreestashError, TreestashResult};
use crate::git::TreeHash;
use crate::store::backend::ObjectStore;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Read the archive into memory and store it under `<hash>.zip`
pub async fn upload(
    store: &dyn ObjectStore,
    bucket: &str,
    hash: &TreeHash,
    archive: &Path,
) -> TreestashResult<u64> {
    let key = hash.object_key();
    info!("Uploading {} to {}/{}", archive.display(), bucket, key);

    let body = fs::read(archive)
        .await
        .map_err(|e| TreestashError::io(format!("reading {}", archive.display()), e))?;
    let size = body.len() as u64;

    store.put(bucket, &key, body).await?;
    info!("Uploaded {} bytes", size);

    Ok(size)
}

/// Copy `<hash>.zip` from the store to `dest`, leaving nothing behind on error
pub async fn download(
    store: &dyn ObjectStore,
    bucket: &str,
    hash: &TreeHash,
    dest: &Path,
) -> TreestashResult<PathBuf> {
    let key = hash.object_key();
    info!("Downloading {}/{} to {}", bucket, key, dest.display());

    let file = fs::File::create(dest)
        .await
        .map_err(|e| TreestashError::io(format!("creating {}", dest.display()), e))?;
    let guard = PartialFile::new(dest.to_path_buf());

    let copied = copy_object(store, bucket, &key, file, dest).await?;

    info!("Downloaded {} bytes", copied);
    Ok(guard.keep())
}

/// Stream the object into `file`; the handle is closed before returning
async fn copy_object(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    mut file: fs::File,
    dest: &Path,
) -> TreestashResult<u64> {
    let copied = store.get(bucket, key, &mut file).await?;
    file.sync_all()
        .await
        .map_err(|e| TreestashError::io(format!("syncing {}", dest.display()), e))?;
    file.shutdown()
        .await
        .map_err(|e| TreestashError::io(format!("closing {}", dest.display()), e))?;
    Ok(copied)
}

/// Local file that is deleted on drop unless kept
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    /// Disarm the guard and hand back the path
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial file {}: {}", self.path.display(), e),
        }
    }
}
