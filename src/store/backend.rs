//! Object store abstraction
//!
//! Provides a trait for the three store round trips the action needs, so the
//! AWS CLI and a plain directory can back the same cache/fetch logic.

use crate::error::TreestashResult;
use async_trait::async_trait;
use std::fmt;
use tokio::io::AsyncWrite;

/// Outcome of a metadata-only existence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Object exists
    Present,
    /// Store confirmed the object does not exist
    Absent,
    /// Store could not be asked (permissions, network, missing CLI)
    Unknown(String),
}

impl Probe {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
            Self::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// Abstract object store interface
///
/// Keys live in a flat namespace per bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether `key` exists without reading its content
    async fn probe(&self, bucket: &str, key: &str) -> Probe;

    /// Store `body` under `key` in a single request
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> TreestashResult<()>;

    /// Stream the object at `key` into `writer`, returning the bytes copied
    ///
    /// Returns only once the whole body has been written or an error occurred
    /// on either side of the copy.
    async fn get(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> TreestashResult<u64>;

    /// Human-readable backend name for logs
    fn backend_name(&self) -> &'static str;
}
