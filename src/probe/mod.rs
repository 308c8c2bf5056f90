//! Existence probing: asking the storage backend which object keys are
//! already taken in a bucket.
//!
//! The reconciliation core only sees the [`ExistenceProbe`] trait. Transport,
//! authentication and retries are properties of the implementation that gets
//! injected, never of the core.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io;
use thiserror::Error;

pub mod directory;
pub mod memory;
pub mod retry;

pub use directory::DirectoryProbe;
pub use memory::MemoryProbe;
pub use retry::RetryingProbe;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("storage backend unreachable: {0}")]
    Unreachable(String),
    #[error("access to bucket `{0}` denied")]
    AccessDenied(String),
    #[error("invalid response from storage backend: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProbeError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProbeError::Unreachable(_) => true,
            ProbeError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::WouldBlock
            ),
            ProbeError::AccessDenied(_) | ProbeError::InvalidResponse(_) => false,
        }
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Reports which of `keys` already exist in `bucket`.
///
/// Implementations answer for exactly the requested keys in a single round
/// trip.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    async fn check(&self, bucket: &str, keys: &BTreeSet<String>)
    -> ProbeResult<HashMap<String, bool>>;
}

#[async_trait]
impl<P: ExistenceProbe + ?Sized> ExistenceProbe for std::sync::Arc<P> {
    async fn check(
        &self,
        bucket: &str,
        keys: &BTreeSet<String>,
    ) -> ProbeResult<HashMap<String, bool>> {
        (**self).check(bucket, keys).await
    }
}
