//! In-memory probe with a fixed view of remote state.
//!
//! Deterministic, counts its round trips and can be told to fail, which is
//! what reconciliation tests need.

use super::{ExistenceProbe, ProbeError, ProbeResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MemoryProbe {
    buckets: BTreeMap<String, BTreeSet<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `keys` as existing objects of `bucket`.
    pub fn with_objects<I, K>(mut self, bucket: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Make every following `check` fail as if the backend were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `check` calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExistenceProbe for MemoryProbe {
    async fn check(
        &self,
        bucket: &str,
        keys: &BTreeSet<String>,
    ) -> ProbeResult<HashMap<String, bool>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProbeError::Unreachable(format!(
                "memory probe for `{bucket}` is offline"
            )));
        }

        let stored = self.buckets.get(bucket);
        Ok(keys
            .iter()
            .map(|key| {
                let exists = stored.is_some_and(|objects| objects.contains(key));
                (key.clone(), exists)
            })
            .collect())
    }
}
