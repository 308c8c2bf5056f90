//! Exponential-backoff wrapper for probes talking to a flaky backend.
//!
//! Only transient errors are retried. Whatever error is left when the
//! elapsed-time budget runs out is handed back to the caller unchanged.

use super::{ExistenceProbe, ProbeError, ProbeResult};
use async_trait::async_trait;
use backoff::{Error as BackoffError, ExponentialBackoff, future::retry_notify};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub max_elapsed_time: Duration,
    pub randomization_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_millis(5000),
            multiplier: 1.5,
            max_elapsed_time: Duration::from_secs(30),
            randomization_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: Some(self.max_elapsed_time),
            randomization_factor: self.randomization_factor,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct RetryingProbe<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: ExistenceProbe> RetryingProbe<P> {
    pub fn new(inner: P) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ExistenceProbe> ExistenceProbe for RetryingProbe<P> {
    async fn check(
        &self,
        bucket: &str,
        keys: &BTreeSet<String>,
    ) -> ProbeResult<HashMap<String, bool>> {
        let operation = move || async move {
            self.inner.check(bucket, keys).await.map_err(|err| {
                if err.is_transient() {
                    BackoffError::transient(err)
                } else {
                    BackoffError::permanent(err)
                }
            })
        };

        retry_notify(
            self.policy.backoff(),
            operation,
            move |err: ProbeError, wait: Duration| {
                warn!("existence check for bucket `{bucket}` failed, retrying in {wait:?}: {err}");
            },
        )
        .await
    }
}
