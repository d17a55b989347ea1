//! Waiting for a derived artifact to catch up with its source.

use std::future::Future;
use std::io;
use std::time::{Duration, SystemTime};

use crate::domain::errors::SyncError;
use crate::infra::config::Config;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Poll cadence and ceiling for [`wait_until_newer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_millis(config.sync.interval_ms),
            timeout: Duration::from_millis(config.sync.timeout_ms),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Poll `modified` until it reports a time strictly newer than `source_modified`.
///
/// The accumulated wait is checked before every sleep, so the call gives up at
/// most one interval after `policy.timeout`. A zero interval is treated as one
/// millisecond. Poll errors are returned as [`SyncError::Unavailable`] without
/// retrying.
pub async fn wait_until_newer<F, Fut>(
    source_modified: SystemTime,
    mut modified: F,
    policy: WaitPolicy,
) -> Result<(), SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<SystemTime>>,
{
    let step = policy.interval.max(MIN_INTERVAL);
    let mut waited = Duration::ZERO;
    let mut attempts = 0u32;
    loop {
        let artifact_modified = modified().await.map_err(SyncError::Unavailable)?;
        attempts += 1;
        if artifact_modified > source_modified {
            tracing::debug!(attempts, ?waited, "artifact is up to date");
            return Ok(());
        }
        if waited > policy.timeout {
            tracing::warn!(attempts, ?waited, "artifact was not refreshed in time");
            return Err(SyncError::Timeout { waited });
        }
        tracing::trace!(attempts, ?waited, "artifact is stale, sleeping");
        tokio::time::sleep(step).await;
        waited += step;
    }
}
