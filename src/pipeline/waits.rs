//! Suspension points raced against the stop signal

use crate::{HarvestError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs a future to completion unless the stop signal fires first
pub async fn until_stopped<F>(stop: &CancellationToken, fut: F) -> Result<F::Output>
where
    F: Future,
{
    if stop.is_cancelled() {
        return Err(HarvestError::Cancelled);
    }
    tokio::select! {
        _ = stop.cancelled() => Err(HarvestError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Sleeps for `duration`, returning early with `Cancelled` on stop
pub async fn sleep_or_stop(stop: &CancellationToken, duration: Duration) -> Result<()> {
    until_stopped(stop, tokio::time::sleep(duration)).await
}

/// Picks a content-settle wait uniformly from `[min_ms, max_ms]`
pub fn settle_jitter(min_ms: u64, max_ms: u64) -> Duration {
    let millis = if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };
    Duration::from_millis(millis)
}
