//! Periodic full-sync loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use tokio::task::JoinHandle;

use super::engine::SyncEngine;

/// Default cadence between periodic full syncs.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 45;

/// Maximum jitter (milliseconds) added to each interval.
pub const SYNC_INTERVAL_JITTER_MS: u64 = 5_000;

fn next_delay(interval: Duration) -> Duration {
    let jitter_ms = Utc::now().timestamp_millis().unsigned_abs() % SYNC_INTERVAL_JITTER_MS;
    interval + Duration::from_millis(jitter_ms)
}

/// Runs a full sync immediately and then every `interval` (plus jitter) until
/// the returned handle is aborted.
pub fn spawn_periodic_sync(engine: Arc<SyncEngine>, interval: Duration) -> JoinHandle<()> {
    info!("[Sync] Periodic sync every {:?}", interval);
    tokio::spawn(async move {
        loop {
            let report = engine.full_sync().await;
            debug!(
                "[Sync] Periodic cycle pushed={} pulled={} failed_phases={}",
                report.pushed_count(),
                report.pulled_count(),
                report.failed_phases().count()
            );
            tokio::time::sleep(next_delay(interval)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_undershoots_interval() {
        let interval = Duration::from_secs(10);
        let delay = next_delay(interval);
        assert!(delay >= interval);
        assert!(delay < interval + Duration::from_millis(SYNC_INTERVAL_JITTER_MS));
    }
}
