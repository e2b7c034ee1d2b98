//! Background Expiry Sweeper
//!
//! Lazy expiry only reclaims entries that something touches; a key that
//! expires and is never read again would otherwise sit in its shard until
//! LRU pressure pushes it out. The sweeper closes that gap by invoking
//! every shard's expiry sweep at a fixed period.
//!
//! The sweeper is a single dedicated tokio task with a `watch`-channel
//! stop signal. [`BackgroundSweeper::stop`] cancels cooperatively and
//! waits out an in-flight sweep within a bounded grace period before
//! aborting the task.

use crate::storage::error::StoreError;
use crate::storage::store::ShardedStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Bounded wait for the in-flight sweep when stopping.
const STOP_GRACE: Duration = Duration::from_secs(5);

struct SweeperTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Handle owning the scheduled expiry sweep over a store's shards.
pub struct BackgroundSweeper {
    store: Arc<ShardedStore>,
    task: Mutex<Option<SweeperTask>>,
}

impl BackgroundSweeper {
    pub fn new(store: Arc<ShardedStore>) -> Self {
        Self {
            store,
            task: Mutex::new(None),
        }
    }

    /// Starts sweeping every `interval`.
    ///
    /// Fails with [`StoreError::InvalidArgument`] for a zero interval and
    /// with [`StoreError::AlreadyRunning`] when the sweeper is active.
    pub fn start(&self, interval: Duration) -> Result<(), StoreError> {
        if interval.is_zero() {
            return Err(StoreError::InvalidArgument(
                "sweep interval must be positive".to_string(),
            ));
        }
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(StoreError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(sweep_loop(store, interval, shutdown_rx));
        *task = Some(SweeperTask {
            shutdown_tx,
            handle,
        });
        info!(interval_ms = interval.as_millis() as u64, "expiry sweeper started");
        Ok(())
    }

    /// Signals the sweep task to stop and joins it within the grace
    /// period. Fails with [`StoreError::NotRunning`] when idle.
    pub async fn stop(&self) -> Result<(), StoreError> {
        let task = self.task.lock().take().ok_or(StoreError::NotRunning)?;
        let _ = task.shutdown_tx.send(true);
        match tokio::time::timeout(STOP_GRACE, task.handle).await {
            Ok(_) => info!("expiry sweeper stopped"),
            Err(_) => {
                warn!("expiry sweeper did not stop within grace period, aborting");
            }
        }
        Ok(())
    }

    /// True while the sweep task is scheduled.
    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }
}

async fn sweep_loop(
    store: Arc<ShardedStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let removed = store.sweep_expired();
        if removed > 0 {
            debug!(removed, remaining = store.size(), "sweep reclaimed expired entries");
        } else {
            trace!("sweep found nothing to reclaim");
        }
    }
}
