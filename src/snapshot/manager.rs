//! Snapshot Persistence
//!
//! [`SnapshotManager`] owns a snapshot directory and turns store images
//! into durable files. A save writes `snapshot-<ts>.bin.tmp` and renames
//! it into place, so a reader of `snapshot-*.bin` always observes either
//! the complete previous file or the complete new one; a failed save never
//! replaces an existing snapshot.
//!
//! Periodic captures run on a single dedicated tokio task. Individual
//! save failures are logged and swallowed; they never stop the schedule.
//! Restores decode fully in memory before touching the store, so a bad
//! file leaves the store unchanged.

use crate::snapshot::codec::{self, CodecError};
use crate::storage::{ShardedStore, StoreError};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const SNAPSHOT_PREFIX: &str = "snapshot-";
const SNAPSHOT_EXTENSION: &str = ".bin";

/// Bounded wait for an in-flight save when stopping the schedule.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Errors surfaced by snapshot persistence.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure while writing, reading or listing snapshots.
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The file's bytes do not form a loadable snapshot.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The decoded image could not be applied to the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct PeriodicTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the snapshot directory and the periodic capture schedule.
pub struct SnapshotManager {
    directory: PathBuf,
    task: Mutex<Option<PeriodicTask>>,
}

impl SnapshotManager {
    /// Creates a manager rooted at `directory`, creating it if missing.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            task: Mutex::new(None),
        })
    }

    /// The directory this manager owns.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Captures the store and writes it to a new snapshot file, returning
    /// the file's path.
    ///
    /// The image is written to a `.tmp` sibling first and renamed into
    /// place; on any write failure the temp file is removed and the
    /// previous snapshot stays intact.
    pub fn save_snapshot(&self, store: &ShardedStore) -> Result<PathBuf, SnapshotError> {
        write_snapshot(&self.directory, store)
    }

    /// Restores the store from the most recently modified snapshot file.
    /// Returns `false` when the directory holds no snapshots.
    pub fn load_latest_snapshot(&self, store: &ShardedStore) -> Result<bool, SnapshotError> {
        match self.latest_snapshot_file()? {
            Some(path) => self.load_snapshot(store, &path),
            None => Ok(false),
        }
    }

    /// Restores the store from an explicit snapshot file. Returns `false`
    /// when the file does not exist.
    ///
    /// The whole file is decoded before the store is touched, so decode
    /// failures leave the store unchanged.
    pub fn load_snapshot(
        &self,
        store: &ShardedStore,
        path: &Path,
    ) -> Result<bool, SnapshotError> {
        if !path.exists() {
            return Ok(false);
        }
        let data = fs::read(path)?;
        let image = codec::decode(&data)?;
        store.restore_snapshot(&image)?;
        info!(
            path = %path.display(),
            entries = image.total_entries(),
            "snapshot loaded"
        );
        Ok(true)
    }

    /// Starts saving a snapshot every `interval`.
    ///
    /// Fails with [`StoreError::InvalidArgument`] for a zero interval and
    /// with [`StoreError::AlreadyRunning`] when the schedule is active.
    /// Save failures inside the schedule are logged, not propagated.
    pub fn start_periodic(
        &self,
        store: Arc<ShardedStore>,
        interval: Duration,
    ) -> Result<(), StoreError> {
        if interval.is_zero() {
            return Err(StoreError::InvalidArgument(
                "snapshot interval must be positive".to_string(),
            ));
        }
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(StoreError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let directory = self.directory.clone();
        let handle = tokio::spawn(periodic_loop(directory, store, interval, shutdown_rx));
        *task = Some(PeriodicTask {
            shutdown_tx,
            handle,
        });
        info!(
            interval_secs = interval.as_secs(),
            dir = %self.directory.display(),
            "periodic snapshots started"
        );
        Ok(())
    }

    /// Stops the periodic schedule, waiting out an in-flight save within
    /// the grace period. Fails with [`StoreError::NotRunning`] when idle.
    pub async fn stop_periodic(&self) -> Result<(), StoreError> {
        let task = self.task.lock().take().ok_or(StoreError::NotRunning)?;
        let _ = task.shutdown_tx.send(true);
        match tokio::time::timeout(STOP_GRACE, task.handle).await {
            Ok(_) => info!("periodic snapshots stopped"),
            Err(_) => {
                warn!("periodic snapshot task did not stop within grace period, aborting");
            }
        }
        Ok(())
    }

    /// True while the periodic schedule is active.
    pub fn is_periodic_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Deletes all but the `keep` most recently modified snapshot files.
    /// Returns the number deleted.
    pub fn cleanup_old_snapshots(&self, keep: usize) -> Result<usize, SnapshotError> {
        let mut files = self.snapshot_files()?;
        if files.len() <= keep {
            return Ok(0);
        }
        // Newest first.
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut deleted = 0;
        for (path, _) in files.into_iter().skip(keep) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "old snapshot deleted");
                    deleted += 1;
                }
                Err(err) => warn!(path = %path.display(), error = %err, "failed to delete snapshot"),
            }
        }
        Ok(deleted)
    }

    /// All `snapshot-*.bin` files with their modification times.
    fn snapshot_files(&self) -> Result<Vec<(PathBuf, SystemTime)>, SnapshotError> {
        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(SNAPSHOT_PREFIX) || !name.ends_with(SNAPSHOT_EXTENSION) {
                continue;
            }
            let modified = dir_entry.metadata()?.modified()?;
            files.push((dir_entry.path(), modified));
        }
        Ok(files)
    }

    fn latest_snapshot_file(&self) -> Result<Option<PathBuf>, SnapshotError> {
        Ok(self
            .snapshot_files()?
            .into_iter()
            .max_by_key(|(_, modified)| *modified)
            .map(|(path, _)| path))
    }
}

/// Captures the store and writes it to a new snapshot file under
/// `directory`, returning the file's path.
fn write_snapshot(directory: &Path, store: &ShardedStore) -> Result<PathBuf, SnapshotError> {
    let image = store.capture_snapshot();
    let encoded = codec::encode(&image);

    let final_path = unused_snapshot_path(directory, image.captured_at_ms);
    let tmp_path = final_path.with_extension("bin.tmp");

    if let Err(err) = fs::write(&tmp_path, &encoded) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    if let Err(rename_err) = fs::rename(&tmp_path, &final_path) {
        // Some platforms refuse to rename over an existing file; clear
        // the destination and retry once before giving up.
        let _ = fs::remove_file(&final_path);
        if let Err(err) = fs::rename(&tmp_path, &final_path) {
            let _ = fs::remove_file(&tmp_path);
            debug!(error = %rename_err, "atomic rename failed");
            return Err(err.into());
        }
    }

    info!(
        path = %final_path.display(),
        entries = image.total_entries(),
        bytes = encoded.len(),
        "snapshot saved"
    );
    Ok(final_path)
}

/// Picks `snapshot-<ts>.bin`, appending a counter when a capture in the
/// same millisecond already produced that name.
fn unused_snapshot_path(directory: &Path, timestamp_ms: i64) -> PathBuf {
    let base = directory.join(format!(
        "{}{}{}",
        SNAPSHOT_PREFIX, timestamp_ms, SNAPSHOT_EXTENSION
    ));
    if !base.exists() {
        return base;
    }
    let mut counter = 1u32;
    loop {
        let candidate = directory.join(format!(
            "{}{}-{}{}",
            SNAPSHOT_PREFIX, timestamp_ms, counter, SNAPSHOT_EXTENSION
        ));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

async fn periodic_loop(
    directory: PathBuf,
    store: Arc<ShardedStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("periodic snapshot task received shutdown signal");
                    return;
                }
            }
        }

        let directory = directory.clone();
        let store = Arc::clone(&store);
        let outcome =
            tokio::task::spawn_blocking(move || write_snapshot(&directory, &store)).await;
        match outcome {
            Ok(Ok(path)) => debug!(path = %path.display(), "periodic snapshot complete"),
            Ok(Err(err)) => error!(error = %err, "periodic snapshot failed"),
            Err(err) => error!(error = %err, "periodic snapshot task panicked"),
        }
    }
}
