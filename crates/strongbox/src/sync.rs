//! Sync and pending work

use std::time::Duration;

use strongbox_core::domain::{ChangeLog, ChangeRecord, FileError, SyncStatus};
use strongbox_sync::{ProgressCallback, SchedulerHandle, Snapshot, SyncError, SyncResult, SyncScheduler};

use crate::errors::AccountError;
use crate::{unexpected, Strongbox};

impl Strongbox {
    /// Pulls, merges and pushes
    ///
    /// If a sync is already running, waits for it and returns its result.
    pub async fn sync(&self, progress: Option<ProgressCallback>) -> Result<SyncResult, SyncError> {
        self.engine.sync(progress).await
    }

    /// Local and server changes the next sync would process
    pub async fn calculate_work(&self) -> Result<SyncStatus, SyncError> {
        self.engine.calculate_work().await
    }

    /// Local changes not yet synced, collapsed to their net effect
    pub async fn get_local_changes(&self) -> Result<Vec<ChangeRecord>, FileError> {
        let _guard = self.tree_lock.lock().await;
        self.account().await?;
        let snapshot = Snapshot::load(self.metadata.as_ref())
            .await
            .map_err(unexpected)?;
        Ok(ChangeLog::new(snapshot.changes).collapsed())
    }

    /// Milliseconds since the epoch of the last completed sync, 0 if never
    pub async fn get_last_synced(&self) -> Result<i64, AccountError> {
        self.account().await?;
        Ok(self.metadata.get_last_synced().await.map_err(unexpected)?)
    }

    /// "never", or how long ago the last sync completed, e.g. "5 minutes ago"
    pub async fn get_last_synced_human_string(&self) -> Result<String, AccountError> {
        let last = self.get_last_synced().await?;
        if last == 0 {
            return Ok("never".to_string());
        }
        let elapsed = chrono::Utc::now().timestamp_millis().saturating_sub(last).max(0);
        Ok(timeago::Formatter::new().convert(Duration::from_millis(elapsed as u64)))
    }

    /// A background scheduler syncing every `sync.auto_sync_interval_secs`
    ///
    /// The caller spawns [`SyncScheduler::run`] and keeps the handle to
    /// request syncs or stop it.
    pub fn scheduler(&self) -> (SyncScheduler, SchedulerHandle) {
        SyncScheduler::from_config(self.engine.clone(), &self.config.sync)
    }
}
