//! Sync scheduler - runs sync cycles periodically and on request
//!
//! The [`SyncScheduler`] owns a loop that calls
//! [`SyncEngine::sync`](super::engine::SyncEngine::sync) whenever its timer
//! fires or a [`SchedulerHandle`] asks for a sync.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──┐
//!                 ├──→ SyncScheduler ──→ SyncEngine::sync()
//! request_sync() ─┘         │
//!                      shutdown() stops the loop
//! ```
//!
//! Requests made while a cycle runs are coalesced into one follow-up cycle.

use std::{
    future::pending,
    sync::Arc,
    time::Duration,
};

use strongbox_core::config::SyncConfig;
use tokio::{
    sync::{watch, Notify},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::engine::SyncEngine;
use crate::SyncError;

/// Counters returned when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub syncs: u64,
    pub failures: u64,
}

/// Controls a running [`SyncScheduler`]
#[derive(Clone)]
pub struct SchedulerHandle {
    requests: Arc<Notify>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SchedulerHandle {
    /// Asks for a sync as soon as the current one (if any) finishes
    pub fn request_sync(&self) {
        debug!("Sync requested");
        self.requests.notify_one();
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Periodic and on-demand sync loop
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    /// `None` disables the timer; only requests trigger syncs
    interval: Option<Duration>,
    requests: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `engine` - Engine whose `sync` is called
    /// * `interval` - Time between automatic syncs; zero disables them
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> (Self, SchedulerHandle) {
        let requests = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = (!interval.is_zero()).then_some(interval);

        info!(
            interval_secs = interval.map(|i| i.as_secs()),
            "Creating sync scheduler"
        );

        let scheduler = Self {
            engine,
            interval,
            requests: requests.clone(),
            shutdown: shutdown_rx,
        };
        let handle = SchedulerHandle {
            requests,
            shutdown: Arc::new(shutdown_tx),
        };
        (scheduler, handle)
    }

    /// Uses `auto_sync_interval_secs` from the configuration
    pub fn from_config(engine: Arc<SyncEngine>, config: &SyncConfig) -> (Self, SchedulerHandle) {
        Self::new(engine, Duration::from_secs(config.auto_sync_interval_secs))
    }

    /// Main loop, until [`SchedulerHandle::shutdown`], the last handle is
    /// dropped, or the server rejects this client
    ///
    /// The first timed sync happens one interval after start.
    pub async fn run(mut self) -> SchedulerStats {
        info!("Sync scheduler starting");
        let mut stats = SchedulerStats::default();
        let mut timer = self.interval.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = self.requests.notified() => {
                    debug!("Running requested sync");
                }
                _ = tick(&mut timer) => {
                    debug!("Running scheduled sync");
                }
            }

            stats.syncs += 1;
            match self.engine.sync(None).await {
                Ok(result) => {
                    debug!(pushed = result.files_pushed, pulled = result.files_pulled, "Scheduled sync done");
                }
                Err(SyncError::ClientUpdateRequired) => {
                    stats.failures += 1;
                    error!("Server requires a newer client, stopping automatic sync");
                    break;
                }
                Err(err) => {
                    stats.failures += 1;
                    warn!(error = %err, "Scheduled sync failed");
                }
            }
        }

        info!(syncs = stats.syncs, failures = stats.failures, "Sync scheduler stopped");
        stats
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}
