//! Strongbox Sync - Synchronization engine
//!
//! Provides:
//! - Pull, merge and push of the encrypted file tree against the server
//! - Deterministic resolution of concurrent edits on several devices
//! - Step-wise progress reporting
//! - At most one sync in flight per local store
//! - A background scheduler driving periodic syncs
//!
//! ## Modules
//!
//! - [`engine`] - The sync state machine
//! - [`progress`] - Progress events with monotonic counters
//! - [`scheduler`] - Interval and on-demand sync triggers
//! - [`snapshot`] - Base and local metadata loaded from the store

pub mod engine;
pub mod progress;
pub mod scheduler;
pub mod snapshot;

use strongbox_conflict::ConflictError;
use strongbox_core::domain::{DomainError, FileError};
use strongbox_core::ports::{EndpointError, ServerError};
use strongbox_crypto::CryptoError;
use thiserror::Error;

pub use engine::{SyncEngine, SyncResult};
pub use progress::ProgressCallback;
pub use scheduler::{SchedulerHandle, SchedulerStats, SyncScheduler};
pub use snapshot::Snapshot;

/// Errors that end a sync attempt
///
/// Cloneable so that callers joining an in-flight sync receive the same
/// outcome as the caller that started it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// There is no account on this device
    #[error("no account on this device")]
    NoAccount,

    /// The server could not be reached; nothing was partially pushed
    #[error("could not reach the server")]
    ServerUnreachable,

    /// The server refuses this client version
    #[error("a newer client version is required")]
    ClientUpdateRequired,

    /// Pushing would take the account over its data cap
    #[error("out of space: usage is over the data cap")]
    OutOfSpace,

    /// The server does not recognise this account's keys
    #[error("the server rejected this account's credentials")]
    InvalidAuth,

    /// Other devices kept changing the tree while this one merged
    #[error("gave up after {0} merge attempts")]
    MergeAttemptsExhausted(u32),

    /// The sync that this call joined stopped before reporting a result
    #[error("the sync was interrupted")]
    Interrupted,

    #[error("unexpected sync error: {0}")]
    Unexpected(String),
}

impl From<ServerError> for SyncError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unreachable => SyncError::ServerUnreachable,
            ServerError::ClientUpdateRequired => SyncError::ClientUpdateRequired,
            ServerError::InvalidAuth => SyncError::InvalidAuth,
            ServerError::Endpoint(EndpointError::UsageIsOverDataCap) => SyncError::OutOfSpace,
            other => SyncError::Unexpected(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Unexpected(format!("{err:#}"))
    }
}

impl From<FileError> for SyncError {
    fn from(err: FileError) -> Self {
        SyncError::Unexpected(err.to_string())
    }
}

impl From<CryptoError> for SyncError {
    fn from(err: CryptoError) -> Self {
        SyncError::Unexpected(err.to_string())
    }
}

impl From<ConflictError> for SyncError {
    fn from(err: ConflictError) -> Self {
        SyncError::Unexpected(err.to_string())
    }
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        SyncError::Unexpected(err.to_string())
    }
}
