//! Error types for the conflict engine

use strongbox_core::domain::FileId;
use thiserror::Error;

/// Errors that can occur during conflict detection and resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// The local and remote records describe different files
    #[error("cannot compare different files: local {local}, remote {remote}")]
    FileMismatch { local: FileId, remote: FileId },

    /// Anything else
    #[error("unexpected conflict error: {0}")]
    Unexpected(String),
}
