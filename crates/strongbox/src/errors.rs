//! Per-operation error types
//!
//! Every public operation returns one of these closed enums. Expected
//! conditions have their own variant; anything else ends up in
//! `Unexpected` with a description for logs and bug reports.
//!
//! File-tree operations use [`FileError`] from the core crate and sync uses
//! [`SyncError`] from the sync crate; both are re-exported here.

use strongbox_core::domain::{DomainError, DrawingError};
use strongbox_core::ports::{EndpointError, ServerError};
use thiserror::Error;

pub use strongbox_core::domain::FileError;
pub use strongbox_sync::SyncError;

/// Failure to open a [`Strongbox`](crate::Strongbox)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not open local storage: {0}")]
    Storage(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreateAccountError {
    #[error("that username is taken")]
    UsernameTaken,

    #[error("usernames must be 1 to 32 lowercase letters or digits")]
    UsernameInvalid,

    #[error("an account already exists on this device")]
    AccountExists,

    #[error("a newer client version is required")]
    ClientUpdateRequired,

    #[error("could not reach the server")]
    ServerUnreachable,

    #[error("the server is not accepting new accounts")]
    ServerDisabled,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<ServerError> for CreateAccountError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unreachable => CreateAccountError::ServerUnreachable,
            ServerError::ClientUpdateRequired => CreateAccountError::ClientUpdateRequired,
            ServerError::Endpoint(EndpointError::UsernameTaken) => CreateAccountError::UsernameTaken,
            ServerError::Endpoint(EndpointError::UsernameInvalid) => {
                CreateAccountError::UsernameInvalid
            }
            ServerError::Endpoint(EndpointError::Disabled) => CreateAccountError::ServerDisabled,
            other => CreateAccountError::Unexpected(other.to_string()),
        }
    }
}

impl From<FileError> for CreateAccountError {
    fn from(err: FileError) -> Self {
        CreateAccountError::Unexpected(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportAccountError {
    #[error("that account string is corrupted")]
    AccountStringCorrupted,

    #[error("an account already exists on this device")]
    AccountExists,

    #[error("the server has different keys for that username")]
    UsernamePublicKeyMismatch,

    #[error("that account does not exist on the server")]
    AccountDoesNotExist,

    #[error("a newer client version is required")]
    ClientUpdateRequired,

    #[error("could not reach the server")]
    ServerUnreachable,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<ServerError> for ImportAccountError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unreachable => ImportAccountError::ServerUnreachable,
            ServerError::ClientUpdateRequired => ImportAccountError::ClientUpdateRequired,
            ServerError::Endpoint(EndpointError::UserNotFound) => {
                ImportAccountError::AccountDoesNotExist
            }
            other => ImportAccountError::Unexpected(other.to_string()),
        }
    }
}

impl From<DomainError> for ImportAccountError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::AccountStringCorrupted(_) => ImportAccountError::AccountStringCorrupted,
            other => ImportAccountError::Unexpected(other.to_string()),
        }
    }
}

/// Errors of account queries and account removal
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("a newer client version is required")]
    ClientUpdateRequired,

    #[error("could not reach the server")]
    ServerUnreachable,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<ServerError> for AccountError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unreachable => AccountError::ServerUnreachable,
            ServerError::ClientUpdateRequired => AccountError::ClientUpdateRequired,
            other => AccountError::Unexpected(other.to_string()),
        }
    }
}

impl From<FileError> for AccountError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NoAccount => AccountError::NoAccount,
            other => AccountError::Unexpected(other.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("that file does not exist")]
    FileNonexistent,

    #[error("that file is not a document")]
    FileNotDocument,

    #[error("you don't have the permission to do that")]
    InsufficientPermission,

    #[error("that document is not a valid drawing")]
    InvalidDrawing,

    #[error("the document changed since it was read")]
    ReReadRequired,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<FileError> for DocumentError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NoAccount => DocumentError::NoAccount,
            FileError::FileNonexistent => DocumentError::FileNonexistent,
            FileError::FileNotDocument => DocumentError::FileNotDocument,
            FileError::InsufficientPermission => DocumentError::InsufficientPermission,
            other => DocumentError::Unexpected(other.to_string()),
        }
    }
}

impl From<DrawingError> for DocumentError {
    fn from(_: DrawingError) -> Self {
        DocumentError::InvalidDrawing
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("that username is invalid")]
    UsernameInvalid,

    #[error("that user does not exist")]
    UserNotFound,

    #[error("you cannot share your root folder")]
    CannotShareRoot,

    #[error("you cannot share a link")]
    CannotShareLink,

    #[error("you don't have the permission to do that")]
    InsufficientPermission,

    #[error("that share already exists")]
    ShareAlreadyExists,

    #[error("that share does not exist")]
    ShareNonexistent,

    #[error("that file does not exist")]
    FileNonexistent,

    #[error("could not reach the server")]
    ServerUnreachable,

    #[error("a newer client version is required")]
    ClientUpdateRequired,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<FileError> for ShareError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NoAccount => ShareError::NoAccount,
            FileError::RootModificationInvalid => ShareError::CannotShareRoot,
            FileError::LinkInSharedFolder => ShareError::CannotShareLink,
            FileError::InsufficientPermission => ShareError::InsufficientPermission,
            FileError::ShareAlreadyExists => ShareError::ShareAlreadyExists,
            FileError::ShareNonexistent => ShareError::ShareNonexistent,
            FileError::FileNonexistent => ShareError::FileNonexistent,
            other => ShareError::Unexpected(other.to_string()),
        }
    }
}

impl From<ServerError> for ShareError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unreachable => ShareError::ServerUnreachable,
            ServerError::ClientUpdateRequired => ShareError::ClientUpdateRequired,
            ServerError::Endpoint(EndpointError::UserNotFound) => ShareError::UserNotFound,
            other => ShareError::Unexpected(other.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("could not reach the server")]
    CouldNotReachServer,

    #[error("a newer client version is required")]
    ClientUpdateRequired,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<ServerError> for UsageError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Unreachable => UsageError::CouldNotReachServer,
            ServerError::ClientUpdateRequired => UsageError::ClientUpdateRequired,
            other => UsageError::Unexpected(other.to_string()),
        }
    }
}

impl From<FileError> for UsageError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NoAccount => UsageError::NoAccount,
            other => UsageError::Unexpected(other.to_string()),
        }
    }
}

/// Errors of copying files between disk and the tree
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportExportError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("that file does not exist")]
    FileNonexistent,

    #[error("that file is not a folder")]
    FileNotFolder,

    #[error("you don't have the permission to do that")]
    InsufficientPermission,

    #[error("invalid disk path: {0}")]
    DiskPathInvalid(String),

    #[error("disk path already exists: {0}")]
    DiskPathTaken(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<FileError> for ImportExportError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NoAccount => ImportExportError::NoAccount,
            FileError::FileNonexistent | FileError::FileParentNonexistent => {
                ImportExportError::FileNonexistent
            }
            FileError::FileNotFolder => ImportExportError::FileNotFolder,
            FileError::InsufficientPermission => ImportExportError::InsufficientPermission,
            other => ImportExportError::Unexpected(other.to_string()),
        }
    }
}

impl From<DocumentError> for ImportExportError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NoAccount => ImportExportError::NoAccount,
            DocumentError::FileNonexistent => ImportExportError::FileNonexistent,
            DocumentError::InsufficientPermission => ImportExportError::InsufficientPermission,
            other => ImportExportError::Unexpected(other.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<FileError> for SearchError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NoAccount => SearchError::NoAccount,
            other => SearchError::Unexpected(other.to_string()),
        }
    }
}

impl From<DocumentError> for SearchError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NoAccount => SearchError::NoAccount,
            other => SearchError::Unexpected(other.to_string()),
        }
    }
}
