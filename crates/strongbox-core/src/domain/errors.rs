//! Domain error types
//!
//! - [`DomainError`] covers malformed values: identifiers, usernames,
//!   hashes, account strings and invalid state transitions.
//! - [`ValidationFailure`] describes why a file tree is structurally invalid.
//! - [`FileError`] is the closed taxonomy returned by every file-tree
//!   operation, local or merged.

use std::collections::HashSet;

use thiserror::Error;

use super::newtypes::FileId;

/// Errors that can occur when constructing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Username is empty, too long, or not lowercase alphanumeric
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Hash is not 64 lowercase hex characters
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Account string could not be decoded
    #[error("Account string corrupted: {0}")]
    AccountStringCorrupted(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },
}

/// A structural rule violated by a file tree
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// A non-root file whose parent is unknown and which was not shared directly
    #[error("file {0} has no parent")]
    Orphan(FileId),

    /// Following parents from these files never reaches a root
    #[error("cycle among {0:?}")]
    Cycle(HashSet<FileId>),

    /// Two live siblings share a name
    #[error("path conflict among {0:?}")]
    PathConflict(HashSet<FileId>),

    /// A document or link has children
    #[error("file {0} is not a folder but has children")]
    NonFolderWithChildren(FileId),

    /// A link is shared, or lives under a shared folder
    #[error("link {link} is inside shared folder {shared_ancestor}")]
    SharedLink {
        link: FileId,
        shared_ancestor: FileId,
    },

    /// More than one live link points at the same target
    #[error("multiple links to {target}")]
    DuplicateLink { target: FileId },

    /// A live link whose target is not in the tree
    #[error("link {0} points to a missing file")]
    BrokenLink(FileId),

    /// A link pointing at a file its own owner owns
    #[error("link {0} points to a file of the same owner")]
    OwnedLink(FileId),

    /// A live file whose owner differs from its parent's owner
    #[error("file {0} has a different owner than its parent")]
    FileWithDifferentOwnerParent(FileId),
}

/// Errors returned by file tree operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("you need an account to do that")]
    NoAccount,

    #[error("no root found")]
    RootNonexistent,

    #[error("that file does not exist")]
    FileNonexistent,

    #[error("could not find a parent")]
    FileParentNonexistent,

    #[error("that file is not a folder")]
    FileNotFolder,

    #[error("that file is not a document")]
    FileNotDocument,

    #[error("file name cannot be empty")]
    FileNameEmpty,

    #[error("file names cannot contain slashes")]
    FileNameContainsSlash,

    #[error("that file name is too long")]
    FileNameTooLong,

    #[error("a file with that name already exists in this folder")]
    FileNameNotAvailable,

    #[error("you cannot move a folder into itself")]
    FolderMovedIntoItself,

    #[error("the target folder already has a child with that name")]
    TargetParentHasChildNamedThat,

    #[error("you cannot modify your root")]
    RootModificationInvalid,

    #[error("you don't have the permission to do that")]
    InsufficientPermission,

    #[error("you cannot put a link inside a shared folder")]
    LinkInSharedFolder,

    #[error("you cannot create a link to a file that you own")]
    LinkTargetIsOwned,

    #[error("that link target does not exist")]
    LinkTargetNonexistent,

    #[error("you cannot have multiple links to the same file")]
    MultipleLinksToSameFile,

    #[error("that share already exists")]
    ShareAlreadyExists,

    #[error("share non-existent")]
    ShareNonexistent,

    #[error("that path contains an empty file name")]
    PathContainsEmptyFileName,

    #[error("that path is not available")]
    PathTaken,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FileError {
    /// Maps a validation failure caused by a create or rename.
    pub fn from_naming_failure(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::PathConflict(_) => FileError::FileNameNotAvailable,
            other => other.into(),
        }
    }

    /// Maps a validation failure caused by a move.
    pub fn from_move_failure(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::PathConflict(_) => FileError::TargetParentHasChildNamedThat,
            other => other.into(),
        }
    }
}

impl From<ValidationFailure> for FileError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Cycle(_) => FileError::FolderMovedIntoItself,
            ValidationFailure::PathConflict(_) => FileError::PathTaken,
            ValidationFailure::NonFolderWithChildren(_) => FileError::FileNotFolder,
            ValidationFailure::SharedLink { .. } => FileError::LinkInSharedFolder,
            ValidationFailure::DuplicateLink { .. } => FileError::MultipleLinksToSameFile,
            ValidationFailure::BrokenLink(_) => FileError::LinkTargetNonexistent,
            ValidationFailure::OwnedLink(_) => FileError::LinkTargetIsOwned,
            ValidationFailure::FileWithDifferentOwnerParent(_) => {
                FileError::InsufficientPermission
            }
            ValidationFailure::Orphan(id) => {
                FileError::Unexpected(format!("orphaned file {id}"))
            }
        }
    }
}

impl From<strongbox_crypto::CryptoError> for FileError {
    fn from(err: strongbox_crypto::CryptoError) -> Self {
        FileError::Unexpected(err.to_string())
    }
}
