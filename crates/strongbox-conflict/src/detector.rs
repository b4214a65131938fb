//! Conflict detection logic
//!
//! Compares the local and remote copies of a file against the last synced
//! base to find out what each side did, then reports the pairs of changes
//! that cannot both be applied as-is.

use serde::{Deserialize, Serialize};
use strongbox_core::domain::{FileId, FileMetadata};
use tracing::debug;

use crate::error::ConflictError;

/// Which copy of a file a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

/// What changed in one copy relative to the base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileChanges {
    pub created: bool,
    pub renamed: bool,
    pub moved: bool,
    pub edited: bool,
    pub deleted: bool,
    pub shares_changed: bool,
}

impl FileChanges {
    /// Changes made to `current` since `base`; a missing base means created
    pub fn between(base: Option<&FileMetadata>, current: &FileMetadata) -> Self {
        let Some(base) = base else {
            return Self {
                created: true,
                deleted: current.deleted,
                ..Self::default()
            };
        };

        Self {
            created: false,
            renamed: base.name.encrypted != current.name.encrypted,
            moved: base.parent != current.parent,
            edited: base.document_hash != current.document_hash,
            deleted: !base.deleted && current.deleted,
            shares_changed: base.user_access_keys != current.user_access_keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The kind of incompatible change pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides renamed the file
    Rename,
    /// Both sides moved the file
    Move,
    /// Both sides wrote different content
    Edit,
    /// One side deleted a file the other side edited
    EditDelete { deleted: Side },
    /// One side deleted a file the other side moved or renamed
    DeleteMove { deleted: Side },
}

/// A conflict on one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub file_id: FileId,
    pub kind: ConflictKind,
    /// `last_modified` of the local copy, in milliseconds
    pub local_modified: i64,
    /// `last_modified` of the remote copy, in milliseconds
    pub remote_modified: i64,
}

/// Result of conflict detection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    /// Both changes can be applied
    NoConflict,
    /// At least one pair of changes collides
    Conflicted(Vec<Conflict>),
}

impl DetectionResult {
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            DetectionResult::NoConflict => &[],
            DetectionResult::Conflicted(conflicts) => conflicts,
        }
    }
}

/// Detects conflicts between local and remote file versions
pub struct ConflictDetector;

impl ConflictDetector {
    /// Compares both copies of one file against their common base
    ///
    /// Returns `ConflictError::FileMismatch` when `local` and `remote` are
    /// not the same file.
    pub fn detect(
        base: Option<&FileMetadata>,
        local: &FileMetadata,
        remote: &FileMetadata,
    ) -> Result<DetectionResult, ConflictError> {
        if local.id != remote.id {
            return Err(ConflictError::FileMismatch {
                local: local.id,
                remote: remote.id,
            });
        }

        let ours = FileChanges::between(base, local);
        let theirs = FileChanges::between(base, remote);
        let mut kinds = Vec::new();

        if ours.deleted || theirs.deleted {
            if !(ours.deleted && theirs.deleted) {
                let (deleted, survivor) = if ours.deleted {
                    (Side::Local, theirs)
                } else {
                    (Side::Remote, ours)
                };
                if survivor.edited {
                    kinds.push(ConflictKind::EditDelete { deleted });
                } else if survivor.moved || survivor.renamed {
                    kinds.push(ConflictKind::DeleteMove { deleted });
                }
            }
        } else {
            if ours.renamed && theirs.renamed && local.name.hmac != remote.name.hmac {
                kinds.push(ConflictKind::Rename);
            }
            if ours.moved && theirs.moved && local.parent != remote.parent {
                kinds.push(ConflictKind::Move);
            }
            if ours.edited && theirs.edited && local.document_hash != remote.document_hash {
                kinds.push(ConflictKind::Edit);
            }
        }

        if kinds.is_empty() {
            return Ok(DetectionResult::NoConflict);
        }

        debug!(
            file_id = %local.id,
            conflicts = kinds.len(),
            "Concurrent changes detected"
        );

        Ok(DetectionResult::Conflicted(
            kinds
                .into_iter()
                .map(|kind| Conflict {
                    file_id: local.id,
                    kind,
                    local_modified: local.last_modified,
                    remote_modified: remote.last_modified,
                })
                .collect(),
        ))
    }

    /// Convenience wrapper for callers that only need a yes/no
    pub fn is_conflicted(
        base: Option<&FileMetadata>,
        local: &FileMetadata,
        remote: &FileMetadata,
    ) -> bool {
        matches!(
            Self::detect(base, local, remote),
            Ok(DetectionResult::Conflicted(_))
        )
    }
}
