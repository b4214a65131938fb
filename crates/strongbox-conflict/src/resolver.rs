//! Conflict resolution rules
//!
//! Decides, for each detected conflict, which side survives:
//! - `Rename` / `Move`: last writer wins, ties go to the remote copy
//! - `Edit`: the later edit stays in the file and the earlier content is
//!   kept as a conflicted copy
//! - `EditDelete`: the edit wins and the file is restored
//! - `DeleteMove`: the delete wins

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detector::{Conflict, ConflictKind, Side};

/// Outcome chosen for one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Apply the local change over the remote one
    KeepLocal,
    /// Keep the remote change and drop the local one
    KeepRemote,
    /// Keep the winner's content in the file and copy the loser's content
    /// into a new document
    KeepBoth { copy_of: Side },
    /// Restore the deleted file, with its deleted ancestors
    Undelete,
    /// Keep the file deleted
    KeepDeleted,
}

/// Applies the resolution rules to detected conflicts
pub struct ConflictResolver;

impl ConflictResolver {
    /// Side whose change is newer; the remote side wins ties
    pub fn last_writer(local_modified: i64, remote_modified: i64) -> Side {
        if local_modified > remote_modified {
            Side::Local
        } else {
            Side::Remote
        }
    }

    pub fn resolve(conflict: &Conflict) -> Resolution {
        let winner = Self::last_writer(conflict.local_modified, conflict.remote_modified);
        let resolution = match conflict.kind {
            ConflictKind::Rename | ConflictKind::Move => match winner {
                Side::Local => Resolution::KeepLocal,
                Side::Remote => Resolution::KeepRemote,
            },
            ConflictKind::Edit => Resolution::KeepBoth {
                copy_of: winner.other(),
            },
            ConflictKind::EditDelete { .. } => Resolution::Undelete,
            ConflictKind::DeleteMove { .. } => Resolution::KeepDeleted,
        };

        debug!(
            file_id = %conflict.file_id,
            kind = ?conflict.kind,
            resolution = ?resolution,
            "Resolved conflict"
        );
        resolution
    }

    /// Resolves every conflict, in order
    pub fn resolve_all(conflicts: &[Conflict]) -> Vec<(Conflict, Resolution)> {
        conflicts
            .iter()
            .map(|c| (c.clone(), Self::resolve(c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::domain::FileId;

    fn conflict(kind: ConflictKind, local: i64, remote: i64) -> Conflict {
        Conflict {
            file_id: FileId::new(),
            kind,
            local_modified: local,
            remote_modified: remote,
        }
    }

    #[test]
    fn test_last_writer_wins_and_remote_takes_ties() {
        assert_eq!(ConflictResolver::last_writer(2, 1), Side::Local);
        assert_eq!(ConflictResolver::last_writer(1, 2), Side::Remote);
        assert_eq!(ConflictResolver::last_writer(5, 5), Side::Remote);
    }

    #[test]
    fn test_rename_and_move_follow_last_writer() {
        assert_eq!(
            ConflictResolver::resolve(&conflict(ConflictKind::Rename, 10, 5)),
            Resolution::KeepLocal
        );
        assert_eq!(
            ConflictResolver::resolve(&conflict(ConflictKind::Move, 5, 10)),
            Resolution::KeepRemote
        );
        assert_eq!(
            ConflictResolver::resolve(&conflict(ConflictKind::Move, 7, 7)),
            Resolution::KeepRemote
        );
    }

    #[test]
    fn test_edit_edit_copies_older_side() {
        assert_eq!(
            ConflictResolver::resolve(&conflict(ConflictKind::Edit, 10, 5)),
            Resolution::KeepBoth {
                copy_of: Side::Remote
            }
        );
        assert_eq!(
            ConflictResolver::resolve(&conflict(ConflictKind::Edit, 5, 10)),
            Resolution::KeepBoth {
                copy_of: Side::Local
            }
        );
    }

    #[test]
    fn test_edit_beats_delete_regardless_of_time() {
        for (local, remote) in [(1, 100), (100, 1)] {
            for deleted in [Side::Local, Side::Remote] {
                assert_eq!(
                    ConflictResolver::resolve(&conflict(
                        ConflictKind::EditDelete { deleted },
                        local,
                        remote
                    )),
                    Resolution::Undelete
                );
            }
        }
    }

    #[test]
    fn test_delete_beats_move() {
        assert_eq!(
            ConflictResolver::resolve(&conflict(
                ConflictKind::DeleteMove {
                    deleted: Side::Remote
                },
                100,
                1
            )),
            Resolution::KeepDeleted
        );
    }

    #[test]
    fn test_resolve_all_keeps_order() {
        let conflicts = vec![
            conflict(ConflictKind::Rename, 1, 2),
            conflict(ConflictKind::Edit, 1, 2),
        ];
        let resolved = ConflictResolver::resolve_all(&conflicts);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].1, Resolution::KeepRemote);
        assert_eq!(
            resolved[1].1,
            Resolution::KeepBoth {
                copy_of: Side::Local
            }
        );
    }
}
