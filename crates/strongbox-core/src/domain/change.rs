//! Local change tracking
//!
//! Every local mutation appends a [`ChangeRecord`]. Before a sync the log is
//! collapsed so that only the net intent per file is replayed against the
//! server state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::newtypes::FileId;

/// Kind of local mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Rename,
    Move,
    Edit,
    Delete,
    ShareGrant,
    ShareRevoke,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Rename => "rename",
            ChangeKind::Move => "move",
            ChangeKind::Edit => "edit",
            ChangeKind::Delete => "delete",
            ChangeKind::ShareGrant => "share_grant",
            ChangeKind::ShareRevoke => "share_revoke",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeKind::Create),
            "rename" => Ok(ChangeKind::Rename),
            "move" => Ok(ChangeKind::Move),
            "edit" => Ok(ChangeKind::Edit),
            "delete" => Ok(ChangeKind::Delete),
            "share_grant" => Ok(ChangeKind::ShareGrant),
            "share_revoke" => Ok(ChangeKind::ShareRevoke),
            other => Err(format!("unknown change kind: {other}")),
        }
    }
}

/// One local mutation and the server version it was made against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub file_id: FileId,
    pub kind: ChangeKind,
    /// Metadata version of the last synced copy; 0 for files not yet on the server
    pub base_version: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChangeRecord {
    pub fn new(file_id: FileId, kind: ChangeKind, base_version: u64) -> Self {
        Self {
            file_id,
            kind,
            base_version,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only log of local changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ChangeRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Net changes, in the order they were first made
    ///
    /// - the latest rename and the latest move win
    /// - consecutive edits collapse into the latest one
    /// - a delete absorbs earlier moves, renames and edits
    /// - a create followed by a delete cancels out entirely
    /// - a create absorbs later renames and moves
    /// - share grants and revokes are kept as recorded
    pub fn collapsed(&self) -> Vec<ChangeRecord> {
        let mut per_file: HashMap<FileId, Vec<(usize, ChangeRecord)>> = HashMap::new();

        for (seq, record) in self.records.iter().enumerate() {
            let entries = per_file.entry(record.file_id).or_default();
            let created = entries.iter().any(|(_, r)| r.kind == ChangeKind::Create);

            match record.kind {
                ChangeKind::Create => entries.push((seq, record.clone())),
                ChangeKind::Rename | ChangeKind::Move => {
                    if created {
                        continue;
                    }
                    entries.retain(|(_, r)| r.kind != record.kind);
                    entries.push((seq, record.clone()));
                }
                ChangeKind::Edit => {
                    entries.retain(|(_, r)| r.kind != ChangeKind::Edit);
                    entries.push((seq, record.clone()));
                }
                ChangeKind::Delete => {
                    if created {
                        entries.clear();
                        continue;
                    }
                    entries.retain(|(_, r)| {
                        !matches!(
                            r.kind,
                            ChangeKind::Move | ChangeKind::Rename | ChangeKind::Edit | ChangeKind::Delete
                        )
                    });
                    entries.push((seq, record.clone()));
                }
                ChangeKind::ShareGrant | ChangeKind::ShareRevoke => {
                    entries.push((seq, record.clone()));
                }
            }
        }

        let mut collapsed: Vec<(usize, ChangeRecord)> =
            per_file.into_values().flatten().collect();
        collapsed.sort_by_key(|(seq, _)| *seq);
        collapsed.into_iter().map(|(_, r)| r).collect()
    }

    /// Files with at least one net change
    pub fn changed_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = Vec::new();
        for record in self.collapsed() {
            if !ids.contains(&record.file_id) {
                ids.push(record.file_id);
            }
        }
        ids
    }
}
