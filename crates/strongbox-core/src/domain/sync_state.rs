//! Sync state machine and progress reporting types

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::FileId;

// ============================================================================
// State machine
// ============================================================================

/// Phase of a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncState {
    #[default]
    Idle,
    PullingRemote,
    Diffing,
    ResolvingConflicts,
    PushingLocal,
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "Idle",
            SyncState::PullingRemote => "PullingRemote",
            SyncState::Diffing => "Diffing",
            SyncState::ResolvingConflicts => "ResolvingConflicts",
            SyncState::PushingLocal => "PushingLocal",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SyncState::Idle)
    }

    /// Checks if a transition is valid
    ///
    /// Valid transitions:
    /// - Idle -> PullingRemote
    /// - PullingRemote -> Diffing
    /// - Diffing -> ResolvingConflicts
    /// - ResolvingConflicts -> PushingLocal
    /// - PushingLocal -> Idle, or PullingRemote when the server saw a newer version
    /// - any running phase -> Idle (abort)
    pub fn can_transition_to(&self, target: &SyncState) -> bool {
        match (self, target) {
            (SyncState::Idle, SyncState::PullingRemote) => true,
            (SyncState::PullingRemote, SyncState::Diffing) => true,
            (SyncState::Diffing, SyncState::ResolvingConflicts) => true,
            (SyncState::ResolvingConflicts, SyncState::PushingLocal) => true,
            (SyncState::PushingLocal, SyncState::PullingRemote) => true,
            (current, SyncState::Idle) => !current.is_idle(),
            _ => false,
        }
    }

    /// Moves to `target`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: SyncState) -> Result<(), DomainError> {
        if !self.can_transition_to(&target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// One progress event
///
/// `total` never shrinks and `progress` strictly increases across the
/// events of one sync. Only the final event has `progress == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub total: usize,
    pub progress: usize,
    pub file_being_processed: Option<FileId>,
    pub msg: String,
}

/// A unit of pending sync work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkUnit {
    /// A file changed on this device
    LocalChange(FileId),
    /// A file changed on the server
    ServerChange(FileId),
}

impl WorkUnit {
    pub fn id(&self) -> FileId {
        match self {
            WorkUnit::LocalChange(id) | WorkUnit::ServerChange(id) => *id,
        }
    }
}

/// Pending work as seen before a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub work_units: Vec<WorkUnit>,
    /// Server version the work was computed against
    pub latest_server_ts: u64,
}

impl SyncStatus {
    pub fn is_empty(&self) -> bool {
        self.work_units.is_empty()
    }

    pub fn local_count(&self) -> usize {
        self.work_units
            .iter()
            .filter(|w| matches!(w, WorkUnit::LocalChange(_)))
            .count()
    }

    pub fn server_count(&self) -> usize {
        self.work_units.len() - self.local_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = SyncState::default();
        for next in [
            SyncState::PullingRemote,
            SyncState::Diffing,
            SyncState::ResolvingConflicts,
            SyncState::PushingLocal,
            SyncState::Idle,
        ] {
            state.transition_to(next).unwrap();
        }
        assert!(state.is_idle());
    }

    #[test]
    fn test_abort_from_any_running_phase() {
        for phase in [
            SyncState::PullingRemote,
            SyncState::Diffing,
            SyncState::ResolvingConflicts,
            SyncState::PushingLocal,
        ] {
            assert!(phase.can_transition_to(&SyncState::Idle));
        }
        assert!(!SyncState::Idle.can_transition_to(&SyncState::Idle));
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = SyncState::Idle;
        let err = state.transition_to(SyncState::PushingLocal).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidState {
                from: "Idle".to_string(),
                to: "PushingLocal".to_string()
            }
        );
        assert!(state.is_idle());
    }

    #[test]
    fn test_retry_after_stale_push() {
        assert!(SyncState::PushingLocal.can_transition_to(&SyncState::PullingRemote));
        assert!(!SyncState::Diffing.can_transition_to(&SyncState::PullingRemote));
    }

    #[test]
    fn test_status_counts() {
        let status = SyncStatus {
            work_units: vec![
                WorkUnit::LocalChange(FileId::new()),
                WorkUnit::ServerChange(FileId::new()),
                WorkUnit::ServerChange(FileId::new()),
            ],
            latest_server_ts: 9,
        };
        assert_eq!(status.local_count(), 1);
        assert_eq!(status.server_count(), 2);
    }
}
