//! Regeneration status reporting
//!
//! The board keeps the latest status per week for non-blocking polling and
//! broadcasts every change to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};
use tokio::sync::broadcast;

use crate::models::WeekId;

// ============================================================================
// Status Types
// ============================================================================

/// Overall state of a regeneration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// Steps of a regeneration run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerationStep {
    LockAcquired,
    BackupCreated,
    ImpactAnalyzed,
    Generated,
    EditsReplayed,
    Committed,
    RolledBack,
    Finished,
}

impl RegenerationStep {
    /// Progress percentage reached once this step is done
    pub fn progress(&self) -> u8 {
        match self {
            Self::LockAcquired => 10,
            Self::BackupCreated => 25,
            Self::ImpactAnalyzed => 40,
            Self::Generated => 60,
            Self::EditsReplayed => 75,
            Self::Committed => 90,
            Self::RolledBack | Self::Finished => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockAcquired => "lock acquired",
            Self::BackupCreated => "backup created",
            Self::ImpactAnalyzed => "impact analyzed",
            Self::Generated => "schedule generated",
            Self::EditsReplayed => "manual edits replayed",
            Self::Committed => "schedule committed",
            Self::RolledBack => "rolled back",
            Self::Finished => "finished",
        }
    }
}

/// Latest known status of a week's regeneration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationStatus {
    pub week_id: WeekId,
    pub current_step: RegenerationStep,

    /// 0-100
    pub progress: u8,
    pub status: RunState,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Events broadcast to status subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatusEvent {
    /// A week's regeneration status changed
    Updated(RegenerationStatus),

    /// New regenerations for the week are refused
    Blocked { week_id: WeekId },

    /// Regenerations for the week are allowed again
    Unblocked { week_id: WeekId },
}

// ============================================================================
// Status Board
// ============================================================================

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Per-week regeneration status with change broadcasting.
///
/// Holds the latest status of every week regenerated in this process, one
/// entry per week, until [`StatusBoard::clear`] drops it.
#[derive(Debug)]
pub struct StatusBoard {
    statuses: RwLock<HashMap<WeekId, RegenerationStatus>>,
    event_tx: broadcast::Sender<StatusEvent>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl StatusBoard {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            statuses: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.event_tx.subscribe()
    }

    /// Latest status of a week, `None` if it never regenerated
    pub fn get(&self, week_id: WeekId) -> Option<RegenerationStatus> {
        self.read().get(&week_id).cloned()
    }

    /// Forget a finished week's status; a running one is kept
    pub fn clear(&self, week_id: WeekId) -> bool {
        let mut statuses = self.write();
        match statuses.get(&week_id) {
            Some(status) if status.status != RunState::Running => statuses.remove(&week_id).is_some(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Start a new run at the given step
    pub fn start(&self, week_id: WeekId, step: RegenerationStep) {
        let status = RegenerationStatus {
            week_id,
            current_step: step,
            progress: step.progress(),
            status: RunState::Running,
            error: None,
            updated_at: Utc::now(),
        };
        self.publish(status);
    }

    /// Record a completed step; progress never moves backwards within a run
    pub fn advance(&self, week_id: WeekId, step: RegenerationStep) {
        self.update(week_id, |status| {
            status.current_step = step;
            status.progress = status.progress.max(step.progress());
        });
    }

    pub fn complete(&self, week_id: WeekId) {
        self.update(week_id, |status| {
            status.current_step = RegenerationStep::Finished;
            status.progress = 100;
            status.status = RunState::Completed;
        });
    }

    pub fn fail(&self, week_id: WeekId, step: RegenerationStep, error: impl Into<String>) {
        let error = error.into();
        self.update(week_id, |status| {
            status.current_step = step;
            status.progress = 100;
            status.status = RunState::Failed;
            status.error = Some(error);
        });
    }

    /// Broadcast an event, returning how many subscribers were listening
    pub fn notify(&self, event: StatusEvent) -> usize {
        let count = self.event_tx.receiver_count();
        let _ = self.event_tx.send(event);
        count
    }

    fn update(&self, week_id: WeekId, apply: impl FnOnce(&mut RegenerationStatus)) {
        let Some(mut status) = self.get(week_id) else {
            return;
        };
        apply(&mut status);
        status.updated_at = Utc::now();
        self.publish(status);
    }

    fn publish(&self, status: RegenerationStatus) {
        tracing::debug!(
            week_id = status.week_id,
            step = status.current_step.as_str(),
            progress = status.progress,
            "Regeneration status"
        );
        self.write().insert(status.week_id, status.clone());
        self.notify(StatusEvent::Updated(status));
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<WeekId, RegenerationStatus>> {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<WeekId, RegenerationStatus>> {
        self.statuses.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let board = StatusBoard::default();
        assert!(board.get(1).is_none());

        board.start(1, RegenerationStep::LockAcquired);
        board.advance(1, RegenerationStep::Generated);
        let status = board.get(1).unwrap();
        assert_eq!(status.status, RunState::Running);
        assert_eq!(status.progress, 60);

        board.complete(1);
        let status = board.get(1).unwrap();
        assert_eq!(status.status, RunState::Completed);
        assert_eq!(status.progress, 100);
    }

    #[test]
    fn test_progress_never_decreases() {
        let board = StatusBoard::default();
        board.start(1, RegenerationStep::LockAcquired);
        board.advance(1, RegenerationStep::Committed);
        board.advance(1, RegenerationStep::BackupCreated);
        assert_eq!(board.get(1).unwrap().progress, 90);
    }

    #[test]
    fn test_failure_records_error() {
        let board = StatusBoard::default();
        board.start(2, RegenerationStep::LockAcquired);
        board.fail(2, RegenerationStep::RolledBack, "store down");

        let status = board.get(2).unwrap();
        assert_eq!(status.status, RunState::Failed);
        assert_eq!(status.error.as_deref(), Some("store down"));
    }

    #[test]
    fn test_clear_drops_only_finished_runs() {
        let board = StatusBoard::default();
        board.start(1, RegenerationStep::LockAcquired);
        board.start(2, RegenerationStep::LockAcquired);
        board.complete(2);
        assert_eq!(board.len(), 2);

        assert!(!board.clear(1));
        assert!(board.clear(2));
        assert!(!board.clear(2));
        assert!(board.get(2).is_none());
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_update_without_run_is_ignored() {
        let board = StatusBoard::default();
        board.advance(9, RegenerationStep::Generated);
        assert!(board.get(9).is_none());
    }

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let board = StatusBoard::default();
        let mut rx = board.subscribe();

        board.start(1, RegenerationStep::LockAcquired);
        board.notify(StatusEvent::Blocked { week_id: 1 });

        match rx.recv().await.unwrap() {
            StatusEvent::Updated(status) => assert_eq!(status.current_step, RegenerationStep::LockAcquired),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), StatusEvent::Blocked { week_id: 1 }));
    }
}
