//! Repository Pattern for Store Abstraction
//!
//! Trait-based repositories decouple the scheduling core from the concrete
//! persistence technology:
//! - Easy testing with the in-memory implementation
//! - Swappable storage backends (SQLite, in-memory, host-provided)
//! - All I/O of the core goes through these traits
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ScheduleManager                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │  Player / Week / Schedule / Pairing / Backup / Availability │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  ┌───────────┴───────────┐
//!                  ▼                       ▼
//!        ┌─────────────────┐     ┌─────────────────┐
//!        │     SQLite      │     │    In-memory    │
//!        └─────────────────┘     └─────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{PairingDelta, PairingHistory, Player, PlayerId, Schedule, SeasonId, Week, WeekId};

// ============================================================================
// Backup Types
// ============================================================================

/// Snapshot of a week's schedule plus a mark in the pairing commit log.
///
/// Restoring reactivates the schedule and retracts the pairing deltas this
/// week committed after `ledger_seq`. Commits of other weeks stay counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleBackup {
    pub id: String,
    pub week_id: WeekId,
    pub season_id: SeasonId,

    /// Active schedule at backup time, if any
    pub schedule: Option<Schedule>,

    /// Last pairing commit sequence number at backup time
    pub ledger_seq: u64,

    pub created_at: DateTime<Utc>,
}

impl ScheduleBackup {
    pub fn new(week_id: WeekId, season_id: SeasonId, schedule: Option<Schedule>, ledger_seq: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            week_id,
            season_id,
            schedule,
            ledger_seq,
            created_at: Utc::now(),
        }
    }

    pub fn info(&self) -> BackupInfo {
        BackupInfo {
            id: self.id.clone(),
            week_id: self.week_id,
            schedule_id: self.schedule.as_ref().map(|s| s.id.clone()),
            created_at: self.created_at,
        }
    }
}

/// Lightweight backup listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub week_id: WeekId,
    pub schedule_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Player records
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Get player by id
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>>;

    /// All players of a season, ordered by id
    async fn find_players_by_season(&self, season_id: SeasonId) -> Result<Vec<Player>>;

    /// Create or update a player
    async fn save_player(&self, player: &Player) -> Result<()>;
}

/// Week records
#[async_trait]
pub trait WeekRepository: Send + Sync {
    /// Get week by id
    async fn find_week(&self, id: WeekId) -> Result<Option<Week>>;

    /// All weeks of a season, ordered by week number
    async fn find_weeks_by_season(&self, season_id: SeasonId) -> Result<Vec<Week>>;

    /// Create or update a week
    async fn save_week(&self, week: &Week) -> Result<()>;
}

/// Schedule records; at most one schedule is active per week
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Get any schedule (active or superseded) by id
    async fn find_schedule(&self, id: &str) -> Result<Option<Schedule>>;

    /// Get the active schedule for a week
    async fn find_schedule_by_week(&self, week_id: WeekId) -> Result<Option<Schedule>>;

    /// Create or update a schedule and make it the week's active one
    async fn save_schedule(&self, schedule: &Schedule) -> Result<()>;

    /// Activate a schedule and add its pairings to the season ledger.
    ///
    /// Both writes land or neither does. The delta is applied to the ledger
    /// as stored at commit time and recorded in the commit log, so
    /// concurrent commits for other weeks are never overwritten.
    async fn commit_schedule(&self, schedule: &Schedule, delta: &PairingDelta) -> Result<()>;
}

/// Season pairing ledgers
#[async_trait]
pub trait PairingRepository: Send + Sync {
    /// Get the pairing history for a season
    async fn find_pairing_history(&self, season_id: SeasonId) -> Result<Option<PairingHistory>>;

    /// Create or update a pairing history
    async fn save_pairing_history(&self, history: &PairingHistory) -> Result<()>;

    /// Add a delta to the stored ledger in one step, returning the result
    async fn record_pairings(&self, delta: &PairingDelta) -> Result<PairingHistory>;
}

/// Snapshot save/restore keyed by week
#[async_trait]
pub trait BackupRepository: Send + Sync {
    /// Snapshot the week's active schedule and mark the pairing commit log
    async fn create_backup(&self, week_id: WeekId) -> Result<String>;

    /// Restore a snapshot and retract the week's later pairing commits.
    ///
    /// Returns false when the backup does not exist.
    async fn restore_from_backup(&self, week_id: WeekId, backup_id: &str) -> Result<bool>;

    /// Backups of a week, oldest first
    async fn list_backups(&self, week_id: WeekId) -> Result<Vec<BackupInfo>>;
}

/// Per-player, per-week availability
#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// Availability of a player; `None` when nothing was recorded
    async fn get_availability(&self, player_id: PlayerId, week_id: WeekId) -> Result<Option<bool>>;

    /// Record availability of a player
    async fn set_availability(&self, player_id: PlayerId, week_id: WeekId, available: bool)
        -> Result<()>;
}

/// Everything the schedule manager needs from persistence
pub trait Store:
    PlayerRepository
    + WeekRepository
    + ScheduleRepository
    + PairingRepository
    + BackupRepository
    + AvailabilityProvider
{
}

impl<T> Store for T where
    T: PlayerRepository
        + WeekRepository
        + ScheduleRepository
        + PairingRepository
        + BackupRepository
        + AvailabilityProvider
{
}
