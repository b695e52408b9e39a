//! In-memory store
//!
//! All state lives behind a single `RwLock`, so a schedule commit or a backup
//! restore is one critical section.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::repository::{
    AvailabilityProvider, BackupInfo, BackupRepository, PairingRepository, PlayerRepository,
    ScheduleBackup, ScheduleRepository, WeekRepository,
};
use crate::error::{Error, Result};
use crate::models::{PairingDelta, PairingHistory, Player, PlayerId, Schedule, SeasonId, Week, WeekId};

/// A delta added to a ledger by a schedule commit
#[derive(Debug, Clone)]
struct PairingCommit {
    seq: u64,
    week_id: WeekId,
    delta: PairingDelta,
}

#[derive(Debug, Default)]
struct MemoryState {
    players: BTreeMap<PlayerId, Player>,
    weeks: BTreeMap<WeekId, Week>,
    schedules: HashMap<String, Schedule>,
    active: HashMap<WeekId, String>,
    histories: HashMap<SeasonId, PairingHistory>,
    commits: Vec<PairingCommit>,
    last_seq: u64,
    backups: Vec<ScheduleBackup>,
}

impl MemoryState {
    fn activate(&mut self, schedule: &Schedule) {
        self.active.insert(schedule.week_id, schedule.id.clone());
        self.schedules.insert(schedule.id.clone(), schedule.clone());
    }

    fn apply(&mut self, delta: &PairingDelta) -> PairingHistory {
        let history = self
            .histories
            .entry(delta.season_id)
            .or_insert_with(|| PairingHistory::new(delta.season_id));
        history.apply(delta);
        history.clone()
    }

    fn active_schedule(&self, week_id: WeekId) -> Option<&Schedule> {
        self.active
            .get(&week_id)
            .and_then(|id| self.schedules.get(id))
    }
}

/// Store keeping everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored schedules, superseded ones included
    pub async fn schedule_count(&self) -> usize {
        self.state.read().await.schedules.len()
    }
}

#[async_trait]
impl PlayerRepository for MemoryStore {
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>> {
        Ok(self.state.read().await.players.get(&id).cloned())
    }

    async fn find_players_by_season(&self, season_id: SeasonId) -> Result<Vec<Player>> {
        let state = self.state.read().await;
        Ok(state
            .players
            .values()
            .filter(|p| p.season_id == season_id)
            .cloned()
            .collect())
    }

    async fn save_player(&self, player: &Player) -> Result<()> {
        let mut state = self.state.write().await;
        state.players.insert(player.id, player.clone());
        Ok(())
    }
}

#[async_trait]
impl WeekRepository for MemoryStore {
    async fn find_week(&self, id: WeekId) -> Result<Option<Week>> {
        Ok(self.state.read().await.weeks.get(&id).cloned())
    }

    async fn find_weeks_by_season(&self, season_id: SeasonId) -> Result<Vec<Week>> {
        let state = self.state.read().await;
        let mut weeks: Vec<_> = state
            .weeks
            .values()
            .filter(|w| w.season_id == season_id)
            .cloned()
            .collect();
        weeks.sort_by_key(|w| w.week_number);
        Ok(weeks)
    }

    async fn save_week(&self, week: &Week) -> Result<()> {
        let mut state = self.state.write().await;
        state.weeks.insert(week.id, week.clone());
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn find_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        Ok(self.state.read().await.schedules.get(id).cloned())
    }

    async fn find_schedule_by_week(&self, week_id: WeekId) -> Result<Option<Schedule>> {
        Ok(self.state.read().await.active_schedule(week_id).cloned())
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.state.write().await.activate(schedule);
        Ok(())
    }

    async fn commit_schedule(&self, schedule: &Schedule, delta: &PairingDelta) -> Result<()> {
        let mut state = self.state.write().await;
        state.activate(schedule);
        state.apply(delta);
        state.last_seq += 1;
        let seq = state.last_seq;
        state.commits.push(PairingCommit {
            seq,
            week_id: schedule.week_id,
            delta: delta.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl PairingRepository for MemoryStore {
    async fn find_pairing_history(&self, season_id: SeasonId) -> Result<Option<PairingHistory>> {
        Ok(self.state.read().await.histories.get(&season_id).cloned())
    }

    async fn save_pairing_history(&self, history: &PairingHistory) -> Result<()> {
        let mut state = self.state.write().await;
        state.histories.insert(history.season_id, history.clone());
        Ok(())
    }

    async fn record_pairings(&self, delta: &PairingDelta) -> Result<PairingHistory> {
        Ok(self.state.write().await.apply(delta))
    }
}

#[async_trait]
impl BackupRepository for MemoryStore {
    async fn create_backup(&self, week_id: WeekId) -> Result<String> {
        let mut state = self.state.write().await;
        let season_id = state
            .weeks
            .get(&week_id)
            .map(|w| w.season_id)
            .ok_or(Error::WeekNotFound { week_id })?;

        let backup = ScheduleBackup::new(
            week_id,
            season_id,
            state.active_schedule(week_id).cloned(),
            state.last_seq,
        );
        let id = backup.id.clone();
        state.backups.push(backup);

        tracing::debug!(week_id, backup_id = %id, "Backup created");
        Ok(id)
    }

    async fn restore_from_backup(&self, week_id: WeekId, backup_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(backup) = state
            .backups
            .iter()
            .find(|b| b.id == backup_id && b.week_id == week_id)
            .cloned()
        else {
            return Ok(false);
        };

        match backup.schedule {
            Some(ref schedule) => state.activate(schedule),
            None => {
                state.active.remove(&week_id);
            }
        }
        let (later, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.commits)
            .into_iter()
            .partition(|c| c.week_id == week_id && c.seq > backup.ledger_seq);
        state.commits = kept;
        if let Some(history) = state.histories.get_mut(&backup.season_id) {
            for commit in &later {
                history.retract(&commit.delta);
            }
        }

        tracing::debug!(
            week_id,
            backup_id,
            retracted = later.len(),
            restored_at = %Utc::now(),
            "Backup restored"
        );
        Ok(true)
    }

    async fn list_backups(&self, week_id: WeekId) -> Result<Vec<BackupInfo>> {
        let state = self.state.read().await;
        Ok(state
            .backups
            .iter()
            .filter(|b| b.week_id == week_id)
            .map(ScheduleBackup::info)
            .collect())
    }
}

#[async_trait]
impl AvailabilityProvider for MemoryStore {
    async fn get_availability(&self, player_id: PlayerId, week_id: WeekId) -> Result<Option<bool>> {
        let state = self.state.read().await;
        let week = state.weeks.get(&week_id).ok_or(Error::WeekNotFound { week_id })?;
        Ok(week.availability_of(player_id))
    }

    async fn set_availability(
        &self,
        player_id: PlayerId,
        week_id: WeekId,
        available: bool,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let week = state
            .weeks
            .get_mut(&week_id)
            .ok_or(Error::WeekNotFound { week_id })?;
        week.set_availability(player_id, available);
        Ok(())
    }
}
