//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

use foursome::error::{Error, Result};
use foursome::models::{PairingDelta, PairingHistory, Player, PlayerId, Schedule, SeasonId, TimePreference, Week, WeekId};
use foursome::storage::{
    AvailabilityProvider, BackupInfo, BackupRepository, MemoryStore, PairingRepository,
    PlayerRepository, ScheduleRepository, WeekRepository,
};

pub const SEASON: SeasonId = 1;
pub const WEEK: WeekId = 1;

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()
}

/// Create a test player with a time preference
pub fn player(id: PlayerId, preference: TimePreference) -> Player {
    Player::new(id, format!("Player {id}"), SEASON).with_preference(preference)
}

/// Players 1..=n sharing one preference
pub fn roster(n: u64, preference: TimePreference) -> Vec<Player> {
    (1..=n).map(|id| player(id, preference)).collect()
}

/// Save players and a week marking the given ids available
pub async fn seed<S>(store: &S, players: &[Player], available: &[PlayerId])
where
    S: PlayerRepository + WeekRepository + ?Sized,
{
    for p in players {
        store.save_player(p).await.unwrap();
    }
    add_week(store, WEEK, players, available).await;
}

/// Save another week of the season, numbered after its id
pub async fn add_week<S>(store: &S, week_id: WeekId, players: &[Player], available: &[PlayerId])
where
    S: WeekRepository + ?Sized,
{
    let date = test_date() + chrono::Duration::weeks(week_id as i64 - 1);
    let mut week = Week::new(week_id, SEASON, week_id as u32, date);
    for p in players {
        week.set_availability(p.id, available.contains(&p.id));
    }
    store.save_week(&week).await.unwrap();
}

/// Memory store with switchable failures around schedule commits
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_commit: AtomicBool,
    pub fail_restore: AtomicBool,

    /// Park commits until `commit_release` is notified
    pub hold_commit: AtomicBool,
    pub commit_entered: Notify,
    pub commit_release: Notify,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_commits(self) -> Self {
        self.fail_commit.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl PlayerRepository for FailingStore {
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>> {
        self.inner.find_player(id).await
    }

    async fn find_players_by_season(&self, season_id: SeasonId) -> Result<Vec<Player>> {
        self.inner.find_players_by_season(season_id).await
    }

    async fn save_player(&self, player: &Player) -> Result<()> {
        self.inner.save_player(player).await
    }
}

#[async_trait]
impl WeekRepository for FailingStore {
    async fn find_week(&self, id: WeekId) -> Result<Option<Week>> {
        self.inner.find_week(id).await
    }

    async fn find_weeks_by_season(&self, season_id: SeasonId) -> Result<Vec<Week>> {
        self.inner.find_weeks_by_season(season_id).await
    }

    async fn save_week(&self, week: &Week) -> Result<()> {
        self.inner.save_week(week).await
    }
}

#[async_trait]
impl ScheduleRepository for FailingStore {
    async fn find_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        self.inner.find_schedule(id).await
    }

    async fn find_schedule_by_week(&self, week_id: WeekId) -> Result<Option<Schedule>> {
        self.inner.find_schedule_by_week(week_id).await
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.inner.save_schedule(schedule).await
    }

    async fn commit_schedule(&self, schedule: &Schedule, delta: &PairingDelta) -> Result<()> {
        if self.hold_commit.load(Ordering::SeqCst) {
            self.commit_entered.notify_one();
            self.commit_release.notified().await;
        }
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::persistence("commit_schedule", "injected failure"));
        }
        self.inner.commit_schedule(schedule, delta).await
    }
}

#[async_trait]
impl PairingRepository for FailingStore {
    async fn find_pairing_history(&self, season_id: SeasonId) -> Result<Option<PairingHistory>> {
        self.inner.find_pairing_history(season_id).await
    }

    async fn save_pairing_history(&self, history: &PairingHistory) -> Result<()> {
        self.inner.save_pairing_history(history).await
    }

    async fn record_pairings(&self, delta: &PairingDelta) -> Result<PairingHistory> {
        self.inner.record_pairings(delta).await
    }
}

#[async_trait]
impl BackupRepository for FailingStore {
    async fn create_backup(&self, week_id: WeekId) -> Result<String> {
        self.inner.create_backup(week_id).await
    }

    async fn restore_from_backup(&self, week_id: WeekId, backup_id: &str) -> Result<bool> {
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(Error::persistence("restore_from_backup", "injected failure"));
        }
        self.inner.restore_from_backup(week_id, backup_id).await
    }

    async fn list_backups(&self, week_id: WeekId) -> Result<Vec<BackupInfo>> {
        self.inner.list_backups(week_id).await
    }
}

#[async_trait]
impl AvailabilityProvider for FailingStore {
    async fn get_availability(&self, player_id: PlayerId, week_id: WeekId) -> Result<Option<bool>> {
        self.inner.get_availability(player_id, week_id).await
    }

    async fn set_availability(&self, player_id: PlayerId, week_id: WeekId, available: bool) -> Result<()> {
        self.inner.set_availability(player_id, week_id, available).await
    }
}
