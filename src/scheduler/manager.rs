//! Schedule manager
//!
//! Orchestrates a week's schedule through its lifecycle:
//!
//! ```text
//! NoSchedule --create--> Scheduled
//! Scheduled --regenerate--> Locked --> Regenerating --> Scheduled(new)
//!                                                  \--> Scheduled(restored)
//! ```
//!
//! Generation is all-or-nothing: the schedule and its pairing increments are
//! written in one commit after the computation finished. Regeneration
//! additionally snapshots the week before touching anything and restores the
//! snapshot if any later step fails. Weeks of one season commit independently;
//! the store applies each week's increments to the ledger as it stands.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::assignment::FoursomeAssigner;
use super::edits::{apply_edit, check_edit, replay_edits, ManualEdit, SkippedEdit};
use super::lock::WeekLocks;
use super::pairing::{schedule_pairs, PairingMetrics, PairingTracker};
use super::status::{RegenerationStatus, RegenerationStep, StatusBoard, StatusEvent};
use crate::config::SchedulerConfig;
use crate::error::{Error, ErrorReport, Result};
use crate::models::{pair_key, PairingDelta, PairingHistory, Player, PlayerId, Schedule, SeasonId, TimePreference, TimeSlot, Week, WeekId};
use crate::storage::{cross_check, Discrepancy, Store, WeekPlayerData};

// ============================================================================
// Options and Results
// ============================================================================

/// Options for [`ScheduleManager::create_weekly_schedule`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Enforce the minimum available-player count
    pub validate_preconditions: bool,

    /// Replace an existing schedule instead of failing
    pub allow_existing: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            validate_preconditions: true,
            allow_existing: false,
        }
    }
}

/// Options for [`ScheduleManager::regenerate_schedule`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegenerateOptions {
    /// Regenerate even when manual edits would be discarded, or when no schedule exists yet
    pub force_overwrite: bool,

    /// Replay the current schedule's manual edits onto the new one
    pub preserve_manual_edits: bool,
}

/// Differences between the superseded and the new schedule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesDetected {
    pub players_added: Vec<PlayerId>,
    pub players_removed: Vec<PlayerId>,

    /// Pairs present in exactly one of the two schedules
    pub pairing_changes: usize,
}

impl ChangesDetected {
    pub fn between(old: Option<&Schedule>, new: &Schedule) -> Self {
        let new_ids: BTreeSet<PlayerId> = new.player_ids().into_iter().collect();
        let old_ids: BTreeSet<PlayerId> = old.map(|s| s.player_ids().into_iter().collect()).unwrap_or_default();
        let new_pairs = schedule_pairs(new);
        let old_pairs = old.map(schedule_pairs).unwrap_or_default();

        Self {
            players_added: new_ids.difference(&old_ids).copied().collect(),
            players_removed: old_ids.difference(&new_ids).copied().collect(),
            pairing_changes: new_pairs.symmetric_difference(&old_pairs).count(),
        }
    }
}

/// A scheduled player sitting in a slot their preference excludes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceConflict {
    pub player_id: PlayerId,
    pub preference: TimePreference,
    pub time_slot: TimeSlot,
}

/// What a regeneration would disturb, for caller-side confirmation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationImpact {
    pub week_id: WeekId,

    /// Pair keys of the current schedule that a new grouping may break up
    pub pairings_at_risk: Vec<String>,
    pub preference_conflicts: Vec<PreferenceConflict>,

    /// Scheduled players no longer marked available
    pub unavailable_scheduled: Vec<PlayerId>,

    /// Manual edits carried by the current schedule
    pub manual_edits: usize,
}

/// Outcome of [`ScheduleManager::regenerate_schedule`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegenerationResult {
    pub success: bool,
    pub new_schedule_id: Option<String>,
    pub backup_id: Option<String>,
    pub changes_detected: ChangesDetected,
    pub impact: Option<RegenerationImpact>,
    pub skipped_edits: Vec<SkippedEdit>,
    pub error: Option<ErrorReport>,
}

/// Read-only check of a manual edit against the current schedule and availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub week_id: WeekId,
    pub valid: bool,
    pub errors: Vec<String>,

    /// Scheduled players without confirmed availability after the edit
    pub discrepancies: Vec<Discrepancy>,
}

// ============================================================================
// Manager
// ============================================================================

/// Generation, regeneration and manual edits for weekly schedules
pub struct ScheduleManager<S: Store + ?Sized> {
    store: Arc<S>,
    config: SchedulerConfig,
    assigner: FoursomeAssigner,
    tracker: PairingTracker<S>,
    locks: Arc<WeekLocks>,
    status: Arc<StatusBoard>,
}

impl<S: Store + ?Sized> ScheduleManager<S> {
    pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
        Self {
            assigner: FoursomeAssigner::from_config(&config),
            tracker: PairingTracker::new(Arc::clone(&store)),
            store,
            config,
            locks: Arc::new(WeekLocks::new()),
            status: Arc::new(StatusBoard::default()),
        }
    }

    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, SchedulerConfig::default())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pairing_tracker(&self) -> &PairingTracker<S> {
        &self.tracker
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Build and persist the first schedule of a week
    pub async fn create_weekly_schedule(&self, week_id: WeekId, options: CreateOptions) -> Result<Schedule> {
        self.ensure_not_regenerating(week_id)?;
        let _week_guard = self.locks.lock_week(week_id).await;
        self.ensure_not_regenerating(week_id)?;

        let week = self.load_week(week_id).await?;
        if !options.allow_existing && self.store.find_schedule_by_week(week_id).await?.is_some() {
            return Err(Error::ScheduleExists { week_id });
        }

        let players = self.available_players(&week).await?;
        if options.validate_preconditions {
            self.check_player_count(week_id, &players)?;
        }

        let history = self.tracker.get_pairing_history(week.season_id).await?;
        let schedule = self.compute(week_id, players, &history).await?;
        self.commit(week.season_id, &schedule).await?;

        tracing::info!(
            week_id,
            schedule_id = %schedule.id,
            players = schedule.player_count(),
            "Weekly schedule created"
        );
        Ok(schedule)
    }

    // ------------------------------------------------------------------------
    // Regeneration
    // ------------------------------------------------------------------------

    /// False while a regeneration holds the week or new ones are blocked
    pub fn is_regeneration_allowed(&self, week_id: WeekId) -> bool {
        !self.locks.is_held(week_id) && !self.locks.is_blocked(week_id)
    }

    /// Acquire (fails fast if held) or release (idempotent) the regeneration lock
    pub fn set_regeneration_lock(&self, week_id: WeekId, held: bool) -> Result<()> {
        if held {
            self.locks.try_acquire(week_id)
        } else {
            self.locks.release(week_id);
            Ok(())
        }
    }

    /// Replace a week's schedule under lock with backup and rollback.
    ///
    /// Failures before the backup return `Err`. Failures after it are rolled
    /// back and reported through [`RegenerationResult::error`].
    pub async fn regenerate_schedule(&self, week_id: WeekId, options: RegenerateOptions) -> Result<RegenerationResult> {
        let guard = self.locks.acquire_guard(week_id)?;
        self.status.start(week_id, RegenerationStep::LockAcquired);

        let result = self.regenerate_locked(week_id, options).await;
        match &result {
            Ok(r) if r.success => self.status.complete(week_id),
            Ok(_) => {}
            Err(e) => self.status.fail(week_id, RegenerationStep::LockAcquired, e.to_string()),
        }

        drop(guard);
        result
    }

    async fn regenerate_locked(&self, week_id: WeekId, options: RegenerateOptions) -> Result<RegenerationResult> {
        let _week_guard = self.locks.lock_week(week_id).await;

        let week = self.load_week(week_id).await?;
        let current = self.store.find_schedule_by_week(week_id).await?;
        match &current {
            None if !options.force_overwrite => return Err(Error::ScheduleNotFound { week_id }),
            Some(schedule)
                if !schedule.manual_edits.is_empty() && !options.force_overwrite && !options.preserve_manual_edits =>
            {
                return Err(Error::precondition(format!(
                    "Schedule for week {week_id} carries {} manual edits; force overwrite or preserve them",
                    schedule.manual_edits.len()
                )));
            }
            _ => {}
        }

        let players = self.available_players(&week).await?;
        self.check_player_count(week_id, &players)?;

        let backup_id = self.store.create_backup(week_id).await?;
        self.status.advance(week_id, RegenerationStep::BackupCreated);
        tracing::info!(week_id, backup_id = %backup_id, "Pre-regeneration backup created");

        match self.regenerate_protected(&week, current.as_ref(), players, options).await {
            Ok(mut result) => {
                result.backup_id = Some(backup_id);
                tracing::info!(
                    week_id,
                    schedule_id = ?result.new_schedule_id,
                    added = result.changes_detected.players_added.len(),
                    removed = result.changes_detected.players_removed.len(),
                    pairing_changes = result.changes_detected.pairing_changes,
                    "Schedule regenerated"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(week_id, error = %e, "Regeneration failed, rolling back");
                self.rollback(week_id, &backup_id, &e).await?;
                self.status.fail(week_id, RegenerationStep::RolledBack, e.to_string());
                Ok(RegenerationResult {
                    success: false,
                    backup_id: Some(backup_id),
                    error: Some(e.report()),
                    ..Default::default()
                })
            }
        }
    }

    async fn regenerate_protected(
        &self,
        week: &Week,
        current: Option<&Schedule>,
        players: Vec<Player>,
        options: RegenerateOptions,
    ) -> Result<RegenerationResult> {
        let week_id = week.id;
        let impact = self.impact_for(week, current).await?;
        self.status.advance(week_id, RegenerationStep::ImpactAnalyzed);

        let history = self.tracker.get_pairing_history(week.season_id).await?;
        let mut schedule = self.compute(week_id, players, &history).await?;
        self.status.advance(week_id, RegenerationStep::Generated);

        let mut skipped_edits = Vec::new();
        if options.preserve_manual_edits {
            if let Some(edits) = current.map(|s| &s.manual_edits).filter(|e| !e.is_empty()) {
                let outcome = replay_edits(schedule, edits);
                tracing::info!(
                    week_id,
                    replayed = outcome.replayed,
                    skipped = outcome.skipped.len(),
                    "Manual edits replayed"
                );
                schedule = outcome.schedule;
                skipped_edits = outcome.skipped;
            }
            self.status.advance(week_id, RegenerationStep::EditsReplayed);
        }

        self.commit(week.season_id, &schedule).await?;
        self.status.advance(week_id, RegenerationStep::Committed);

        Ok(RegenerationResult {
            success: true,
            new_schedule_id: Some(schedule.id.clone()),
            backup_id: None,
            changes_detected: ChangesDetected::between(current, &schedule),
            impact: Some(impact),
            skipped_edits,
            error: None,
        })
    }

    async fn rollback(&self, week_id: WeekId, backup_id: &str, cause: &Error) -> Result<()> {
        match self.store.restore_from_backup(week_id, backup_id).await {
            Ok(true) => {
                tracing::warn!(week_id, backup_id, "Schedule restored and this week's pairings retracted");
                Ok(())
            }
            Ok(false) => {
                tracing::error!(week_id, backup_id, "Backup vanished before rollback");
                Err(Error::persistence(
                    "rollback",
                    format!("backup {backup_id} not found after: {cause}"),
                ))
            }
            Err(restore_err) => {
                tracing::error!(week_id, backup_id, error = %restore_err, "Rollback failed");
                Err(Error::persistence(
                    "rollback",
                    format!("{restore_err} while recovering from: {cause}"),
                ))
            }
        }
    }

    /// What regenerating the week's current schedule would disturb
    pub async fn analyze_regeneration_impact(&self, week_id: WeekId) -> Result<RegenerationImpact> {
        let week = self.load_week(week_id).await?;
        let current = self
            .store
            .find_schedule_by_week(week_id)
            .await?
            .ok_or(Error::ScheduleNotFound { week_id })?;
        self.impact_for(&week, Some(&current)).await
    }

    async fn impact_for(&self, week: &Week, current: Option<&Schedule>) -> Result<RegenerationImpact> {
        let mut impact = RegenerationImpact {
            week_id: week.id,
            ..Default::default()
        };
        let Some(current) = current else {
            return Ok(impact);
        };

        // Preferences may have changed since the schedule was built
        let latest: HashMap<PlayerId, Player> = self
            .store
            .find_players_by_season(week.season_id)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        impact.pairings_at_risk = schedule_pairs(current)
            .into_iter()
            .map(|(a, b)| pair_key(a, b))
            .collect();

        for foursome in current.foursomes() {
            for player in &foursome.players {
                let preference = latest.get(&player.id).unwrap_or(player).time_preference;
                if !preference.accepts(foursome.time_slot) {
                    impact.preference_conflicts.push(PreferenceConflict {
                        player_id: player.id,
                        preference,
                        time_slot: foursome.time_slot,
                    });
                }
                if week.availability_of(player.id) != Some(true) {
                    impact.unavailable_scheduled.push(player.id);
                }
            }
        }
        impact.manual_edits = current.manual_edits.len();

        Ok(impact)
    }

    // ------------------------------------------------------------------------
    // Manual edits
    // ------------------------------------------------------------------------

    /// Apply and persist a manual edit to the week's schedule
    pub async fn apply_manual_edit(&self, week_id: WeekId, edit: ManualEdit) -> Result<Schedule> {
        self.ensure_not_regenerating(week_id)?;
        let _week_guard = self.locks.lock_week(week_id).await;
        self.ensure_not_regenerating(week_id)?;

        let schedule = self
            .store
            .find_schedule_by_week(week_id)
            .await?
            .ok_or(Error::ScheduleNotFound { week_id })?;
        let updated = apply_edit(&schedule, &edit)?;
        self.store.save_schedule(&updated).await?;

        tracing::info!(week_id, edit = %edit.describe(), "Manual edit applied");
        Ok(updated)
    }

    /// Check an edit without applying it
    pub async fn validate_manual_edit(&self, week_id: WeekId, edit: &ManualEdit) -> Result<ValidationReport> {
        let week = self.load_week(week_id).await?;
        let schedule = self
            .store
            .find_schedule_by_week(week_id)
            .await?
            .ok_or(Error::ScheduleNotFound { week_id })?;
        let players = self.store.find_players_by_season(week.season_id).await?;

        let (errors, preview) = match check_edit(&schedule, edit).and_then(|_| apply_edit(&schedule, edit)) {
            Ok(preview) => (Vec::new(), preview),
            Err(e) => (vec![e.to_string()], schedule),
        };

        let discrepancies = cross_check(&week, &players, Some(&preview))
            .blocking_discrepancies()
            .into_iter()
            .cloned()
            .collect();

        Ok(ValidationReport {
            week_id,
            valid: errors.is_empty(),
            errors,
            discrepancies,
        })
    }

    /// Season players split by availability, with schedule discrepancies
    pub async fn get_player_data_for_week(&self, week_id: WeekId) -> Result<WeekPlayerData> {
        let week = self.load_week(week_id).await?;
        let players = self.store.find_players_by_season(week.season_id).await?;
        let schedule = self.store.find_schedule_by_week(week_id).await?;

        let data = cross_check(&week, &players, schedule.as_ref());
        if !data.blocking_discrepancies().is_empty() {
            tracing::warn!(
                week_id,
                discrepancies = data.blocking_discrepancies().len(),
                "Schedule disagrees with availability"
            );
        }
        Ok(data)
    }

    // ------------------------------------------------------------------------
    // Queries and status
    // ------------------------------------------------------------------------

    pub async fn get_schedule(&self, week_id: WeekId) -> Result<Option<Schedule>> {
        self.store.find_schedule_by_week(week_id).await
    }

    /// Pairing statistics across every player of a season
    pub async fn season_metrics(&self, season_id: SeasonId) -> Result<PairingMetrics> {
        let players = self.store.find_players_by_season(season_id).await?;
        self.tracker.calculate_pairing_metrics(season_id, &players).await
    }

    pub fn get_regeneration_status(&self, week_id: WeekId) -> Option<RegenerationStatus> {
        self.status.get(week_id)
    }

    /// Drop a finished week's status from the board
    pub fn clear_regeneration_status(&self, week_id: WeekId) -> bool {
        self.status.clear(week_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    /// Refuse new regenerations for a week. An in-flight run still completes.
    pub fn cancel_regeneration(&self, week_id: WeekId) -> bool {
        let newly_blocked = self.locks.block(week_id);
        if newly_blocked {
            tracing::info!(week_id, in_flight = self.locks.is_held(week_id), "Regeneration cancelled");
            self.status.notify(StatusEvent::Blocked { week_id });
        }
        newly_blocked
    }

    pub fn resume_regeneration(&self, week_id: WeekId) -> bool {
        let unblocked = self.locks.unblock(week_id);
        if unblocked {
            tracing::info!(week_id, "Regeneration resumed");
            self.status.notify(StatusEvent::Unblocked { week_id });
        }
        unblocked
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_not_regenerating(&self, week_id: WeekId) -> Result<()> {
        if self.locks.is_held(week_id) {
            Err(Error::LockConflict { week_id })
        } else {
            Ok(())
        }
    }

    async fn load_week(&self, week_id: WeekId) -> Result<Week> {
        self.store
            .find_week(week_id)
            .await?
            .ok_or(Error::WeekNotFound { week_id })
    }

    /// Season players explicitly marked available, in id order
    async fn available_players(&self, week: &Week) -> Result<Vec<Player>> {
        let players = self.store.find_players_by_season(week.season_id).await?;
        Ok(cross_check(week, &players, None).available)
    }

    fn check_player_count(&self, week_id: WeekId, players: &[Player]) -> Result<()> {
        if players.len() < self.config.min_players {
            return Err(Error::InsufficientPlayers {
                week_id,
                available: players.len(),
                required: self.config.min_players,
            });
        }
        Ok(())
    }

    async fn compute(&self, week_id: WeekId, players: Vec<Player>, history: &PairingHistory) -> Result<Schedule> {
        if self.config.concurrent_assignment {
            self.assigner
                .generate_concurrent(week_id, players, Arc::new(history.clone()))
                .await
        } else {
            self.assigner.generate(week_id, &players, history)
        }
    }

    /// Persist a schedule together with its pairings in one commit
    async fn commit(&self, season_id: SeasonId, schedule: &Schedule) -> Result<()> {
        let delta = PairingDelta::for_schedule(season_id, schedule);
        self.store.commit_schedule(schedule, &delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::{MemoryStore, PlayerRepository, ScheduleRepository, WeekRepository};
    use chrono::NaiveDate;

    async fn seeded(players: u64, available: u64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut week = Week::new(1, 1, 1, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        for id in 1..=players {
            store.save_player(&Player::new(id, format!("P{id}"), 1)).await.unwrap();
            week.set_availability(id, id <= available);
        }
        store.save_week(&week).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_schedule() {
        let store = seeded(10, 8).await;
        let manager = ScheduleManager::with_defaults(Arc::clone(&store));

        let schedule = manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap();
        assert_eq!(schedule.player_count(), 8);
        assert!(schedule.is_consistent());

        let stored = store.find_schedule_by_week(1).await.unwrap().unwrap();
        assert_eq!(stored, schedule);

        let history = manager.pairing_tracker().get_pairing_history(1).await.unwrap();
        assert_eq!(history.total(), schedule_pairs(&schedule).len() as u64);
    }

    #[tokio::test]
    async fn test_create_preconditions() {
        let store = seeded(6, 3).await;
        let manager = ScheduleManager::with_defaults(Arc::clone(&store));

        let err = manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientPlayers { available: 3, required: 4, .. }));

        let err = manager.create_weekly_schedule(7, CreateOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let relaxed = CreateOptions {
            validate_preconditions: false,
            ..Default::default()
        };
        manager.create_weekly_schedule(1, relaxed).await.unwrap();
        let err = manager.create_weekly_schedule(1, relaxed).await.unwrap_err();
        assert!(matches!(err, Error::ScheduleExists { week_id: 1 }));
    }

    #[tokio::test]
    async fn test_regenerate_reports_changes() {
        let store = seeded(8, 8).await;
        let manager = ScheduleManager::with_defaults(Arc::clone(&store));
        let first = manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap();

        let mut week = store.find_week(1).await.unwrap().unwrap();
        week.set_availability(8, false);
        store.save_week(&week).await.unwrap();

        let result = manager.regenerate_schedule(1, RegenerateOptions::default()).await.unwrap();
        assert!(result.success);
        assert_ne!(result.new_schedule_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(result.changes_detected.players_removed, vec![8]);
        assert!(result.changes_detected.players_added.is_empty());
        assert_eq!(result.impact.unwrap().unavailable_scheduled, vec![8]);
        assert!(manager.is_regeneration_allowed(1));
    }

    #[tokio::test]
    async fn test_regenerate_without_schedule() {
        let store = seeded(4, 4).await;
        let manager = ScheduleManager::with_defaults(store);

        let err = manager.regenerate_schedule(1, RegenerateOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::ScheduleNotFound { week_id: 1 }));
        assert!(manager.is_regeneration_allowed(1));

        let forced = RegenerateOptions {
            force_overwrite: true,
            ..Default::default()
        };
        assert!(manager.regenerate_schedule(1, forced).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_held_lock_blocks_regeneration_and_edits() {
        let store = seeded(4, 4).await;
        let manager = ScheduleManager::with_defaults(store);
        let schedule = manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap();

        manager.set_regeneration_lock(1, true).unwrap();
        assert!(!manager.is_regeneration_allowed(1));
        assert!(matches!(manager.set_regeneration_lock(1, true), Err(Error::LockConflict { .. })));

        let err = manager.regenerate_schedule(1, RegenerateOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockConflict);

        let foursome = &schedule.time_slots.afternoon[0];
        let edit = ManualEdit::RemovePlayer {
            player_id: foursome.players[0].id,
            foursome_id: foursome.id.clone(),
        };
        let err = manager.apply_manual_edit(1, edit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockConflict);

        manager.set_regeneration_lock(1, false).unwrap();
        manager.set_regeneration_lock(1, false).unwrap();
        assert!(manager.is_regeneration_allowed(1));
    }

    #[tokio::test]
    async fn test_manual_edits_require_opt_in() {
        let store = seeded(8, 8).await;
        let manager = ScheduleManager::with_defaults(store);
        let schedule = manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap();

        let foursome = schedule.foursomes().next().unwrap();
        let edit = ManualEdit::RemovePlayer {
            player_id: foursome.players[0].id,
            foursome_id: foursome.id.clone(),
        };
        let edited = manager.apply_manual_edit(1, edit).await.unwrap();
        assert_eq!(edited.manual_edits.len(), 1);

        let err = manager.regenerate_schedule(1, RegenerateOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let impact = manager.analyze_regeneration_impact(1).await.unwrap();
        assert_eq!(impact.manual_edits, 1);
    }

    #[tokio::test]
    async fn test_validate_manual_edit_reports_errors() {
        let store = seeded(8, 8).await;
        let manager = ScheduleManager::with_defaults(store);
        let schedule = manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap();
        let (from, to) = (&schedule.time_slots.morning[0], &schedule.time_slots.afternoon[0]);

        let full_target = ManualEdit::MovePlayer {
            player_id: from.players[0].id,
            from_foursome_id: from.id.clone(),
            to_foursome_id: to.id.clone(),
        };
        let report = manager.validate_manual_edit(1, &full_target).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);

        let remove = ManualEdit::RemovePlayer {
            player_id: from.players[0].id,
            foursome_id: from.id.clone(),
        };
        let report = manager.validate_manual_edit(1, &remove).await.unwrap();
        assert!(report.valid);
        assert!(report.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_blocks_new_regenerations() {
        let store = seeded(4, 4).await;
        let manager = ScheduleManager::with_defaults(store);
        manager.create_weekly_schedule(1, CreateOptions::default()).await.unwrap();
        let mut events = manager.subscribe();

        assert!(manager.cancel_regeneration(1));
        assert!(!manager.is_regeneration_allowed(1));
        let err = manager.regenerate_schedule(1, RegenerateOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockConflict);
        assert!(matches!(events.recv().await.unwrap(), StatusEvent::Blocked { week_id: 1 }));

        assert!(manager.resume_regeneration(1));
        assert!(manager.regenerate_schedule(1, RegenerateOptions::default()).await.unwrap().success);
        let status = manager.get_regeneration_status(1).unwrap();
        assert_eq!(status.progress, 100);

        assert!(manager.clear_regeneration_status(1));
        assert!(manager.get_regeneration_status(1).is_none());
    }

    #[test]
    fn test_changes_between() {
        use crate::models::{Foursome, TimeSlots};

        let build = |groups: &[&[PlayerId]]| {
            Schedule::new(
                1,
                TimeSlots {
                    morning: groups
                        .iter()
                        .enumerate()
                        .map(|(i, ids)| {
                            let players = ids.iter().map(|id| Player::new(*id, format!("P{id}"), 1)).collect();
                            Foursome::new(players, TimeSlot::Morning, i)
                        })
                        .collect(),
                    afternoon: vec![],
                },
            )
        };

        let old = build(&[&[1, 2, 3]]);
        let new = build(&[&[1, 2, 4]]);
        let changes = ChangesDetected::between(Some(&old), &new);

        assert_eq!(changes.players_added, vec![4]);
        assert_eq!(changes.players_removed, vec![3]);
        // 1-3, 2-3 gone; 1-4, 2-4 new
        assert_eq!(changes.pairing_changes, 4);
    }
}
