//! SQLite store
//!
//! Records are kept as JSON documents next to the columns used for lookups.
//! Uses `Mutex` to ensure thread-safety for the SQLite connection.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::repository::{
    AvailabilityProvider, BackupInfo, BackupRepository, PairingRepository, PlayerRepository,
    ScheduleBackup, ScheduleRepository, WeekRepository,
};
use crate::error::{Error, Result};
use crate::models::{PairingDelta, PairingHistory, Player, PlayerId, Schedule, SeasonId, Week, WeekId};

/// SQLite integer column for an unsigned id; ids above `i64::MAX` are rejected
fn sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| Error::persistence("encode_id", format!("id {id} exceeds the SQLite integer range")))
}

/// SQLite-backed implementation of every repository trait
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::persistence("lock_connection", e.to_string()))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS players (
                    id INTEGER PRIMARY KEY,
                    season_id INTEGER NOT NULL,
                    data TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_players_season
                    ON players(season_id);

                CREATE TABLE IF NOT EXISTS weeks (
                    id INTEGER PRIMARY KEY,
                    season_id INTEGER NOT NULL,
                    week_number INTEGER NOT NULL,
                    data TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_weeks_season
                    ON weeks(season_id);

                CREATE TABLE IF NOT EXISTS schedules (
                    id TEXT PRIMARY KEY,
                    week_id INTEGER NOT NULL,
                    active INTEGER NOT NULL DEFAULT 0,
                    data TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_schedules_week
                    ON schedules(week_id, active);

                CREATE TABLE IF NOT EXISTS pairing_histories (
                    season_id INTEGER PRIMARY KEY,
                    data TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pairing_commits (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    week_id INTEGER NOT NULL,
                    season_id INTEGER NOT NULL,
                    data TEXT NOT NULL,
                    committed_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_pairing_commits_week
                    ON pairing_commits(week_id, seq);

                CREATE TABLE IF NOT EXISTS schedule_backups (
                    id TEXT PRIMARY KEY,
                    week_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    data TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_backups_week
                    ON schedule_backups(week_id);
                "#,
        )?;
        Ok(())
    }
}

// Statement helpers shared by plain calls and transactions

fn load_week(conn: &Connection, week_id: WeekId) -> Result<Option<Week>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM weeks WHERE id = ?1",
            params![sql_id(week_id)?],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| serde_json::from_str(&d).map_err(Error::from))
        .transpose()
}

fn store_week(conn: &Connection, week: &Week) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO weeks (id, season_id, week_number, data) VALUES (?1, ?2, ?3, ?4)",
        params![
            sql_id(week.id)?,
            sql_id(week.season_id)?,
            week.week_number,
            serde_json::to_string(week)?
        ],
    )?;
    Ok(())
}

fn load_active_schedule(conn: &Connection, week_id: WeekId) -> Result<Option<Schedule>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM schedules WHERE week_id = ?1 AND active = 1",
            params![sql_id(week_id)?],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| serde_json::from_str(&d).map_err(Error::from))
        .transpose()
}

fn activate_schedule(tx: &Transaction<'_>, schedule: &Schedule) -> Result<()> {
    tx.execute(
        "UPDATE schedules SET active = 0 WHERE week_id = ?1 AND id != ?2",
        params![sql_id(schedule.week_id)?, schedule.id],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO schedules (id, week_id, active, data, updated_at)
         VALUES (?1, ?2, 1, ?3, ?4)",
        params![
            schedule.id,
            sql_id(schedule.week_id)?,
            serde_json::to_string(schedule)?,
            schedule.last_modified.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn load_history(conn: &Connection, season_id: SeasonId) -> Result<Option<PairingHistory>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM pairing_histories WHERE season_id = ?1",
            params![sql_id(season_id)?],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| serde_json::from_str(&d).map_err(Error::from))
        .transpose()
}

fn store_history(conn: &Connection, history: &PairingHistory) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pairing_histories (season_id, data, updated_at) VALUES (?1, ?2, ?3)",
        params![
            sql_id(history.season_id)?,
            serde_json::to_string(history)?,
            history.last_updated.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Add a delta to the stored ledger inside the caller's transaction
fn apply_delta(tx: &Transaction<'_>, delta: &PairingDelta) -> Result<PairingHistory> {
    let mut history = load_history(tx, delta.season_id)?.unwrap_or_else(|| PairingHistory::new(delta.season_id));
    history.apply(delta);
    store_history(tx, &history)?;
    Ok(history)
}

fn last_commit_seq(conn: &Connection) -> Result<u64> {
    let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM pairing_commits", [], |row| row.get(0))?;
    u64::try_from(seq).map_err(|_| Error::persistence("last_commit_seq", format!("negative sequence {seq}")))
}

#[async_trait]
impl PlayerRepository for SqliteStore {
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM players WHERE id = ?1",
                params![sql_id(id)?],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    async fn find_players_by_season(&self, season_id: SeasonId) -> Result<Vec<Player>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data FROM players WHERE season_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![sql_id(season_id)?], |row| row.get::<_, String>(0))?;

        let mut players = Vec::new();
        for row in rows {
            players.push(serde_json::from_str(&row?)?);
        }
        Ok(players)
    }

    async fn save_player(&self, player: &Player) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO players (id, season_id, data) VALUES (?1, ?2, ?3)",
            params![
                sql_id(player.id)?,
                sql_id(player.season_id)?,
                serde_json::to_string(player)?
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl WeekRepository for SqliteStore {
    async fn find_week(&self, id: WeekId) -> Result<Option<Week>> {
        let conn = self.conn()?;
        load_week(&conn, id)
    }

    async fn find_weeks_by_season(&self, season_id: SeasonId) -> Result<Vec<Week>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT data FROM weeks WHERE season_id = ?1 ORDER BY week_number")?;
        let rows = stmt.query_map(params![sql_id(season_id)?], |row| row.get::<_, String>(0))?;

        let mut weeks = Vec::new();
        for row in rows {
            weeks.push(serde_json::from_str(&row?)?);
        }
        Ok(weeks)
    }

    async fn save_week(&self, week: &Week) -> Result<()> {
        let conn = self.conn()?;
        store_week(&conn, week)
    }
}

#[async_trait]
impl ScheduleRepository for SqliteStore {
    async fn find_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM schedules WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    async fn find_schedule_by_week(&self, week_id: WeekId) -> Result<Option<Schedule>> {
        let conn = self.conn()?;
        load_active_schedule(&conn, week_id)
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        activate_schedule(&tx, schedule)?;
        tx.commit()?;
        Ok(())
    }

    async fn commit_schedule(&self, schedule: &Schedule, delta: &PairingDelta) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        activate_schedule(&tx, schedule)?;
        apply_delta(&tx, delta)?;
        tx.execute(
            "INSERT INTO pairing_commits (week_id, season_id, data, committed_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                sql_id(schedule.week_id)?,
                sql_id(delta.season_id)?,
                serde_json::to_string(delta)?,
                schedule.last_modified.to_rfc3339()
            ],
        )?;
        tx.commit()?;

        tracing::debug!(schedule_id = %schedule.id, week_id = schedule.week_id, "Schedule committed");
        Ok(())
    }
}

#[async_trait]
impl PairingRepository for SqliteStore {
    async fn find_pairing_history(&self, season_id: SeasonId) -> Result<Option<PairingHistory>> {
        let conn = self.conn()?;
        load_history(&conn, season_id)
    }

    async fn save_pairing_history(&self, history: &PairingHistory) -> Result<()> {
        let conn = self.conn()?;
        store_history(&conn, history)
    }

    async fn record_pairings(&self, delta: &PairingDelta) -> Result<PairingHistory> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let history = apply_delta(&tx, delta)?;
        tx.commit()?;
        Ok(history)
    }
}

#[async_trait]
impl BackupRepository for SqliteStore {
    async fn create_backup(&self, week_id: WeekId) -> Result<String> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let week = load_week(&tx, week_id)?.ok_or(Error::WeekNotFound { week_id })?;
        let backup = ScheduleBackup::new(
            week_id,
            week.season_id,
            load_active_schedule(&tx, week_id)?,
            last_commit_seq(&tx)?,
        );

        tx.execute(
            "INSERT INTO schedule_backups (id, week_id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
            params![
                backup.id,
                sql_id(week_id)?,
                backup.created_at.to_rfc3339(),
                serde_json::to_string(&backup)?
            ],
        )?;
        tx.commit()?;

        tracing::debug!(week_id, backup_id = %backup.id, "Backup created");
        Ok(backup.id)
    }

    async fn restore_from_backup(&self, week_id: WeekId, backup_id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let data: Option<String> = tx
            .query_row(
                "SELECT data FROM schedule_backups WHERE id = ?1 AND week_id = ?2",
                params![backup_id, sql_id(week_id)?],
                |row| row.get(0),
            )
            .optional()?;
        let Some(data) = data else {
            return Ok(false);
        };
        let backup: ScheduleBackup = serde_json::from_str(&data)?;

        match backup.schedule {
            Some(ref schedule) => activate_schedule(&tx, schedule)?,
            None => {
                tx.execute(
                    "UPDATE schedules SET active = 0 WHERE week_id = ?1",
                    params![sql_id(week_id)?],
                )?;
            }
        }

        let after = i64::try_from(backup.ledger_seq)
            .map_err(|_| Error::persistence("restore_from_backup", "ledger sequence out of range"))?;
        let later = {
            let mut stmt =
                tx.prepare("SELECT data FROM pairing_commits WHERE week_id = ?1 AND seq > ?2 ORDER BY seq")?;
            let rows = stmt.query_map(params![sql_id(week_id)?, after], |row| row.get::<_, String>(0))?;
            let mut deltas = Vec::new();
            for row in rows {
                deltas.push(serde_json::from_str::<PairingDelta>(&row?)?);
            }
            deltas
        };
        if !later.is_empty() {
            if let Some(mut history) = load_history(&tx, backup.season_id)? {
                for delta in &later {
                    history.retract(delta);
                }
                store_history(&tx, &history)?;
            }
            tx.execute(
                "DELETE FROM pairing_commits WHERE week_id = ?1 AND seq > ?2",
                params![sql_id(week_id)?, after],
            )?;
        }
        tx.commit()?;

        tracing::debug!(week_id, backup_id, retracted = later.len(), "Backup restored");
        Ok(true)
    }

    async fn list_backups(&self, week_id: WeekId) -> Result<Vec<BackupInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT data FROM schedule_backups WHERE week_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![sql_id(week_id)?], |row| row.get::<_, String>(0))?;

        let mut backups = Vec::new();
        for row in rows {
            let backup: ScheduleBackup = serde_json::from_str(&row?)?;
            backups.push(backup.info());
        }
        Ok(backups)
    }
}

#[async_trait]
impl AvailabilityProvider for SqliteStore {
    async fn get_availability(&self, player_id: PlayerId, week_id: WeekId) -> Result<Option<bool>> {
        let conn = self.conn()?;
        let week = load_week(&conn, week_id)?.ok_or(Error::WeekNotFound { week_id })?;
        Ok(week.availability_of(player_id))
    }

    async fn set_availability(
        &self,
        player_id: PlayerId,
        week_id: WeekId,
        available: bool,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut week = load_week(&tx, week_id)?.ok_or(Error::WeekNotFound { week_id })?;
        week.set_availability(player_id, available);
        store_week(&tx, &week)?;
        tx.commit()?;
        Ok(())
    }
}
