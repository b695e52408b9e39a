//! Persistence for players, weeks, schedules, pairing histories and backups
//!
//! The scheduling core only talks to the traits in [`repository`]; two
//! implementations ship with the crate:
//!
//! - [`MemoryStore`] keeps everything in process memory (tests, embedding)
//! - [`SqliteStore`] persists to a SQLite file (the CLI)

pub mod availability;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use availability::{
    cross_check, set_availability_batch, set_availability_verified, AvailabilityFailure,
    BatchAvailabilityReport, Discrepancy, DiscrepancyKind, WeekPlayerData,
};
pub use memory::MemoryStore;
pub use repository::{
    AvailabilityProvider, BackupInfo, BackupRepository, PairingRepository, PlayerRepository,
    ScheduleBackup, ScheduleRepository, Store, WeekRepository,
};
pub use sqlite::SqliteStore;
