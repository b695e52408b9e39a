//! foursome - Weekly golf foursome scheduler
//!
//! Groups a week's available players into foursomes across a morning and an
//! afternoon slot while keeping repeat pairings within a season low.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Players, weeks, foursomes, schedules and pairing history
//! - [`scheduler`] - Assignment, pairing tracking and schedule management
//! - [`storage`] - Repository traits with in-memory and SQLite stores
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use foursome::config::Config;
//! use foursome::scheduler::{CreateOptions, ScheduleManager};
//! use foursome::storage::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::new(&config.storage.sqlite_path)?);
//!     let manager = ScheduleManager::new(store, config.scheduler);
//!     let schedule = manager.create_weekly_schedule(1, CreateOptions::default()).await?;
//!     println!("{} players scheduled", schedule.player_count());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::models::{Foursome, PairingDelta, PairingHistory, Player, Schedule, TimePreference, TimeSlot, Week};
    pub use crate::scheduler::{
        CreateOptions, FoursomeAssigner, ManualEdit, RegenerateOptions, RegenerationResult, ScheduleManager,
    };
    pub use crate::storage::{MemoryStore, SqliteStore, Store};
}

// Direct re-exports for convenience
pub use models::{Foursome, Player, Schedule, Week};
