//! Weekly foursome scheduling
//!
//! This module turns a week's available players into foursomes that keep
//! repeat pairings low across a season, and manages each week's schedule
//! through generation, manual edits and regeneration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ScheduleManager                      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────┐   │
//! │  │   Foursome   │  │   Pairing    │  │  Week locks   │   │
//! │  │   Assigner   │  │   Tracker    │  │  + Status     │   │
//! │  └──────┬───────┘  └──────┬───────┘  └───────────────┘   │
//! │         │                 │                              │
//! │         └────────┬────────┘                              │
//! │                  ▼                                       │
//! │          commit / backup / restore                       │
//! └──────────────────┼───────────────────────────────────────┘
//!                    ▼
//!              storage::Store
//! ```
//!
//! # Modules
//!
//! - [`assignment`] - Time-slot split and pairing-weight partitioning
//! - [`pairing`] - Season pairing ledger and metrics
//! - [`edits`] - Manual edit commands, reducer and replay
//! - [`lock`] - Per-week mutex and fail-fast regeneration lock
//! - [`status`] - Regeneration progress board and events
//! - [`manager`] - Generation and regeneration orchestration
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use foursome::scheduler::{CreateOptions, RegenerateOptions, ScheduleManager};
//! use foursome::storage::MemoryStore;
//!
//! let manager = ScheduleManager::with_defaults(Arc::new(MemoryStore::new()));
//! let schedule = manager.create_weekly_schedule(week_id, CreateOptions::default()).await?;
//!
//! // Later, after availability changed
//! let result = manager
//!     .regenerate_schedule(week_id, RegenerateOptions { preserve_manual_edits: true, ..Default::default() })
//!     .await?;
//! if !result.success {
//!     eprintln!("rolled back: {:?}", result.error);
//! }
//! ```

pub mod assignment;
pub mod edits;
pub mod lock;
pub mod manager;
pub mod pairing;
pub mod status;

pub use assignment::{find_duplicates, pairing_weight, schedule_weight, FoursomeAssigner, SlotPartition};
pub use edits::{apply_edit, check_edit, replay_edits, ManualEdit, ReplayOutcome, SkippedEdit};
pub use lock::{RegenerationGuard, WeekLocks};
pub use manager::{
    ChangesDetected, CreateOptions, PreferenceConflict, RegenerateOptions, RegenerationImpact,
    RegenerationResult, ScheduleManager, ValidationReport,
};
pub use pairing::{schedule_pairs, PairingMetrics, PairingTracker};
pub use status::{RegenerationStatus, RegenerationStep, RunState, StatusBoard, StatusEvent};
