mod availability;
mod import;
mod metrics;
mod schedule;

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use foursome::config::Config;
use foursome::scheduler::ScheduleManager;
use foursome::storage::SqliteStore;

// Re-export command functions for convenience
pub use availability::availability;
pub use import::import;
pub use metrics::metrics;
pub use schedule::{check, generate, move_player, regenerate, remove_player, show};

pub type Manager = ScheduleManager<SqliteStore>;

/// Open the configured SQLite store and wrap it in a manager
pub fn open_manager(config: &Config) -> Result<Manager> {
    let store = SqliteStore::new(&config.storage.sqlite_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.storage.sqlite_path.display()
        )
    })?;
    Ok(ScheduleManager::new(Arc::new(store), config.scheduler.clone()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
