use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use foursome::models::{Player, Week};
use foursome::storage::{PlayerRepository, WeekRepository};

use super::Manager;

/// Seed file layout
#[derive(Debug, Deserialize)]
struct Seed {
    #[serde(default)]
    players: Vec<Player>,
    #[serde(default)]
    weeks: Vec<Week>,
}

pub async fn import(manager: &Manager, input: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input path does not exist: {}", input.display());
    }

    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read seed file: {}", input.display()))?;
    let seed: Seed = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file: {}", input.display()))?;

    let store = manager.store();
    for player in &seed.players {
        store
            .save_player(player)
            .await
            .with_context(|| format!("Failed to save player {}", player.id))?;
    }
    for week in &seed.weeks {
        store
            .save_week(week)
            .await
            .with_context(|| format!("Failed to save week {}", week.id))?;
    }

    println!(
        "Imported {} players and {} weeks from {}",
        seed.players.len(),
        seed.weeks.len(),
        input.display()
    );
    Ok(())
}
