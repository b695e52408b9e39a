use anyhow::{Context, Result};
use serde::Serialize;

use foursome::models::SeasonId;
use foursome::scheduler::PairingMetrics;

use super::{print_json, Manager};

#[derive(Serialize)]
struct MetricsOutput<'a> {
    season_id: SeasonId,
    #[serde(flatten)]
    metrics: &'a PairingMetrics,
}

pub async fn metrics(manager: &Manager, season: SeasonId, top: usize, json: bool) -> Result<()> {
    let metrics = manager
        .season_metrics(season)
        .await
        .with_context(|| format!("Failed to compute pairing metrics for season {season}"))?;

    if json {
        return print_json(&MetricsOutput {
            season_id: season,
            metrics: &metrics,
        });
    }

    println!("Pairing metrics for season {season}");
    println!("================================");
    println!("  Pairs tracked: {}", metrics.pairing_counts.len());
    println!("  Min pairings:  {}", metrics.min_pairings);
    println!("  Max pairings:  {}", metrics.max_pairings);
    println!("  Average:       {:.2}", metrics.average_pairings);

    let mut frequent: Vec<_> = metrics.pairing_counts.iter().filter(|(_, c)| **c > 0).collect();
    frequent.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    if !frequent.is_empty() {
        println!("\nMost frequent pairs:");
        for (key, count) in frequent.into_iter().take(top) {
            println!("  {key}: {count}");
        }
    }
    Ok(())
}
