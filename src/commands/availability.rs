use anyhow::{Context, Result};

use foursome::models::{PlayerId, WeekId};
use foursome::storage::set_availability_batch;

use super::{print_json, Manager};

fn parse_entry(entry: &str) -> Result<(PlayerId, bool)> {
    let (player, value) = entry
        .split_once('=')
        .with_context(|| format!("Invalid entry '{entry}'. Expected PLAYER=yes|no"))?;
    let player = player
        .trim()
        .parse::<PlayerId>()
        .with_context(|| format!("Invalid player id in '{entry}'"))?;
    let available = match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => true,
        "no" | "n" | "false" | "0" => false,
        other => anyhow::bail!("Invalid availability '{other}' in '{entry}'"),
    };
    Ok((player, available))
}

pub async fn availability(manager: &Manager, week: WeekId, entries: &[String], json: bool) -> Result<()> {
    let entries = entries
        .iter()
        .map(|e| parse_entry(e))
        .collect::<Result<Vec<_>>>()?;

    let report = set_availability_batch(manager.store().as_ref(), week, &entries).await;

    if json {
        print_json(&report)?;
    } else {
        println!("Availability for week {week}");
        println!("================================");
        println!("  Verified: {}", report.verified.len());
        for failure in &report.failed {
            println!("  FAILED player {}: {}", failure.player_id, failure.reason);
        }
    }

    if !report.is_complete() {
        anyhow::bail!("Availability not confirmed for players {:?}", report.failed_ids());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        assert_eq!(parse_entry("3=yes").unwrap(), (3, true));
        assert_eq!(parse_entry(" 12 = No ").unwrap(), (12, false));
        assert!(parse_entry("3").is_err());
        assert!(parse_entry("x=yes").is_err());
        assert!(parse_entry("3=maybe").is_err());
    }
}
