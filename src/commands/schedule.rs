use anyhow::{Context, Result};

use foursome::models::{PlayerId, Schedule, TimeSlot, WeekId};
use foursome::scheduler::{CreateOptions, ManualEdit, RegenerateOptions};

use super::{print_json, Manager};

fn print_schedule(schedule: &Schedule) {
    println!("Schedule for week {} ({})", schedule.week_id, schedule.id);
    println!("================================");
    for slot in TimeSlot::all() {
        println!("{}:", slot.as_str());
        let foursomes = schedule.time_slots.slot(slot);
        if foursomes.is_empty() {
            println!("  (none)");
        }
        for foursome in foursomes {
            let names: Vec<_> = foursome
                .players
                .iter()
                .map(|p| format!("{} [{}]", p.name, p.id))
                .collect();
            println!("  {}. {}  ({})", foursome.position + 1, names.join(", "), foursome.id);
        }
    }
    if !schedule.manual_edits.is_empty() {
        println!("Manual edits:");
        for applied in &schedule.manual_edits {
            println!("  {} at {}", applied.edit.describe(), applied.applied_at);
        }
    }
}

async fn current_schedule(manager: &Manager, week: WeekId) -> Result<Schedule> {
    manager
        .get_schedule(week)
        .await?
        .with_context(|| format!("No schedule exists for week {week}"))
}

pub async fn generate(
    manager: &Manager,
    week: WeekId,
    validate_preconditions: bool,
    allow_existing: bool,
    json: bool,
) -> Result<()> {
    let options = CreateOptions {
        validate_preconditions,
        allow_existing,
    };
    let schedule = manager
        .create_weekly_schedule(week, options)
        .await
        .with_context(|| format!("Failed to generate schedule for week {week}"))?;

    if json {
        print_json(&schedule)
    } else {
        print_schedule(&schedule);
        Ok(())
    }
}

pub async fn regenerate(
    manager: &Manager,
    week: WeekId,
    force_overwrite: bool,
    preserve_manual_edits: bool,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    if dry_run {
        let impact = manager.analyze_regeneration_impact(week).await?;
        if json {
            return print_json(&impact);
        }
        println!("Regeneration impact for week {week}");
        println!("================================");
        println!("  Pairings at risk:     {}", impact.pairings_at_risk.len());
        println!("  Preference conflicts: {}", impact.preference_conflicts.len());
        println!("  Unavailable players:  {:?}", impact.unavailable_scheduled);
        println!("  Manual edits:         {}", impact.manual_edits);
        return Ok(());
    }

    let options = RegenerateOptions {
        force_overwrite,
        preserve_manual_edits,
    };
    let result = manager
        .regenerate_schedule(week, options)
        .await
        .with_context(|| format!("Failed to regenerate schedule for week {week}"))?;

    if json {
        print_json(&result)?;
    } else if result.success {
        let changes = &result.changes_detected;
        println!("Regenerated week {week}");
        println!("  New schedule:    {}", result.new_schedule_id.as_deref().unwrap_or("-"));
        println!("  Players added:   {:?}", changes.players_added);
        println!("  Players removed: {:?}", changes.players_removed);
        println!("  Pairing changes: {}", changes.pairing_changes);
        for skipped in &result.skipped_edits {
            println!("  Skipped edit: {} ({})", skipped.edit.describe(), skipped.reason);
        }
    }

    match result.error {
        Some(report) if !result.success => anyhow::bail!("Regeneration rolled back: {report}"),
        _ => Ok(()),
    }
}

pub async fn show(manager: &Manager, week: WeekId, json: bool) -> Result<()> {
    let schedule = current_schedule(manager, week).await?;
    if json {
        print_json(&schedule)
    } else {
        print_schedule(&schedule);
        Ok(())
    }
}

pub async fn move_player(manager: &Manager, week: WeekId, player: PlayerId, to: String, json: bool) -> Result<()> {
    let schedule = current_schedule(manager, week).await?;
    let from = schedule
        .foursome_of(player)
        .with_context(|| format!("Player {player} is not scheduled in week {week}"))?;

    let edit = ManualEdit::MovePlayer {
        player_id: player,
        from_foursome_id: from.id.clone(),
        to_foursome_id: to,
    };
    apply(manager, week, edit, json).await
}

pub async fn remove_player(manager: &Manager, week: WeekId, player: PlayerId, json: bool) -> Result<()> {
    let schedule = current_schedule(manager, week).await?;
    let foursome = schedule
        .foursome_of(player)
        .with_context(|| format!("Player {player} is not scheduled in week {week}"))?;

    let edit = ManualEdit::RemovePlayer {
        player_id: player,
        foursome_id: foursome.id.clone(),
    };
    apply(manager, week, edit, json).await
}

async fn apply(manager: &Manager, week: WeekId, edit: ManualEdit, json: bool) -> Result<()> {
    let report = manager.validate_manual_edit(week, &edit).await?;
    if !report.valid {
        anyhow::bail!("Edit rejected: {}", report.errors.join("; "));
    }
    for discrepancy in &report.discrepancies {
        tracing::warn!(player_id = discrepancy.player_id, kind = ?discrepancy.kind, "Availability discrepancy after edit");
    }

    let schedule = manager
        .apply_manual_edit(week, edit)
        .await
        .context("Failed to apply manual edit")?;

    if json {
        print_json(&schedule)
    } else {
        print_schedule(&schedule);
        Ok(())
    }
}

pub async fn check(manager: &Manager, week: WeekId, json: bool) -> Result<()> {
    let data = manager.get_player_data_for_week(week).await?;
    if json {
        return print_json(&data);
    }

    println!("Availability check for week {week}");
    println!("================================");
    println!("  Available:   {}", data.available.len());
    println!("  Unavailable: {}", data.unavailable.len());
    println!("  No data:     {}", data.no_data.len());
    if data.discrepancies.is_empty() {
        println!("  Schedule matches availability.");
    }
    for discrepancy in &data.discrepancies {
        println!("  player {}: {:?}", discrepancy.player_id, discrepancy.kind);
    }
    Ok(())
}
