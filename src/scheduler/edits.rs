//! Manual edit commands
//!
//! Operators adjust a generated schedule through two discrete commands,
//! [`ManualEdit::MovePlayer`] and [`ManualEdit::RemovePlayer`]. Both are
//! applied by a pure reducer ([`apply_edit`]) that returns a new
//! [`Schedule`] value and appends the edit to the schedule's edit log.
//!
//! Foursome ids change on every regeneration, so [`replay_edits`] re-targets
//! logged edits by player identity: a move lands in whichever foursome now
//! holds one of the players the destination held when the move was made.
//! When that foursome is full, the mover trades places with one of its
//! players who was not part of the original destination.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{AppliedEdit, PlayerId, Schedule, TimeSlot};

/// An operator-applied schedule mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManualEdit {
    /// Move a player from one foursome into another
    MovePlayer {
        player_id: PlayerId,
        from_foursome_id: String,
        to_foursome_id: String,
    },
    /// Take a player out of a foursome
    RemovePlayer {
        player_id: PlayerId,
        foursome_id: String,
    },
}

impl ManualEdit {
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::MovePlayer { player_id, .. } | Self::RemovePlayer { player_id, .. } => *player_id,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::MovePlayer {
                player_id,
                from_foursome_id,
                to_foursome_id,
            } => format!("move player {player_id} from {from_foursome_id} to {to_foursome_id}"),
            Self::RemovePlayer {
                player_id,
                foursome_id,
            } => format!("remove player {player_id} from {foursome_id}"),
        }
    }
}

/// Locate a foursome by id, returning its slot and index
fn locate(schedule: &Schedule, foursome_id: &str) -> Option<(TimeSlot, usize)> {
    TimeSlot::all().into_iter().find_map(|slot| {
        schedule
            .time_slots
            .slot(slot)
            .iter()
            .position(|f| f.id == foursome_id)
            .map(|idx| (slot, idx))
    })
}

/// Check an edit against a schedule without applying it
pub fn check_edit(schedule: &Schedule, edit: &ManualEdit) -> Result<()> {
    match edit {
        ManualEdit::MovePlayer {
            player_id,
            from_foursome_id,
            to_foursome_id,
        } => {
            if from_foursome_id == to_foursome_id {
                return Err(Error::validation(format!(
                    "Source and target foursome are both {from_foursome_id}"
                )));
            }
            let from = schedule.find_foursome(from_foursome_id).ok_or_else(|| {
                Error::validation(format!("Source foursome {from_foursome_id} not found"))
            })?;
            let to = schedule.find_foursome(to_foursome_id).ok_or_else(|| {
                Error::validation(format!("Target foursome {to_foursome_id} not found"))
            })?;
            if !from.contains(*player_id) {
                return Err(Error::validation(format!(
                    "Player {player_id} is not in foursome {from_foursome_id}"
                )));
            }
            if to.is_full() {
                return Err(Error::validation(format!(
                    "Target foursome {to_foursome_id} is already full"
                )));
            }
            Ok(())
        }
        ManualEdit::RemovePlayer {
            player_id,
            foursome_id,
        } => {
            let foursome = schedule
                .find_foursome(foursome_id)
                .ok_or_else(|| Error::validation(format!("Foursome {foursome_id} not found")))?;
            if !foursome.contains(*player_id) {
                return Err(Error::validation(format!(
                    "Player {player_id} is not in foursome {foursome_id}"
                )));
            }
            Ok(())
        }
    }
}

/// Apply an edit, returning the updated schedule.
///
/// Foursomes left empty are dropped and positions renumbered.
pub fn apply_edit(schedule: &Schedule, edit: &ManualEdit) -> Result<Schedule> {
    check_edit(schedule, edit)?;

    let mut next = schedule.clone();
    let mut companions = Vec::new();

    match edit {
        ManualEdit::MovePlayer {
            player_id,
            from_foursome_id,
            to_foursome_id,
        } => {
            let (from_slot, from_idx) = locate(&next, from_foursome_id)
                .ok_or_else(|| Error::validation(format!("Foursome {from_foursome_id} vanished")))?;
            let (to_slot, to_idx) = locate(&next, to_foursome_id)
                .ok_or_else(|| Error::validation(format!("Foursome {to_foursome_id} vanished")))?;

            let source = &mut next.time_slots.slot_mut(from_slot)[from_idx];
            let pos = source
                .players
                .iter()
                .position(|p| p.id == *player_id)
                .ok_or_else(|| Error::validation(format!("Player {player_id} vanished")))?;
            let player = source.players.remove(pos);

            let target = &mut next.time_slots.slot_mut(to_slot)[to_idx];
            companions = target.player_ids();
            target.players.push(player);
        }
        ManualEdit::RemovePlayer {
            player_id,
            foursome_id,
        } => {
            let (slot, idx) = locate(&next, foursome_id)
                .ok_or_else(|| Error::validation(format!("Foursome {foursome_id} vanished")))?;
            next.time_slots.slot_mut(slot)[idx]
                .players
                .retain(|p| p.id != *player_id);
        }
    }

    for slot in TimeSlot::all() {
        next.time_slots.slot_mut(slot).retain(|f| !f.players.is_empty());
    }
    next.renumber_positions();
    next.manual_edits.push(AppliedEdit {
        edit: edit.clone(),
        companions,
        applied_at: Utc::now(),
    });
    next.touch();

    Ok(next)
}

/// An edit that could not be carried onto a new schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEdit {
    pub edit: ManualEdit,
    pub reason: String,
}

/// Result of replaying an edit log onto a schedule
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub schedule: Schedule,
    pub replayed: usize,
    pub skipped: Vec<SkippedEdit>,
}

/// How a logged edit lands on a regenerated schedule
enum Resolution {
    /// The new grouping already satisfies it
    Satisfied,
    Apply(ManualEdit),
    /// The destination is full: trade places with `displaced`
    Swap { edit: ManualEdit, displaced: PlayerId },
}

/// Re-target a logged edit onto the foursomes of `schedule`
fn resolve(schedule: &Schedule, logged: &AppliedEdit) -> std::result::Result<Resolution, String> {
    let player_id = logged.edit.player_id();
    let source = schedule
        .foursome_of(player_id)
        .ok_or_else(|| format!("player {player_id} is no longer scheduled"))?;

    match &logged.edit {
        ManualEdit::MovePlayer { .. } => {
            let target = logged
                .companions
                .iter()
                .filter(|id| **id != player_id)
                .find_map(|id| schedule.foursome_of(*id))
                .ok_or_else(|| "none of the destination players are scheduled".to_string())?;

            if target.id == source.id {
                return Ok(Resolution::Satisfied);
            }
            let edit = ManualEdit::MovePlayer {
                player_id,
                from_foursome_id: source.id.clone(),
                to_foursome_id: target.id.clone(),
            };
            if !target.is_full() {
                return Ok(Resolution::Apply(edit));
            }

            let displaced = target
                .players
                .iter()
                .find(|p| !logged.companions.contains(&p.id) && p.time_preference.accepts(source.time_slot))
                .ok_or_else(|| format!("destination foursome {} is full of companions", target.id))?;
            Ok(Resolution::Swap {
                edit,
                displaced: displaced.id,
            })
        }
        ManualEdit::RemovePlayer { .. } => Ok(Resolution::Apply(ManualEdit::RemovePlayer {
            player_id,
            foursome_id: source.id.clone(),
        })),
    }
}

/// Apply a move into a full foursome by sending `displaced` back to the mover's source.
///
/// Both foursomes keep their sizes.
fn apply_swap(schedule: &Schedule, edit: &ManualEdit, displaced: PlayerId) -> Result<Schedule> {
    let ManualEdit::MovePlayer {
        player_id,
        from_foursome_id,
        to_foursome_id,
    } = edit
    else {
        return Err(Error::validation(format!("Only moves can swap: {}", edit.describe())));
    };

    let mut next = schedule.clone();
    let (from_slot, from_idx) = locate(&next, from_foursome_id)
        .ok_or_else(|| Error::validation(format!("Foursome {from_foursome_id} vanished")))?;
    let (to_slot, to_idx) = locate(&next, to_foursome_id)
        .ok_or_else(|| Error::validation(format!("Foursome {to_foursome_id} vanished")))?;

    let take = |players: &mut Vec<crate::models::Player>, id: PlayerId| {
        players
            .iter()
            .position(|p| p.id == id)
            .map(|pos| players.remove(pos))
            .ok_or_else(|| Error::validation(format!("Player {id} vanished")))
    };

    let mover = take(&mut next.time_slots.slot_mut(from_slot)[from_idx].players, *player_id)?;
    let target = &mut next.time_slots.slot_mut(to_slot)[to_idx];
    let bumped = take(&mut target.players, displaced)?;
    let companions = target.player_ids();
    target.players.push(mover);
    next.time_slots.slot_mut(from_slot)[from_idx].players.push(bumped);

    next.manual_edits.push(AppliedEdit {
        edit: edit.clone(),
        companions,
        applied_at: Utc::now(),
    });
    next.touch();

    Ok(next)
}

/// Fold an edit log over a freshly generated schedule.
///
/// A move into a full foursome swaps the mover with a player the move did
/// not target. Edits whose players are gone are skipped.
pub fn replay_edits(schedule: Schedule, edits: &[AppliedEdit]) -> ReplayOutcome {
    let mut skipped = Vec::new();
    let mut replayed = 0;

    let schedule = edits.iter().fold(schedule, |current, logged| {
        let applied = match resolve(&current, logged) {
            Ok(Resolution::Satisfied) => {
                // Keep it in the log
                let mut next = current.clone();
                next.manual_edits.push(logged.clone());
                Ok(next)
            }
            Ok(Resolution::Apply(edit)) => apply_edit(&current, &edit).map_err(|e| e.to_string()),
            Ok(Resolution::Swap { edit, displaced }) => {
                tracing::debug!(edit = %edit.describe(), displaced, "Destination full, swapping");
                apply_swap(&current, &edit, displaced).map_err(|e| e.to_string())
            }
            Err(reason) => Err(reason),
        };

        match applied {
            Ok(next) => {
                replayed += 1;
                next
            }
            Err(reason) => {
                tracing::debug!(edit = %logged.edit.describe(), %reason, "Skipping manual edit replay");
                skipped.push(SkippedEdit {
                    edit: logged.edit.clone(),
                    reason,
                });
                current
            }
        }
    });

    ReplayOutcome {
        schedule,
        replayed,
        skipped,
    }
}
