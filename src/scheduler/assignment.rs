//! Foursome assignment
//!
//! Splits the available players between the morning and afternoon slots and
//! partitions each slot into groups of at most four, minimising the pairing
//! weight: the sum of historical pairing counts over every pair sharing a
//! group.
//!
//! # Algorithm
//!
//! 1. AM-only and PM-only players go to their slot; "Either" players top the
//!    morning up to `floor(n/2)` in input order and the rest play afternoon.
//! 2. Group capacities in a slot are 4, 4, ..., r where r = n mod 4.
//! 3. Players are ordered by total pairing load (heaviest first) and placed
//!    greedily into the open group where they add the least weight, ties
//!    going to the emptiest group, which spreads heavily paired players out.
//! 4. Pairwise swaps between groups are applied while one strictly lowers the
//!    weight, up to an iteration cap.
//!
//! Everything is deterministic: identical input order and history always
//! produce the same groupings. Large slots can be cut into chunks that are
//! computed concurrently on the blocking pool and merged afterwards.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::models::{
    Foursome, PairingHistory, Player, PlayerId, Schedule, TimePreference, TimeSlot, TimeSlots,
    WeekId, FOURSOME_CAPACITY,
};

/// Sum of pairing counts over every unordered pair in a group
pub fn pairing_weight(group: &[PlayerId], history: &PairingHistory) -> u64 {
    let mut weight = 0u64;
    for (i, a) in group.iter().enumerate() {
        for b in &group[i + 1..] {
            weight += u64::from(history.count(*a, *b));
        }
    }
    weight
}

/// Total pairing weight of a schedule
pub fn schedule_weight(schedule: &Schedule, history: &PairingHistory) -> u64 {
    schedule
        .foursomes()
        .map(|f| pairing_weight(&f.player_ids(), history))
        .sum()
}

/// Player ids that appear more than once, in first-repeat order
pub fn find_duplicates(players: &[Player]) -> Vec<PlayerId> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for player in players {
        if !seen.insert(player.id) && !duplicates.contains(&player.id) {
            duplicates.push(player.id);
        }
    }
    duplicates
}

/// Group capacities for `n` players: full foursomes plus one partial group
fn capacities(n: usize) -> Vec<usize> {
    let mut caps = vec![FOURSOME_CAPACITY; n / FOURSOME_CAPACITY];
    let rem = n % FOURSOME_CAPACITY;
    if rem > 0 {
        caps.push(rem);
    }
    caps
}

/// Partition of one slot's players
#[derive(Debug, Clone)]
pub struct SlotPartition {
    pub groups: Vec<Vec<Player>>,
    pub initial_weight: u64,
    pub final_weight: u64,
    pub swaps: usize,
}

/// Computes weekly foursomes from available players and pairing history
#[derive(Debug, Clone, Copy)]
pub struct FoursomeAssigner {
    /// Cap on accepted improving swaps per slot chunk
    max_swap_iterations: usize,

    /// Players per concurrently computed chunk
    chunk_size: usize,
}

impl Default for FoursomeAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl FoursomeAssigner {
    pub fn new() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            max_swap_iterations: defaults.max_swap_iterations,
            chunk_size: defaults.parallel_chunk_size,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new()
            .with_max_swap_iterations(config.max_swap_iterations)
            .with_chunk_size(config.parallel_chunk_size)
    }

    pub fn with_max_swap_iterations(mut self, iterations: usize) -> Self {
        self.max_swap_iterations = iterations;
        self
    }

    /// Set chunk size, rounded up to a whole number of foursomes
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        let size = size.max(FOURSOME_CAPACITY);
        self.chunk_size = size.div_ceil(FOURSOME_CAPACITY) * FOURSOME_CAPACITY;
        self
    }

    /// Split players between the morning and afternoon slots
    pub fn split_time_slots(&self, players: &[Player]) -> (Vec<Player>, Vec<Player>) {
        let am_only = players
            .iter()
            .filter(|p| p.time_preference == TimePreference::AM)
            .count();
        let morning_target = players.len() / 2;
        let mut either_to_morning = morning_target.saturating_sub(am_only);

        let mut morning = Vec::new();
        let mut afternoon = Vec::new();
        for player in players {
            match player.time_preference {
                TimePreference::AM => morning.push(player.clone()),
                TimePreference::PM => afternoon.push(player.clone()),
                TimePreference::Either if either_to_morning > 0 => {
                    either_to_morning -= 1;
                    morning.push(player.clone());
                }
                TimePreference::Either => afternoon.push(player.clone()),
            }
        }
        (morning, afternoon)
    }

    /// Partition one slot's players into groups of at most four
    pub fn partition_slot(&self, players: &[Player], history: &PairingHistory) -> SlotPartition {
        let n = players.len();
        if n == 0 {
            return SlotPartition {
                groups: Vec::new(),
                initial_weight: 0,
                final_weight: 0,
                swaps: 0,
            };
        }

        let weights: Vec<Vec<u64>> = players
            .iter()
            .map(|a| {
                players
                    .iter()
                    .map(|b| {
                        if a.id == b.id {
                            0
                        } else {
                            u64::from(history.count(a.id, b.id))
                        }
                    })
                    .collect()
            })
            .collect();

        let caps = capacities(n);
        let mut groups = initial_groups(&weights, &caps);
        let initial_weight = total_weight(&groups, &weights);
        let swaps = improve_by_swaps(&mut groups, &weights, self.max_swap_iterations);
        let final_weight = total_weight(&groups, &weights);

        tracing::debug!(
            players = n,
            groups = groups.len(),
            initial_weight,
            final_weight,
            swaps,
            "Slot partitioned"
        );

        let groups = groups
            .into_iter()
            .map(|mut members| {
                members.sort_unstable();
                members.into_iter().map(|i| players[i].clone()).collect()
            })
            .collect();

        SlotPartition {
            groups,
            initial_weight,
            final_weight,
            swaps,
        }
    }

    /// Build a schedule for a week
    pub fn generate(
        &self,
        week_id: WeekId,
        players: &[Player],
        history: &PairingHistory,
    ) -> Result<Schedule> {
        check_input(players)?;
        let (morning, afternoon) = self.split_time_slots(players);

        let slots = TimeSlots {
            morning: build_foursomes(self.partition_slot(&morning, history).groups, TimeSlot::Morning),
            afternoon: build_foursomes(
                self.partition_slot(&afternoon, history).groups,
                TimeSlot::Afternoon,
            ),
        };

        let schedule = Schedule::new(week_id, slots);
        verify_output(&schedule, players.len())?;

        tracing::info!(
            week_id,
            players = players.len(),
            morning = morning.len(),
            afternoon = afternoon.len(),
            weight = schedule_weight(&schedule, history),
            "Foursomes assigned"
        );
        Ok(schedule)
    }

    /// Build a schedule with each slot cut into chunks computed concurrently.
    ///
    /// Chunks are merged in order and re-validated, since players were split
    /// before any chunk was assigned.
    pub async fn generate_concurrent(
        &self,
        week_id: WeekId,
        players: Vec<Player>,
        history: Arc<PairingHistory>,
    ) -> Result<Schedule> {
        check_input(&players)?;
        let (morning, afternoon) = self.split_time_slots(&players);

        let mut tasks = Vec::new();
        for (slot, slot_players) in [(TimeSlot::Morning, morning), (TimeSlot::Afternoon, afternoon)] {
            for chunk in slot_players.chunks(self.chunk_size) {
                let assigner = *self;
                let chunk = chunk.to_vec();
                let history = Arc::clone(&history);
                tasks.push(async move {
                    tokio::task::spawn_blocking(move || {
                        (slot, assigner.partition_slot(&chunk, &history).groups)
                    })
                    .await
                    .map_err(|e| Error::assignment(format!("Chunk task failed: {e}")))
                });
            }
        }

        let chunk_count = tasks.len();
        let results = futures::future::try_join_all(tasks).await?;

        let mut slots = TimeSlots::default();
        for (slot, groups) in results {
            let foursomes = slots.slot_mut(slot);
            let offset = foursomes.len();
            for (i, players) in groups.into_iter().enumerate() {
                foursomes.push(Foursome::new(players, slot, offset + i));
            }
        }

        let schedule = Schedule::new(week_id, slots);
        verify_output(&schedule, players.len())?;

        tracing::info!(
            week_id,
            players = players.len(),
            chunks = chunk_count,
            weight = schedule_weight(&schedule, &history),
            "Foursomes assigned concurrently"
        );
        Ok(schedule)
    }
}

fn check_input(players: &[Player]) -> Result<()> {
    let duplicates = find_duplicates(players);
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Error::DuplicatePlayers { duplicates })
    }
}

/// Re-validate a merged schedule: consistent and nobody lost
fn verify_output(schedule: &Schedule, expected: usize) -> Result<()> {
    if !schedule.is_consistent() {
        return Err(Error::assignment("Merged schedule places a player twice"));
    }
    if schedule.player_count() != expected {
        return Err(Error::assignment(format!(
            "Merged schedule holds {} players, expected {expected}",
            schedule.player_count()
        )));
    }
    Ok(())
}

fn build_foursomes(groups: Vec<Vec<Player>>, slot: TimeSlot) -> Vec<Foursome> {
    groups
        .into_iter()
        .enumerate()
        .map(|(position, players)| Foursome::new(players, slot, position))
        .collect()
}

fn added_weight(player: usize, group: &[usize], weights: &[Vec<u64>]) -> u64 {
    group.iter().map(|q| weights[player][*q]).sum()
}

fn total_weight(groups: &[Vec<usize>], weights: &[Vec<u64>]) -> u64 {
    groups
        .iter()
        .map(|g| {
            let mut w = 0;
            for (i, a) in g.iter().enumerate() {
                for b in &g[i + 1..] {
                    w += weights[*a][*b];
                }
            }
            w
        })
        .sum()
}

/// Greedy placement, heaviest-loaded players first
fn initial_groups(weights: &[Vec<u64>], caps: &[usize]) -> Vec<Vec<usize>> {
    let n = weights.len();
    let loads: Vec<u64> = weights.iter().map(|row| row.iter().sum()).collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| loads[*b].cmp(&loads[*a]).then(a.cmp(b)));

    let mut groups: Vec<Vec<usize>> = caps.iter().map(|c| Vec::with_capacity(*c)).collect();
    for player in order {
        let target = groups
            .iter()
            .enumerate()
            .filter(|(g, members)| members.len() < caps[*g])
            .min_by_key(|(g, members)| (added_weight(player, members, weights), members.len(), *g))
            .map(|(g, _)| g);

        // Capacities always sum to n, so an open group exists
        if let Some(g) = target {
            groups[g].push(player);
        }
    }
    groups
}

/// Apply strictly improving swaps until none exists or the cap is hit
fn improve_by_swaps(groups: &mut [Vec<usize>], weights: &[Vec<u64>], max_iterations: usize) -> usize {
    let cost_without = |player: usize, group: &[usize], skip: usize| -> i64 {
        group
            .iter()
            .filter(|q| **q != player && **q != skip)
            .map(|q| weights[player][*q] as i64)
            .sum()
    };

    let mut swaps = 0;
    while swaps < max_iterations {
        let mut best: Option<(usize, usize, usize, usize)> = None;

        'scan: for gi in 0..groups.len() {
            for gj in gi + 1..groups.len() {
                for ai in 0..groups[gi].len() {
                    for bj in 0..groups[gj].len() {
                        let a = groups[gi][ai];
                        let b = groups[gj][bj];
                        let before = cost_without(a, &groups[gi], a) + cost_without(b, &groups[gj], b);
                        let after = cost_without(b, &groups[gi], a) + cost_without(a, &groups[gj], b);
                        if after < before {
                            best = Some((gi, ai, gj, bj));
                            break 'scan;
                        }
                    }
                }
            }
        }

        match best {
            Some((gi, ai, gj, bj)) => {
                let a = groups[gi][ai];
                groups[gi][ai] = groups[gj][bj];
                groups[gj][bj] = a;
                swaps += 1;
            }
            None => break,
        }
    }
    swaps
}
