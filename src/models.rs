// Core data structures for the foursome scheduler

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type PlayerId = u64;
pub type WeekId = u64;
pub type SeasonId = u64;

/// Maximum number of players in a single foursome
pub const FOURSOME_CAPACITY: usize = 4;

/// Build the canonical pair key ("lowerId-higherId") for two players.
///
/// The key is order-independent so `pair_key(a, b) == pair_key(b, a)`.
pub fn pair_key(a: PlayerId, b: PlayerId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}-{hi}")
}

/// Order a pair of players canonically (lower id first)
pub fn canonical_pair(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ============================================================================
// Player
// ============================================================================

/// Which hand a player swings with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

/// Time-of-day preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimePreference {
    AM,
    PM,
    #[default]
    Either,
}

impl TimePreference {
    /// Check whether a slot satisfies this preference
    pub fn accepts(&self, slot: TimeSlot) -> bool {
        match self {
            Self::AM => slot == TimeSlot::Morning,
            Self::PM => slot == TimeSlot::Afternoon,
            Self::Either => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AM => "AM",
            Self::PM => "PM",
            Self::Either => "Either",
        }
    }
}

impl fmt::Display for TimePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "am" => Ok(Self::AM),
            "pm" => Ok(Self::PM),
            "either" => Ok(Self::Either),
            other => Err(Error::validation(format!(
                "Unknown time preference '{other}'. Valid options: AM, PM, Either"
            ))),
        }
    }
}

/// A league player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub handedness: Handedness,
    #[serde(default)]
    pub time_preference: TimePreference,
    pub season_id: SeasonId,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, season_id: SeasonId) -> Self {
        Self {
            id,
            name: name.into(),
            handedness: Handedness::default(),
            time_preference: TimePreference::default(),
            season_id,
        }
    }

    pub fn with_preference(mut self, preference: TimePreference) -> Self {
        self.time_preference = preference;
        self
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = handedness;
        self
    }
}

// ============================================================================
// Week
// ============================================================================

/// A week of play within a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub id: WeekId,
    pub season_id: SeasonId,
    pub week_number: u32,
    pub date: NaiveDate,

    /// Per-player availability; a missing entry means no data was recorded
    #[serde(default)]
    pub player_availability: BTreeMap<PlayerId, bool>,
}

impl Week {
    pub fn new(id: WeekId, season_id: SeasonId, week_number: u32, date: NaiveDate) -> Self {
        Self {
            id,
            season_id,
            week_number,
            date,
            player_availability: BTreeMap::new(),
        }
    }

    /// Availability for a player, `None` when nothing was recorded
    pub fn availability_of(&self, player_id: PlayerId) -> Option<bool> {
        self.player_availability.get(&player_id).copied()
    }

    pub fn set_availability(&mut self, player_id: PlayerId, available: bool) {
        self.player_availability.insert(player_id, available);
    }
}

// ============================================================================
// Foursome & Schedule
// ============================================================================

/// Time slot of a foursome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    Afternoon,
}

impl TimeSlot {
    pub fn all() -> [Self; 2] {
        [Self::Morning, Self::Afternoon]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A group of up to four players in one time slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Foursome {
    pub id: String,
    pub players: Vec<Player>,
    pub time_slot: TimeSlot,

    /// Display order within the slot
    pub position: usize,
}

impl Foursome {
    /// Create a foursome with a fresh id
    pub fn new(players: Vec<Player>, time_slot: TimeSlot, position: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            players,
            time_slot,
            position,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= FOURSOME_CAPACITY
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// All unordered pairs within this foursome, canonically ordered
    pub fn pairs(&self) -> Vec<(PlayerId, PlayerId)> {
        let mut pairs = Vec::new();
        for (i, a) in self.players.iter().enumerate() {
            for b in &self.players[i + 1..] {
                pairs.push(canonical_pair(a.id, b.id));
            }
        }
        pairs
    }

    /// Check the 1-4 distinct players invariant
    pub fn is_well_formed(&self) -> bool {
        if self.players.is_empty() || self.players.len() > FOURSOME_CAPACITY {
            return false;
        }
        let unique: HashSet<_> = self.players.iter().map(|p| p.id).collect();
        unique.len() == self.players.len()
    }
}

/// Foursomes grouped by time slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlots {
    pub morning: Vec<Foursome>,
    pub afternoon: Vec<Foursome>,
}

impl TimeSlots {
    pub fn slot(&self, slot: TimeSlot) -> &Vec<Foursome> {
        match slot {
            TimeSlot::Morning => &self.morning,
            TimeSlot::Afternoon => &self.afternoon,
        }
    }

    pub fn slot_mut(&mut self, slot: TimeSlot) -> &mut Vec<Foursome> {
        match slot {
            TimeSlot::Morning => &mut self.morning,
            TimeSlot::Afternoon => &mut self.afternoon,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Foursome> {
        self.morning.iter().chain(self.afternoon.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Foursome> {
        self.morning.iter_mut().chain(self.afternoon.iter_mut())
    }
}

/// A manual edit together with the context needed to replay it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEdit {
    pub edit: crate::scheduler::edits::ManualEdit,

    /// Players already in the destination foursome when a move was applied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companions: Vec<PlayerId>,

    pub applied_at: DateTime<Utc>,
}

/// The active schedule for a week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub week_id: WeekId,
    pub time_slots: TimeSlots,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,

    /// Manual edits applied since the schedule was generated
    #[serde(default)]
    pub manual_edits: Vec<AppliedEdit>,
}

impl Schedule {
    pub fn new(week_id: WeekId, time_slots: TimeSlots) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            week_id,
            time_slots,
            created_at: now,
            last_modified: now,
            manual_edits: Vec::new(),
        }
    }

    pub fn foursomes(&self) -> impl Iterator<Item = &Foursome> {
        self.time_slots.iter()
    }

    pub fn find_foursome(&self, foursome_id: &str) -> Option<&Foursome> {
        self.foursomes().find(|f| f.id == foursome_id)
    }

    /// Foursome currently holding a player
    pub fn foursome_of(&self, player_id: PlayerId) -> Option<&Foursome> {
        self.foursomes().find(|f| f.contains(player_id))
    }

    /// Every scheduled player id, morning first, in display order
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.foursomes().flat_map(|f| f.player_ids()).collect()
    }

    pub fn player_count(&self) -> usize {
        self.foursomes().map(|f| f.players.len()).sum()
    }

    /// Player groupings per slot, ignoring ephemeral foursome ids
    pub fn groupings(&self) -> (Vec<Vec<PlayerId>>, Vec<Vec<PlayerId>>) {
        (
            self.time_slots.morning.iter().map(|f| f.player_ids()).collect(),
            self.time_slots.afternoon.iter().map(|f| f.player_ids()).collect(),
        )
    }

    /// Check that every foursome is well formed and no player is scheduled twice
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        for foursome in self.foursomes() {
            if !foursome.is_well_formed() {
                return false;
            }
            for id in foursome.player_ids() {
                if !seen.insert(id) {
                    return false;
                }
            }
        }
        true
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// Renumber positions so they follow vector order in each slot
    pub fn renumber_positions(&mut self) {
        for slot in TimeSlot::all() {
            for (position, foursome) in self.time_slots.slot_mut(slot).iter_mut().enumerate() {
                foursome.position = position;
            }
        }
    }
}

// ============================================================================
// Pairing History
// ============================================================================

/// Season-scoped ledger of how often each pair has played together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingHistory {
    pub season_id: SeasonId,

    /// Canonical pair key -> count
    #[serde(default)]
    pub pairings: BTreeMap<String, u32>,

    pub last_updated: DateTime<Utc>,
}

impl PairingHistory {
    pub fn new(season_id: SeasonId) -> Self {
        Self {
            season_id,
            pairings: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Count for a pair, symmetric, 0 when never paired
    pub fn count(&self, a: PlayerId, b: PlayerId) -> u32 {
        self.pairings.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    /// Add one to a pair's count
    pub fn increment(&mut self, a: PlayerId, b: PlayerId) {
        *self.pairings.entry(pair_key(a, b)).or_insert(0) += 1;
    }

    /// Total number of recorded pairings
    pub fn total(&self) -> u64 {
        self.pairings.values().map(|c| u64::from(*c)).sum()
    }

    /// Add every increment of a delta
    pub fn apply(&mut self, delta: &PairingDelta) {
        for (key, n) in &delta.increments {
            *self.pairings.entry(key.clone()).or_insert(0) += n;
        }
        self.last_updated = Utc::now();
    }

    /// Subtract a previously applied delta; counts stop at zero
    pub fn retract(&mut self, delta: &PairingDelta) {
        for (key, n) in &delta.increments {
            if let Some(count) = self.pairings.get_mut(key) {
                *count = count.saturating_sub(*n);
                if *count == 0 {
                    self.pairings.remove(key);
                }
            }
        }
        self.last_updated = Utc::now();
    }
}

/// Pair count increments for one season, applied to its ledger in one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingDelta {
    pub season_id: SeasonId,

    /// Canonical pair key -> increment
    #[serde(default)]
    pub increments: BTreeMap<String, u32>,
}

impl PairingDelta {
    pub fn new(season_id: SeasonId) -> Self {
        Self {
            season_id,
            increments: BTreeMap::new(),
        }
    }

    /// Every pair of one foursome, once
    pub fn for_foursome(season_id: SeasonId, foursome: &Foursome) -> Self {
        let mut delta = Self::new(season_id);
        for (a, b) in foursome.pairs() {
            delta.add(a, b);
        }
        delta
    }

    /// Every pair sharing a foursome in a schedule, once
    pub fn for_schedule(season_id: SeasonId, schedule: &Schedule) -> Self {
        let mut delta = Self::new(season_id);
        for (a, b) in schedule.foursomes().flat_map(Foursome::pairs) {
            delta.add(a, b);
        }
        delta
    }

    pub fn add(&mut self, a: PlayerId, b: PlayerId) {
        if a != b {
            *self.increments.entry(pair_key(a, b)).or_insert(0) += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.increments.values().map(|c| u64::from(*c)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.increments.is_empty()
    }
}
