//! Pairing history tracking
//!
//! The tracker owns the season-scoped ledger of how often two players have
//! shared a foursome. Counts grow through [`PairingTracker::track_foursome_pairings`]
//! or a schedule commit, each applied by the store as one increment. A backup
//! restore retracts the restored week's later commits and nothing else.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{canonical_pair, pair_key, Foursome, PairingDelta, PairingHistory, Player, PlayerId, Schedule, SeasonId};
use crate::storage::PairingRepository;

/// Aggregate pairing statistics over a set of players
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingMetrics {
    /// Count for every unordered pair, never-paired pairs included
    pub pairing_counts: BTreeMap<String, u32>,
    pub min_pairings: u32,
    pub max_pairings: u32,
    pub average_pairings: f64,
}

impl PairingMetrics {
    /// Pairs sitting at the maximum count
    pub fn most_frequent(&self) -> Vec<&str> {
        if self.max_pairings == 0 {
            return Vec::new();
        }
        self.pairing_counts
            .iter()
            .filter(|(_, count)| **count == self.max_pairings)
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Every canonical pair sharing a foursome in a schedule
pub fn schedule_pairs(schedule: &Schedule) -> BTreeSet<(PlayerId, PlayerId)> {
    schedule.foursomes().flat_map(Foursome::pairs).collect()
}

/// Records and answers pairing counts for seasons
pub struct PairingTracker<P: PairingRepository + ?Sized> {
    repo: Arc<P>,
}

impl<P: PairingRepository + ?Sized> Clone for PairingTracker<P> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<P: PairingRepository + ?Sized> PairingTracker<P> {
    pub fn new(repo: Arc<P>) -> Self {
        Self { repo }
    }

    /// Current ledger for a season, empty when nothing was recorded yet
    pub async fn get_pairing_history(&self, season_id: SeasonId) -> Result<PairingHistory> {
        Ok(self
            .repo
            .find_pairing_history(season_id)
            .await?
            .unwrap_or_else(|| PairingHistory::new(season_id)))
    }

    /// Increment every pair of a foursome by one and persist.
    ///
    /// Not idempotent: call at most once per committed foursome.
    pub async fn track_foursome_pairings(&self, season_id: SeasonId, foursome: &Foursome) -> Result<()> {
        let delta = PairingDelta::for_foursome(season_id, foursome);
        let history = self.repo.record_pairings(&delta).await?;

        tracing::debug!(
            season_id,
            foursome_id = %foursome.id,
            pairs = delta.increments.len(),
            total = history.total(),
            "Foursome pairings tracked"
        );
        Ok(())
    }

    /// Times two players have shared a foursome this season
    pub async fn get_pairing_count(&self, season_id: SeasonId, a: PlayerId, b: PlayerId) -> Result<u32> {
        if a == b {
            return Ok(0);
        }
        Ok(self
            .repo
            .find_pairing_history(season_id)
            .await?
            .map_or(0, |history| history.count(a, b)))
    }

    /// Pairing statistics over every unordered pair of `players`
    pub async fn calculate_pairing_metrics(&self, season_id: SeasonId, players: &[Player]) -> Result<PairingMetrics> {
        let history = self.get_pairing_history(season_id).await?;
        Ok(metrics_for(&history, players))
    }
}

fn metrics_for(history: &PairingHistory, players: &[Player]) -> PairingMetrics {
    let ids: BTreeSet<PlayerId> = players.iter().map(|p| p.id).collect();
    let ids: Vec<PlayerId> = ids.into_iter().collect();

    let mut pairing_counts = BTreeMap::new();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            let (lo, hi) = canonical_pair(*a, *b);
            pairing_counts.insert(pair_key(lo, hi), history.count(lo, hi));
        }
    }

    if pairing_counts.is_empty() {
        return PairingMetrics::default();
    }

    let min_pairings = pairing_counts.values().copied().min().unwrap_or(0);
    let max_pairings = pairing_counts.values().copied().max().unwrap_or(0);
    let total: u64 = pairing_counts.values().map(|c| u64::from(*c)).sum();
    let average_pairings = total as f64 / pairing_counts.len() as f64;

    PairingMetrics {
        pairing_counts,
        min_pairings,
        max_pairings,
        average_pairings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSlot;
    use crate::storage::MemoryStore;

    fn foursome(ids: &[PlayerId]) -> Foursome {
        let players = ids.iter().map(|id| Player::new(*id, format!("P{id}"), 1)).collect();
        Foursome::new(players, TimeSlot::Morning, 0)
    }

    #[tokio::test]
    async fn test_track_increments_each_pair_once() {
        let tracker = PairingTracker::new(Arc::new(MemoryStore::new()));

        tracker.track_foursome_pairings(1, &foursome(&[1, 2, 3, 4])).await.unwrap();
        tracker.track_foursome_pairings(1, &foursome(&[1, 2])).await.unwrap();

        assert_eq!(tracker.get_pairing_count(1, 1, 2).await.unwrap(), 2);
        assert_eq!(tracker.get_pairing_count(1, 2, 1).await.unwrap(), 2);
        assert_eq!(tracker.get_pairing_count(1, 3, 4).await.unwrap(), 1);
        assert_eq!(tracker.get_pairing_count(1, 1, 99).await.unwrap(), 0);
        assert_eq!(tracker.get_pairing_history(1).await.unwrap().total(), 7);
    }

    #[tokio::test]
    async fn test_seasons_are_separate() {
        let tracker = PairingTracker::new(Arc::new(MemoryStore::new()));
        tracker.track_foursome_pairings(1, &foursome(&[1, 2])).await.unwrap();

        assert_eq!(tracker.get_pairing_count(2, 1, 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metrics_include_unpaired() {
        let tracker = PairingTracker::new(Arc::new(MemoryStore::new()));
        tracker.track_foursome_pairings(1, &foursome(&[1, 2])).await.unwrap();
        tracker.track_foursome_pairings(1, &foursome(&[1, 2])).await.unwrap();

        let players: Vec<_> = (1..=3).map(|id| Player::new(id, format!("P{id}"), 1)).collect();
        let metrics = tracker.calculate_pairing_metrics(1, &players).await.unwrap();

        assert_eq!(metrics.pairing_counts.len(), 3);
        assert_eq!(metrics.pairing_counts["1-2"], 2);
        assert_eq!(metrics.pairing_counts["2-3"], 0);
        assert_eq!(metrics.min_pairings, 0);
        assert_eq!(metrics.max_pairings, 2);
        assert!((metrics.average_pairings - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(metrics.most_frequent(), vec!["1-2"]);
    }

    #[tokio::test]
    async fn test_metrics_for_single_player() {
        let tracker = PairingTracker::new(Arc::new(MemoryStore::new()));
        let metrics = tracker
            .calculate_pairing_metrics(1, &[Player::new(1, "Solo", 1)])
            .await
            .unwrap();
        assert_eq!(metrics, PairingMetrics::default());
    }

    #[tokio::test]
    async fn test_concurrent_tracking_keeps_every_pair() {
        let tracker = PairingTracker::new(Arc::new(MemoryStore::new()));
        let groups: Vec<Foursome> = (0..8u64).map(|i| foursome(&[i * 4 + 1, i * 4 + 2, i * 4 + 3, i * 4 + 4])).collect();

        futures::future::try_join_all(groups.iter().map(|f| tracker.track_foursome_pairings(1, f)))
            .await
            .unwrap();

        assert_eq!(tracker.get_pairing_history(1).await.unwrap().total(), 48);
    }

    #[test]
    fn test_schedule_pairs() {
        let schedule = Schedule::new(
            1,
            crate::models::TimeSlots {
                morning: vec![foursome(&[1, 2, 3])],
                afternoon: vec![],
            },
        );
        assert_eq!(
            schedule_pairs(&schedule).into_iter().collect::<Vec<_>>(),
            vec![(1, 2), (1, 3), (2, 3)]
        );
    }
}
