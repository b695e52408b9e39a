//! Verified availability writes and schedule/availability cross-checks
//!
//! Every availability write is confirmed by reading the value back. Batch
//! writes never fail as a whole: each entry is verified on its own and the
//! report lists exactly which players could not be confirmed.

use serde::{Deserialize, Serialize};

use super::repository::AvailabilityProvider;
use crate::error::{Error, Result};
use crate::models::{Player, PlayerId, Schedule, Week, WeekId};

/// A single availability entry that could not be confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityFailure {
    pub player_id: PlayerId,
    pub reason: String,
}

/// Outcome of a batch availability write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAvailabilityReport {
    pub week_id: WeekId,
    pub verified: Vec<PlayerId>,
    pub failed: Vec<AvailabilityFailure>,
}

impl BatchAvailabilityReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<PlayerId> {
        self.failed.iter().map(|f| f.player_id).collect()
    }

    /// Turn a partial failure into a validation error naming the failing players
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(Error::validation(format!(
                "Availability not confirmed for players {:?} in week {}",
                self.failed_ids(),
                self.week_id
            )))
        }
    }
}

/// Write one availability value and confirm it by reading it back
pub async fn set_availability_verified<P>(
    provider: &P,
    player_id: PlayerId,
    week_id: WeekId,
    available: bool,
) -> Result<()>
where
    P: AvailabilityProvider + ?Sized,
{
    provider.set_availability(player_id, week_id, available).await?;

    match provider.get_availability(player_id, week_id).await? {
        Some(stored) if stored == available => Ok(()),
        Some(stored) => Err(Error::validation(format!(
            "Availability for player {player_id} in week {week_id} reads back as {stored}, expected {available}"
        ))),
        None => Err(Error::validation(format!(
            "Availability for player {player_id} in week {week_id} was not stored"
        ))),
    }
}

/// Write a batch of availability values, verifying each individually
pub async fn set_availability_batch<P>(
    provider: &P,
    week_id: WeekId,
    entries: &[(PlayerId, bool)],
) -> BatchAvailabilityReport
where
    P: AvailabilityProvider + ?Sized,
{
    let mut report = BatchAvailabilityReport {
        week_id,
        ..Default::default()
    };

    for (player_id, available) in entries {
        match set_availability_verified(provider, *player_id, week_id, *available).await {
            Ok(()) => report.verified.push(*player_id),
            Err(e) => {
                tracing::warn!(player_id, week_id, error = %e, "Availability write not confirmed");
                report.failed.push(AvailabilityFailure {
                    player_id: *player_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        week_id,
        verified = report.verified.len(),
        failed = report.failed.len(),
        "Batch availability write finished"
    );
    report
}

/// Kind of mismatch between a schedule and recorded availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Scheduled although marked unavailable
    ScheduledButUnavailable,
    /// Scheduled with no availability recorded
    ScheduledWithoutData,
    /// Scheduled although not a player of the week's season
    UnknownPlayer,
    /// Available but left out of the schedule
    AvailableButUnscheduled,
}

/// A single schedule/availability mismatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub player_id: PlayerId,
    pub kind: DiscrepancyKind,
}

/// Players of a week split by recorded availability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekPlayerData {
    pub week_id: WeekId,
    pub available: Vec<Player>,
    pub unavailable: Vec<Player>,
    pub no_data: Vec<Player>,
    pub discrepancies: Vec<Discrepancy>,
}

impl WeekPlayerData {
    pub fn available_ids(&self) -> Vec<PlayerId> {
        self.available.iter().map(|p| p.id).collect()
    }

    /// Discrepancies that mean a scheduled player should not be playing
    pub fn blocking_discrepancies(&self) -> Vec<&Discrepancy> {
        self.discrepancies
            .iter()
            .filter(|d| d.kind != DiscrepancyKind::AvailableButUnscheduled)
            .collect()
    }
}

/// Split season players by the week's availability and compare with a schedule
pub fn cross_check(week: &Week, players: &[Player], schedule: Option<&Schedule>) -> WeekPlayerData {
    let mut data = WeekPlayerData {
        week_id: week.id,
        ..Default::default()
    };

    for player in players {
        match week.availability_of(player.id) {
            Some(true) => data.available.push(player.clone()),
            Some(false) => data.unavailable.push(player.clone()),
            None => data.no_data.push(player.clone()),
        }
    }

    let Some(schedule) = schedule else {
        return data;
    };

    let scheduled = schedule.player_ids();
    for player_id in &scheduled {
        let kind = if !players.iter().any(|p| p.id == *player_id) {
            Some(DiscrepancyKind::UnknownPlayer)
        } else {
            match week.availability_of(*player_id) {
                Some(true) => None,
                Some(false) => Some(DiscrepancyKind::ScheduledButUnavailable),
                None => Some(DiscrepancyKind::ScheduledWithoutData),
            }
        };
        if let Some(kind) = kind {
            data.discrepancies.push(Discrepancy {
                player_id: *player_id,
                kind,
            });
        }
    }

    for player in &data.available {
        if !scheduled.contains(&player.id) {
            data.discrepancies.push(Discrepancy {
                player_id: player.id,
                kind: DiscrepancyKind::AvailableButUnscheduled,
            });
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Foursome, TimeSlot, TimeSlots};
    use crate::storage::MemoryStore;
    use crate::storage::WeekRepository;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn week() -> Week {
        Week::new(1, 1, 1, NaiveDate::from_ymd_opt(2024, 5, 7).unwrap())
    }

    /// Provider that silently drops writes for one player
    struct LossyProvider {
        inner: MemoryStore,
        drop_player: PlayerId,
    }

    #[async_trait]
    impl AvailabilityProvider for LossyProvider {
        async fn get_availability(&self, player_id: PlayerId, week_id: WeekId) -> Result<Option<bool>> {
            self.inner.get_availability(player_id, week_id).await
        }

        async fn set_availability(&self, player_id: PlayerId, week_id: WeekId, available: bool) -> Result<()> {
            if player_id == self.drop_player {
                return Ok(());
            }
            self.inner.set_availability(player_id, week_id, available).await
        }
    }

    #[tokio::test]
    async fn test_batch_reports_failing_players() {
        let inner = MemoryStore::new();
        inner.save_week(&week()).await.unwrap();
        let provider = LossyProvider {
            inner,
            drop_player: 2,
        };

        let report = set_availability_batch(&provider, 1, &[(1, true), (2, true), (3, false)]).await;

        assert_eq!(report.verified, vec![1, 3]);
        assert_eq!(report.failed_ids(), vec![2]);
        assert!(!report.is_complete());
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_batch_unknown_week_fails_each_entry() {
        let store = MemoryStore::new();
        let report = set_availability_batch(&store, 42, &[(1, true), (2, true)]).await;
        assert_eq!(report.failed_ids(), vec![1, 2]);
    }

    #[test]
    fn test_cross_check() {
        let mut week = week();
        week.set_availability(1, true);
        week.set_availability(2, false);
        week.set_availability(4, true);
        let players: Vec<_> = (1..=4).map(|id| Player::new(id, format!("P{id}"), 1)).collect();

        let schedule = Schedule::new(
            1,
            TimeSlots {
                morning: vec![Foursome::new(
                    vec![players[0].clone(), players[1].clone(), players[2].clone()],
                    TimeSlot::Morning,
                    0,
                )],
                afternoon: vec![],
            },
        );

        let data = cross_check(&week, &players, Some(&schedule));
        assert_eq!(data.available_ids(), vec![1, 4]);
        assert_eq!(data.unavailable.len(), 1);
        assert_eq!(data.no_data.len(), 1);
        assert!(data.discrepancies.contains(&Discrepancy {
            player_id: 2,
            kind: DiscrepancyKind::ScheduledButUnavailable
        }));
        assert!(data.discrepancies.contains(&Discrepancy {
            player_id: 3,
            kind: DiscrepancyKind::ScheduledWithoutData
        }));
        assert!(data.discrepancies.contains(&Discrepancy {
            player_id: 4,
            kind: DiscrepancyKind::AvailableButUnscheduled
        }));
        assert_eq!(data.blocking_discrepancies().len(), 2);
    }
}
