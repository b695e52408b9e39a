//! Per-week locking
//!
//! Two layers guard a week:
//!
//! - a per-week async mutex serialising every mutation (generate, regenerate,
//!   manual edit), so writers queue behind each other
//! - a regeneration flag that is acquired compare-and-swap style and fails
//!   fast with [`Error::LockConflict`] instead of queueing
//!
//! The flag is released by [`RegenerationGuard`] on drop, so every exit path
//! of a regeneration (success, error, panic unwinding) clears it. Flags and
//! cancellation blocks share one mutex, so a run cannot slip in after a
//! cancel has returned.
//!
//! Week mutexes nobody holds or waits on are pruned on the next lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::error::{Error, Result};
use crate::models::WeekId;

#[derive(Debug, Default)]
struct Flags {
    regenerating: HashSet<WeekId>,
    blocked: HashSet<WeekId>,
}

/// Lock table for all weeks
#[derive(Debug, Default)]
pub struct WeekLocks {
    mutexes: Mutex<HashMap<WeekId, Arc<tokio::sync::Mutex<()>>>>,
    flags: Mutex<Flags>,
}

// Week tables stay valid even if a holder panicked mid-update
fn recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WeekLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive mutation access to a week
    pub async fn lock_week(&self, week_id: WeekId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut mutexes = recover(&self.mutexes);
            // Only the table itself references an idle week's mutex
            mutexes.retain(|id, m| *id == week_id || Arc::strong_count(m) > 1);
            Arc::clone(mutexes.entry(week_id).or_default())
        };
        mutex.lock_owned().await
    }

    /// Number of week mutexes currently kept in the table
    pub fn tracked_weeks(&self) -> usize {
        recover(&self.mutexes).len()
    }

    /// Whether the regeneration flag is held for a week
    pub fn is_held(&self, week_id: WeekId) -> bool {
        recover(&self.flags).regenerating.contains(&week_id)
    }

    /// Set the regeneration flag, failing if it is already held or the week is blocked
    pub fn try_acquire(&self, week_id: WeekId) -> Result<()> {
        let mut flags = recover(&self.flags);
        if flags.blocked.contains(&week_id) {
            tracing::warn!(week_id, "Regeneration refused: week is blocked");
            return Err(Error::LockConflict { week_id });
        }
        if !flags.regenerating.insert(week_id) {
            tracing::warn!(week_id, "Regeneration refused: lock already held");
            return Err(Error::LockConflict { week_id });
        }
        tracing::info!(week_id, "Regeneration lock acquired");
        Ok(())
    }

    /// Clear the regeneration flag; releasing a free lock is a no-op
    pub fn release(&self, week_id: WeekId) {
        if recover(&self.flags).regenerating.remove(&week_id) {
            tracing::info!(week_id, "Regeneration lock released");
        }
    }

    /// Acquire the regeneration flag as a guard that releases on drop
    pub fn acquire_guard(self: &Arc<Self>, week_id: WeekId) -> Result<RegenerationGuard> {
        self.try_acquire(week_id)?;
        Ok(RegenerationGuard {
            locks: Arc::clone(self),
            week_id,
        })
    }

    /// Refuse new regenerations for a week; an in-flight run is unaffected
    pub fn block(&self, week_id: WeekId) -> bool {
        recover(&self.flags).blocked.insert(week_id)
    }

    pub fn unblock(&self, week_id: WeekId) -> bool {
        recover(&self.flags).blocked.remove(&week_id)
    }

    pub fn is_blocked(&self, week_id: WeekId) -> bool {
        recover(&self.flags).blocked.contains(&week_id)
    }
}

/// Holds a week's regeneration flag for its lifetime
#[derive(Debug)]
pub struct RegenerationGuard {
    locks: Arc<WeekLocks>,
    week_id: WeekId,
}

impl RegenerationGuard {
    pub fn week_id(&self) -> WeekId {
        self.week_id
    }
}

impl Drop for RegenerationGuard {
    fn drop(&mut self) {
        self.locks.release(self.week_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_acquire_fails_fast_when_held() {
        let locks = WeekLocks::new();
        locks.try_acquire(1).unwrap();

        let err = locks.try_acquire(1).unwrap_err();
        assert!(matches!(err, Error::LockConflict { week_id: 1 }));
        assert!(locks.try_acquire(2).is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let locks = WeekLocks::new();
        locks.try_acquire(1).unwrap();
        locks.release(1);
        locks.release(1);
        assert!(!locks.is_held(1));
        assert!(locks.try_acquire(1).is_ok());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = Arc::new(WeekLocks::new());
        {
            let guard = locks.acquire_guard(3).unwrap();
            assert_eq!(guard.week_id(), 3);
            assert!(locks.is_held(3));
        }
        assert!(!locks.is_held(3));
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let locks = Arc::new(WeekLocks::new());
        let inner = Arc::clone(&locks);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.acquire_guard(4).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!locks.is_held(4));
    }

    #[test]
    fn test_blocked_week_refuses_regeneration() {
        let locks = WeekLocks::new();
        assert!(locks.block(5));
        assert!(matches!(locks.try_acquire(5), Err(Error::LockConflict { .. })));
        assert!(locks.unblock(5));
        assert!(locks.try_acquire(5).is_ok());
    }

    #[test]
    fn test_no_acquire_succeeds_after_block_returns() {
        use std::sync::atomic::{AtomicBool, Ordering};

        for _ in 0..50 {
            let locks = Arc::new(WeekLocks::new());
            let cancelled = Arc::new(AtomicBool::new(false));

            let worker = {
                let locks = Arc::clone(&locks);
                let cancelled = Arc::clone(&cancelled);
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        let after_cancel = cancelled.load(Ordering::SeqCst);
                        if locks.try_acquire(9).is_ok() {
                            assert!(!after_cancel, "acquired after cancel returned");
                            locks.release(9);
                        }
                    }
                })
            };

            std::thread::yield_now();
            assert!(locks.block(9));
            cancelled.store(true, Ordering::SeqCst);
            worker.join().unwrap();

            assert!(locks.try_acquire(9).is_err());
        }
    }

    #[tokio::test]
    async fn test_idle_week_mutexes_are_pruned() {
        let locks = WeekLocks::new();
        for week in 1..=20 {
            let _guard = locks.lock_week(week).await;
        }
        assert_eq!(locks.tracked_weeks(), 1);

        let held = locks.lock_week(1).await;
        let _other = locks.lock_week(2).await;
        assert_eq!(locks.tracked_weeks(), 2);

        drop(held);
        let _third = locks.lock_week(3).await;
        // Week 1 is idle again, week 2 is still held
        assert_eq!(locks.tracked_weeks(), 2);
    }

    #[tokio::test]
    async fn test_week_mutex_serialises() {
        let locks = Arc::new(WeekLocks::new());
        let guard = locks.lock_week(1).await;

        let other = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = other.lock_week(1).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();

        // a different week is independent
        let _a = locks.lock_week(1).await;
        let _b = locks.lock_week(2).await;
    }
}
