//! Per-survivor mutual exclusion.
//!
//! Every survivor id maps to its own async mutex. Operations touching one
//! survivor hold that survivor's guard; trades hold both participants'
//! guards, always acquired in ascending id order so two trades sharing a
//! participant can never deadlock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use refuge_types::SurvivorId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The guard(s) could not be acquired within the configured bound.
    #[error("timed out after {waited_ms} ms waiting for survivor lock")]
    Timeout {
        /// The bound that elapsed, in milliseconds.
        waited_ms: u64,
    },
}

/// Guard for a single survivor.
#[derive(Debug)]
pub struct SurvivorGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Guards for both participants of a trade. Released together on drop.
#[derive(Debug)]
pub struct PairGuard {
    _first: OwnedMutexGuard<()>,
    _second: OwnedMutexGuard<()>,
}

/// Registry of per-survivor mutexes.
#[derive(Debug, Default)]
pub struct SurvivorLocks {
    slots: Mutex<BTreeMap<SurvivorId, Arc<Mutex<()>>>>,
}

impl SurvivorLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: SurvivorId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(id).or_default())
    }

    /// Lock a single survivor, waiting at most `limit`.
    pub async fn lock_one(
        &self,
        id: SurvivorId,
        limit: Duration,
    ) -> Result<SurvivorGuard, LockError> {
        let acquire = async {
            let slot = self.slot(id).await;
            slot.lock_owned().await
        };
        match tokio::time::timeout(limit, acquire).await {
            Ok(guard) => Ok(SurvivorGuard { _guard: guard }),
            Err(_elapsed) => Err(timeout_error(limit)),
        }
    }

    /// Lock two distinct survivors in ascending id order, waiting at most
    /// `limit` for both.
    pub async fn lock_pair(
        &self,
        a: SurvivorId,
        b: SurvivorId,
        limit: Duration,
    ) -> Result<PairGuard, LockError> {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let acquire = async {
            let first = self.slot(low).await.lock_owned().await;
            let second = self.slot(high).await.lock_owned().await;
            (first, second)
        };
        match tokio::time::timeout(limit, acquire).await {
            Ok((first, second)) => Ok(PairGuard {
                _first: first,
                _second: second,
            }),
            Err(_elapsed) => Err(timeout_error(limit)),
        }
    }

    /// Number of survivors that have been locked at least once.
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }
}

fn timeout_error(limit: Duration) -> LockError {
    LockError::Timeout {
        waited_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn single_lock_blocks_second_holder() {
        let locks = SurvivorLocks::new();
        let id = SurvivorId::new();

        let held = locks.lock_one(id, LIMIT).await.unwrap();
        let second = locks.lock_one(id, Duration::from_millis(20)).await;
        assert_eq!(second.err(), Some(LockError::Timeout { waited_ms: 20 }));

        drop(held);
        assert!(locks.lock_one(id, LIMIT).await.is_ok());
    }

    #[tokio::test]
    async fn pair_lock_is_order_independent() {
        let locks = SurvivorLocks::new();
        let a = SurvivorId::new();
        let b = SurvivorId::new();

        let guard = locks.lock_pair(a, b, LIMIT).await.unwrap();
        // Reversed order contends on the same mutexes.
        assert!(locks.lock_pair(b, a, Duration::from_millis(20)).await.is_err());
        drop(guard);
        assert!(locks.lock_pair(b, a, LIMIT).await.is_ok());
        assert_eq!(locks.tracked().await, 2);
    }

    #[tokio::test]
    async fn disjoint_pairs_do_not_contend() {
        let locks = SurvivorLocks::new();
        let _first = locks
            .lock_pair(SurvivorId::new(), SurvivorId::new(), LIMIT)
            .await
            .unwrap();
        assert!(
            locks
                .lock_pair(SurvivorId::new(), SurvivorId::new(), LIMIT)
                .await
                .is_ok()
        );
    }
}
