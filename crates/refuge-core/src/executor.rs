//! Trade execution: lock, load, gate, validate, mutate, persist.
//!
//! The executor is the only code path that changes two survivor records at
//! once. It works on owned copies of both records and writes them back only
//! after every check has passed, so a rejected trade never touches the
//! store. Both participants stay locked for the whole sequence.
//!
//! # Phases
//!
//! `Pending -> Validating -> Mutating -> Persisting -> Committed`, or
//! `Rejected` from any phase before `Committed`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use refuge_survivors::{TradeError, apply_trade, ensure_can_trade, prepare_trade, validate_trade};
use refuge_types::{Survivor, SurvivorId, TradeId, TradeRequest};

use crate::error::ServiceError;
use crate::locks::SurvivorLocks;
use crate::registry::{RegistryError, SurvivorRegistry, bounded};

/// Message attached to every committed trade.
pub const TRADE_SUCCESS_MESSAGE: &str = "Trade successful.";

/// Lifecycle of a single trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradePhase {
    /// Request received, locks not yet held.
    Pending,
    /// Records loaded; gate and value checks running.
    Validating,
    /// Ledgers of the in-memory copies being changed.
    Mutating,
    /// Both records being written back.
    Persisting,
    /// Both records written.
    Committed,
    /// Trade abandoned; stored state is unchanged.
    Rejected,
}

impl TradePhase {
    /// Stable snake-case name for log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Mutating => "mutating",
            Self::Persisting => "persisting",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for TradePhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a committed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeReceipt {
    /// Identifier assigned when the trade was received.
    pub trade_id: TradeId,
    /// Declared value exchanged by each side.
    pub value: u64,
    /// Survivor A as persisted.
    pub survivor_a: Survivor,
    /// Survivor B as persisted.
    pub survivor_b: Survivor,
    /// Human-readable confirmation.
    pub message: String,
}

/// Tracks and logs the phase of one trade.
struct PhaseTracker {
    trade_id: TradeId,
    phase: TradePhase,
}

impl PhaseTracker {
    const fn new(trade_id: TradeId) -> Self {
        Self {
            trade_id,
            phase: TradePhase::Pending,
        }
    }

    fn advance(&mut self, next: TradePhase) {
        debug!(
            trade_id = %self.trade_id,
            from = %self.phase,
            to = %next,
            "trade phase transition"
        );
        self.phase = next;
    }
}

/// Runs trades against a registry under per-survivor locks.
#[derive(Debug)]
pub struct TradeExecutor<R> {
    registry: Arc<R>,
    locks: Arc<SurvivorLocks>,
    store_timeout: Duration,
    lock_timeout: Duration,
}

impl<R: SurvivorRegistry> TradeExecutor<R> {
    /// Create an executor sharing `registry` and `locks` with the caller.
    pub const fn new(
        registry: Arc<R>,
        locks: Arc<SurvivorLocks>,
        store_timeout: Duration,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            locks,
            store_timeout,
            lock_timeout,
        }
    }

    /// Execute a trade request.
    ///
    /// On success both records have been saved and the receipt carries the
    /// persisted versions. On any rejection nothing was written.
    pub async fn execute(&self, request: &TradeRequest) -> Result<TradeReceipt, ServiceError> {
        let mut tracker = PhaseTracker::new(TradeId::new());

        match self.run(request, &mut tracker).await {
            Ok(receipt) => {
                info!(
                    trade_id = %receipt.trade_id,
                    survivor_a = %request.survivor_a,
                    survivor_b = %request.survivor_b,
                    value = receipt.value,
                    "trade committed"
                );
                Ok(receipt)
            }
            Err(err) => {
                let kind = err.kind();
                if kind.is_fatal() {
                    error!(
                        trade_id = %tracker.trade_id,
                        phase = %tracker.phase,
                        kind = %kind,
                        error = %err,
                        "trade failed on storage"
                    );
                } else {
                    warn!(
                        trade_id = %tracker.trade_id,
                        phase = %tracker.phase,
                        kind = %kind,
                        error = %err,
                        "trade rejected"
                    );
                }
                tracker.advance(TradePhase::Rejected);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request: &TradeRequest,
        tracker: &mut PhaseTracker,
    ) -> Result<TradeReceipt, ServiceError> {
        if request.survivor_a == request.survivor_b {
            return Err(TradeError::SameParticipant(request.survivor_a).into());
        }

        let _guard = self
            .locks
            .lock_pair(request.survivor_a, request.survivor_b, self.lock_timeout)
            .await?;

        tracker.advance(TradePhase::Validating);
        let before_a = self.load(request.survivor_a).await?;
        let before_b = self.load(request.survivor_b).await?;

        let prepared = prepare_trade(request)?;
        ensure_can_trade(&before_a, &before_b)?;
        let value = validate_trade(&before_a.resources, &before_b.resources, &prepared)?;

        tracker.advance(TradePhase::Mutating);
        let mut after_a = before_a.clone();
        let mut after_b = before_b;
        apply_trade(&mut after_a, &mut after_b, &prepared)?;
        let now = Utc::now();
        after_a.updated_at = now;
        after_b.updated_at = now;

        tracker.advance(TradePhase::Persisting);
        self.persist(tracker.trade_id, &before_a, &after_a, &after_b)
            .await?;

        tracker.advance(TradePhase::Committed);
        Ok(TradeReceipt {
            trade_id: tracker.trade_id,
            value,
            survivor_a: after_a,
            survivor_b: after_b,
            message: String::from(TRADE_SUCCESS_MESSAGE),
        })
    }

    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        bounded("load", self.store_timeout, self.registry.load(id)).await
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        bounded("save", self.store_timeout, self.registry.save(survivor)).await
    }

    /// Save A then B, leaving the store at either the pre-trade or the
    /// post-trade pair.
    ///
    /// A failed save is reported as an error even when reconciliation finds
    /// that the write landed.
    async fn persist(
        &self,
        trade_id: TradeId,
        before_a: &Survivor,
        after_a: &Survivor,
        after_b: &Survivor,
    ) -> Result<(), RegistryError> {
        if let Err(save_err) = self.save(after_a).await {
            match self.settle(after_a, &save_err).await {
                WriteState::Landed => self.restore(trade_id, before_a).await,
                WriteState::Missing => {}
                WriteState::Unknown => error!(
                    trade_id = %trade_id,
                    survivor_id = %after_a.id,
                    "survivor A state unknown after failed save"
                ),
            }
            return Err(save_err);
        }

        let Err(save_err) = self.save(after_b).await else {
            return Ok(());
        };

        match self.settle(after_b, &save_err).await {
            WriteState::Landed => warn!(
                trade_id = %trade_id,
                survivor_id = %after_b.id,
                "survivor B saved despite late reply, trade stored as committed"
            ),
            WriteState::Missing => self.restore(trade_id, before_a).await,
            WriteState::Unknown => error!(
                trade_id = %trade_id,
                survivor_id = %after_b.id,
                "survivor B state unknown after failed save, survivor A left as traded"
            ),
        }

        Err(save_err)
    }

    /// Decide whether a failed save of `record` reached the store.
    ///
    /// Only a timeout leaves this open; the record is read back and compared.
    async fn settle(&self, record: &Survivor, save_err: &RegistryError) -> WriteState {
        if !matches!(save_err, RegistryError::Timeout { .. }) {
            return WriteState::Missing;
        }
        match self.load(record.id).await {
            Ok(stored) if stored == *record => WriteState::Landed,
            Ok(_) => WriteState::Missing,
            Err(err) => {
                error!(
                    survivor_id = %record.id,
                    error = %err,
                    "could not read back survivor after timed out save"
                );
                WriteState::Unknown
            }
        }
    }

    /// Best-effort write of A's pre-trade record.
    async fn restore(&self, trade_id: TradeId, before_a: &Survivor) {
        let restored = match self.save(before_a).await {
            Ok(()) => true,
            Err(err) => matches!(self.settle(before_a, &err).await, WriteState::Landed),
        };
        if restored {
            warn!(
                trade_id = %trade_id,
                survivor_id = %before_a.id,
                "restored survivor A after failed save"
            );
        } else {
            error!(
                trade_id = %trade_id,
                survivor_id = %before_a.id,
                "could not restore survivor A after failed save"
            );
        }
    }
}

/// Whether a save that returned an error took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    /// The stored record equals the one written.
    Landed,
    /// The write did not take effect.
    Missing,
    /// The store could not be read back.
    Unknown,
}
