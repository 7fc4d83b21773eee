//! Survivor logic for the Refuge registry.
//!
//! This crate is the pure logic layer: it operates on owned survivor
//! records and never touches storage or the runtime. It sits between
//! `refuge-types` (data structures) and `refuge-core` (locking, persistence
//! and the service facade).
//!
//! # Modules
//!
//! - [`error`] -- Error type for ledger and record operations ([`SurvivorError`])
//! - [`infection`] -- Infection counter, health classification, trade gate
//! - [`ledger`] -- Per-item inventory arithmetic with one entry per item key
//! - [`report`] -- Read-only population statistics ([`SurvivorReport`])
//! - [`survivor`] -- Record creation and location updates
//! - [`trade`] -- Offer aggregation, barter validation, and ledger swaps

pub mod error;
pub mod infection;
pub mod ledger;
pub mod report;
pub mod survivor;
pub mod trade;

pub use error::SurvivorError;
pub use infection::{
    INFECTION_THRESHOLD, ensure_can_trade, flag_infected, health_status, is_healthy,
};
pub use report::{SurvivorReport, build_report};
pub use trade::{
    AggregatedOffer, OfferLine, PreparedTrade, TradeError, apply_trade, prepare_trade,
    validate_trade,
};
