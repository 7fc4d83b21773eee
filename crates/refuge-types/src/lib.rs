//! Shared type definitions for the Refuge survivor registry.
//!
//! This crate is the single source of truth for the records that flow
//! between the barter engine, the survivor store, and the scenario runner.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for survivor and trade identifiers
//! - [`enums`] -- Gender, health status, and trade side enumerations
//! - [`structs`] -- Survivor records, ledger entries, offers, and trade requests

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Gender, HealthStatus, TradeSide};
pub use ids::{SurvivorId, TradeId};
pub use structs::{NewSurvivor, OfferEntry, ResourceEntry, Survivor, TradeRequest};
