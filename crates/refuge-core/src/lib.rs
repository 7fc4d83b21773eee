//! Runtime layer for the Refuge survivor registry.
//!
//! This crate wires the pure logic in `refuge-survivors` to a store and the
//! tokio runtime: it owns the persistence seam, per-survivor locking, the
//! trade executor and the service facade that callers use.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration ([`RefugeConfig`])
//! - [`error`] -- Unified service error and taxonomy ([`ServiceError`], [`ErrorKind`])
//! - [`executor`] -- Locked, phase-tracked trade execution ([`TradeExecutor`])
//! - [`locks`] -- Per-survivor async mutexes with ordered pair locking
//! - [`registry`] -- Store trait and in-memory implementation ([`SurvivorRegistry`])
//! - [`service`] -- Facade for every survivor operation ([`SurvivorService`])

pub mod config;
pub mod error;
pub mod executor;
pub mod locks;
pub mod registry;
pub mod service;

pub use config::{ConfigError, RefugeConfig, StoreBackend};
pub use error::{ErrorKind, ServiceError};
pub use executor::{TRADE_SUCCESS_MESSAGE, TradeExecutor, TradePhase, TradeReceipt};
pub use locks::{LockError, SurvivorLocks};
pub use registry::{InMemoryRegistry, RegistryError, SurvivorRegistry};
pub use service::{FlagOutcome, SurvivorService};
