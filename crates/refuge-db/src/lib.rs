//! `Dragonfly` persistence for the Refuge survivor registry.
//!
//! Survivor records are stored as JSON documents, one key per survivor,
//! with a set indexing every stored id so the report projections can list
//! the whole population.
//!
//! # Modules
//!
//! - [`dragonfly`] -- [`DragonflyRegistry`], the `SurvivorRegistry` over `fred`
//! - [`error`] -- [`DbError`] and its mapping onto `RegistryError`

pub mod dragonfly;
pub mod error;

pub use dragonfly::{DragonflyRegistry, SURVIVOR_INDEX_KEY, survivor_key};
pub use error::DbError;
