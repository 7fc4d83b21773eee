//! Error types for the data layer.
//!
//! Store operations fail with [`DbError`], which wraps the underlying
//! [`fred`] and [`serde_json`] errors. The registry boundary converts it
//! into the core's [`RegistryError`].

use refuge_core::RegistryError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for RegistryError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.to_string())
    }
}
