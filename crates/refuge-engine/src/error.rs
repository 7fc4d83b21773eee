//! Error types for the scenario runner binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and scenario execution.

/// Top-level error for the scenario runner.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: refuge_core::ConfigError,
    },

    /// Connecting to the survivor store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying data layer error.
        #[from]
        source: refuge_db::DbError,
    },

    /// A service operation failed on storage.
    #[error("service error: {source}")]
    Service {
        /// The underlying service error.
        #[from]
        source: refuge_core::ServiceError,
    },

    /// The scenario file could not be read or is inconsistent.
    #[error("scenario error: {message}")]
    Scenario {
        /// Description of the scenario problem.
        message: String,
    },
}
