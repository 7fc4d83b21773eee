//! Error types for the refuge-survivors crate.
//!
//! All operations that can fail return typed errors rather than panicking.
//! Trade-specific failures live in [`crate::trade::TradeError`]; this module
//! covers ledger arithmetic, infection flags, and record validation.

use refuge_types::SurvivorId;

/// Errors that can occur during survivor record operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurvivorError {
    /// Attempted to remove more units of an item than the ledger holds.
    #[error("insufficient units of {item}: wanted {requested} but only have {available}")]
    InsufficientUnits {
        /// The item key being removed.
        item: String,
        /// The quantity the caller attempted to remove.
        requested: u32,
        /// The quantity the ledger actually holds.
        available: u32,
    },

    /// The survivor has already crossed the infection threshold and can no
    /// longer be flagged.
    #[error("survivor {survivor} is already infected (counter {infection_count}) and cannot be updated")]
    AlreadyInfected {
        /// The survivor that was flagged.
        survivor: SurvivorId,
        /// The counter value at the time of the attempt.
        infection_count: u32,
    },

    /// A new survivor record failed validation.
    #[error("invalid survivor record: {reason}")]
    InvalidRecord {
        /// Description of why the record was rejected.
        reason: String,
    },

    /// An arithmetic overflow occurred during a ledger computation.
    #[error("arithmetic overflow in ledger computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },
}

impl SurvivorError {
    /// Shorthand for an [`SurvivorError::ArithmeticOverflow`] with a static context.
    pub(crate) fn overflow(context: &str) -> Self {
        Self::ArithmeticOverflow {
            context: context.to_owned(),
        }
    }
}
