//! Unified error type for the survivor service.
//!
//! Every failure surfaced by [`crate::service::SurvivorService`] is a
//! [`ServiceError`]. Callers branch on [`ServiceError::kind`] rather than on
//! the individual variants, and show users [`ServiceError::public_message`]
//! so storage internals never leak.

use refuge_survivors::{SurvivorError, TradeError};

use crate::locks::LockError;
use crate::registry::RegistryError;

/// Coarse failure taxonomy shared by every service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced survivor does not exist.
    NotFound,
    /// A participant is infected, or a flag targets an infected survivor.
    IneligibleParticipant,
    /// A side cannot cover its offer.
    InsufficientResource,
    /// The two declared offer values differ.
    ValueMismatch,
    /// The request itself is malformed.
    InvalidRequest,
    /// The backing store failed, timed out, or locks could not be taken.
    Storage,
}

impl ErrorKind {
    /// Whether this kind indicates an infrastructure fault rather than a
    /// rejected request.
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Storage)
    }

    /// Stable snake-case name, used as a structured log field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::IneligibleParticipant => "ineligible_participant",
            Self::InsufficientResource => "insufficient_resource",
            Self::ValueMismatch => "value_mismatch",
            Self::InvalidRequest => "invalid_request",
            Self::Storage => "storage",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the survivor service and trade executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// A record or ledger operation failed.
    #[error(transparent)]
    Survivor(#[from] SurvivorError),

    /// A trade was rejected or failed during application.
    #[error(transparent)]
    Trade(#[from] TradeError),

    /// The registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Survivor locks could not be acquired.
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl ServiceError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Survivor(err) => survivor_kind(err),
            Self::Trade(err) => match err {
                TradeError::InfectedParticipant { .. } => ErrorKind::IneligibleParticipant,
                TradeError::InsufficientResource { .. } => ErrorKind::InsufficientResource,
                TradeError::ValueMismatch { .. } => ErrorKind::ValueMismatch,
                TradeError::Ledger(inner) => survivor_kind(inner),
                TradeError::EmptyOffer { .. }
                | TradeError::SameParticipant(_)
                | TradeError::ArithmeticOverflow { .. } => ErrorKind::InvalidRequest,
            },
            Self::Registry(RegistryError::NotFound(_)) => ErrorKind::NotFound,
            Self::Registry(RegistryError::Storage(_) | RegistryError::Timeout { .. })
            | Self::Lock(_) => ErrorKind::Storage,
        }
    }

    /// Message safe to show to a caller.
    ///
    /// Storage failures collapse to a generic message; every other kind
    /// describes the rejection.
    pub fn public_message(&self) -> String {
        if self.kind().is_fatal() {
            String::from("internal storage error, please retry later")
        } else {
            self.to_string()
        }
    }
}

const fn survivor_kind(err: &SurvivorError) -> ErrorKind {
    match err {
        SurvivorError::InsufficientUnits { .. } => ErrorKind::InsufficientResource,
        SurvivorError::AlreadyInfected { .. } => ErrorKind::IneligibleParticipant,
        SurvivorError::InvalidRecord { .. } | SurvivorError::ArithmeticOverflow { .. } => {
            ErrorKind::InvalidRequest
        }
    }
}
