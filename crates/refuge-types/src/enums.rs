//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Self-reported gender of a survivor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Any other or undisclosed gender.
    Other,
}

/// Health classification derived from a survivor's infection counter.
///
/// A survivor is [`HealthStatus::Infected`] once three independent reports
/// have flagged them. The classification is never stored; it is always
/// recomputed from the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Counter below the infection threshold. May trade.
    Healthy,
    /// Counter at or above the infection threshold. May not trade.
    Infected,
}

impl HealthStatus {
    /// Human-readable label used in flag responses.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Healthy => "Not Infected",
            Self::Infected => "Infected",
        }
    }
}

impl core::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which participant of a two-party trade a value or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    /// The first survivor named in the request.
    A,
    /// The second survivor named in the request.
    B,
}

impl core::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::A => f.write_str("survivor A"),
            Self::B => f.write_str("survivor B"),
        }
    }
}
