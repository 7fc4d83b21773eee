//! Infection gate: counter-based eligibility per survivor.
//!
//! Every infection report increments a survivor's counter by one. Once the
//! counter reaches [`INFECTION_THRESHOLD`] the survivor is classified as
//! infected, may no longer trade, and may no longer be flagged.

use refuge_types::{HealthStatus, Survivor, TradeSide};

use crate::error::SurvivorError;
use crate::trade::TradeError;

/// Number of reports after which a survivor counts as infected.
pub const INFECTION_THRESHOLD: u32 = 3;

/// Classify an infection counter.
pub const fn status_for(infection_count: u32) -> HealthStatus {
    if infection_count >= INFECTION_THRESHOLD {
        HealthStatus::Infected
    } else {
        HealthStatus::Healthy
    }
}

/// Current health classification of a survivor.
pub const fn health_status(survivor: &Survivor) -> HealthStatus {
    status_for(survivor.infection_count)
}

/// Whether the survivor is below the infection threshold.
pub const fn is_healthy(survivor: &Survivor) -> bool {
    survivor.infection_count < INFECTION_THRESHOLD
}

/// Record one infection report against `survivor`.
///
/// Increments the counter by exactly one and returns the new value. A
/// survivor already at or above the threshold is rejected and left
/// unchanged.
pub fn flag_infected(survivor: &mut Survivor) -> Result<u32, SurvivorError> {
    if !is_healthy(survivor) {
        return Err(SurvivorError::AlreadyInfected {
            survivor: survivor.id,
            infection_count: survivor.infection_count,
        });
    }

    let next = survivor
        .infection_count
        .checked_add(1)
        .ok_or_else(|| SurvivorError::overflow("infection counter overflow"))?;
    survivor.infection_count = next;
    Ok(next)
}

/// Clear both participants of a trade.
///
/// Side A is checked first, then side B; the first infected participant is
/// reported. No ledger is inspected.
pub fn ensure_can_trade(a: &Survivor, b: &Survivor) -> Result<(), TradeError> {
    if !is_healthy(a) {
        return Err(TradeError::InfectedParticipant {
            side: TradeSide::A,
            survivor: a.id,
            infection_count: a.infection_count,
        });
    }
    if !is_healthy(b) {
        return Err(TradeError::InfectedParticipant {
            side: TradeSide::B,
            survivor: b.id,
            infection_count: b.infection_count,
        });
    }
    Ok(())
}
