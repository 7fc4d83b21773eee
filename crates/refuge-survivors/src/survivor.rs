//! Survivor record creation and field updates.
//!
//! Everything here works on owned [`Survivor`] values and takes the current
//! time as a parameter, so the same input always yields the same record.

use chrono::{DateTime, Utc};
use refuge_types::{NewSurvivor, Survivor, SurvivorId};

use crate::error::SurvivorError;
use crate::ledger;

/// Build a fresh survivor record from registration input.
///
/// The name is trimmed and must not be empty. The initial inventory is
/// normalized: duplicate item keys are merged (first unit-points win) and
/// zero-quantity entries are dropped. The infection counter starts at 0.
pub fn create_survivor(input: NewSurvivor, now: DateTime<Utc>) -> Result<Survivor, SurvivorError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(SurvivorError::InvalidRecord {
            reason: String::from("name must not be empty"),
        });
    }

    let resources = ledger::normalize(input.resources)?;

    Ok(Survivor {
        id: SurvivorId::new(),
        name: name.to_owned(),
        age: input.age,
        gender: input.gender,
        location: input.location,
        infection_count: 0,
        resources,
        created_at: now,
        updated_at: now,
    })
}

/// Replace a survivor's last known location.
///
/// Allowed regardless of infection status. Returns the stored location.
pub fn update_location(survivor: &mut Survivor, location: String, now: DateTime<Utc>) -> &str {
    survivor.location = location;
    survivor.updated_at = now;
    &survivor.location
}
