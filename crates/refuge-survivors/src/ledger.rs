//! Resource ledger operations for survivors.
//!
//! A survivor's ledger is a list of [`ResourceEntry`] values holding at most
//! one entry per item key. This module provides adding, removing, valuing and
//! normalizing entries with full checked arithmetic -- no silent overflows,
//! no panics.
//!
//! # Unit-points policy
//!
//! Each ledger keeps a single canonical unit-points value per item key.
//! Crediting units of an item that already exists only increases its
//! quantity; the existing unit-points are kept. A brand-new item is appended
//! with the unit-points supplied by the caller.

use refuge_types::ResourceEntry;

use crate::error::SurvivorError;

/// Find the entry for `item`, if present.
pub fn find_entry<'a>(ledger: &'a [ResourceEntry], item: &str) -> Option<&'a ResourceEntry> {
    ledger.iter().find(|entry| entry.item == item)
}

/// Stock value of a single entry (`unit_points * quantity`).
///
/// Cannot overflow: the product of two `u32` values always fits in a `u64`.
pub fn entry_value(entry: &ResourceEntry) -> u64 {
    u64::from(entry.unit_points).saturating_mul(u64::from(entry.quantity))
}

/// Stock value the ledger holds for `item`, or 0 when the item is absent.
pub fn item_value(ledger: &[ResourceEntry], item: &str) -> u64 {
    find_entry(ledger, item).map_or(0, entry_value)
}

/// Quantity the ledger holds for `item`, or 0 when the item is absent.
pub fn item_quantity(ledger: &[ResourceEntry], item: &str) -> u32 {
    find_entry(ledger, item).map_or(0, |entry| entry.quantity)
}

/// Total stock value across every entry in the ledger.
///
/// Returns `None` if the sum overflows `u64`.
pub fn total_value(ledger: &[ResourceEntry]) -> Option<u64> {
    let mut total: u64 = 0;
    for entry in ledger {
        total = total.checked_add(entry_value(entry))?;
    }
    Some(total)
}

/// Add `amount` units of `item` to the ledger.
///
/// Existing entries keep their unit-points; a missing item is appended with
/// `unit_points`. Adding zero units is a no-op so no empty entry is ever
/// created.
pub fn add_units(
    ledger: &mut Vec<ResourceEntry>,
    item: &str,
    unit_points: u32,
    amount: u32,
) -> Result<(), SurvivorError> {
    if amount == 0 {
        return Ok(());
    }

    if let Some(entry) = ledger.iter_mut().find(|entry| entry.item == item) {
        entry.quantity = entry
            .quantity
            .checked_add(amount)
            .ok_or_else(|| SurvivorError::overflow("item quantity overflow in add_units"))?;
    } else {
        ledger.push(ResourceEntry::new(item, unit_points, amount));
    }

    Ok(())
}

/// Remove `amount` units of `item` from the ledger.
///
/// Fails if the ledger does not hold enough units. Removes the entry
/// entirely when its quantity reaches zero.
pub fn remove_units(
    ledger: &mut Vec<ResourceEntry>,
    item: &str,
    amount: u32,
) -> Result<(), SurvivorError> {
    let Some(position) = ledger.iter().position(|entry| entry.item == item) else {
        return Err(SurvivorError::InsufficientUnits {
            item: item.to_owned(),
            requested: amount,
            available: 0,
        });
    };

    let Some(entry) = ledger.get_mut(position) else {
        return Err(SurvivorError::overflow("ledger position out of range"));
    };

    let remaining =
        entry
            .quantity
            .checked_sub(amount)
            .ok_or_else(|| SurvivorError::InsufficientUnits {
                item: item.to_owned(),
                requested: amount,
                available: entry.quantity,
            })?;

    if remaining == 0 {
        ledger.remove(position);
    } else {
        entry.quantity = remaining;
    }

    Ok(())
}

/// Normalize a raw list of entries into a canonical ledger.
///
/// Entries sharing an item key are merged (the first entry's unit-points
/// win), zero-quantity entries are dropped, and first-appearance order is
/// preserved.
pub fn normalize(entries: Vec<ResourceEntry>) -> Result<Vec<ResourceEntry>, SurvivorError> {
    let mut ledger: Vec<ResourceEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        add_units(&mut ledger, &entry.item, entry.unit_points, entry.quantity)?;
    }
    Ok(ledger)
}
