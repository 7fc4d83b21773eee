//! Read-only statistics over the survivor collection.
//!
//! Every function takes a slice of survivors and computes a projection
//! without mutating anything. Ratios use [`Decimal`] so percentages and
//! averages stay exact; an empty collection yields zero rather than a
//! division error.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use refuge_types::Survivor;

use crate::error::SurvivorError;
use crate::infection;
use crate::ledger;

/// Every report figure, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurvivorReport {
    /// Total number of registered survivors.
    pub survivor_count: u64,
    /// Number of survivors at or above the infection threshold.
    pub infected_count: u64,
    /// Share of infected survivors, in percent.
    pub percentage_infected: Decimal,
    /// Share of healthy survivors, in percent.
    pub percentage_non_infected: Decimal,
    /// Points held in the ledgers of infected survivors.
    pub point_loss: u64,
    /// Units held per item key across every ledger.
    pub item_totals: BTreeMap<String, u64>,
    /// Units per item key divided by the total survivor count.
    pub average_amount_per_item: BTreeMap<String, Decimal>,
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Number of survivors in the collection.
pub fn survivor_count(survivors: &[Survivor]) -> u64 {
    u64::try_from(survivors.len()).unwrap_or(u64::MAX)
}

/// Number of infected survivors in the collection.
pub fn infected_count(survivors: &[Survivor]) -> u64 {
    let infected = survivors
        .iter()
        .filter(|survivor| !infection::is_healthy(survivor))
        .count();
    u64::try_from(infected).unwrap_or(u64::MAX)
}

fn percentage_of(part: u64, total: u64) -> Result<Decimal, SurvivorError> {
    if total == 0 {
        return Ok(Decimal::ZERO);
    }
    Decimal::from(part)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(Decimal::from(total)))
        .ok_or_else(|| SurvivorError::overflow("percentage computation overflow"))
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Percentage of survivors that are infected (0 for an empty collection).
pub fn percentage_infected(survivors: &[Survivor]) -> Result<Decimal, SurvivorError> {
    percentage_of(infected_count(survivors), survivor_count(survivors))
}

/// Percentage of survivors that are healthy (0 for an empty collection).
pub fn percentage_non_infected(survivors: &[Survivor]) -> Result<Decimal, SurvivorError> {
    let total = survivor_count(survivors);
    let healthy = total.saturating_sub(infected_count(survivors));
    percentage_of(healthy, total)
}

/// Total stock value held by infected survivors.
pub fn point_loss(survivors: &[Survivor]) -> Result<u64, SurvivorError> {
    let mut total: u64 = 0;
    for survivor in survivors.iter().filter(|s| !infection::is_healthy(s)) {
        let value = ledger::total_value(&survivor.resources)
            .ok_or_else(|| SurvivorError::overflow("ledger value overflow in point loss"))?;
        total = total
            .checked_add(value)
            .ok_or_else(|| SurvivorError::overflow("point loss overflow"))?;
    }
    Ok(total)
}

/// Units held per item key across every ledger.
pub fn item_totals(survivors: &[Survivor]) -> Result<BTreeMap<String, u64>, SurvivorError> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for entry in survivors.iter().flat_map(|survivor| &survivor.resources) {
        let slot = totals.entry(entry.item.clone()).or_insert(0);
        *slot = slot
            .checked_add(u64::from(entry.quantity))
            .ok_or_else(|| SurvivorError::overflow("item total overflow"))?;
    }
    Ok(totals)
}

/// Average units per survivor for each item key.
///
/// The divisor is the whole population, including survivors that hold none
/// of the item. An empty collection yields an empty map.
pub fn average_amount_per_item(
    survivors: &[Survivor],
) -> Result<BTreeMap<String, Decimal>, SurvivorError> {
    averages_from_totals(&item_totals(survivors)?, survivor_count(survivors))
}

fn averages_from_totals(
    totals: &BTreeMap<String, u64>,
    population: u64,
) -> Result<BTreeMap<String, Decimal>, SurvivorError> {
    let mut averages = BTreeMap::new();
    if population == 0 {
        return Ok(averages);
    }
    for (item, total) in totals {
        let average = Decimal::from(*total)
            .checked_div(Decimal::from(population))
            .ok_or_else(|| SurvivorError::overflow("average computation overflow"))?;
        averages.insert(item.clone(), average);
    }
    Ok(averages)
}

/// Compute every figure at once.
pub fn build_report(survivors: &[Survivor]) -> Result<SurvivorReport, SurvivorError> {
    let count = survivor_count(survivors);
    let infected = infected_count(survivors);
    let item_totals = item_totals(survivors)?;
    let average_amount_per_item = averages_from_totals(&item_totals, count)?;

    Ok(SurvivorReport {
        survivor_count: count,
        infected_count: infected,
        percentage_infected: percentage_of(infected, count)?,
        percentage_non_infected: percentage_of(count.saturating_sub(infected), count)?,
        point_loss: point_loss(survivors)?,
        item_totals,
        average_amount_per_item,
    })
}
