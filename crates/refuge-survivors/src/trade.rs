//! Barter validation and in-memory trade application.
//!
//! A trade swaps two offers between two survivors. It is admissible only
//! when, in order:
//!
//! 1. Both survivors are healthy ([`crate::infection::ensure_can_trade`]).
//! 2. Each side's ledger stock value, summed over the item keys it offers,
//!    covers that side's declared offer value ([`check_gross_sufficiency`]).
//! 3. Both declared offer values are exactly equal (the parity law).
//! 4. At mutation time, every offered item exists in the giver's ledger
//!    with enough stock value and enough units ([`check_line_sufficiency`]).
//!
//! Offers are aggregated per item key before any check, so an offer that
//! names the same item twice is treated as one line with the summed
//! quantity and value.
//!
//! Nothing here touches storage. Callers mutate owned copies of the two
//! records and persist them only if every step succeeded.

use refuge_types::{OfferEntry, ResourceEntry, Survivor, SurvivorId, TradeRequest, TradeSide};

use crate::error::SurvivorError;
use crate::ledger;

// ---------------------------------------------------------------------------
// Aggregated offers
// ---------------------------------------------------------------------------

/// One item key of an offer after aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferLine {
    /// Item key.
    pub item: String,
    /// Declared unit-points of the first entry naming this item. Used when
    /// the receiver does not hold the item yet.
    pub unit_points: u32,
    /// Total declared quantity for this item.
    pub quantity: u32,
    /// Total declared value (`unit_points * quantity` summed per entry).
    pub declared_value: u64,
}

/// A side's offer, aggregated per item key in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedOffer {
    side: TradeSide,
    lines: Vec<OfferLine>,
    declared_value: u64,
}

impl AggregatedOffer {
    /// Aggregate the raw offer entries of one side.
    ///
    /// # Errors
    ///
    /// Returns [`TradeError::EmptyOffer`] if `entries` is empty, or
    /// [`TradeError::ArithmeticOverflow`] if a summed quantity or value
    /// overflows.
    pub fn from_entries(side: TradeSide, entries: &[OfferEntry]) -> Result<Self, TradeError> {
        if entries.is_empty() {
            return Err(TradeError::EmptyOffer { side });
        }

        let mut lines: Vec<OfferLine> = Vec::with_capacity(entries.len());
        let mut declared_value: u64 = 0;

        for entry in entries {
            let value = u64::from(entry.unit_points).saturating_mul(u64::from(entry.quantity));
            declared_value = declared_value
                .checked_add(value)
                .ok_or_else(|| TradeError::overflow("declared offer value overflow"))?;

            if let Some(line) = lines.iter_mut().find(|line| line.item == entry.item) {
                line.quantity = line
                    .quantity
                    .checked_add(entry.quantity)
                    .ok_or_else(|| TradeError::overflow("offer quantity overflow"))?;
                line.declared_value = line
                    .declared_value
                    .checked_add(value)
                    .ok_or_else(|| TradeError::overflow("offer line value overflow"))?;
            } else {
                lines.push(OfferLine {
                    item: entry.item.clone(),
                    unit_points: entry.unit_points,
                    quantity: entry.quantity,
                    declared_value: value,
                });
            }
        }

        Ok(Self {
            side,
            lines,
            declared_value,
        })
    }

    /// The side this offer belongs to.
    pub const fn side(&self) -> TradeSide {
        self.side
    }

    /// Aggregated lines, one per item key.
    pub fn lines(&self) -> &[OfferLine] {
        &self.lines
    }

    /// Total declared value of the offer.
    pub const fn declared_value(&self) -> u64 {
        self.declared_value
    }
}

/// Both sides of a request, aggregated and checked for shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTrade {
    /// Survivor A's aggregated offer.
    pub offer_a: AggregatedOffer,
    /// Survivor B's aggregated offer.
    pub offer_b: AggregatedOffer,
}

/// Check the request's shape and aggregate both offers.
///
/// # Errors
///
/// Returns [`TradeError::SameParticipant`] when both ids are equal and
/// [`TradeError::EmptyOffer`] when either side offers nothing.
pub fn prepare_trade(request: &TradeRequest) -> Result<PreparedTrade, TradeError> {
    if request.survivor_a == request.survivor_b {
        return Err(TradeError::SameParticipant(request.survivor_a));
    }
    Ok(PreparedTrade {
        offer_a: AggregatedOffer::from_entries(TradeSide::A, &request.offer_a)?,
        offer_b: AggregatedOffer::from_entries(TradeSide::B, &request.offer_b)?,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Coarse stock check for one side.
///
/// Sums the ledger's stock value for every item key the offer names and
/// requires the total to cover the declared offer value. Missing items
/// contribute zero. On failure the first under-covered item is reported.
pub fn check_gross_sufficiency(
    ledger_entries: &[ResourceEntry],
    offer: &AggregatedOffer,
) -> Result<(), TradeError> {
    let mut stock_value: u64 = 0;
    for line in offer.lines() {
        stock_value = stock_value
            .checked_add(ledger::item_value(ledger_entries, &line.item))
            .ok_or_else(|| TradeError::overflow("ledger stock value overflow"))?;
    }

    if stock_value >= offer.declared_value() {
        return Ok(());
    }

    let deficient = offer
        .lines()
        .iter()
        .find(|line| ledger::item_value(ledger_entries, &line.item) < line.declared_value)
        .or_else(|| offer.lines().first());

    Err(deficient.map_or(
        TradeError::EmptyOffer { side: offer.side() },
        |line| TradeError::InsufficientResource {
            side: offer.side(),
            item: line.item.clone(),
            needed: line.declared_value,
            available: ledger::item_value(ledger_entries, &line.item),
        },
    ))
}

/// Fine-grained check for one aggregated line, run immediately before the
/// line is deducted.
///
/// The giver must hold the item, its stock value must cover the declared
/// value, and it must hold at least the declared number of units.
pub fn check_line_sufficiency(
    ledger_entries: &[ResourceEntry],
    side: TradeSide,
    line: &OfferLine,
) -> Result<(), TradeError> {
    let Some(entry) = ledger::find_entry(ledger_entries, &line.item) else {
        return Err(TradeError::InsufficientResource {
            side,
            item: line.item.clone(),
            needed: line.declared_value,
            available: 0,
        });
    };

    let available = ledger::entry_value(entry);
    if available < line.declared_value || entry.quantity < line.quantity {
        return Err(TradeError::InsufficientResource {
            side,
            item: line.item.clone(),
            needed: line.declared_value,
            available,
        });
    }

    Ok(())
}

/// Run the gross sufficiency check for both sides, then the parity law.
///
/// Returns the common declared value on success.
pub fn validate_trade(
    ledger_a: &[ResourceEntry],
    ledger_b: &[ResourceEntry],
    prepared: &PreparedTrade,
) -> Result<u64, TradeError> {
    check_gross_sufficiency(ledger_a, &prepared.offer_a)?;
    check_gross_sufficiency(ledger_b, &prepared.offer_b)?;

    let value_a = prepared.offer_a.declared_value();
    let value_b = prepared.offer_b.declared_value();
    if value_a != value_b {
        return Err(TradeError::ValueMismatch { value_a, value_b });
    }

    Ok(value_a)
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Remove an offer from its giver's ledger.
///
/// Each line is re-checked with [`check_line_sufficiency`] and then
/// decremented by the declared quantity. The first insufficient line aborts;
/// lines already deducted stay deducted in `ledger_entries`, so callers must
/// work on a copy they can discard.
pub fn deduct_offer(
    ledger_entries: &mut Vec<ResourceEntry>,
    offer: &AggregatedOffer,
) -> Result<(), TradeError> {
    for line in offer.lines() {
        check_line_sufficiency(ledger_entries, offer.side(), line)?;
        ledger::remove_units(ledger_entries, &line.item, line.quantity)?;
    }
    Ok(())
}

/// Add an offer to the receiver's ledger.
pub fn credit_offer(
    ledger_entries: &mut Vec<ResourceEntry>,
    offer: &AggregatedOffer,
) -> Result<(), TradeError> {
    for line in offer.lines() {
        ledger::add_units(ledger_entries, &line.item, line.unit_points, line.quantity)?;
    }
    Ok(())
}

/// Apply a validated trade to both survivors' ledgers.
///
/// Deducts A's offer from A, then B's offer from B, then credits B's offer
/// to A and A's offer to B. On error both records may be partially
/// modified and must be discarded.
pub fn apply_trade(
    a: &mut Survivor,
    b: &mut Survivor,
    prepared: &PreparedTrade,
) -> Result<(), TradeError> {
    deduct_offer(&mut a.resources, &prepared.offer_a)?;
    deduct_offer(&mut b.resources, &prepared.offer_b)?;
    credit_offer(&mut a.resources, &prepared.offer_b)?;
    credit_offer(&mut b.resources, &prepared.offer_a)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors specific to trade validation and application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    /// A participant is infected and may not trade.
    #[error("{side} ({survivor}) is infected, trading with them is not allowed")]
    InfectedParticipant {
        /// Which side is infected.
        side: TradeSide,
        /// The infected survivor.
        survivor: SurvivorId,
        /// Their infection counter.
        infection_count: u32,
    },

    /// A side cannot cover what it offers.
    #[error("{side} does not have enough {item}: needs {needed} points, has {available}")]
    InsufficientResource {
        /// The side that cannot cover its offer.
        side: TradeSide,
        /// The offending item key.
        item: String,
        /// Declared value for the item.
        needed: u64,
        /// Stock value the ledger holds for the item.
        available: u64,
    },

    /// Both sides must offer the same amount of points.
    #[error("both sides should offer the same amount of points: {value_a} vs {value_b}")]
    ValueMismatch {
        /// Declared value of survivor A's offer.
        value_a: u64,
        /// Declared value of survivor B's offer.
        value_b: u64,
    },

    /// A side offered nothing.
    #[error("{side} offered no items")]
    EmptyOffer {
        /// The side with the empty offer.
        side: TradeSide,
    },

    /// Both sides of the request name the same survivor.
    #[error("survivor {0} cannot trade with themselves")]
    SameParticipant(SurvivorId),

    /// A ledger operation failed while applying the trade.
    #[error("ledger error during trade: {0}")]
    Ledger(#[from] SurvivorError),

    /// An arithmetic overflow occurred while valuing an offer.
    #[error("arithmetic overflow in trade computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },
}

impl TradeError {
    fn overflow(context: &str) -> Self {
        Self::ArithmeticOverflow {
            context: context.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use refuge_types::Gender;

    use super::*;
    use crate::infection;

    fn make_survivor(resources: &[(&str, u32, u32)]) -> Survivor {
        Survivor {
            id: SurvivorId::new(),
            name: String::from("Rick"),
            age: 35,
            gender: Gender::Male,
            location: String::from("farmhouse"),
            infection_count: 0,
            resources: resources
                .iter()
                .map(|&(item, points, qty)| ResourceEntry::new(item, points, qty))
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn offer(entries: &[(&str, u32, u32)]) -> Vec<OfferEntry> {
        entries
            .iter()
            .map(|&(item, points, qty)| OfferEntry::new(item, points, qty))
            .collect()
    }

    fn request(
        a: &Survivor,
        b: &Survivor,
        offer_a: &[(&str, u32, u32)],
        offer_b: &[(&str, u32, u32)],
    ) -> TradeRequest {
        TradeRequest {
            survivor_a: a.id,
            survivor_b: b.id,
            offer_a: offer(offer_a),
            offer_b: offer(offer_b),
        }
    }

    /// Gate, validate and apply on copies; returns the updated copies.
    fn run_trade(
        a: &Survivor,
        b: &Survivor,
        req: &TradeRequest,
    ) -> Result<(Survivor, Survivor), TradeError> {
        let prepared = prepare_trade(req)?;
        infection::ensure_can_trade(a, b)?;
        validate_trade(&a.resources, &b.resources, &prepared)?;
        let mut a = a.clone();
        let mut b = b.clone();
        apply_trade(&mut a, &mut b, &prepared)?;
        Ok((a, b))
    }

    // -----------------------------------------------------------------------
    // Aggregation
    // -----------------------------------------------------------------------

    #[test]
    fn aggregation_merges_duplicate_items() {
        let aggregated = AggregatedOffer::from_entries(
            TradeSide::A,
            &offer(&[("water", 4, 1), ("food", 3, 2), ("water", 4, 2)]),
        )
        .unwrap();
        assert_eq!(aggregated.declared_value(), 18);
        assert_eq!(aggregated.lines().len(), 2);
        let water = aggregated.lines().first().unwrap();
        assert_eq!(water.item, "water");
        assert_eq!(water.quantity, 3);
        assert_eq!(water.declared_value, 12);
    }

    #[test]
    fn empty_offer_is_rejected() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[]);
        assert_eq!(
            prepare_trade(&req),
            Err(TradeError::EmptyOffer { side: TradeSide::B })
        );
    }

    #[test]
    fn same_participant_is_rejected() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let req = request(&a, &a, &[("wood", 2, 1)], &[("wood", 2, 1)]);
        assert_eq!(prepare_trade(&req), Err(TradeError::SameParticipant(a.id)));
    }

    // -----------------------------------------------------------------------
    // Reference scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn equal_value_trade_swaps_items() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[("food", 6, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 6, 1)]);

        let (a_after, b_after) = run_trade(&a, &b, &req).unwrap();

        assert_eq!(ledger::item_quantity(&a_after.resources, "wood"), 0);
        assert!(ledger::find_entry(&a_after.resources, "wood").is_none());
        assert_eq!(ledger::item_quantity(&a_after.resources, "food"), 1);
        assert_eq!(
            ledger::find_entry(&b_after.resources, "wood"),
            Some(&ResourceEntry::new("wood", 2, 3))
        );
        assert!(ledger::find_entry(&b_after.resources, "food").is_none());
    }

    #[test]
    fn unequal_values_are_a_mismatch() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[("food", 5, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 5, 1)]);

        assert_eq!(
            run_trade(&a, &b, &req),
            Err(TradeError::ValueMismatch { value_a: 6, value_b: 5 })
        );
    }

    #[test]
    fn offer_above_stock_value_is_insufficient() {
        let a = make_survivor(&[("wood", 2, 1)]);
        let b = make_survivor(&[("food", 6, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 6, 1)]);

        assert_eq!(
            run_trade(&a, &b, &req),
            Err(TradeError::InsufficientResource {
                side: TradeSide::A,
                item: String::from("wood"),
                needed: 6,
                available: 2,
            })
        );
    }

    #[test]
    fn infected_participant_blocks_before_ledger_checks() {
        let mut a = make_survivor(&[]);
        a.infection_count = 3;
        let b = make_survivor(&[("food", 6, 1)]);
        // A holds nothing; the infection must be reported, not the ledger.
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 6, 1)]);

        assert!(matches!(
            run_trade(&a, &b, &req),
            Err(TradeError::InfectedParticipant { side: TradeSide::A, .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Check ordering and edge cases
    // -----------------------------------------------------------------------

    #[test]
    fn gross_check_runs_before_parity() {
        let a = make_survivor(&[("wood", 2, 1)]);
        let b = make_survivor(&[("food", 5, 1)]);
        // Both insufficient stock for A and a value mismatch: stock wins.
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 5, 1)]);
        assert!(matches!(
            run_trade(&a, &b, &req),
            Err(TradeError::InsufficientResource { side: TradeSide::A, .. })
        ));
    }

    #[test]
    fn side_b_gross_check_reports_side_b() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[("food", 6, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("medication", 6, 1)]);
        assert!(matches!(
            run_trade(&a, &b, &req),
            Err(TradeError::InsufficientResource { side: TradeSide::B, ref item, available: 0, .. }) if item == "medication"
        ));
    }

    #[test]
    fn duplicate_offer_lines_are_additive() {
        // Ledger covers one line of 6 but not two of them.
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[("food", 6, 2)]);
        let req = request(&a, &b, &[("wood", 2, 3), ("wood", 2, 3)], &[("food", 6, 2)]);
        assert!(matches!(
            run_trade(&a, &b, &req),
            Err(TradeError::InsufficientResource { side: TradeSide::A, needed: 12, available: 6, .. })
        ));
    }

    #[test]
    fn duplicate_offer_lines_within_stock_commit() {
        let a = make_survivor(&[("wood", 2, 4)]);
        let b = make_survivor(&[("food", 4, 2)]);
        let req = request(&a, &b, &[("wood", 2, 2), ("wood", 2, 2)], &[("food", 4, 2)]);
        let (a_after, b_after) = run_trade(&a, &b, &req).unwrap();
        assert!(ledger::find_entry(&a_after.resources, "wood").is_none());
        assert_eq!(ledger::item_quantity(&b_after.resources, "wood"), 4);
    }

    #[test]
    fn declared_quantity_above_units_held_is_rejected() {
        // Stock value 10 covers declared value 6, but only one unit exists.
        let a = make_survivor(&[("wood", 10, 1)]);
        let b = make_survivor(&[("food", 6, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 6, 1)]);

        let prepared = prepare_trade(&req).unwrap();
        assert_eq!(validate_trade(&a.resources, &b.resources, &prepared), Ok(6));
        assert!(matches!(
            run_trade(&a, &b, &req),
            Err(TradeError::InsufficientResource { side: TradeSide::A, .. })
        ));
    }

    #[test]
    fn declared_points_below_ledger_points_deducts_declared_quantity() {
        // Ledger values wood at 3; the request values it at 2.
        let a = make_survivor(&[("wood", 3, 5)]);
        let b = make_survivor(&[("food", 6, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 6, 1)]);

        let (a_after, b_after) = run_trade(&a, &b, &req).unwrap();
        assert_eq!(ledger::item_quantity(&a_after.resources, "wood"), 2);
        // B had no wood: the new entry carries the declared points.
        assert_eq!(
            ledger::find_entry(&b_after.resources, "wood"),
            Some(&ResourceEntry::new("wood", 2, 3))
        );
    }

    #[test]
    fn credit_keeps_receivers_canonical_points() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[("food", 6, 1), ("wood", 5, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3)], &[("food", 6, 1)]);

        let (_, b_after) = run_trade(&a, &b, &req).unwrap();
        assert_eq!(
            ledger::find_entry(&b_after.resources, "wood"),
            Some(&ResourceEntry::new("wood", 5, 4))
        );
    }

    #[test]
    fn zero_value_trade_of_held_items_commits() {
        let a = make_survivor(&[("wood", 0, 2)]);
        let b = make_survivor(&[("stone", 0, 1)]);
        let req = request(&a, &b, &[("wood", 0, 2)], &[("stone", 0, 1)]);
        let (a_after, b_after) = run_trade(&a, &b, &req).unwrap();
        assert_eq!(ledger::item_quantity(&a_after.resources, "stone"), 1);
        assert_eq!(ledger::item_quantity(&b_after.resources, "wood"), 2);
    }

    #[test]
    fn missing_item_with_zero_declared_value_fails_line_check() {
        let a = make_survivor(&[("wood", 2, 3)]);
        let b = make_survivor(&[("food", 6, 1)]);
        let req = request(&a, &b, &[("wood", 2, 3), ("ghost", 0, 4)], &[("food", 6, 1)]);

        assert!(matches!(
            run_trade(&a, &b, &req),
            Err(TradeError::InsufficientResource { side: TradeSide::A, ref item, .. }) if item == "ghost"
        ));
    }

    // -----------------------------------------------------------------------
    // Randomized invariants
    // -----------------------------------------------------------------------

    fn random_entries(rng: &mut StdRng, items: &[&str]) -> Vec<(String, u32, u32)> {
        let count = rng.random_range(0..4);
        (0..count)
            .map(|_| {
                let item = items[rng.random_range(0..items.len())];
                (item.to_owned(), rng.random_range(0..5), rng.random_range(0..4))
            })
            .collect()
    }

    fn as_refs(entries: &[(String, u32, u32)]) -> Vec<(&str, u32, u32)> {
        entries.iter().map(|(item, p, q)| (item.as_str(), *p, *q)).collect()
    }

    #[test]
    fn accepted_trades_respect_parity_and_conserve_units() {
        let items = ["water", "food", "medication", "ammunition"];
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut accepted = 0_u32;

        for _ in 0..2_000 {
            let mut a = make_survivor(&as_refs(&random_entries(&mut rng, &items)));
            let mut b = make_survivor(&as_refs(&random_entries(&mut rng, &items)));
            a.resources = ledger::normalize(std::mem::take(&mut a.resources)).unwrap();
            b.resources = ledger::normalize(std::mem::take(&mut b.resources)).unwrap();
            let offer_a = random_entries(&mut rng, &items);
            let offer_b = random_entries(&mut rng, &items);
            let req = request(&a, &b, &as_refs(&offer_a), &as_refs(&offer_b));

            match run_trade(&a, &b, &req) {
                Ok((a_after, b_after)) => {
                    accepted += 1;
                    let prepared = prepare_trade(&req).unwrap();
                    assert_eq!(
                        prepared.offer_a.declared_value(),
                        prepared.offer_b.declared_value()
                    );
                    for item in items {
                        let before = u64::from(ledger::item_quantity(&a.resources, item))
                            + u64::from(ledger::item_quantity(&b.resources, item));
                        let after = u64::from(ledger::item_quantity(&a_after.resources, item))
                            + u64::from(ledger::item_quantity(&b_after.resources, item));
                        assert_eq!(before, after, "units of {item} not conserved");
                    }
                    assert!(a_after.resources.iter().all(|entry| entry.quantity > 0));
                    assert!(b_after.resources.iter().all(|entry| entry.quantity > 0));
                }
                Err(first) => {
                    // Rejection is deterministic on unchanged input.
                    assert_eq!(run_trade(&a, &b, &req), Err(first));
                }
            }
        }

        assert!(accepted > 0, "generator never produced an admissible trade");
    }
}
