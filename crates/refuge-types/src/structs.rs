//! Core entity structs: survivors, their ledger entries, and trade requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::Gender;
use crate::ids::SurvivorId;

// ---------------------------------------------------------------------------
// Ledger entries and offers
// ---------------------------------------------------------------------------

/// One line of a survivor's inventory: an item, its unit value, and how
/// many units are held.
///
/// A ledger never keeps an entry with zero quantity; emptied entries are
/// removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Item key (e.g. `water`, `food`, `medication`, `ammunition`).
    pub item: String,
    /// Point value of a single unit.
    #[serde(alias = "points")]
    pub unit_points: u32,
    /// Number of units held.
    #[serde(alias = "qty")]
    pub quantity: u32,
}

impl ResourceEntry {
    /// Create a new entry.
    pub fn new(item: impl Into<String>, unit_points: u32, quantity: u32) -> Self {
        Self {
            item: item.into(),
            unit_points,
            quantity,
        }
    }
}

/// One line of a trade offer, as declared by the requester.
///
/// Declared unit-points are not required to match the giver's ledger; the
/// validator only requires the ledger's stock value to cover the declared
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferEntry {
    /// Item key being offered.
    pub item: String,
    /// Declared point value of a single unit.
    #[serde(alias = "points")]
    pub unit_points: u32,
    /// Declared number of units.
    #[serde(alias = "qty")]
    pub quantity: u32,
}

impl OfferEntry {
    /// Create a new offer line.
    pub fn new(item: impl Into<String>, unit_points: u32, quantity: u32) -> Self {
        Self {
            item: item.into(),
            unit_points,
            quantity,
        }
    }
}

// ---------------------------------------------------------------------------
// Survivor
// ---------------------------------------------------------------------------

/// A survivor record as held by the registry.
///
/// Mutated only by location updates, infection flags (counter increment)
/// and trade execution (ledger changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survivor {
    /// Unique identifier.
    pub id: SurvivorId,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Self-reported gender.
    pub gender: Gender,
    /// Last reported location, free-form.
    pub location: String,
    /// Number of times this survivor has been reported as infected.
    /// Monotonically non-decreasing.
    pub infection_count: u32,
    /// Inventory entries, at most one per item key.
    pub resources: Vec<ResourceEntry>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new survivor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSurvivor {
    /// Display name (must be non-empty).
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Self-reported gender.
    pub gender: Gender,
    /// Initial location, free-form.
    pub location: String,
    /// Initial inventory. Normalized on creation.
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

// ---------------------------------------------------------------------------
// Trade request
// ---------------------------------------------------------------------------

/// A proposed two-party barter.
///
/// Each side lists what it gives up. The trade executes only if both
/// survivors are healthy, each side can cover its own offer, and the two
/// declared values are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    /// The first participant.
    pub survivor_a: SurvivorId,
    /// The second participant.
    pub survivor_b: SurvivorId,
    /// What survivor A gives to survivor B.
    pub offer_a: Vec<OfferEntry>,
    /// What survivor B gives to survivor A.
    pub offer_b: Vec<OfferEntry>,
}
