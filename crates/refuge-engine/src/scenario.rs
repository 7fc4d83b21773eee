//! Scenario files: a population to register and batches of operations.
//!
//! Survivors are declared with a label; operations refer to survivors by
//! label. Operations inside one batch run concurrently against the
//! service, batches run one after another.
//!
//! ```yaml
//! survivors:
//!   - label: rick
//!     name: Rick
//!     age: 35
//!     gender: male
//!     location: farmhouse
//!     resources:
//!       - { item: wood, points: 2, qty: 3 }
//! batches:
//!   - - op: trade
//!       a: rick
//!       b: negan
//!       offer_a: [{ item: wood, points: 2, qty: 3 }]
//!       offer_b: [{ item: food, points: 6, qty: 1 }]
//!     - op: flag_infected
//!       survivor: shane
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use refuge_core::{ServiceError, SurvivorRegistry, SurvivorService};
use refuge_types::{Gender, NewSurvivor, OfferEntry, ResourceEntry, SurvivorId, TradeRequest};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

/// A complete scenario document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scenario {
    /// Survivors registered before the first batch.
    #[serde(default)]
    pub survivors: Vec<ScenarioSurvivor>,
    /// Operation batches, run in order.
    #[serde(default)]
    pub batches: Vec<Vec<ScenarioOp>>,
}

/// A survivor declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioSurvivor {
    /// Name operations use to refer to this survivor.
    pub label: String,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Self-reported gender.
    pub gender: Gender,
    /// Initial location.
    pub location: String,
    /// Initial inventory.
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

/// One operation in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioOp {
    /// Two-party barter.
    Trade {
        /// Label of survivor A.
        a: String,
        /// Label of survivor B.
        b: String,
        /// What A gives.
        offer_a: Vec<OfferEntry>,
        /// What B gives.
        offer_b: Vec<OfferEntry>,
    },
    /// Infection report against a survivor.
    FlagInfected {
        /// Label of the reported survivor.
        survivor: String,
    },
    /// Location change.
    UpdateLocation {
        /// Label of the moving survivor.
        survivor: String,
        /// New location.
        location: String,
    },
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Scenario {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&contents)
    }

    /// Parse a scenario from YAML.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        serde_yml::from_str(yaml).map_err(|e| EngineError::Scenario {
            message: format!("failed to parse scenario YAML: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Counts of operation outcomes across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Survivors registered.
    pub registered: usize,
    /// Operations that took effect.
    pub applied: usize,
    /// Operations rejected by a domain rule.
    pub rejected: usize,
}

/// An operation with labels resolved to ids.
enum ResolvedOp {
    Trade(TradeRequest),
    FlagInfected(SurvivorId),
    UpdateLocation(SurvivorId, String),
}

fn resolve(labels: &BTreeMap<String, SurvivorId>, label: &str) -> Result<SurvivorId, EngineError> {
    labels.get(label).copied().ok_or_else(|| EngineError::Scenario {
        message: format!("unknown survivor label: {label}"),
    })
}

fn resolve_op(
    labels: &BTreeMap<String, SurvivorId>,
    op: &ScenarioOp,
) -> Result<ResolvedOp, EngineError> {
    Ok(match op {
        ScenarioOp::Trade {
            a,
            b,
            offer_a,
            offer_b,
        } => ResolvedOp::Trade(TradeRequest {
            survivor_a: resolve(labels, a)?,
            survivor_b: resolve(labels, b)?,
            offer_a: offer_a.clone(),
            offer_b: offer_b.clone(),
        }),
        ScenarioOp::FlagInfected { survivor } => {
            ResolvedOp::FlagInfected(resolve(labels, survivor)?)
        }
        ScenarioOp::UpdateLocation { survivor, location } => {
            ResolvedOp::UpdateLocation(resolve(labels, survivor)?, location.clone())
        }
    })
}

async fn apply<R: SurvivorRegistry>(
    service: &SurvivorService<R>,
    op: &ResolvedOp,
) -> Result<(), ServiceError> {
    match op {
        ResolvedOp::Trade(request) => {
            let receipt = service.trade_items(request).await?;
            info!(
                trade_id = %receipt.trade_id,
                value = receipt.value,
                message = receipt.message,
                "trade applied"
            );
        }
        ResolvedOp::FlagInfected(id) => {
            let outcome = service.flag_infected(*id).await?;
            info!(
                survivor_id = %id,
                infection_count = outcome.survivor.infection_count,
                label = outcome.label(),
                "flag applied"
            );
        }
        ResolvedOp::UpdateLocation(id, location) => {
            let stored = service.update_location(*id, location.clone()).await?;
            info!(survivor_id = %id, location = %stored, "location applied");
        }
    }
    Ok(())
}

/// Register the scenario's survivors, then run its batches.
///
/// Rejections are logged and counted. A storage failure stops the run
/// after the current batch.
pub async fn run<R: SurvivorRegistry>(
    service: &SurvivorService<R>,
    scenario: &Scenario,
) -> Result<RunSummary, EngineError> {
    let mut summary = RunSummary::default();
    let mut labels = BTreeMap::new();

    for declared in &scenario.survivors {
        if labels.contains_key(&declared.label) {
            return Err(EngineError::Scenario {
                message: format!("duplicate survivor label: {}", declared.label),
            });
        }
        let created = service
            .create_survivor(NewSurvivor {
                name: declared.name.clone(),
                age: declared.age,
                gender: declared.gender,
                location: declared.location.clone(),
                resources: declared.resources.clone(),
            })
            .await?;
        labels.insert(declared.label.clone(), created.id);
        summary.registered = summary.registered.saturating_add(1);
    }

    for (batch_index, batch) in scenario.batches.iter().enumerate() {
        let ops = batch
            .iter()
            .map(|op| resolve_op(&labels, op))
            .collect::<Result<Vec<_>, _>>()?;
        info!(batch = batch_index, operations = ops.len(), "running batch");

        let results = futures::future::join_all(ops.iter().map(|op| apply(service, op))).await;

        let mut fatal = None;
        for result in results {
            match result {
                Ok(()) => summary.applied = summary.applied.saturating_add(1),
                Err(err) if err.kind().is_fatal() => fatal = Some(err),
                Err(err) => {
                    summary.rejected = summary.rejected.saturating_add(1);
                    warn!(
                        batch = batch_index,
                        kind = %err.kind(),
                        reason = %err.public_message(),
                        "operation rejected"
                    );
                }
            }
        }
        if let Some(err) = fatal {
            return Err(err.into());
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use refuge_core::{InMemoryRegistry, RefugeConfig};

    use super::*;

    const OUTBREAK: &str = r"
survivors:
  - label: rick
    name: Rick
    age: 35
    gender: male
    location: farmhouse
    resources:
      - { item: wood, points: 2, qty: 3 }
  - label: negan
    name: Negan
    age: 45
    gender: male
    location: sanctuary
    resources:
      - { item: food, points: 6, qty: 1 }
  - label: shane
    name: Shane
    age: 33
    gender: male
    location: quarry
batches:
  - - op: trade
      a: rick
      b: negan
      offer_a: [{ item: wood, points: 2, qty: 3 }]
      offer_b: [{ item: food, points: 6, qty: 1 }]
    - op: flag_infected
      survivor: shane
  - - op: update_location
      survivor: rick
      location: prison
    - op: trade
      a: rick
      b: negan
      offer_a: [{ item: wood, points: 2, qty: 3 }]
      offer_b: [{ item: wood, points: 2, qty: 3 }]
";

    fn service() -> SurvivorService<InMemoryRegistry> {
        SurvivorService::new(InMemoryRegistry::new(), &RefugeConfig::default())
    }

    #[test]
    fn parses_tagged_operations() {
        let scenario = Scenario::parse(OUTBREAK).unwrap();
        assert_eq!(scenario.survivors.len(), 3);
        assert_eq!(scenario.batches.len(), 2);
        assert_eq!(
            scenario.batches.first().and_then(|b| b.get(1)),
            Some(&ScenarioOp::FlagInfected {
                survivor: String::from("shane"),
            })
        );
    }

    #[tokio::test]
    async fn runs_batches_and_counts_outcomes() {
        let service = service();
        let scenario = Scenario::parse(OUTBREAK).unwrap();

        let summary = run(&service, &scenario).await.unwrap();

        // Second trade is rejected: Rick gave away all his wood.
        assert_eq!(
            summary,
            RunSummary {
                registered: 3,
                applied: 3,
                rejected: 1,
            }
        );
        let report = service.report().await.unwrap();
        assert_eq!(report.item_totals.get("wood"), Some(&3));
    }

    #[tokio::test]
    async fn unknown_label_is_a_scenario_error() {
        let scenario = Scenario::parse(
            "batches:\n  - - op: flag_infected\n      survivor: ghost\n",
        )
        .unwrap();
        let result = run(&service(), &scenario).await;
        assert!(matches!(result, Err(EngineError::Scenario { .. })));
    }

    #[tokio::test]
    async fn duplicate_label_is_a_scenario_error() {
        let yaml = r"
survivors:
  - { label: a, name: Ana, age: 20, gender: female, location: camp }
  - { label: a, name: Bea, age: 21, gender: female, location: camp }
";
        let result = run(&service(), &Scenario::parse(yaml).unwrap()).await;
        assert!(matches!(result, Err(EngineError::Scenario { .. })));
    }
}
