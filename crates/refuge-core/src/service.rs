//! Survivor service facade.
//!
//! [`SurvivorService`] is the single entry point for callers: registration,
//! location updates, infection flags, trades, and the report projections.
//! Single-record mutations hold that survivor's lock for their
//! load-modify-save sequence; trades are delegated to [`TradeExecutor`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use refuge_survivors::{SurvivorReport, infection, report, survivor};
use refuge_types::{HealthStatus, NewSurvivor, Survivor, SurvivorId, TradeRequest};

use crate::config::RefugeConfig;
use crate::error::ServiceError;
use crate::executor::{TradeExecutor, TradeReceipt};
use crate::locks::SurvivorLocks;
use crate::registry::{RegistryError, SurvivorRegistry, bounded};

/// Result of an infection flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagOutcome {
    /// The survivor as persisted after the flag.
    pub survivor: Survivor,
    /// Classification derived from the new counter.
    pub status: HealthStatus,
}

impl FlagOutcome {
    /// `"Infected"` or `"Not Infected"`.
    pub const fn label(&self) -> &'static str {
        self.status.label()
    }
}

/// Facade over a survivor registry.
#[derive(Debug)]
pub struct SurvivorService<R> {
    registry: Arc<R>,
    locks: Arc<SurvivorLocks>,
    executor: TradeExecutor<R>,
    store_timeout: Duration,
    lock_timeout: Duration,
}

impl<R: SurvivorRegistry> SurvivorService<R> {
    /// Build a service over `registry` using the store and trade timeouts
    /// from `config`.
    pub fn new(registry: R, config: &RefugeConfig) -> Self {
        let registry = Arc::new(registry);
        let locks = Arc::new(SurvivorLocks::new());
        let store_timeout = config.store.operation_timeout();
        let lock_timeout = config.trade.lock_timeout();
        let executor = TradeExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&locks),
            store_timeout,
            lock_timeout,
        );
        Self {
            registry,
            locks,
            executor,
            store_timeout,
            lock_timeout,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Register a new survivor.
    pub async fn create_survivor(&self, input: NewSurvivor) -> Result<Survivor, ServiceError> {
        let created = survivor::create_survivor(input, Utc::now())?;
        let _guard = self.locks.lock_one(created.id, self.lock_timeout).await?;
        self.save(&created).await?;
        info!(
            survivor_id = %created.id,
            items = created.resources.len(),
            "survivor registered"
        );
        Ok(created)
    }

    /// Fetch a survivor by id.
    pub async fn get_survivor(&self, id: SurvivorId) -> Result<Survivor, ServiceError> {
        Ok(self.load(id).await?)
    }

    /// Replace a survivor's location and return the stored value.
    pub async fn update_location(
        &self,
        id: SurvivorId,
        location: String,
    ) -> Result<String, ServiceError> {
        let _guard = self.locks.lock_one(id, self.lock_timeout).await?;
        let mut record = self.load(id).await?;
        let stored = survivor::update_location(&mut record, location, Utc::now()).to_owned();
        self.save(&record).await?;
        info!(survivor_id = %id, location = %stored, "survivor location updated");
        Ok(stored)
    }

    /// Record one infection report against a survivor.
    ///
    /// Rejected without change when the survivor is already infected.
    pub async fn flag_infected(&self, id: SurvivorId) -> Result<FlagOutcome, ServiceError> {
        let _guard = self.locks.lock_one(id, self.lock_timeout).await?;
        let mut record = self.load(id).await?;

        let count = match infection::flag_infected(&mut record) {
            Ok(count) => count,
            Err(err) => {
                warn!(survivor_id = %id, error = %err, "infection flag rejected");
                return Err(err.into());
            }
        };
        record.updated_at = Utc::now();
        self.save(&record).await?;

        let status = infection::health_status(&record);
        info!(
            survivor_id = %id,
            infection_count = count,
            status = %status,
            "survivor flagged"
        );
        Ok(FlagOutcome {
            survivor: record,
            status,
        })
    }

    // -----------------------------------------------------------------------
    // Trades
    // -----------------------------------------------------------------------

    /// Execute a two-party barter.
    pub async fn trade_items(&self, request: &TradeRequest) -> Result<TradeReceipt, ServiceError> {
        self.executor.execute(request).await
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    /// Percentage of infected survivors.
    pub async fn percentage_infected(&self) -> Result<Decimal, ServiceError> {
        Ok(report::percentage_infected(&self.list().await?)?)
    }

    /// Percentage of healthy survivors.
    pub async fn percentage_non_infected(&self) -> Result<Decimal, ServiceError> {
        Ok(report::percentage_non_infected(&self.list().await?)?)
    }

    /// Points held by infected survivors.
    pub async fn point_loss(&self) -> Result<u64, ServiceError> {
        Ok(report::point_loss(&self.list().await?)?)
    }

    /// Average units per survivor for each item key.
    pub async fn average_amount_per_item(
        &self,
    ) -> Result<BTreeMap<String, Decimal>, ServiceError> {
        Ok(report::average_amount_per_item(&self.list().await?)?)
    }

    /// Every report figure computed over one snapshot.
    pub async fn report(&self) -> Result<SurvivorReport, ServiceError> {
        Ok(report::build_report(&self.list().await?)?)
    }

    // -----------------------------------------------------------------------
    // Registry access
    // -----------------------------------------------------------------------

    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        bounded("load", self.store_timeout, self.registry.load(id)).await
    }

    async fn save(&self, record: &Survivor) -> Result<(), RegistryError> {
        bounded("save", self.store_timeout, self.registry.save(record)).await
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        bounded("list", self.store_timeout, self.registry.list()).await
    }
}
