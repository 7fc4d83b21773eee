//! Survivor persistence seam.
//!
//! The core only needs three operations from a store: load one record, save
//! one record, and list every record. It never assumes a multi-record
//! transaction; atomicity across two survivors is provided by the
//! executor's locks and compensating save.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use refuge_types::{Survivor, SurvivorId};
use tokio::sync::RwLock;

/// Errors returned by a [`SurvivorRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No record exists for the id.
    #[error("survivor not found: {0}")]
    NotFound(SurvivorId),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The backing store did not answer in time.
    #[error("storage operation timed out: {operation}")]
    Timeout {
        /// The registry operation that timed out.
        operation: String,
    },
}

/// Load/save store for survivor records.
///
/// Implementations must be safe to share across tasks. Each call operates
/// on a single record (or a snapshot of all of them for `list`).
pub trait SurvivorRegistry: Send + Sync {
    /// Fetch the record for `id`.
    fn load(&self, id: SurvivorId) -> impl Future<Output = Result<Survivor, RegistryError>> + Send;

    /// Insert or replace the record keyed by `survivor.id`.
    fn save(&self, survivor: &Survivor) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Snapshot every record, in no particular order.
    fn list(&self) -> impl Future<Output = Result<Vec<Survivor>, RegistryError>> + Send;
}

/// Run a registry call with an upper time bound.
///
/// An elapsed timer becomes [`RegistryError::Timeout`] naming `operation`.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, RegistryError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(RegistryError::Timeout {
            operation: operation.to_owned(),
        }),
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Process-local registry backed by an ordered map.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    records: RwLock<BTreeMap<SurvivorId, Survivor>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the registry holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl SurvivorRegistry for InMemoryRegistry {
    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        self.records
            .write()
            .await
            .insert(survivor.id, survivor.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
