//! Store selection for the runner.

use refuge_core::config::StoreConfig;
use refuge_core::{InMemoryRegistry, RegistryError, StoreBackend, SurvivorRegistry};
use refuge_db::DragonflyRegistry;
use refuge_types::{Survivor, SurvivorId};

use crate::error::EngineError;

/// The survivor store chosen by `store.backend`.
///
/// Uses enum dispatch instead of trait objects because the registry's
/// async methods are not dyn-compatible.
pub enum Registry {
    /// Process-local map.
    Memory(InMemoryRegistry),
    /// `Dragonfly` server.
    Dragonfly(DragonflyRegistry),
}

impl Registry {
    /// Build the configured store, connecting if it is remote.
    pub async fn from_config(store: &StoreConfig) -> Result<Self, EngineError> {
        match store.backend {
            StoreBackend::Memory => Ok(Self::Memory(InMemoryRegistry::new())),
            StoreBackend::Dragonfly => Ok(Self::Dragonfly(
                DragonflyRegistry::connect(&store.dragonfly_url).await?,
            )),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Memory(_) => "memory",
            Self::Dragonfly(_) => "dragonfly",
        }
    }
}

impl SurvivorRegistry for Registry {
    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        match self {
            Self::Memory(registry) => registry.load(id).await,
            Self::Dragonfly(registry) => registry.load(id).await,
        }
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        match self {
            Self::Memory(registry) => registry.save(survivor).await,
            Self::Dragonfly(registry) => registry.save(survivor).await,
        }
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        match self {
            Self::Memory(registry) => registry.list().await,
            Self::Dragonfly(registry) => registry.list().await,
        }
    }
}
