//! `Dragonfly` (Redis-compatible) survivor store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `survivor:{id}` | JSON | Full survivor record |
//! | `survivors:index` | Set | Every stored survivor id |

use fred::prelude::*;
use refuge_core::{RegistryError, SurvivorRegistry};
use refuge_types::{Survivor, SurvivorId};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

/// Set holding the id of every stored survivor.
pub const SURVIVOR_INDEX_KEY: &str = "survivors:index";

/// Key of the JSON record for `id`.
pub fn survivor_key(id: SurvivorId) -> String {
    format!("survivor:{id}")
}

/// Survivor registry backed by a `Dragonfly` instance.
///
/// Wraps a [`fred::prelude::Client`]. Each save writes the record and adds
/// its id to [`SURVIVOR_INDEX_KEY`]; the two writes are not transactional,
/// so `list` skips index entries whose record is missing.
#[derive(Clone)]
pub struct DragonflyRegistry {
    client: Client,
}

impl DragonflyRegistry {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    // =========================================================================
    // Generic JSON get/set
    // =========================================================================

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value.map_or(Ok(None), |s| Ok(Some(serde_json::from_str(&s)?)))
    }

    // =========================================================================
    // Survivor records -- survivor:{id}, survivors:index
    // =========================================================================

    /// Read the record for `id`, or `None` if it is not stored.
    pub async fn fetch(&self, id: SurvivorId) -> Result<Option<Survivor>, DbError> {
        self.get_json(&survivor_key(id)).await
    }

    /// Write the record and index its id.
    pub async fn store(&self, survivor: &Survivor) -> Result<(), DbError> {
        self.set_json(&survivor_key(survivor.id), survivor).await?;
        let _: u32 = self
            .client
            .sadd(SURVIVOR_INDEX_KEY, survivor.id.to_string().as_str())
            .await?;
        Ok(())
    }

    /// Every indexed survivor id.
    pub async fn indexed_ids(&self) -> Result<Vec<SurvivorId>, DbError> {
        let members: Vec<String> = self.client.smembers(SURVIVOR_INDEX_KEY).await?;
        let mut ids = Vec::with_capacity(members.len());
        for m in &members {
            let id = m.parse::<SurvivorId>().map_err(|e| {
                DbError::Config(format!("Invalid UUID in {SURVIVOR_INDEX_KEY}: {e}"))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Load every indexed record.
    pub async fn fetch_all(&self) -> Result<Vec<Survivor>, DbError> {
        let ids = self.indexed_ids().await?;
        let mut survivors = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fetch(id).await? {
                Some(survivor) => survivors.push(survivor),
                None => tracing::warn!(survivor_id = %id, "indexed survivor has no record"),
            }
        }
        Ok(survivors)
    }

    /// Delete a record and drop it from the index.
    pub async fn remove(&self, id: SurvivorId) -> Result<(), DbError> {
        let _: u32 = self.client.del(survivor_key(id)).await?;
        let _: u32 = self
            .client
            .srem(SURVIVOR_INDEX_KEY, id.to_string().as_str())
            .await?;
        Ok(())
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }
}

impl SurvivorRegistry for DragonflyRegistry {
    async fn load(&self, id: SurvivorId) -> Result<Survivor, RegistryError> {
        self.fetch(id).await?.ok_or(RegistryError::NotFound(id))
    }

    async fn save(&self, survivor: &Survivor) -> Result<(), RegistryError> {
        Ok(self.store(survivor).await?)
    }

    async fn list(&self) -> Result<Vec<Survivor>, RegistryError> {
        Ok(self.fetch_all().await?)
    }
}
