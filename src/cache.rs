use std::fmt::{Debug, Display};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fjall::Keyspace;
use rand::RngExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::task;

use crate::{CommuteSenseError, Result};

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (seconds)
}

/// Disk-backed key/value cache with per-entry expiry
#[derive(Clone)]
pub struct PersistentCache {
    store: Keyspace,
}

fn cache_error(context: &str, error: impl Display) -> CommuteSenseError {
    CommuteSenseError::cache(format!("{context}: {error}"))
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| cache_error("clock before epoch", e))
}

/// Scale a TTL by a random factor in 0.9..1.1 so entries written together expire apart
#[must_use]
pub fn jittered(ttl: Duration) -> Duration {
    let jitter: f64 = rand::rng().random_range(0.9..1.1);
    ttl.mul_f64(jitter)
}

impl PersistentCache {
    /// Open (or create) the cache under `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(path.as_ref())
            .open()
            .map_err(|e| cache_error("failed to open cache database", e))?;
        let store = db
            .keyspace("cache", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| cache_error("failed to open cache keyspace", e))?;
        Ok(PersistentCache { store })
    }

    /// Stores a serializable value with a time-to-live (TTL).
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize + Send + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = unix_now()?.saturating_add(ttl.as_secs());
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry).map_err(|e| cache_error("encode", e))?;

        task::spawn_blocking(move || store.insert(key, bytes))
            .await
            .map_err(|e| cache_error("cache task failed", e))?
            .map_err(|e| cache_error("insert", e))
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || {
            store.get(key_bytes).map(|v| v.map(|v| v.to_vec()))
        })
        .await
        .map_err(|e| cache_error("cache task failed", e))?
        .map_err(|e| cache_error("read", e))?;

        let Some(bytes) = maybe_bytes else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry<T> = match postcard::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                // written by an older layout
                tracing::debug!(error = %e, "Dropping undecodable entry");
                self.remove(key).await?;
                return Ok(None);
            }
        };

        if unix_now()? < entry.expires_at {
            tracing::debug!("Key found and still fresh");
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key))
            .await
            .map_err(|e| cache_error("cache task failed", e))?
            .map_err(|e| cache_error("remove", e))
    }
}

impl Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache").finish_non_exhaustive()
    }
}
