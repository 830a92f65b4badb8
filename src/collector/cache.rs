//! TTL-bounded cache of serialized probe results.
//!
//! Entries are opaque strings (probes serialize their own row sets) that are
//! visible until their expiry instant and treated as absent afterwards.
//! Writes replace an entry wholesale and restart its TTL.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

/// A cached payload and the instant it stops being visible.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// Shared result cache. Safe for concurrent readers and writers.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a metric on a data source.
    ///
    /// Keys are namespaced by both so two sources never share an entry.
    pub fn key(source: &str, metric: &str) -> String {
        format!("{source}:{metric}")
    }

    /// Payload for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.read();
        let entry = entries.get(key)?;
        (Instant::now() < entry.expires_at).then(|| entry.payload.clone())
    }

    /// Store `payload` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, payload: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry {
            payload: payload.into(),
            expires_at: Instant::now() + ttl,
        };
        self.write().insert(key.into(), entry);
    }

    /// Decode a JSON payload. Decode failures are logged and reported as a miss.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.get(key)?;
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Encode `value` as JSON and store it. Encode failures are logged and skipped.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(payload) => self.set(key, payload, ttl),
            Err(e) => tracing::warn!(key, error = %e, "Failed to encode cache entry"),
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
