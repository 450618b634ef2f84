//! Runtime state cache for the relayfleet control plane
//!
//! An in-process, expiration-aware key/value store holding small structured
//! snapshots: admission lists, node/tunnel descriptors, credential lookups and
//! raw traffic counters. The relay data path reads these for admission and
//! quota decisions without touching the relational store.
//!
//! The cache is a projection, never the source of truth. Writers overwrite
//! wholesale per key; republishing the same derived state is always safe
//! (last-write-wins, idempotent). Values serialize as JSON on write and a
//! failed deserialize on read is a miss, never an error — callers fall back
//! to the relational store.
//!
//! The handle is cheap to clone and injected explicitly into every component;
//! it is created once at process start and never re-initialized.

pub mod admission;
pub mod auth;
pub mod features;
pub mod node;
pub mod traffic;
pub mod tunnel;

pub use admission::AdmissionSnapshot;
pub use features::FeatureGates;
pub use node::NodeSnapshot;
pub use traffic::TrafficCounters;
pub use tunnel::{ChargingKind, TunnelKind, TunnelSnapshot};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One cached entry: the serialized value plus an optional deadline
#[derive(Debug, Clone)]
struct Entry {
    json: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Shared in-process cache handle
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: Arc<DashMap<String, Entry>>,
}

impl Cache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`.
    ///
    /// `ttl` of `None` means no expiration; those entries live until an
    /// explicit [`Cache::delete`]. A value that fails to serialize is dropped
    /// with a log line rather than surfacing an error to the caller.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(error) => {
                tracing::warn!(key, %error, "dropping unserializable cache value");
                return;
            }
        };
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_string(), Entry { json, expires_at });
    }

    /// Fetch and deserialize the value under `key`.
    ///
    /// Expired and undecodable entries are both misses; undecodable entries
    /// are evicted so the next writer starts clean.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = {
            let entry = self.entries.get(key)?;
            if entry.is_expired(Instant::now()) {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
            entry.json.clone()
        };
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(key, %error, "evicting undecodable cache entry");
                self.entries.remove(key);
                None
            }
        }
    }

    /// Remove the entry under `key`, if any
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired entry.
    ///
    /// Reads already treat expired entries as misses; this only reclaims
    /// memory and is safe to call from a periodic sweeper task.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Number of resident entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Atomically read-modify-write the value under `key`.
    ///
    /// The closure sees the current decoded value (miss and undecodable both
    /// read as `None`) and returns the replacement. The update happens under
    /// the key's shard lock, so concurrent updates to the same key never lose
    /// increments.
    pub(crate) fn update<T, F>(&self, key: &str, ttl: Option<Duration>, f: F)
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let now = Instant::now();
        let mut slot = self.entries.entry(key.to_string()).or_insert(Entry {
            json: String::new(),
            expires_at: None,
        });
        let current = if slot.json.is_empty() || slot.is_expired(now) {
            None
        } else {
            serde_json::from_str(&slot.json).ok()
        };
        let next = f(current);
        match serde_json::to_string(&next) {
            Ok(json) => {
                slot.json = json;
                slot.expires_at = ttl.map(|ttl| now + ttl);
            }
            Err(error) => {
                tracing::warn!(key, %error, "dropping unserializable cache update");
            }
        }
    }

    #[cfg(test)]
    fn insert_raw(&self, key: &str, json: &str) {
        self.entries.insert(
            key.to_string(),
            Entry {
                json: json.to_string(),
                expires_at: None,
            },
        );
    }
}
