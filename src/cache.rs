//! Advisory result cache.
//!
//! Written after every successful generation so other readers can map a
//! query hash to a page id without touching the database. The search flow
//! itself never reads it.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub page_id: i64,
    pub query: String,
    pub timestamp: i64,
}

/// `page_<hex sha256>` of the normalized query.
pub fn cache_key(normalized_query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_query.as_bytes());
    format!("page_{}", hex::encode(hasher.finalize()))
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
}

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

/// Process-local TTL map. Expired slots are dropped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .read()
            .map(|s| s.values().filter(|slot| slot.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        let now = Instant::now();
        slots.retain(|_, slot| slot.expires_at > now);
        slots.insert(
            key.to_string(),
            Slot {
                entry,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        Ok(slots
            .get(key)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| slot.entry.clone()))
    }
}
