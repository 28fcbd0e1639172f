//! Memoized info documents
//!
//! The info document only depends on the registry, the server identity and
//! the address clients use to reach the server. It is built on first request
//! for an address and served from memory afterwards. Concurrent first
//! requests for the same address share a single build.
//!
//! Entries are invalidated explicitly with [`InfoCache::invalidate`] (address
//! change) or [`InfoCache::clear`]; a configuration reload creates a new
//! server and therefore a new cache. The address comes from the client's
//! `Host` header, so the number of entries is capped and the least recently
//! used address is evicted first. Failed builds leave no entry behind.

use super::builder::{build_info, ServerInfoDocument};
use crate::config::ServerIdentity;
use crate::error::{Result, RipError};
use crate::registry::Registry;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A built document together with its serialized form
#[derive(Debug)]
pub struct RenderedInfo {
    pub document: ServerInfoDocument,
    /// JSON rendering returned verbatim to clients
    pub json: String,
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct InfoCacheStats {
    pub builds: u64,
    pub hits: u64,
    /// Entries dropped to stay under the entry limit
    pub evictions: u64,
    pub entry_count: usize,
}

/// Default cap on distinct cached addresses
pub const DEFAULT_MAX_ENTRIES: usize = 64;

type Slot = Arc<OnceCell<Arc<RenderedInfo>>>;

struct CacheEntry {
    slot: Slot,
    last_accessed: Instant,
}

/// Per-address memoized builder of info documents
pub struct InfoCache {
    registry: Arc<Registry>,
    identity: ServerIdentity,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
    builds: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
}

impl InfoCache {
    pub fn new(registry: Arc<Registry>, identity: ServerIdentity) -> Self {
        Self::with_max_entries(registry, identity, DEFAULT_MAX_ENTRIES)
    }

    /// Cache holding at most `max_entries` addresses (at least one)
    pub fn with_max_entries(
        registry: Arc<Registry>,
        identity: ServerIdentity,
        max_entries: usize,
    ) -> Self {
        Self {
            registry,
            identity,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
            builds: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Document for `address`, building it if this is the first request
    pub async fn get(&self, address: &str) -> Result<Arc<RenderedInfo>> {
        let slot = self.slot(address)?;

        if let Some(rendered) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(rendered.clone());
        }

        let built = slot
            .get_or_try_init(|| async {
                self.builds.fetch_add(1, Ordering::SeqCst);
                debug!(address = %address, "Building info document");
                let document = build_info(&self.registry, &self.identity, address)?;
                let json = serde_json::to_string(&document)
                    .map_err(|e| RipError::build_failure(format!("serialization failed: {e}")))?;
                info!(address = %address, bytes = json.len(), "Info document cached");
                Ok::<_, RipError>(Arc::new(RenderedInfo { document, json }))
            })
            .await;

        match built {
            Ok(rendered) => Ok(rendered.clone()),
            Err(e) => {
                self.discard_empty(address, &slot);
                Err(e)
            }
        }
    }

    /// Drop the cached document of one address
    pub fn invalidate(&self, address: &str) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => entries.remove(address).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every cached document
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of builds started so far
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> InfoCacheStats {
        InfoCacheStats {
            builds: self.build_count(),
            hits: self.hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.entries.lock().map(|e| e.len()).unwrap_or_default(),
        }
    }

    fn slot(&self, address: &str) -> Result<Slot> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| RipError::build_failure("info cache lock poisoned"))?;
        let now = Instant::now();

        if let Some(entry) = entries.get_mut(address) {
            entry.last_accessed = now;
            return Ok(entry.slot.clone());
        }

        while entries.len() >= self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(address = %oldest, "Evicted least recently used info document");
        }

        let slot = Slot::default();
        entries.insert(
            address.to_string(),
            CacheEntry {
                slot: slot.clone(),
                last_accessed: now,
            },
        );
        Ok(slot)
    }

    /// Remove `slot` for `address` if it is still the registered one and empty
    fn discard_empty(&self, address: &str, slot: &Slot) {
        if let Ok(mut entries) = self.entries.lock() {
            let stale = entries
                .get(address)
                .is_some_and(|entry| Arc::ptr_eq(&entry.slot, slot) && !slot.initialized());
            if stale {
                entries.remove(address);
            }
        }
    }
}
