//! Explicit, TTL-bound caches.
//!
//! Client-side lookups that would otherwise live in ambient module state
//! (company wallets, logos) go through a [`TtlCache`] with a stated lifetime
//! and explicit invalidation. The checkout validator never reads through a
//! cache: it always consults the store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::ServiceError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES};
use crate::models::Company;
use crate::store::CommerceStore;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    store: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut store = self.store.write().await;
        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                CACHE_HITS.inc();
                Some(entry.value.clone())
            }
            Some(_) => {
                store.remove(key);
                CACHE_MISSES.inc();
                None
            }
            None => {
                CACHE_MISSES.inc();
                None
            }
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.store.write().await.insert(key, entry);
    }

    pub async fn invalidate(&self, key: &K) {
        self.store.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }
}

/// Read-through company cache used when assembling outbound checkouts.
#[derive(Clone)]
pub struct CompanyDirectory {
    store: Arc<dyn CommerceStore>,
    cache: TtlCache<String, Company>,
}

impl CompanyDirectory {
    pub fn new(store: Arc<dyn CommerceStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    pub async fn company(&self, company_id: &str) -> Result<Option<Company>, ServiceError> {
        let key = company_id.to_string();
        if let Some(company) = self.cache.get(&key).await {
            return Ok(Some(company));
        }

        let company = self.store.get_company(company_id).await?;
        if let Some(ref company) = company {
            debug!(company_id, "caching company");
            self.cache.insert(key, company.clone()).await;
        }
        Ok(company)
    }

    /// Drops the cached copy, e.g. after the company changes its wallet.
    pub async fn invalidate(&self, company_id: &str) {
        self.cache.invalidate(&company_id.to_string()).await;
    }
}
