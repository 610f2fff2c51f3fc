use crate::{
    error::{AuthzError, Result},
    models::Store,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Resolves the backend store holding a namespace's authorization data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreResolver: Send + Sync {
    /// Resolve the store for a namespace, may involve a network round trip
    async fn resolve(&self, namespace: &str) -> Result<Store>;
}

/// In-memory namespace -> store mapping for development and tests
pub struct StaticStoreResolver {
    stores: Arc<DashMap<String, Store>>,
}

impl StaticStoreResolver {
    pub fn new() -> Self {
        Self {
            stores: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, namespace: &str, store: Store) {
        self.stores.insert(namespace.to_string(), store);
    }

    /// Provision a fresh store for a namespace, replacing any existing one
    pub fn provision(&self, namespace: &str) -> Store {
        let store = Store {
            id: Uuid::new_v4().to_string(),
            model_id: Uuid::new_v4().to_string(),
        };
        info!(namespace, store = %store, "Provisioned authorization store");
        self.insert(namespace, store.clone());
        store
    }

    pub fn remove(&self, namespace: &str) -> Option<Store> {
        self.stores.remove(namespace).map(|(_, store)| store)
    }
}

impl Default for StaticStoreResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreResolver for StaticStoreResolver {
    async fn resolve(&self, namespace: &str) -> Result<Store> {
        self.stores
            .get(namespace)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AuthzError::StoreNotFound(namespace.to_string()))
    }
}

/// Caches resolutions of an inner resolver until invalidated
pub struct CachingStoreResolver {
    inner: Arc<dyn StoreResolver>,
    cache: DashMap<String, Store>,
}

impl CachingStoreResolver {
    pub fn new(inner: Arc<dyn StoreResolver>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Drop the cached store of a namespace after it was re-provisioned
    pub fn invalidate(&self, namespace: &str) {
        self.cache.remove(namespace);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl StoreResolver for CachingStoreResolver {
    async fn resolve(&self, namespace: &str) -> Result<Store> {
        // clone out so no shard guard is held across the await below
        let cached = self.cache.get(namespace).map(|entry| entry.value().clone());
        if let Some(store) = cached {
            debug!(namespace, "Store cache hit");
            return Ok(store);
        }

        let store = self.inner.resolve(namespace).await?;
        self.cache.insert(namespace.to_string(), store.clone());
        Ok(store)
    }
}
