// Catalog Cache
//
// Time-based cache of categories, discounts and gifts in front of the
// PromotionStore. Each section is refreshed independently once its TTL
// expires, and writers invalidate the sections they touch.
//
// Cached gift stock is advisory only. Reservation always goes to the store,
// so a stale snapshot can at worst turn an exhausted gift into an OutOfStock
// rejection one step later.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::PResult;
use crate::promotions::metrics::PerformanceMetrics;
use crate::promotions::models::{Category, Discount, Gift};
use crate::store::PromotionStore;

/// Default time-to-live for cached catalog sections (60 seconds)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Independently refreshed part of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSection {
    Categories,
    Discounts,
    Gifts,
}

#[derive(Debug, Default)]
struct CacheState {
    categories: Arc<Vec<Category>>,
    discounts: Arc<Vec<Discount>>,
    gifts: Arc<Vec<Gift>>,
    last_updated: HashMap<CatalogSection, Instant>,
}

impl CacheState {
    fn is_stale(&self, section: CatalogSection, ttl: Duration) -> bool {
        match self.last_updated.get(&section) {
            Some(last_update) => last_update.elapsed() >= ttl,
            None => true,
        }
    }

    fn mark_updated(&mut self, section: CatalogSection) {
        self.last_updated.insert(section, Instant::now());
    }
}

/// Read-through cache over a `PromotionStore`
///
/// Snapshots are handed out as `Arc`s, so readers never hold the lock while
/// evaluating.
pub struct CatalogCache {
    store: Arc<dyn PromotionStore>,
    state: RwLock<CacheState>,
    ttl: Duration,
    metrics: Option<PerformanceMetrics>,
}

impl CatalogCache {
    /// Create a new CatalogCache
    ///
    /// A zero `ttl` disables caching: every read goes to the store.
    pub fn new(store: Arc<dyn PromotionStore>, ttl: Duration) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
            ttl,
            metrics: None,
        }
    }

    /// Create a new CatalogCache with metrics tracking
    pub fn with_metrics(
        store: Arc<dyn PromotionStore>,
        ttl: Duration,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(store, ttl)
        }
    }

    /// The store this cache reads through
    pub fn store(&self) -> &Arc<dyn PromotionStore> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn record_cache_hit(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_cache_hit();
        }
    }

    fn record_cache_miss(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_cache_miss();
        }
    }

    /// All categories, in insertion order
    pub async fn categories(&self) -> PResult<Arc<Vec<Category>>> {
        self.refresh_if_stale(CatalogSection::Categories).await?;
        Ok(Arc::clone(&self.state.read().await.categories))
    }

    /// All discounts, in insertion order
    pub async fn discounts(&self) -> PResult<Arc<Vec<Discount>>> {
        self.refresh_if_stale(CatalogSection::Discounts).await?;
        Ok(Arc::clone(&self.state.read().await.discounts))
    }

    /// All gifts, in insertion order
    pub async fn gifts(&self) -> PResult<Arc<Vec<Gift>>> {
        self.refresh_if_stale(CatalogSection::Gifts).await?;
        Ok(Arc::clone(&self.state.read().await.gifts))
    }

    pub async fn find_category(&self, id: &str) -> PResult<Option<Category>> {
        let categories = self.categories().await?;
        Ok(categories.iter().find(|c| c.id == id).cloned())
    }

    /// Load every section now, regardless of age
    pub async fn warm(&self) -> PResult<()> {
        for section in [
            CatalogSection::Categories,
            CatalogSection::Discounts,
            CatalogSection::Gifts,
        ] {
            self.invalidate(section).await;
            self.refresh_if_stale(section).await?;
        }
        Ok(())
    }

    /// Forces the next access to a section to reload from the store
    pub async fn invalidate(&self, section: CatalogSection) {
        let mut state = self.state.write().await;
        state.last_updated.remove(&section);
        tracing::debug!("Invalidated catalog cache section {:?}", section);
    }

    pub async fn invalidate_all(&self) {
        let mut state = self.state.write().await;
        state.last_updated.clear();
    }

    async fn refresh_if_stale(&self, section: CatalogSection) -> PResult<()> {
        // Fast path under the read lock
        {
            let state = self.state.read().await;
            if !state.is_stale(section, self.ttl) {
                self.record_cache_hit();
                return Ok(());
            }
        }

        self.record_cache_miss();

        let mut state = self.state.write().await;

        // Another task may have refreshed while we waited for the write lock.
        // A zero TTL is always stale, so it never short-circuits here.
        if !state.is_stale(section, self.ttl) {
            return Ok(());
        }

        match section {
            CatalogSection::Categories => {
                state.categories = Arc::new(self.store.list_categories().await?);
            }
            CatalogSection::Discounts => {
                state.discounts = Arc::new(self.store.list_discounts().await?);
            }
            CatalogSection::Gifts => {
                state.gifts = Arc::new(self.store.list_gifts().await?);
            }
        }
        state.mark_updated(section);

        tracing::debug!("Refreshed catalog cache section {:?}", section);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPromotionStore;

    fn category(id: &str) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_string(),
            slug: id.to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_cached_snapshot_until_invalidated() {
        let store = Arc::new(InMemoryPromotionStore::new());
        let cache = CatalogCache::new(store.clone(), Duration::from_secs(60));

        store.insert_category(category("rings")).await.unwrap();
        assert_eq!(cache.categories().await.unwrap().len(), 1);

        store.insert_category(category("bangles")).await.unwrap();
        assert_eq!(cache.categories().await.unwrap().len(), 1);

        cache.invalidate(CatalogSection::Categories).await;
        assert_eq!(cache.categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let store = Arc::new(InMemoryPromotionStore::new());
        let cache = CatalogCache::new(store.clone(), Duration::ZERO);

        assert!(cache.categories().await.unwrap().is_empty());
        store.insert_category(category("rings")).await.unwrap();
        assert!(cache.find_category("rings").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_hits_and_misses_are_recorded() {
        let store = Arc::new(InMemoryPromotionStore::new());
        let metrics = PerformanceMetrics::new();
        let cache = CatalogCache::with_metrics(store, Duration::from_secs(60), metrics.clone());

        cache.gifts().await.unwrap();
        cache.gifts().await.unwrap();
        cache.gifts().await.unwrap();

        let summary = metrics.summary();
        assert_eq!(summary.cache_misses, 1);
        assert_eq!(summary.cache_hits, 2);
    }

    #[tokio::test]
    async fn test_warm_loads_every_section() {
        let store = Arc::new(InMemoryPromotionStore::new());
        store.insert_category(category("rings")).await.unwrap();

        let metrics = PerformanceMetrics::new();
        let cache = CatalogCache::with_metrics(store, Duration::from_secs(60), metrics.clone());
        cache.warm().await.unwrap();

        assert_eq!(cache.categories().await.unwrap().len(), 1);
        assert!(cache.discounts().await.unwrap().is_empty());
        assert_eq!(metrics.summary().cache_misses, 3);
    }
}
