// Promotions Module
//
// Promotional incentives for a storefront: category discounts with validity
// windows, and stock-limited gifts awarded to orders that meet a condition.
// It provides:
// - Discount resolution: best active discount per category
// - Gift matching: which gifts an order qualifies for
// - Stock reservation: atomic, idempotent claim of one gift unit per order
// - Order evaluation: one call that combines all of the above

pub mod types;
pub mod models;
pub mod validity;
pub mod catalog_cache;
pub mod discounts;
pub mod gifts;
pub mod reservation;
pub mod notifications;
pub mod metrics;
pub mod catalog;
pub mod seed;

// Re-export commonly used types for convenience
pub use types::{GiftConditionType, GiftStatus, RejectedGift, RejectionReason};
pub use models::{
    Category,
    Discount,
    Gift,
    GiftCategory,
    GiftUpdate,
    LineItem,
    NewCategory,
    NewDiscount,
    NewGift,
    NewGiftCategory,
    OrderSnapshot,
    Reservation,
};
pub use validity::PromotionWindow;
pub use catalog_cache::{CatalogCache, CatalogSection};
pub use discounts::DiscountResolver;
pub use gifts::{GiftConfigurationError, GiftEligibilityMatcher, GiftMatch};
pub use reservation::{GiftStockReservation, ReservationOutcome};
pub use notifications::{
    ChannelNotifier,
    GiftAwardedEvent,
    GiftNotifier,
    notifier_from_config,
    NoopNotifier,
    PromotionEvent,
    RedisNotifier,
};
pub use metrics::PerformanceMetrics;
pub use catalog::{CatalogDefaults, PromotionCatalog};
pub use seed::{apply_seed, SeedData, SeedReport};

// Promotion Engine - Orchestrator
//
// Coordinates the resolver, matcher and reservation and provides the single
// order evaluation entry point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::PromotionConfig;
use crate::error::{PResult, PromotionError};
use crate::store::PromotionStore;

/// Tunables for a PromotionEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub cache_ttl: Duration,
    pub store_timeout: Duration,
    pub defaults: CatalogDefaults,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_ttl: catalog_cache::DEFAULT_CACHE_TTL,
            store_timeout: reservation::DEFAULT_STORE_TIMEOUT,
            defaults: CatalogDefaults::default(),
        }
    }
}

impl From<&PromotionConfig> for EngineSettings {
    fn from(config: &PromotionConfig) -> Self {
        Self {
            cache_ttl: config.catalog_cache_ttl(),
            store_timeout: config.store_timeout(),
            defaults: CatalogDefaults::from(config),
        }
    }
}

/// Outcome of evaluating one order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Best discount per line-item category; categories without one are absent
    pub discounts: BTreeMap<String, Discount>,

    /// Reservations the order holds, including ones made by an earlier evaluation
    pub awarded_gifts: Vec<Reservation>,

    /// Matched gifts that were not awarded, with the reason
    pub rejected_gifts: Vec<RejectedGift>,
}

/// Promotion Engine
///
/// Evaluation has no side effects apart from gift reservations. Reservation
/// correctness rests on the store's atomic decrement, so any number of
/// engines may share one store.
pub struct PromotionEngine {
    discount_resolver: DiscountResolver,
    gift_matcher: GiftEligibilityMatcher,
    reservations: GiftStockReservation,
    catalog: PromotionCatalog,
    notifier: Arc<dyn GiftNotifier>,
    clock: Arc<dyn Clock>,
    cache: Arc<CatalogCache>,
    metrics: PerformanceMetrics,
}

impl PromotionEngine {
    /// Create a new PromotionEngine with default settings
    pub fn new(
        store: Arc<dyn PromotionStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn GiftNotifier>,
    ) -> Self {
        Self::with_settings(store, clock, notifier, EngineSettings::default())
    }

    /// Create a new PromotionEngine
    ///
    /// All components share one catalog cache, so catalog writes made
    /// through `catalog()` are visible to the next evaluation.
    pub fn with_settings(
        store: Arc<dyn PromotionStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn GiftNotifier>,
        settings: EngineSettings,
    ) -> Self {
        let metrics = PerformanceMetrics::new();
        let cache = Arc::new(CatalogCache::with_metrics(
            store.clone(),
            settings.cache_ttl,
            metrics.clone(),
        ));

        Self {
            discount_resolver: DiscountResolver::new(cache.clone()),
            gift_matcher: GiftEligibilityMatcher::new(cache.clone()),
            reservations: GiftStockReservation::new(
                store.clone(),
                clock.clone(),
                settings.store_timeout,
                metrics.clone(),
            ),
            catalog: PromotionCatalog::new(store, cache.clone(), clock.clone(), settings.defaults),
            notifier,
            clock,
            cache,
            metrics,
        }
    }

    /// Create a PromotionEngine from loaded configuration
    ///
    /// Gift events go to Redis when `redis_url` is set and are dropped otherwise.
    pub async fn from_config(
        store: Arc<dyn PromotionStore>,
        clock: Arc<dyn Clock>,
        config: &PromotionConfig,
    ) -> PResult<Self> {
        let notifier = notifier_from_config(config).await?;
        Ok(Self::with_settings(
            store,
            clock,
            notifier,
            EngineSettings::from(config),
        ))
    }

    /// Get performance metrics
    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn catalog(&self) -> &PromotionCatalog {
        &self.catalog
    }

    pub fn discount_resolver(&self) -> &DiscountResolver {
        &self.discount_resolver
    }

    pub fn gift_matcher(&self) -> &GiftEligibilityMatcher {
        &self.gift_matcher
    }

    pub fn reservations(&self) -> &GiftStockReservation {
        &self.reservations
    }

    /// Warm up the cache by loading the whole catalog
    ///
    /// Optional; avoids cold-start latency on the first evaluation.
    pub async fn warm_cache(&self) -> PResult<()> {
        tracing::info!("Warming promotions catalog cache...");
        self.cache.warm().await?;
        tracing::info!("Promotions catalog cache warmed successfully");
        Ok(())
    }

    /// Evaluate an order at the engine clock's current time
    pub async fn evaluate_order_now(&self, order: &OrderSnapshot) -> PResult<EvaluationResult> {
        self.evaluate_order(order, self.clock.now()).await
    }

    /// Evaluate an order at `now`
    ///
    /// Orchestrates the full promotions flow:
    /// 1. Resolve the best discount for every distinct line-item category
    /// 2. Match the order against the gift catalog
    /// 3. Reserve each matched gift, collecting awards and rejections
    ///
    /// Discounts are resolved first, so an unknown category fails the call
    /// before any stock is touched. After that, a failure on one gift never
    /// affects the others.
    pub async fn evaluate_order(
        &self,
        order: &OrderSnapshot,
        now: DateTime<Utc>,
    ) -> PResult<EvaluationResult> {
        if order.order_id.trim().is_empty() {
            return Err(PromotionError::Validation(
                "order_id must not be empty".to_string(),
            ));
        }

        let _timer = self.metrics.start_evaluation();
        tracing::debug!(
            "Evaluating order {} ({} line items, total {})",
            order.order_id,
            order.line_items.len(),
            order.total_amount
        );

        // Step 1: discounts
        let categories = order.distinct_category_ids();
        let discounts = self.discount_resolver.resolve_many(&categories, now).await?;

        // Step 2: gift matching
        let matched = self.gift_matcher.match_order(order, now).await?;

        let mut result = EvaluationResult {
            discounts,
            ..EvaluationResult::default()
        };

        for error in matched.configuration_errors {
            result.rejected_gifts.push(RejectedGift {
                gift_id: error.gift_id,
                reason: RejectionReason::ConfigurationError {
                    message: error.reason,
                },
            });
        }

        // Step 3: reservations. Exhausted gifts still go to the store, which
        // reports AlreadyReserved when this order took the last unit earlier.
        let mut catalog_stale = false;
        for gift in matched.candidates.iter().chain(matched.exhausted.iter()) {
            match self.reservations.reserve(gift.id, &order.order_id).await {
                Ok(ReservationOutcome::Reserved(reservation)) => {
                    self.spawn_notification(PromotionEvent::gift_awarded(
                        reservation.gift_id,
                        reservation.order_id.clone(),
                    ));
                    result.awarded_gifts.push(reservation);
                }
                Ok(ReservationOutcome::AlreadyReserved(reservation)) => {
                    result.awarded_gifts.push(reservation);
                }
                Ok(ReservationOutcome::OutOfStock) => {
                    catalog_stale = true;
                    result.rejected_gifts.push(RejectedGift {
                        gift_id: gift.id,
                        reason: RejectionReason::OutOfStock,
                    });
                }
                Ok(ReservationOutcome::NotFound) => {
                    catalog_stale = true;
                    result.rejected_gifts.push(RejectedGift {
                        gift_id: gift.id,
                        reason: RejectionReason::NotFound,
                    });
                }
                Ok(ReservationOutcome::Unavailable) => {
                    catalog_stale = true;
                    result.rejected_gifts.push(RejectedGift {
                        gift_id: gift.id,
                        reason: RejectionReason::Unavailable,
                    });
                }
                Err(e) => {
                    result.rejected_gifts.push(RejectedGift {
                        gift_id: gift.id,
                        reason: RejectionReason::StoreUnavailable {
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        if catalog_stale {
            self.cache.invalidate(CatalogSection::Gifts).await;
        }

        tracing::info!(
            "Evaluated order {}: {} discount(s), {} gift(s) awarded, {} rejected",
            order.order_id,
            result.discounts.len(),
            result.awarded_gifts.len(),
            result.rejected_gifts.len()
        );

        Ok(result)
    }

    /// Compensating release of a gift reservation for a cancelled order
    pub async fn release_gift(&self, gift_id: Uuid, order_id: &str) -> PResult<bool> {
        let released = self.reservations.release(gift_id, order_id).await?;
        if released {
            self.cache.invalidate(CatalogSection::Gifts).await;
        }
        Ok(released)
    }

    /// Deliver an event without waiting for it
    fn spawn_notification(&self, event: PromotionEvent) {
        let notifier = Arc::clone(&self.notifier);
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                metrics.record_notification_failure();
                tracing::warn!("Failed to deliver promotion event {:?}: {}", event, e);
            }
        });
    }
}
