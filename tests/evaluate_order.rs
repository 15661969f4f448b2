// Order evaluation tests
// Exercises PromotionEngine end-to-end over the in-memory store

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use gift_promotions::clock::FixedClock;
use gift_promotions::error::{PResult, PromotionError};
use gift_promotions::promotions::{
    Category, ChannelNotifier, Discount, EngineSettings, Gift, GiftCategory, GiftConditionType,
    GiftStatus, NewCategory, NewDiscount, NewGift, NoopNotifier, OrderSnapshot, PromotionEvent,
    PromotionEngine, RejectionReason, Reservation, ReservationOutcome,
};
use gift_promotions::store::{InMemoryPromotionStore, PromotionStore};

// ============================================================================
// Test Helpers
// ============================================================================

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + ChronoDuration::days(n)
}

fn engine_over(store: Arc<dyn PromotionStore>) -> PromotionEngine {
    PromotionEngine::new(store, Arc::new(FixedClock::new(day(0))), Arc::new(NoopNotifier))
}

fn category(id: &str) -> NewCategory {
    NewCategory {
        id: id.to_string(),
        name: id.to_string(),
        slug: id.to_string(),
        image_url: None,
    }
}

fn ring_week() -> NewDiscount {
    NewDiscount {
        id: None,
        title: "Ring week".to_string(),
        description: None,
        discount_percent: dec!(20),
        category_id: Some("rings".to_string()),
        banner_image: None,
        active: true,
        valid_from: Some(day(0)),
        valid_to: Some(day(10)),
    }
}

fn gift(condition_type: GiftConditionType, value: &str, stock: i32) -> NewGift {
    NewGift {
        id: None,
        name: format!("{} gift", condition_type),
        code: None,
        description: None,
        condition_type,
        condition_value: value.to_string(),
        stock,
        image_url: None,
        status: GiftStatus::Active,
    }
}

async fn seeded_engine() -> PromotionEngine {
    let engine = engine_over(Arc::new(InMemoryPromotionStore::new()));
    let catalog = engine.catalog();
    catalog.create_category(category("rings")).await.unwrap();
    catalog.create_category(category("bangles")).await.unwrap();
    catalog.create_discount(ring_week()).await.unwrap();
    engine
}

/// Store whose reservation primitive misbehaves; everything else delegates
struct FaultyStore {
    inner: InMemoryPromotionStore,
    delay: Option<Duration>,
}

#[async_trait]
impl PromotionStore for FaultyStore {
    async fn list_categories(&self) -> PResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn find_category(&self, id: &str) -> PResult<Option<Category>> {
        self.inner.find_category(id).await
    }

    async fn insert_category(&self, category: Category) -> PResult<Category> {
        self.inner.insert_category(category).await
    }

    async fn update_category_display(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> PResult<Category> {
        self.inner.update_category_display(id, name, image_url).await
    }

    async fn delete_category(&self, id: &str) -> PResult<()> {
        self.inner.delete_category(id).await
    }

    async fn list_gift_categories(&self) -> PResult<Vec<GiftCategory>> {
        self.inner.list_gift_categories().await
    }

    async fn insert_gift_category(&self, category: GiftCategory) -> PResult<GiftCategory> {
        self.inner.insert_gift_category(category).await
    }

    async fn list_discounts(&self) -> PResult<Vec<Discount>> {
        self.inner.list_discounts().await
    }

    async fn find_discount(&self, id: Uuid) -> PResult<Option<Discount>> {
        self.inner.find_discount(id).await
    }

    async fn insert_discount(&self, discount: Discount) -> PResult<Discount> {
        self.inner.insert_discount(discount).await
    }

    async fn update_discount(&self, discount: Discount) -> PResult<Discount> {
        self.inner.update_discount(discount).await
    }

    async fn delete_discount(&self, id: Uuid) -> PResult<bool> {
        self.inner.delete_discount(id).await
    }

    async fn list_gifts(&self) -> PResult<Vec<Gift>> {
        self.inner.list_gifts().await
    }

    async fn find_gift(&self, id: Uuid) -> PResult<Option<Gift>> {
        self.inner.find_gift(id).await
    }

    async fn insert_gift(&self, gift: Gift) -> PResult<Gift> {
        self.inner.insert_gift(gift).await
    }

    async fn update_gift_details(&self, gift: Gift) -> PResult<Gift> {
        self.inner.update_gift_details(gift).await
    }

    async fn restock_gift(&self, id: Uuid, units: i32) -> PResult<Gift> {
        self.inner.restock_gift(id, units).await
    }

    async fn conditional_decrement(
        &self,
        gift_id: Uuid,
        order_id: &str,
        reserved_at: DateTime<Utc>,
    ) -> PResult<ReservationOutcome> {
        match self.delay {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                self.inner
                    .conditional_decrement(gift_id, order_id, reserved_at)
                    .await
            }
            None => Err(PromotionError::StoreUnavailable(
                "connection reset".to_string(),
            )),
        }
    }

    async fn release_reservation(&self, gift_id: Uuid, order_id: &str) -> PResult<bool> {
        self.inner.release_reservation(gift_id, order_id).await
    }

    async fn find_reservation(
        &self,
        gift_id: Uuid,
        order_id: &str,
    ) -> PResult<Option<Reservation>> {
        self.inner.find_reservation(gift_id, order_id).await
    }
}

// ============================================================================
// Discount Scenarios
// ============================================================================

#[tokio::test]
async fn test_discount_applies_inside_window_only() {
    let engine = seeded_engine().await;
    let order = OrderSnapshot::new("order-1", dec!(500)).with_item("ring-1", "rings", 1);

    let inside = engine.evaluate_order(&order, day(5)).await.unwrap();
    assert_eq!(inside.discounts.len(), 1);
    assert_eq!(inside.discounts["rings"].discount_percent, dec!(20));

    let after = engine.evaluate_order(&order, day(11)).await.unwrap();
    assert!(after.discounts.is_empty());
}

#[tokio::test]
async fn test_unknown_category_fails_before_reserving() {
    let engine = seeded_engine().await;
    let g = engine
        .catalog()
        .create_gift(gift(GiftConditionType::None, "", 3))
        .await
        .unwrap();

    let order = OrderSnapshot::new("order-1", dec!(500)).with_item("watch-1", "watches", 1);
    let result = engine.evaluate_order(&order, day(1)).await;

    assert!(matches!(result, Err(PromotionError::NotFound { .. })));
    assert_eq!(engine.catalog().get_gift(g.id).await.unwrap().stock, 3);
}

// ============================================================================
// Gift Scenarios
// ============================================================================

#[tokio::test]
async fn test_category_gift_requires_matching_line_item() {
    let engine = seeded_engine().await;
    let g = engine
        .catalog()
        .create_gift(gift(GiftConditionType::Category, "bangles", 5))
        .await
        .unwrap();

    let rings_only = OrderSnapshot::new("order-1", dec!(100)).with_item("ring-1", "rings", 1);
    let result = engine.evaluate_order(&rings_only, day(1)).await.unwrap();
    assert!(result.awarded_gifts.is_empty());
    assert!(result.rejected_gifts.is_empty());

    let mixed = OrderSnapshot::new("order-2", dec!(100))
        .with_item("ring-1", "rings", 1)
        .with_item("bangle-1", "bangles", 1);
    let result = engine.evaluate_order(&mixed, day(1)).await.unwrap();
    assert_eq!(result.awarded_gifts.len(), 1);
    assert_eq!(result.awarded_gifts[0].gift_id, g.id);
    assert_eq!(result.awarded_gifts[0].order_id, "order-2");
}

#[tokio::test]
async fn test_last_unit_goes_to_first_order() {
    let engine = seeded_engine().await;
    let g = engine
        .catalog()
        .create_gift(gift(GiftConditionType::Amount, "1000", 1))
        .await
        .unwrap();

    let first = engine
        .evaluate_order(&OrderSnapshot::new("order-1", dec!(1200)), day(1))
        .await
        .unwrap();
    assert_eq!(first.awarded_gifts.len(), 1);

    let second = engine
        .evaluate_order(&OrderSnapshot::new("order-2", dec!(1500)), day(1))
        .await
        .unwrap();
    assert!(second.awarded_gifts.is_empty());
    assert_eq!(second.rejected_gifts.len(), 1);
    assert_eq!(second.rejected_gifts[0].gift_id, g.id);
    assert_eq!(second.rejected_gifts[0].reason, RejectionReason::OutOfStock);

    // Still out of stock once the cache has caught up
    let third = engine
        .evaluate_order(&OrderSnapshot::new("order-3", dec!(2000)), day(1))
        .await
        .unwrap();
    assert_eq!(third.rejected_gifts[0].reason, RejectionReason::OutOfStock);
}

#[tokio::test]
async fn test_malformed_gift_does_not_block_others() {
    let store = Arc::new(InMemoryPromotionStore::new());
    let engine = engine_over(store.clone());

    // Inserted directly: the catalog would refuse this condition
    let now = day(0);
    let broken = store
        .insert_gift(Gift {
            id: Uuid::new_v4(),
            name: "Broken".to_string(),
            code: None,
            description: None,
            condition_type: GiftConditionType::Amount,
            condition_value: "lots".to_string(),
            stock: 5,
            image_url: None,
            status: GiftStatus::Active,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    let good = engine
        .catalog()
        .create_gift(gift(GiftConditionType::None, "", 5))
        .await
        .unwrap();

    let result = engine
        .evaluate_order(&OrderSnapshot::new("order-1", dec!(10)), day(1))
        .await
        .unwrap();

    assert_eq!(result.awarded_gifts.len(), 1);
    assert_eq!(result.awarded_gifts[0].gift_id, good.id);
    assert_eq!(result.rejected_gifts.len(), 1);
    assert_eq!(result.rejected_gifts[0].gift_id, broken.id);
    assert!(matches!(
        result.rejected_gifts[0].reason,
        RejectionReason::ConfigurationError { .. }
    ));
    assert_eq!(store.find_gift(broken.id).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn test_inactive_gift_is_ignored() {
    let engine = seeded_engine().await;
    let mut request = gift(GiftConditionType::None, "", 5);
    request.status = GiftStatus::Inactive;
    engine.catalog().create_gift(request).await.unwrap();

    let result = engine
        .evaluate_order(&OrderSnapshot::new("order-1", dec!(10)), day(1))
        .await
        .unwrap();
    assert!(result.awarded_gifts.is_empty());
    assert!(result.rejected_gifts.is_empty());
}

// ============================================================================
// Store Failures
// ============================================================================

#[tokio::test]
async fn test_store_failure_becomes_retryable_rejection() {
    let store = Arc::new(FaultyStore {
        inner: InMemoryPromotionStore::new(),
        delay: None,
    });
    let engine = engine_over(store);
    engine.catalog().create_category(category("rings")).await.unwrap();
    engine.catalog().create_discount(ring_week()).await.unwrap();
    engine
        .catalog()
        .create_gift(gift(GiftConditionType::None, "", 5))
        .await
        .unwrap();

    let order = OrderSnapshot::new("order-1", dec!(10)).with_item("ring-1", "rings", 1);
    let result = engine.evaluate_order(&order, day(1)).await.unwrap();

    assert_eq!(result.discounts.len(), 1);
    assert!(result.awarded_gifts.is_empty());
    assert_eq!(result.rejected_gifts.len(), 1);
    assert!(result.rejected_gifts[0].reason.is_retryable());
    assert_eq!(engine.metrics().summary().reservation_failures, 1);
}

#[tokio::test]
async fn test_slow_store_times_out_without_claiming_out_of_stock() {
    let store = Arc::new(FaultyStore {
        inner: InMemoryPromotionStore::new(),
        delay: Some(Duration::from_millis(500)),
    });
    let engine = PromotionEngine::with_settings(
        store,
        Arc::new(FixedClock::new(day(0))),
        Arc::new(NoopNotifier),
        EngineSettings {
            store_timeout: Duration::from_millis(50),
            ..EngineSettings::default()
        },
    );
    engine
        .catalog()
        .create_gift(gift(GiftConditionType::None, "", 5))
        .await
        .unwrap();

    let result = engine
        .evaluate_order(&OrderSnapshot::new("order-1", dec!(10)), day(1))
        .await
        .unwrap();

    assert_eq!(result.rejected_gifts.len(), 1);
    assert!(matches!(
        result.rejected_gifts[0].reason,
        RejectionReason::StoreUnavailable { .. }
    ));
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_award_is_notified_once() {
    let (notifier, mut events) = ChannelNotifier::channel(16);
    let engine = PromotionEngine::new(
        Arc::new(InMemoryPromotionStore::new()),
        Arc::new(FixedClock::new(day(0))),
        Arc::new(notifier),
    );
    let g = engine
        .catalog()
        .create_gift(gift(GiftConditionType::None, "", 5))
        .await
        .unwrap();

    let order = OrderSnapshot::new("order-1", dec!(10));
    let first = engine.evaluate_order(&order, day(1)).await.unwrap();
    let second = engine.evaluate_order(&order, day(1)).await.unwrap();
    assert_eq!(first.awarded_gifts, second.awarded_gifts);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap();
    assert_eq!(event, Some(PromotionEvent::gift_awarded(g.id, "order-1")));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(engine.catalog().get_gift(g.id).await.unwrap().stock, 4);
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_evaluation() {
    let (notifier, events) = ChannelNotifier::channel(1);
    drop(events);

    let engine = PromotionEngine::new(
        Arc::new(InMemoryPromotionStore::new()),
        Arc::new(FixedClock::new(day(0))),
        Arc::new(notifier),
    );
    engine
        .catalog()
        .create_gift(gift(GiftConditionType::None, "", 5))
        .await
        .unwrap();

    let result = engine
        .evaluate_order(&OrderSnapshot::new("order-1", dec!(10)), day(1))
        .await
        .unwrap();
    assert_eq!(result.awarded_gifts.len(), 1);

    let mut failures = 0;
    for _ in 0..100 {
        failures = engine.metrics().summary().notification_failures;
        if failures > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(failures, 1);
}
