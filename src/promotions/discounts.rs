// Discount Resolver
//
// Picks the single best discount for a category at a given instant.
// Candidates are discounts in effect that target the category or the whole
// store; the highest percentage wins, then the newest, then the lowest id.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{PResult, PromotionError};
use crate::promotions::catalog_cache::{CatalogCache, CatalogSection};
use crate::promotions::models::Discount;
use crate::promotions::validity::PromotionWindow;
use crate::store::PromotionStore;

/// Discount Resolver
///
/// Reads discounts through the catalog cache and confirms the winners with
/// the store; never writes.
pub struct DiscountResolver {
    cache: Arc<CatalogCache>,
}

impl DiscountResolver {
    /// Create a new DiscountResolver
    pub fn new(cache: Arc<CatalogCache>) -> Self {
        Self { cache }
    }

    /// Best discount in effect for `category_id` at `now`
    ///
    /// With `None`, only store-wide discounts are considered. An unknown
    /// category is a caller error and fails with `NotFound`.
    pub async fn resolve(
        &self,
        category_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> PResult<Option<Discount>> {
        if let Some(id) = category_id {
            self.ensure_category(id).await?;
        }

        let best = self
            .select_current(&[category_id], now)
            .await?
            .into_iter()
            .next()
            .flatten();

        tracing::debug!(
            "Resolved discount for category {:?}: {:?}",
            category_id,
            best.as_ref().map(|d| d.id)
        );
        Ok(best)
    }

    /// Resolves several categories against one discount snapshot
    ///
    /// Every category is checked before any is resolved, so an unknown id
    /// fails the whole call. Categories without a discount are absent from
    /// the returned map.
    pub async fn resolve_many(
        &self,
        category_ids: &[&str],
        now: DateTime<Utc>,
    ) -> PResult<BTreeMap<String, Discount>> {
        for id in category_ids {
            self.ensure_category(id).await?;
        }

        let queries: Vec<Option<&str>> = category_ids.iter().map(|id| Some(*id)).collect();
        let selected = self.select_current(&queries, now).await?;

        Ok(category_ids
            .iter()
            .zip(selected)
            .filter_map(|(id, discount)| discount.map(|d| ((*id).to_string(), d)))
            .collect())
    }

    /// Selects from the cached snapshot, then confirms every winner with the store
    ///
    /// A winner edited, deactivated or deleted since the snapshot was taken
    /// drops the Discounts section and selection runs once more on fresh data.
    async fn select_current(
        &self,
        queries: &[Option<&str>],
        now: DateTime<Utc>,
    ) -> PResult<Vec<Option<Discount>>> {
        let discounts = self.cache.discounts().await?;
        let selected = select_each(&discounts, queries, now);

        if self.winners_current(&selected).await? {
            return Ok(selected);
        }

        tracing::debug!("Cached discounts changed in the store; reloading");
        self.cache.invalidate(CatalogSection::Discounts).await;
        let discounts = self.cache.discounts().await?;
        Ok(select_each(&discounts, queries, now))
    }

    async fn winners_current(&self, selected: &[Option<Discount>]) -> PResult<bool> {
        let mut confirmed = HashSet::new();

        for discount in selected.iter().flatten() {
            if !confirmed.insert(discount.id) {
                continue;
            }
            match self.cache.store().find_discount(discount.id).await? {
                Some(current) if current == *discount => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    async fn ensure_category(&self, id: &str) -> PResult<()> {
        match self.cache.find_category(id).await? {
            Some(_) => Ok(()),
            None => Err(PromotionError::not_found("Category", id)),
        }
    }

    /// Amount taken off `price` by `discount`, rounded to cents
    ///
    /// Never negative and never more than the price itself.
    pub fn discount_amount(price: Decimal, discount: &Discount) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let amount = (price * discount.discount_percent / Decimal::ONE_HUNDRED).round_dp(2);
        amount.clamp(Decimal::ZERO, price)
    }

    /// `price` after applying `discount`, rounded to cents, never negative
    pub fn discounted_price(price: Decimal, discount: &Discount) -> Decimal {
        (price - Self::discount_amount(price, discount))
            .round_dp(2)
            .max(Decimal::ZERO)
    }
}

/// Orders two candidates so that the preferred one compares greater
fn preference(a: &Discount, b: &Discount) -> Ordering {
    a.discount_percent
        .cmp(&b.discount_percent)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

fn select_each(
    discounts: &[Discount],
    queries: &[Option<&str>],
    now: DateTime<Utc>,
) -> Vec<Option<Discount>> {
    queries
        .iter()
        .map(|category_id| select_discount(discounts, *category_id, now).cloned())
        .collect()
}

/// Pure selection over a discount snapshot
pub fn select_discount<'a>(
    discounts: &'a [Discount],
    category_id: Option<&str>,
    now: DateTime<Utc>,
) -> Option<&'a Discount> {
    discounts
        .iter()
        .filter(|d| d.is_active(now) && d.targets(category_id))
        .max_by(|a, b| preference(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotions::models::Category;
    use crate::store::{InMemoryPromotionStore, PromotionStore};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn discount(percent: Decimal, category_id: Option<&str>, created: DateTime<Utc>) -> Discount {
        Discount {
            id: Uuid::new_v4(),
            title: format!("{}% off", percent),
            description: None,
            discount_percent: percent,
            category_id: category_id.map(str::to_string),
            banner_image: None,
            active: true,
            valid_from: day(0),
            valid_to: Some(day(10)),
            created_at: created,
            updated_at: created,
        }
    }

    async fn resolver_with(discounts: Vec<Discount>) -> DiscountResolver {
        let store = Arc::new(InMemoryPromotionStore::new());
        for id in ["rings", "bangles"] {
            store
                .insert_category(Category {
                    id: id.to_string(),
                    name: id.to_string(),
                    slug: id.to_string(),
                    image_url: None,
                })
                .await
                .unwrap();
        }
        for d in discounts {
            store.insert_discount(d).await.unwrap();
        }

        let cache = Arc::new(CatalogCache::new(store, std::time::Duration::ZERO));
        DiscountResolver::new(cache)
    }

    #[tokio::test]
    async fn test_discount_window_scenario() {
        let resolver = resolver_with(vec![discount(dec!(20), Some("rings"), day(0))]).await;

        let found = resolver.resolve(Some("rings"), day(5)).await.unwrap();
        assert_eq!(found.map(|d| d.discount_percent), Some(dec!(20)));

        let expired = resolver.resolve(Some("rings"), day(11)).await.unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_discount_deactivated_behind_the_cache_is_not_applied() {
        let store = Arc::new(InMemoryPromotionStore::new());
        store
            .insert_category(Category {
                id: "rings".to_string(),
                name: "Rings".to_string(),
                slug: "rings".to_string(),
                image_url: None,
            })
            .await
            .unwrap();
        let big = store
            .insert_discount(discount(dec!(30), Some("rings"), day(0)))
            .await
            .unwrap();
        store
            .insert_discount(discount(dec!(10), Some("rings"), day(0)))
            .await
            .unwrap();

        let cache = Arc::new(CatalogCache::new(store.clone(), std::time::Duration::from_secs(600)));
        let resolver = DiscountResolver::new(cache);
        let before = resolver.resolve(Some("rings"), day(1)).await.unwrap();
        assert_eq!(before.map(|d| d.id), Some(big.id));

        // Switched off through the store while the snapshot is still fresh
        store
            .update_discount(Discount {
                active: false,
                ..big.clone()
            })
            .await
            .unwrap();

        let after = resolver.resolve(Some("rings"), day(1)).await.unwrap();
        assert_eq!(after.map(|d| d.discount_percent), Some(dec!(10)));

        let many = resolver.resolve_many(&["rings"], day(1)).await.unwrap();
        assert_eq!(many["rings"].discount_percent, dec!(10));
    }

    #[tokio::test]
    async fn test_unknown_category_is_not_found() {
        let resolver = resolver_with(vec![]).await;
        let result = resolver.resolve(Some("watches"), day(1)).await;
        assert!(matches!(result, Err(PromotionError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_store_wide_discount_applies_to_every_category() {
        let resolver = resolver_with(vec![discount(dec!(5), None, day(0))]).await;

        assert!(resolver.resolve(Some("bangles"), day(1)).await.unwrap().is_some());
        assert!(resolver.resolve(None, day(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_none_query_ignores_scoped_discounts() {
        let resolver = resolver_with(vec![discount(dec!(30), Some("rings"), day(0))]).await;
        assert!(resolver.resolve(None, day(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_many_skips_categories_without_discount() {
        let resolver = resolver_with(vec![discount(dec!(20), Some("rings"), day(0))]).await;

        let resolved = resolver
            .resolve_many(&["rings", "bangles"], day(2))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("rings"));

        let result = resolver.resolve_many(&["rings", "watches"], day(2)).await;
        assert!(matches!(result, Err(PromotionError::NotFound { .. })));
    }

    #[test]
    fn test_highest_percent_wins_over_scope() {
        let scoped = discount(dec!(10), Some("rings"), day(0));
        let store_wide = discount(dec!(15), None, day(0));
        let all = vec![scoped, store_wide.clone()];

        let best = select_discount(&all, Some("rings"), day(1)).unwrap();
        assert_eq!(best.id, store_wide.id);
    }

    #[test]
    fn test_tie_breaks_on_newest_then_lowest_id() {
        let older = discount(dec!(20), Some("rings"), day(0));
        let newer = discount(dec!(20), Some("rings"), day(1));
        let all = vec![older, newer.clone()];
        assert_eq!(select_discount(&all, Some("rings"), day(2)).unwrap().id, newer.id);

        let mut a = discount(dec!(20), Some("rings"), day(0));
        let mut b = discount(dec!(20), Some("rings"), day(0));
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);
        let all = vec![b, a];
        assert_eq!(
            select_discount(&all, Some("rings"), day(2)).unwrap().id,
            Uuid::from_u128(1)
        );
    }

    #[test]
    fn test_discounted_price() {
        let d = discount(dec!(20), None, day(0));
        assert_eq!(DiscountResolver::discount_amount(dec!(199.99), &d), dec!(40.00));
        assert_eq!(DiscountResolver::discounted_price(dec!(199.99), &d), dec!(159.99));

        let full = discount(dec!(100), None, day(0));
        assert_eq!(DiscountResolver::discounted_price(dec!(50), &full), dec!(0));
        assert_eq!(DiscountResolver::discount_amount(dec!(-5), &full), dec!(0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_discount() -> impl Strategy<Value = Discount> {
            (
                any::<bool>(),
                1u32..=100,
                -20i64..20,
                proptest::option::of(0i64..40),
                prop_oneof![Just(None), Just(Some("rings")), Just(Some("bangles"))],
            )
                .prop_map(|(active, percent, from, length, category)| {
                    let valid_from = day(from);
                    let mut d = discount(Decimal::from(percent), category, valid_from);
                    d.active = active;
                    d.valid_from = valid_from;
                    d.valid_to = length.map(|len| valid_from + Duration::days(len));
                    d
                })
        }

        proptest! {
            #[test]
            fn prop_resolver_never_returns_inactive_discount(
                discounts in proptest::collection::vec(arb_discount(), 0..12),
                probe in -30i64..60,
            ) {
                let now = day(probe);
                for category in [None, Some("rings"), Some("bangles")] {
                    if let Some(best) = select_discount(&discounts, category, now) {
                        prop_assert!(best.is_active(now));
                        prop_assert!(best.targets(category));
                    }
                }
            }

            #[test]
            fn prop_selected_discount_has_maximal_percent(
                discounts in proptest::collection::vec(arb_discount(), 1..12),
                probe in -30i64..60,
            ) {
                let now = day(probe);
                if let Some(best) = select_discount(&discounts, Some("rings"), now) {
                    for other in discounts.iter().filter(|d| d.is_active(now) && d.targets(Some("rings"))) {
                        prop_assert!(other.discount_percent <= best.discount_percent);
                    }
                }
            }

            #[test]
            fn prop_discounted_price_stays_in_bounds(
                cents in 0i64..10_000_000,
                percent in 1u32..=100,
            ) {
                let price = Decimal::new(cents, 2);
                let d = discount(Decimal::from(percent), None, day(0));
                let discounted = DiscountResolver::discounted_price(price, &d);
                prop_assert!(discounted >= Decimal::ZERO);
                prop_assert!(discounted <= price);
            }
        }
    }
}
