// Gift Eligibility Matcher
//
// Determines which gifts an order qualifies for. Matching is pure over a
// catalog snapshot: candidates keep store order, malformed gift conditions
// are reported instead of aborting the match.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PResult;
use crate::promotions::catalog_cache::CatalogCache;
use crate::promotions::models::{Gift, OrderSnapshot};
use crate::promotions::types::{GiftConditionType, GiftStatus};
use crate::promotions::validity::PromotionWindow;

/// A gift whose condition could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftConfigurationError {
    pub gift_id: Uuid,
    pub reason: String,
}

/// Result of matching one order against the gift catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiftMatch {
    /// Gifts the order qualifies for that are currently available, in store order
    pub candidates: Vec<Gift>,

    /// Active gifts the order qualifies for whose stock is already zero
    pub exhausted: Vec<Gift>,

    /// Gifts skipped because their condition is malformed
    pub configuration_errors: Vec<GiftConfigurationError>,
}

impl GiftMatch {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
            && self.exhausted.is_empty()
            && self.configuration_errors.is_empty()
    }
}

/// Gift Eligibility Matcher
pub struct GiftEligibilityMatcher {
    cache: Arc<CatalogCache>,
}

impl GiftEligibilityMatcher {
    /// Create a new GiftEligibilityMatcher
    pub fn new(cache: Arc<CatalogCache>) -> Self {
        Self { cache }
    }

    /// Match an order against the current gift catalog
    pub async fn match_order(
        &self,
        order: &OrderSnapshot,
        now: DateTime<Utc>,
    ) -> PResult<GiftMatch> {
        let gifts = self.cache.gifts().await?;
        let matched = match_gifts(&gifts, order, now);

        for error in &matched.configuration_errors {
            tracing::warn!(
                "Gift {} excluded from matching: {}",
                error.gift_id,
                error.reason
            );
        }
        tracing::debug!(
            "Order {} matched {} gift(s), {} exhausted",
            order.order_id,
            matched.candidates.len(),
            matched.exhausted.len()
        );

        Ok(matched)
    }
}

/// Pure matching over a gift snapshot
///
/// Inactive gifts are skipped before their condition is looked at.
pub fn match_gifts(gifts: &[Gift], order: &OrderSnapshot, now: DateTime<Utc>) -> GiftMatch {
    let mut matched = GiftMatch::default();

    for gift in gifts.iter().filter(|g| g.status == GiftStatus::Active) {
        match condition_matches(gift, order) {
            Ok(false) => {}
            Ok(true) if gift.is_active(now) => matched.candidates.push(gift.clone()),
            Ok(true) => matched.exhausted.push(gift.clone()),
            Err(reason) => matched.configuration_errors.push(GiftConfigurationError {
                gift_id: gift.id,
                reason,
            }),
        }
    }

    matched
}

/// Evaluates a gift's condition against an order
///
/// Returns the reason as `Err` when the condition value cannot be interpreted.
pub fn condition_matches(gift: &Gift, order: &OrderSnapshot) -> Result<bool, String> {
    let value = gift.condition_value.trim();

    match gift.condition_type {
        GiftConditionType::None => Ok(true),
        GiftConditionType::Amount => {
            let threshold = parse_amount_threshold(value)?;
            Ok(order.total_amount >= threshold)
        }
        GiftConditionType::Product => {
            if value.is_empty() {
                return Err("product condition has no product id".to_string());
            }
            Ok(order.contains_product(value))
        }
        GiftConditionType::Category => {
            if value.is_empty() {
                return Err("category condition has no category id".to_string());
            }
            Ok(order.contains_category(value))
        }
    }
}

/// Parses a minimum order total; rejects blanks, non-numbers and negatives
pub fn parse_amount_threshold(value: &str) -> Result<Decimal, String> {
    let trimmed = value.trim();
    let threshold = Decimal::from_str(trimmed)
        .map_err(|_| format!("amount threshold '{}' is not a number", trimmed))?;

    if threshold < Decimal::ZERO {
        return Err(format!("amount threshold '{}' is negative", trimmed));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gift(condition_type: GiftConditionType, value: &str, stock: i32) -> Gift {
        let now = Utc::now();
        Gift {
            id: Uuid::new_v4(),
            name: format!("{} gift", condition_type),
            code: None,
            description: None,
            condition_type,
            condition_value: value.to_string(),
            stock,
            image_url: None,
            status: GiftStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(total: Decimal, categories: &[&str]) -> OrderSnapshot {
        categories
            .iter()
            .enumerate()
            .fold(OrderSnapshot::new("order-1", total), |o, (i, c)| {
                o.with_item(format!("p-{}", i), *c, 1)
            })
    }

    #[test]
    fn test_amount_threshold() {
        let g = gift(GiftConditionType::Amount, "1000", 5);
        assert_eq!(condition_matches(&g, &order(dec!(1200), &[])), Ok(true));
        assert_eq!(condition_matches(&g, &order(dec!(1000), &[])), Ok(true));
        assert_eq!(condition_matches(&g, &order(dec!(999.99), &[])), Ok(false));
    }

    #[test]
    fn test_category_condition_scenario() {
        let g = gift(GiftConditionType::Category, "bangles", 5);

        let rings_only = match_gifts(&[g.clone()], &order(dec!(100), &["rings"]), Utc::now());
        assert!(rings_only.candidates.is_empty());

        let both = match_gifts(
            &[g.clone()],
            &order(dec!(100), &["rings", "bangles"]),
            Utc::now(),
        );
        assert_eq!(both.candidates.len(), 1);
        assert_eq!(both.candidates[0].id, g.id);
    }

    #[test]
    fn test_product_condition() {
        let g = gift(GiftConditionType::Product, "p-1", 5);
        let o = order(dec!(10), &["rings", "bangles"]);
        assert_eq!(condition_matches(&g, &o), Ok(true));

        let g = gift(GiftConditionType::Product, "p-9", 5);
        assert_eq!(condition_matches(&g, &o), Ok(false));
    }

    #[test]
    fn test_none_condition_always_matches() {
        let g = gift(GiftConditionType::None, "ignored", 5);
        assert_eq!(condition_matches(&g, &order(dec!(0), &[])), Ok(true));
    }

    #[test]
    fn test_malformed_conditions_are_reported_not_fatal() {
        let bad_amount = gift(GiftConditionType::Amount, "a lot", 5);
        let negative = gift(GiftConditionType::Amount, "-10", 5);
        let empty_category = gift(GiftConditionType::Category, "  ", 5);
        let good = gift(GiftConditionType::None, "", 5);

        let matched = match_gifts(
            &[bad_amount.clone(), negative.clone(), empty_category.clone(), good.clone()],
            &order(dec!(5000), &["rings"]),
            Utc::now(),
        );

        assert_eq!(matched.candidates.len(), 1);
        assert_eq!(matched.candidates[0].id, good.id);

        let reported: Vec<Uuid> = matched.configuration_errors.iter().map(|e| e.gift_id).collect();
        assert_eq!(reported, vec![bad_amount.id, negative.id, empty_category.id]);
    }

    #[test]
    fn test_exhausted_and_inactive_gifts() {
        let exhausted = gift(GiftConditionType::None, "", 0);
        let mut inactive = gift(GiftConditionType::None, "", 5);
        inactive.status = GiftStatus::Inactive;
        let mut inactive_malformed = gift(GiftConditionType::Amount, "oops", 5);
        inactive_malformed.status = GiftStatus::Inactive;

        let matched = match_gifts(
            &[exhausted.clone(), inactive, inactive_malformed],
            &order(dec!(10), &[]),
            Utc::now(),
        );

        assert!(matched.candidates.is_empty());
        assert!(matched.configuration_errors.is_empty());
        assert_eq!(matched.exhausted.len(), 1);
        assert_eq!(matched.exhausted[0].id, exhausted.id);
    }

    #[test]
    fn test_candidates_keep_store_order() {
        let gifts: Vec<Gift> = (0..5).map(|_| gift(GiftConditionType::None, "", 1)).collect();
        let matched = match_gifts(&gifts, &order(dec!(1), &[]), Utc::now());

        let expected: Vec<Uuid> = gifts.iter().map(|g| g.id).collect();
        let actual: Vec<Uuid> = matched.candidates.iter().map(|g| g.id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_parse_amount_threshold() {
        assert_eq!(parse_amount_threshold(" 1000.50 "), Ok(dec!(1000.50)));
        assert_eq!(parse_amount_threshold("0"), Ok(dec!(0)));
        assert!(parse_amount_threshold("").is_err());
        assert!(parse_amount_threshold("12abc").is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_gift() -> impl Strategy<Value = Gift> {
            (
                prop_oneof![
                    Just(GiftConditionType::None),
                    Just(GiftConditionType::Amount),
                    Just(GiftConditionType::Product),
                    Just(GiftConditionType::Category),
                ],
                prop_oneof![
                    Just("500".to_string()),
                    Just("rings".to_string()),
                    Just("p-0".to_string()),
                    Just("bad".to_string()),
                ],
                0i32..3,
            )
                .prop_map(|(kind, value, stock)| gift(kind, &value, stock))
        }

        proptest! {
            #[test]
            fn prop_matching_is_deterministic(
                gifts in proptest::collection::vec(arb_gift(), 0..10),
                total in 0i64..2_000,
            ) {
                let o = order(Decimal::from(total), &["rings", "bangles"]);
                let now = Utc::now();
                prop_assert_eq!(match_gifts(&gifts, &o, now), match_gifts(&gifts, &o, now));
            }

            #[test]
            fn prop_candidates_are_available(
                gifts in proptest::collection::vec(arb_gift(), 0..10),
                total in 0i64..2_000,
            ) {
                let o = order(Decimal::from(total), &["rings"]);
                let now = Utc::now();
                let matched = match_gifts(&gifts, &o, now);
                for candidate in &matched.candidates {
                    prop_assert!(candidate.is_active(now));
                }
                for gift in &matched.exhausted {
                    prop_assert_eq!(gift.stock, 0);
                }
            }
        }
    }
}
