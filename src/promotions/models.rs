use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::promotions::types::{GiftConditionType, GiftStatus};
use crate::validation::{validate_discount_percent, validate_gift_code, validate_slug};

/// Canonical catalog category referenced by discounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Unique, lowercase
    pub slug: String,
    pub image_url: Option<String>,
}

/// Presentational grouping of gifts; carries no eligibility semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GiftCategory {
    pub id: Uuid,
    pub name: String,
    pub subtitle: Option<String>,
    pub slug: String,
    pub image_url: Option<String>,
    pub display_gradient: String,
}

/// Percentage price reduction, optionally scoped to one category
///
/// A discount without `category_id` is store-wide. Expiry is never stored; it is
/// derived from `valid_to` at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Discount {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// In (0, 100]
    pub discount_percent: Decimal,
    pub category_id: Option<String>,
    pub banner_image: Option<String>,
    pub active: bool,
    pub valid_from: DateTime<Utc>,
    /// None means the window never closes
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    pub fn is_store_wide(&self) -> bool {
        self.category_id.is_none()
    }

    /// Whether this discount targets the given category (store-wide discounts target every category)
    pub fn targets(&self, category_id: Option<&str>) -> bool {
        match self.category_id.as_deref() {
            None => true,
            Some(own) => Some(own) == category_id,
        }
    }
}

/// Stock-limited bonus item awarded when an order meets its condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Gift {
    pub id: Uuid,
    pub name: String,
    /// Unique, uppercase
    pub code: Option<String>,
    pub description: Option<String>,
    pub condition_type: GiftConditionType,
    pub condition_value: String,
    /// Never negative; only reservations decrement it
    pub stock: i32,
    pub image_url: Option<String>,
    pub status: GiftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One cart line as seen by the promotions engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub category_id: String,
    pub quantity: u32,
}

/// Read-only view of a finalized order, supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub total_amount: Decimal,
    pub line_items: Vec<LineItem>,
}

impl OrderSnapshot {
    pub fn new(order_id: impl Into<String>, total_amount: Decimal) -> Self {
        Self {
            order_id: order_id.into(),
            total_amount,
            line_items: Vec::new(),
        }
    }

    /// Builder-style helper for appending a line item
    pub fn with_item(
        mut self,
        product_id: impl Into<String>,
        category_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        self.line_items.push(LineItem {
            product_id: product_id.into(),
            category_id: category_id.into(),
            quantity,
        });
        self
    }

    /// Distinct category ids in first-seen order
    pub fn distinct_category_ids(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for item in &self.line_items {
            if !seen.contains(&item.category_id.as_str()) {
                seen.push(&item.category_id);
            }
        }
        seen
    }

    pub fn contains_product(&self, product_id: &str) -> bool {
        self.line_items.iter().any(|item| item.product_id == product_id)
    }

    pub fn contains_category(&self, category_id: &str) -> bool {
        self.line_items.iter().any(|item| item.category_id == category_id)
    }
}

/// Durable record that an order holds one unit of a gift
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub gift_id: Uuid,
    pub order_id: String,
    pub reserved_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Request DTO for registering a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 64, message = "Category id must be 1-64 characters"))]
    pub id: String,
    #[validate(length(min = 1, max = 120, message = "Category name must be 1-120 characters"))]
    pub name: String,
    #[validate(custom = "validate_slug")]
    pub slug: String,
    pub image_url: Option<String>,
}

/// Request DTO for creating a gift category
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewGiftCategory {
    /// Fixed id for idempotent seeding; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 120, message = "Gift category name must be 1-120 characters"))]
    pub name: String,
    pub subtitle: Option<String>,
    #[validate(custom = "validate_slug")]
    pub slug: String,
    pub image_url: Option<String>,
    /// Falls back to the configured default gradient
    pub display_gradient: Option<String>,
}

/// Request DTO for creating or replacing a discount
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewDiscount {
    /// Fixed id for idempotent seeding; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(custom = "validate_discount_percent")]
    pub discount_percent: Decimal,
    pub category_id: Option<String>,
    pub banner_image: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Defaults to the creation time
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Request DTO for creating a gift
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewGift {
    /// Fixed id for idempotent seeding; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Gift name must be 1-200 characters"))]
    pub name: String,
    #[validate(custom = "validate_gift_code")]
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub condition_type: GiftConditionType,
    #[serde(default)]
    pub condition_value: String,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: GiftStatus,
}

/// Request DTO for editing a gift; stock is deliberately absent
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GiftUpdate {
    #[validate(length(min = 1, max = 200, message = "Gift name must be 1-200 characters"))]
    pub name: String,
    #[validate(custom = "validate_gift_code")]
    pub code: Option<String>,
    pub description: Option<String>,
    pub condition_type: GiftConditionType,
    #[serde(default)]
    pub condition_value: String,
    pub image_url: Option<String>,
    pub status: GiftStatus,
}
