// Domain type definitions for the promotions engine
// Provides shared enums used across the matcher, reservation and facade

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a gift's `condition_value` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GiftConditionType {
    /// Every order qualifies; the value is ignored
    None,

    /// Order total must reach a minimum; the value is a decimal string
    Amount,

    /// Order must contain a product; the value is a product id
    Product,

    /// Order must contain a product from a category; the value is a category id
    Category,
}

impl fmt::Display for GiftConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiftConditionType::None => write!(f, "none"),
            GiftConditionType::Amount => write!(f, "amount"),
            GiftConditionType::Product => write!(f, "product"),
            GiftConditionType::Category => write!(f, "category"),
        }
    }
}

impl std::str::FromStr for GiftConditionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(GiftConditionType::None),
            "amount" => Ok(GiftConditionType::Amount),
            "product" => Ok(GiftConditionType::Product),
            "category" => Ok(GiftConditionType::Category),
            _ => Err(format!("Invalid gift condition type: {}", s)),
        }
    }
}

impl Default for GiftConditionType {
    fn default() -> Self {
        GiftConditionType::None
    }
}

/// Merchandising switch for a gift, independent of its stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GiftStatus {
    Active,
    Inactive,
}

impl fmt::Display for GiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiftStatus::Active => write!(f, "active"),
            GiftStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for GiftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(GiftStatus::Active),
            "inactive" => Ok(GiftStatus::Inactive),
            _ => Err(format!("Invalid gift status: {}", s)),
        }
    }
}

impl Default for GiftStatus {
    fn default() -> Self {
        GiftStatus::Active
    }
}

/// Why a matched gift was not awarded to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Stock reached zero before this order's reservation
    OutOfStock,

    /// Gift disappeared between matching and reservation
    NotFound,

    /// Gift was deactivated after the catalog snapshot was taken
    Unavailable,

    /// Gift's condition could not be interpreted
    ConfigurationError { message: String },

    /// Store failed or timed out; the caller may retry the order
    StoreUnavailable { message: String },
}

impl RejectionReason {
    /// Whether re-submitting the order could change the outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, RejectionReason::StoreUnavailable { .. })
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::OutOfStock => write!(f, "out_of_stock"),
            RejectionReason::NotFound => write!(f, "not_found"),
            RejectionReason::Unavailable => write!(f, "unavailable"),
            RejectionReason::ConfigurationError { message } => {
                write!(f, "configuration_error: {}", message)
            }
            RejectionReason::StoreUnavailable { message } => {
                write!(f, "store_unavailable: {}", message)
            }
        }
    }
}

/// A gift that was matched but not awarded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedGift {
    pub gift_id: Uuid,
    pub reason: RejectionReason,
}
