// Validity Window Evaluator
//
// Decides whether a promotional entity is in effect at a given instant.
// Time is always passed in; nothing here reads a clock.

use chrono::{DateTime, Utc};

use crate::promotions::models::{Discount, Gift};
use crate::promotions::types::GiftStatus;

/// An entity whose availability depends on its own state and the evaluation time
pub trait PromotionWindow {
    fn is_active(&self, now: DateTime<Utc>) -> bool;
}

impl PromotionWindow for Discount {
    /// Active flag set, window opened, and window not yet closed (bounds inclusive)
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        if !self.active || now < self.valid_from {
            return false;
        }

        match self.valid_to {
            Some(valid_to) => now <= valid_to,
            None => true,
        }
    }
}

impl PromotionWindow for Gift {
    /// Gifts have no time window: available while Active and in stock
    fn is_active(&self, _now: DateTime<Utc>) -> bool {
        self.status == GiftStatus::Active && self.stock > 0
    }
}

/// Free-function form used by callers that work with trait objects or closures
pub fn is_active<T: PromotionWindow>(entity: &T, now: DateTime<Utc>) -> bool {
    entity.is_active(now)
}
