// In-memory Promotion Store
//
// Reference implementation of `PromotionStore` for tests and embedders.
// Every mutation runs inside a single write-lock critical section, which is
// what makes the conditional decrement atomic here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{PResult, PromotionError};
use crate::promotions::models::{Category, Discount, Gift, GiftCategory, Reservation};
use crate::promotions::reservation::ReservationOutcome;
use crate::promotions::types::GiftStatus;
use crate::store::PromotionStore;

#[derive(Debug, Default)]
struct MemoryState {
    categories: Vec<Category>,
    gift_categories: Vec<GiftCategory>,
    discounts: Vec<Discount>,
    gifts: Vec<Gift>,
    reservations: HashMap<(Uuid, String), Reservation>,
}

impl MemoryState {
    fn gift_mut(&mut self, id: Uuid) -> PResult<&mut Gift> {
        self.gifts
            .iter_mut()
            .find(|gift| gift.id == id)
            .ok_or_else(|| PromotionError::not_found("Gift", id))
    }
}

/// Process-local store backed by vectors in insertion order
#[derive(Debug, Default)]
pub struct InMemoryPromotionStore {
    state: RwLock<MemoryState>,
}

impl InMemoryPromotionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reservations currently held, across all gifts
    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }
}

#[async_trait]
impl PromotionStore for InMemoryPromotionStore {
    async fn list_categories(&self) -> PResult<Vec<Category>> {
        Ok(self.state.read().await.categories.clone())
    }

    async fn find_category(&self, id: &str) -> PResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_category(&self, category: Category) -> PResult<Category> {
        let mut state = self.state.write().await;

        if state
            .categories
            .iter()
            .any(|c| c.id == category.id || c.slug == category.slug)
        {
            return Err(PromotionError::Conflict(format!(
                "Category id '{}' or slug '{}' already exists",
                category.id, category.slug
            )));
        }

        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category_display(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> PResult<Category> {
        let mut state = self.state.write().await;
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PromotionError::not_found("Category", id))?;

        category.name = name.to_string();
        category.image_url = image_url.map(str::to_string);
        Ok(category.clone())
    }

    async fn delete_category(&self, id: &str) -> PResult<()> {
        let mut state = self.state.write().await;

        if !state.categories.iter().any(|c| c.id == id) {
            return Err(PromotionError::not_found("Category", id));
        }
        if state
            .discounts
            .iter()
            .any(|d| d.category_id.as_deref() == Some(id))
        {
            return Err(PromotionError::Conflict(format!(
                "Category '{}' is referenced by a discount",
                id
            )));
        }

        state.categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn list_gift_categories(&self) -> PResult<Vec<GiftCategory>> {
        Ok(self.state.read().await.gift_categories.clone())
    }

    async fn insert_gift_category(&self, category: GiftCategory) -> PResult<GiftCategory> {
        let mut state = self.state.write().await;

        if state
            .gift_categories
            .iter()
            .any(|c| c.id == category.id || c.slug == category.slug)
        {
            return Err(PromotionError::Conflict(format!(
                "Gift category slug '{}' already exists",
                category.slug
            )));
        }

        state.gift_categories.push(category.clone());
        Ok(category)
    }

    async fn list_discounts(&self) -> PResult<Vec<Discount>> {
        Ok(self.state.read().await.discounts.clone())
    }

    async fn find_discount(&self, id: Uuid) -> PResult<Option<Discount>> {
        let state = self.state.read().await;
        Ok(state.discounts.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_discount(&self, discount: Discount) -> PResult<Discount> {
        let mut state = self.state.write().await;

        if state.discounts.iter().any(|d| d.id == discount.id) {
            return Err(PromotionError::Conflict(format!(
                "Discount {} already exists",
                discount.id
            )));
        }
        if let Some(category_id) = discount.category_id.as_deref() {
            if !state.categories.iter().any(|c| c.id == category_id) {
                return Err(PromotionError::not_found("Category", category_id));
            }
        }

        state.discounts.push(discount.clone());
        Ok(discount)
    }

    async fn update_discount(&self, discount: Discount) -> PResult<Discount> {
        let mut state = self.state.write().await;

        if let Some(category_id) = discount.category_id.as_deref() {
            if !state.categories.iter().any(|c| c.id == category_id) {
                return Err(PromotionError::not_found("Category", category_id));
            }
        }

        let existing = state
            .discounts
            .iter_mut()
            .find(|d| d.id == discount.id)
            .ok_or_else(|| PromotionError::not_found("Discount", discount.id))?;

        let created_at = existing.created_at;
        *existing = Discount {
            created_at,
            ..discount
        };
        Ok(existing.clone())
    }

    async fn delete_discount(&self, id: Uuid) -> PResult<bool> {
        let mut state = self.state.write().await;
        let before = state.discounts.len();
        state.discounts.retain(|d| d.id != id);
        Ok(state.discounts.len() != before)
    }

    async fn list_gifts(&self) -> PResult<Vec<Gift>> {
        Ok(self.state.read().await.gifts.clone())
    }

    async fn find_gift(&self, id: Uuid) -> PResult<Option<Gift>> {
        let state = self.state.read().await;
        Ok(state.gifts.iter().find(|g| g.id == id).cloned())
    }

    async fn insert_gift(&self, gift: Gift) -> PResult<Gift> {
        let mut state = self.state.write().await;

        if state.gifts.iter().any(|g| g.id == gift.id) {
            return Err(PromotionError::Conflict(format!("Gift {} already exists", gift.id)));
        }
        if let Some(code) = gift.code.as_deref() {
            if state.gifts.iter().any(|g| g.code.as_deref() == Some(code)) {
                return Err(PromotionError::Conflict(format!(
                    "Gift code '{}' already exists",
                    code
                )));
            }
        }

        state.gifts.push(gift.clone());
        Ok(gift)
    }

    async fn update_gift_details(&self, gift: Gift) -> PResult<Gift> {
        let mut state = self.state.write().await;

        if let Some(code) = gift.code.as_deref() {
            if state
                .gifts
                .iter()
                .any(|g| g.id != gift.id && g.code.as_deref() == Some(code))
            {
                return Err(PromotionError::Conflict(format!(
                    "Gift code '{}' already exists",
                    code
                )));
            }
        }

        let existing = state.gift_mut(gift.id)?;
        let stock = existing.stock;
        let created_at = existing.created_at;
        *existing = Gift {
            stock,
            created_at,
            ..gift
        };
        Ok(existing.clone())
    }

    async fn restock_gift(&self, id: Uuid, units: i32) -> PResult<Gift> {
        let mut state = self.state.write().await;
        let gift = state.gift_mut(id)?;

        gift.stock = gift
            .stock
            .checked_add(units)
            .ok_or_else(|| PromotionError::Validation("Stock would overflow".to_string()))?;
        Ok(gift.clone())
    }

    async fn conditional_decrement(
        &self,
        gift_id: Uuid,
        order_id: &str,
        reserved_at: DateTime<Utc>,
    ) -> PResult<ReservationOutcome> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let key = (gift_id, order_id.to_string());

        let Some(gift) = state.gifts.iter_mut().find(|g| g.id == gift_id) else {
            return Ok(ReservationOutcome::NotFound);
        };

        if let Some(existing) = state.reservations.get(&key) {
            return Ok(ReservationOutcome::AlreadyReserved(existing.clone()));
        }

        if gift.status != GiftStatus::Active {
            return Ok(ReservationOutcome::Unavailable);
        }
        if gift.stock <= 0 {
            return Ok(ReservationOutcome::OutOfStock);
        }
        gift.stock -= 1;

        let reservation = Reservation {
            gift_id,
            order_id: order_id.to_string(),
            reserved_at,
        };
        state.reservations.insert(key, reservation.clone());
        Ok(ReservationOutcome::Reserved(reservation))
    }

    async fn release_reservation(&self, gift_id: Uuid, order_id: &str) -> PResult<bool> {
        let mut state = self.state.write().await;

        if state
            .reservations
            .remove(&(gift_id, order_id.to_string()))
            .is_none()
        {
            return Ok(false);
        }

        let gift = state.gift_mut(gift_id)?;
        gift.stock += 1;
        Ok(true)
    }

    async fn find_reservation(
        &self,
        gift_id: Uuid,
        order_id: &str,
    ) -> PResult<Option<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .get(&(gift_id, order_id.to_string()))
            .cloned())
    }
}
