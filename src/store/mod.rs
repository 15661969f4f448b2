// Promotion Store
//
// Storage seam for the promotions engine. The engine never holds a global
// connection; every component receives an `Arc<dyn PromotionStore>`.
// Stock is only ever changed through `conditional_decrement`,
// `release_reservation` and `restock_gift`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PResult;
use crate::promotions::models::{Category, Discount, Gift, GiftCategory, Reservation};
use crate::promotions::reservation::ReservationOutcome;

pub use memory::InMemoryPromotionStore;
pub use postgres::PgPromotionStore;

/// Persistence operations required by the promotions engine
///
/// List operations return entities in insertion order. Implementations must
/// make `conditional_decrement` and `release_reservation` atomic with respect
/// to every other caller, including other processes sharing the same backend.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    // Categories

    async fn list_categories(&self) -> PResult<Vec<Category>>;

    async fn find_category(&self, id: &str) -> PResult<Option<Category>>;

    /// Fails with `Conflict` when the id or slug is taken
    async fn insert_category(&self, category: Category) -> PResult<Category>;

    /// Only `name` and `image_url` are mutable
    async fn update_category_display(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> PResult<Category>;

    /// Fails with `Conflict` while any discount references the category
    async fn delete_category(&self, id: &str) -> PResult<()>;

    // Gift categories

    async fn list_gift_categories(&self) -> PResult<Vec<GiftCategory>>;

    /// Fails with `Conflict` when the id or slug is taken
    async fn insert_gift_category(&self, category: GiftCategory) -> PResult<GiftCategory>;

    // Discounts

    async fn list_discounts(&self) -> PResult<Vec<Discount>>;

    async fn find_discount(&self, id: Uuid) -> PResult<Option<Discount>>;

    async fn insert_discount(&self, discount: Discount) -> PResult<Discount>;

    /// Replaces every field except `id` and `created_at`
    async fn update_discount(&self, discount: Discount) -> PResult<Discount>;

    /// Returns whether a discount was removed
    async fn delete_discount(&self, id: Uuid) -> PResult<bool>;

    // Gifts

    async fn list_gifts(&self) -> PResult<Vec<Gift>>;

    async fn find_gift(&self, id: Uuid) -> PResult<Option<Gift>>;

    /// Fails with `Conflict` when the id or code is taken
    async fn insert_gift(&self, gift: Gift) -> PResult<Gift>;

    /// Writes every descriptive field; the stored stock is left untouched
    async fn update_gift_details(&self, gift: Gift) -> PResult<Gift>;

    /// Adds `units` to the stock of a gift
    async fn restock_gift(&self, id: Uuid, units: i32) -> PResult<Gift>;

    // Reservations

    /// Records a (gift, order) reservation and decrements stock by one, atomically
    ///
    /// An existing reservation for the pair is returned unchanged without
    /// touching stock. Stock is decremented only while it is positive.
    async fn conditional_decrement(
        &self,
        gift_id: Uuid,
        order_id: &str,
        reserved_at: DateTime<Utc>,
    ) -> PResult<ReservationOutcome>;

    /// Deletes a reservation and returns its unit to stock, atomically
    ///
    /// Returns false when the pair held no reservation.
    async fn release_reservation(&self, gift_id: Uuid, order_id: &str) -> PResult<bool>;

    async fn find_reservation(&self, gift_id: Uuid, order_id: &str)
        -> PResult<Option<Reservation>>;
}
