// PostgreSQL Promotion Store
//
// `PromotionStore` over a sqlx connection pool. The reservation primitives run
// in a single transaction: the (gift, order) row is claimed with
// INSERT .. ON CONFLICT DO NOTHING, then stock is decremented with a guarded
// UPDATE that also requires the gift to be active. Stock is never read and
// written back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{PResult, PromotionError};
use crate::promotions::models::{Category, Discount, Gift, GiftCategory, Reservation};
use crate::promotions::reservation::ReservationOutcome;
use crate::promotions::types::GiftStatus;
use crate::store::PromotionStore;

const CATEGORY_COLUMNS: &str = "id, name, slug, image_url";

const GIFT_CATEGORY_COLUMNS: &str = "id, name, subtitle, slug, image_url, display_gradient";

const DISCOUNT_COLUMNS: &str = "id, title, description, discount_percent, category_id, \
     banner_image, active, valid_from, valid_to, created_at, updated_at";

const GIFT_COLUMNS: &str = "id, name, code, description, condition_type, condition_value, \
     stock, image_url, status, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// Maps a unique violation to `Conflict`, leaving other failures as store errors
fn conflict_on_duplicate(err: sqlx::Error, what: String) -> PromotionError {
    if has_code(&err, UNIQUE_VIOLATION) {
        PromotionError::Conflict(format!("{} already exists", what))
    } else {
        PromotionError::Store(err)
    }
}

/// Store backed by the `categories`, `discounts`, `gifts` and
/// `gift_reservations` tables
#[derive(Clone)]
pub struct PgPromotionStore {
    pool: PgPool,
}

impl PgPromotionStore {
    /// Create a new PgPromotionStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PromotionStore for PgPromotionStore {
    async fn list_categories(&self) -> PResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories ORDER BY seq",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn find_category(&self, id: &str) -> PResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn insert_category(&self, category: Category) -> PResult<Category> {
        let inserted = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (id, name, slug, image_url) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(
                e,
                format!("Category id '{}' or slug '{}'", category.id, category.slug),
            )
        })?;

        Ok(inserted)
    }

    async fn update_category_display(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> PResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET name = $2, image_url = $3 WHERE id = $1 RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(image_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PromotionError::not_found("Category", id))
    }

    async fn delete_category(&self, id: &str) -> PResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if has_code(&e, FOREIGN_KEY_VIOLATION) {
                    PromotionError::Conflict(format!(
                        "Category '{}' is referenced by a discount",
                        id
                    ))
                } else {
                    PromotionError::Store(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(PromotionError::not_found("Category", id));
        }
        Ok(())
    }

    async fn list_gift_categories(&self) -> PResult<Vec<GiftCategory>> {
        let categories = sqlx::query_as::<_, GiftCategory>(&format!(
            "SELECT {} FROM gift_categories ORDER BY seq",
            GIFT_CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn insert_gift_category(&self, category: GiftCategory) -> PResult<GiftCategory> {
        let inserted = sqlx::query_as::<_, GiftCategory>(&format!(
            "INSERT INTO gift_categories (id, name, subtitle, slug, image_url, display_gradient) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            GIFT_CATEGORY_COLUMNS
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.subtitle)
        .bind(&category.slug)
        .bind(&category.image_url)
        .bind(&category.display_gradient)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, format!("Gift category slug '{}'", category.slug)))?;

        Ok(inserted)
    }

    async fn list_discounts(&self) -> PResult<Vec<Discount>> {
        let discounts = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {} FROM discounts ORDER BY seq",
            DISCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(discounts)
    }

    async fn find_discount(&self, id: Uuid) -> PResult<Option<Discount>> {
        let discount = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {} FROM discounts WHERE id = $1",
            DISCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(discount)
    }

    async fn insert_discount(&self, discount: Discount) -> PResult<Discount> {
        let category_id = discount.category_id.clone();

        let inserted = sqlx::query_as::<_, Discount>(&format!(
            r#"
            INSERT INTO discounts (
                id, title, description, discount_percent, category_id, banner_image,
                active, valid_from, valid_to, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            DISCOUNT_COLUMNS
        ))
        .bind(discount.id)
        .bind(&discount.title)
        .bind(&discount.description)
        .bind(discount.discount_percent)
        .bind(&discount.category_id)
        .bind(&discount.banner_image)
        .bind(discount.active)
        .bind(discount.valid_from)
        .bind(discount.valid_to)
        .bind(discount.created_at)
        .bind(discount.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, FOREIGN_KEY_VIOLATION) {
                PromotionError::not_found("Category", category_id.unwrap_or_default())
            } else {
                conflict_on_duplicate(e, format!("Discount {}", discount.id))
            }
        })?;

        Ok(inserted)
    }

    async fn update_discount(&self, discount: Discount) -> PResult<Discount> {
        let category_id = discount.category_id.clone();

        sqlx::query_as::<_, Discount>(&format!(
            r#"
            UPDATE discounts
            SET title = $2, description = $3, discount_percent = $4, category_id = $5,
                banner_image = $6, active = $7, valid_from = $8, valid_to = $9, updated_at = $10
            WHERE id = $1
            RETURNING {}
            "#,
            DISCOUNT_COLUMNS
        ))
        .bind(discount.id)
        .bind(&discount.title)
        .bind(&discount.description)
        .bind(discount.discount_percent)
        .bind(&discount.category_id)
        .bind(&discount.banner_image)
        .bind(discount.active)
        .bind(discount.valid_from)
        .bind(discount.valid_to)
        .bind(discount.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, FOREIGN_KEY_VIOLATION) {
                PromotionError::not_found("Category", category_id.unwrap_or_default())
            } else {
                PromotionError::Store(e)
            }
        })?
        .ok_or_else(|| PromotionError::not_found("Discount", discount.id))
    }

    async fn delete_discount(&self, id: Uuid) -> PResult<bool> {
        let result = sqlx::query("DELETE FROM discounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_gifts(&self) -> PResult<Vec<Gift>> {
        let gifts = sqlx::query_as::<_, Gift>(&format!(
            "SELECT {} FROM gifts ORDER BY seq",
            GIFT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(gifts)
    }

    async fn find_gift(&self, id: Uuid) -> PResult<Option<Gift>> {
        let gift = sqlx::query_as::<_, Gift>(&format!(
            "SELECT {} FROM gifts WHERE id = $1",
            GIFT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(gift)
    }

    async fn insert_gift(&self, gift: Gift) -> PResult<Gift> {
        let inserted = sqlx::query_as::<_, Gift>(&format!(
            r#"
            INSERT INTO gifts (
                id, name, code, description, condition_type, condition_value,
                stock, image_url, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            GIFT_COLUMNS
        ))
        .bind(gift.id)
        .bind(&gift.name)
        .bind(&gift.code)
        .bind(&gift.description)
        .bind(gift.condition_type)
        .bind(&gift.condition_value)
        .bind(gift.stock)
        .bind(&gift.image_url)
        .bind(gift.status)
        .bind(gift.created_at)
        .bind(gift.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(
                e,
                format!("Gift {} or code '{}'", gift.id, gift.code.as_deref().unwrap_or("")),
            )
        })?;

        Ok(inserted)
    }

    async fn update_gift_details(&self, gift: Gift) -> PResult<Gift> {
        sqlx::query_as::<_, Gift>(&format!(
            r#"
            UPDATE gifts
            SET name = $2, code = $3, description = $4, condition_type = $5,
                condition_value = $6, image_url = $7, status = $8, updated_at = $9
            WHERE id = $1
            RETURNING {}
            "#,
            GIFT_COLUMNS
        ))
        .bind(gift.id)
        .bind(&gift.name)
        .bind(&gift.code)
        .bind(&gift.description)
        .bind(gift.condition_type)
        .bind(&gift.condition_value)
        .bind(&gift.image_url)
        .bind(gift.status)
        .bind(gift.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(
                e,
                format!("Gift code '{}'", gift.code.as_deref().unwrap_or("")),
            )
        })?
        .ok_or_else(|| PromotionError::not_found("Gift", gift.id))
    }

    async fn restock_gift(&self, id: Uuid, units: i32) -> PResult<Gift> {
        sqlx::query_as::<_, Gift>(&format!(
            "UPDATE gifts SET stock = stock + $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            GIFT_COLUMNS
        ))
        .bind(id)
        .bind(units)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PromotionError::not_found("Gift", id))
    }

    async fn conditional_decrement(
        &self,
        gift_id: Uuid,
        order_id: &str,
        reserved_at: DateTime<Utc>,
    ) -> PResult<ReservationOutcome> {
        let mut tx = self.pool.begin().await?;

        // Claim the (gift, order) pair first; a concurrent claim for the same
        // pair blocks here until the other transaction finishes
        let claimed = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO gift_reservations (gift_id, order_id, reserved_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (gift_id, order_id) DO NOTHING
            RETURNING gift_id, order_id, reserved_at
            "#,
        )
        .bind(gift_id)
        .bind(order_id)
        .bind(reserved_at)
        .fetch_optional(&mut *tx)
        .await;

        let claimed = match claimed {
            Ok(claimed) => claimed,
            Err(e) if has_code(&e, FOREIGN_KEY_VIOLATION) => {
                return Ok(ReservationOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(reservation) = claimed else {
            let existing = sqlx::query_as::<_, Reservation>(
                "SELECT gift_id, order_id, reserved_at FROM gift_reservations \
                 WHERE gift_id = $1 AND order_id = $2",
            )
            .bind(gift_id)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;

            tx.rollback().await?;

            // Released between the conflict and the lookup
            return existing
                .map(ReservationOutcome::AlreadyReserved)
                .ok_or_else(|| {
                    PromotionError::StoreUnavailable(format!(
                        "Reservation for gift {} and order {} changed concurrently",
                        gift_id, order_id
                    ))
                });
        };

        let decremented = sqlx::query_scalar::<_, i32>(
            "UPDATE gifts SET stock = stock - 1, updated_at = NOW() \
             WHERE id = $1 AND stock > 0 AND status = 'active' RETURNING stock",
        )
        .bind(gift_id)
        .fetch_optional(&mut *tx)
        .await?;

        if decremented.is_none() {
            // Only classifies the refusal; the guarded UPDATE above decided it
            let status =
                sqlx::query_scalar::<_, GiftStatus>("SELECT status FROM gifts WHERE id = $1")
                    .bind(gift_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Ok(match status {
                Some(GiftStatus::Active) => ReservationOutcome::OutOfStock,
                Some(GiftStatus::Inactive) => ReservationOutcome::Unavailable,
                None => ReservationOutcome::NotFound,
            });
        }

        tx.commit().await?;
        Ok(ReservationOutcome::Reserved(reservation))
    }

    async fn release_reservation(&self, gift_id: Uuid, order_id: &str) -> PResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM gift_reservations WHERE gift_id = $1 AND order_id = $2",
        )
        .bind(gift_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE gifts SET stock = stock + 1, updated_at = NOW() WHERE id = $1")
            .bind(gift_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_reservation(
        &self,
        gift_id: Uuid,
        order_id: &str,
    ) -> PResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "SELECT gift_id, order_id, reserved_at FROM gift_reservations \
             WHERE gift_id = $1 AND order_id = $2",
        )
        .bind(gift_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }
}
