// Promotion Catalog
//
// Validated management of categories, gift categories, discounts and gifts.
// Every write invalidates the catalog cache sections it touches. Gift stock
// is only raised through `restock_gift`; gift edits never write it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::config::{PromotionConfig, DEFAULT_GIFT_GRADIENT};
use crate::error::{PResult, PromotionError};
use crate::promotions::catalog_cache::{CatalogCache, CatalogSection};
use crate::promotions::gifts::parse_amount_threshold;
use crate::promotions::models::{
    Category, Discount, Gift, GiftCategory, GiftUpdate, NewCategory, NewDiscount, NewGift,
    NewGiftCategory,
};
use crate::promotions::types::{GiftConditionType, GiftStatus};
use crate::store::PromotionStore;
use crate::validation::normalize_gift_code;

/// Values applied when a request leaves an optional field empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDefaults {
    pub gift_category_gradient: String,
}

impl Default for CatalogDefaults {
    fn default() -> Self {
        Self {
            gift_category_gradient: DEFAULT_GIFT_GRADIENT.to_string(),
        }
    }
}

impl From<&PromotionConfig> for CatalogDefaults {
    fn from(config: &PromotionConfig) -> Self {
        Self {
            gift_category_gradient: config.default_gift_gradient.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Rejects a discount window that closes before it opens
fn check_window(valid_from: DateTime<Utc>, valid_to: Option<DateTime<Utc>>) -> PResult<()> {
    match valid_to {
        Some(valid_to) if valid_to <= valid_from => Err(PromotionError::Validation(format!(
            "valid_to ({}) must be after valid_from ({})",
            valid_to, valid_from
        ))),
        _ => Ok(()),
    }
}

/// Rejects condition values the matcher could not interpret
fn check_condition(
    gift_id: Uuid,
    condition_type: GiftConditionType,
    value: &str,
) -> PResult<String> {
    let value = value.trim();

    match condition_type {
        GiftConditionType::None => Ok(String::new()),
        GiftConditionType::Amount => {
            parse_amount_threshold(value)
                .map_err(|reason| PromotionError::configuration("Gift", gift_id, reason))?;
            Ok(value.to_string())
        }
        GiftConditionType::Product | GiftConditionType::Category => {
            if value.is_empty() {
                return Err(PromotionError::configuration(
                    "Gift",
                    gift_id,
                    format!("{} condition requires a value", condition_type),
                ));
            }
            Ok(value.to_string())
        }
    }
}

/// Promotion Catalog
pub struct PromotionCatalog {
    store: Arc<dyn PromotionStore>,
    cache: Arc<CatalogCache>,
    clock: Arc<dyn Clock>,
    defaults: CatalogDefaults,
}

impl PromotionCatalog {
    /// Create a new PromotionCatalog
    pub fn new(
        store: Arc<dyn PromotionStore>,
        cache: Arc<CatalogCache>,
        clock: Arc<dyn Clock>,
        defaults: CatalogDefaults,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            defaults,
        }
    }

    pub fn defaults(&self) -> &CatalogDefaults {
        &self.defaults
    }

    // Categories

    pub async fn create_category(&self, request: NewCategory) -> PResult<Category> {
        request.validate()?;

        let category = self
            .store
            .insert_category(Category {
                id: request.id.trim().to_string(),
                name: request.name.trim().to_string(),
                slug: request.slug,
                image_url: non_blank(request.image_url),
            })
            .await?;

        self.cache.invalidate(CatalogSection::Categories).await;
        tracing::info!("Created category {}", category.id);
        Ok(category)
    }

    /// Updates the display fields of a category; id and slug never change
    pub async fn update_category_display(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> PResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PromotionError::Validation(
                "Category name must not be empty".to_string(),
            ));
        }

        let image_url = image_url.filter(|url| !url.trim().is_empty());
        let category = self
            .store
            .update_category_display(id, name, image_url)
            .await?;

        self.cache.invalidate(CatalogSection::Categories).await;
        Ok(category)
    }

    /// Fails with `Conflict` while a discount still references the category
    pub async fn delete_category(&self, id: &str) -> PResult<()> {
        self.store.delete_category(id).await?;
        self.cache.invalidate(CatalogSection::Categories).await;
        tracing::info!("Deleted category {}", id);
        Ok(())
    }

    pub async fn list_categories(&self) -> PResult<Vec<Category>> {
        self.store.list_categories().await
    }

    // Gift categories

    pub async fn create_gift_category(&self, request: NewGiftCategory) -> PResult<GiftCategory> {
        request.validate()?;

        let category = self
            .store
            .insert_gift_category(GiftCategory {
                id: request.id.unwrap_or_else(Uuid::new_v4),
                name: request.name.trim().to_string(),
                subtitle: non_blank(request.subtitle),
                slug: request.slug,
                image_url: non_blank(request.image_url),
                display_gradient: non_blank(request.display_gradient)
                    .unwrap_or_else(|| self.defaults.gift_category_gradient.clone()),
            })
            .await?;

        tracing::info!("Created gift category {}", category.slug);
        Ok(category)
    }

    pub async fn list_gift_categories(&self) -> PResult<Vec<GiftCategory>> {
        self.store.list_gift_categories().await
    }

    // Discounts

    async fn ensure_category(&self, category_id: Option<&str>) -> PResult<()> {
        if let Some(id) = category_id {
            if self.store.find_category(id).await?.is_none() {
                return Err(PromotionError::not_found("Category", id));
            }
        }
        Ok(())
    }

    /// Creates a discount; `valid_from` defaults to now
    pub async fn create_discount(&self, request: NewDiscount) -> PResult<Discount> {
        request.validate()?;

        let now = self.clock.now();
        let valid_from = request.valid_from.unwrap_or(now);
        check_window(valid_from, request.valid_to)?;

        let category_id = non_blank(request.category_id);
        self.ensure_category(category_id.as_deref()).await?;

        let discount = self
            .store
            .insert_discount(Discount {
                id: request.id.unwrap_or_else(Uuid::new_v4),
                title: request.title.trim().to_string(),
                description: non_blank(request.description),
                discount_percent: request.discount_percent,
                category_id,
                banner_image: non_blank(request.banner_image),
                active: request.active,
                valid_from,
                valid_to: request.valid_to,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.cache.invalidate(CatalogSection::Discounts).await;
        tracing::info!(
            "Created discount {} ({}% on {})",
            discount.id,
            discount.discount_percent,
            discount.category_id.as_deref().unwrap_or("all categories")
        );
        Ok(discount)
    }

    /// Replaces a discount; an absent `valid_from` keeps the current one
    pub async fn update_discount(&self, id: Uuid, request: NewDiscount) -> PResult<Discount> {
        request.validate()?;

        let existing = self
            .store
            .find_discount(id)
            .await?
            .ok_or_else(|| PromotionError::not_found("Discount", id))?;

        let valid_from = request.valid_from.unwrap_or(existing.valid_from);
        check_window(valid_from, request.valid_to)?;

        let category_id = non_blank(request.category_id);
        self.ensure_category(category_id.as_deref()).await?;

        let discount = self
            .store
            .update_discount(Discount {
                id,
                title: request.title.trim().to_string(),
                description: non_blank(request.description),
                discount_percent: request.discount_percent,
                category_id,
                banner_image: non_blank(request.banner_image),
                active: request.active,
                valid_from,
                valid_to: request.valid_to,
                created_at: existing.created_at,
                updated_at: self.clock.now(),
            })
            .await?;

        self.cache.invalidate(CatalogSection::Discounts).await;
        Ok(discount)
    }

    /// Returns whether a discount was removed
    pub async fn delete_discount(&self, id: Uuid) -> PResult<bool> {
        let deleted = self.store.delete_discount(id).await?;
        if deleted {
            self.cache.invalidate(CatalogSection::Discounts).await;
            tracing::info!("Deleted discount {}", id);
        }
        Ok(deleted)
    }

    pub async fn list_discounts(&self) -> PResult<Vec<Discount>> {
        self.store.list_discounts().await
    }

    // Gifts

    pub async fn create_gift(&self, request: NewGift) -> PResult<Gift> {
        request.validate()?;

        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let condition_value =
            check_condition(id, request.condition_type, &request.condition_value)?;
        let now = self.clock.now();

        let gift = self
            .store
            .insert_gift(Gift {
                id,
                name: request.name.trim().to_string(),
                code: request.code.as_deref().map(normalize_gift_code),
                description: non_blank(request.description),
                condition_type: request.condition_type,
                condition_value,
                stock: request.stock,
                image_url: non_blank(request.image_url),
                status: request.status,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.cache.invalidate(CatalogSection::Gifts).await;
        tracing::info!("Created gift {} with stock {}", gift.id, gift.stock);
        Ok(gift)
    }

    /// Edits a gift's descriptive fields and condition; stock is untouched
    pub async fn update_gift(&self, id: Uuid, request: GiftUpdate) -> PResult<Gift> {
        request.validate()?;

        let existing = self.get_gift(id).await?;
        let condition_value =
            check_condition(id, request.condition_type, &request.condition_value)?;

        let gift = self
            .store
            .update_gift_details(Gift {
                name: request.name.trim().to_string(),
                code: request.code.as_deref().map(normalize_gift_code),
                description: non_blank(request.description),
                condition_type: request.condition_type,
                condition_value,
                image_url: non_blank(request.image_url),
                status: request.status,
                updated_at: self.clock.now(),
                ..existing
            })
            .await?;

        self.cache.invalidate(CatalogSection::Gifts).await;
        Ok(gift)
    }

    pub async fn set_gift_status(&self, id: Uuid, status: GiftStatus) -> PResult<Gift> {
        let existing = self.get_gift(id).await?;

        let gift = self
            .store
            .update_gift_details(Gift {
                status,
                updated_at: self.clock.now(),
                ..existing
            })
            .await?;

        self.cache.invalidate(CatalogSection::Gifts).await;
        tracing::info!("Gift {} is now {}", id, status);
        Ok(gift)
    }

    /// Adds `units` to a gift's stock
    pub async fn restock_gift(&self, id: Uuid, units: i32) -> PResult<Gift> {
        if units <= 0 {
            return Err(PromotionError::Validation(
                "Restock units must be positive".to_string(),
            ));
        }

        let gift = self.store.restock_gift(id, units).await?;
        self.cache.invalidate(CatalogSection::Gifts).await;
        tracing::info!("Restocked gift {} by {} (now {})", id, units, gift.stock);
        Ok(gift)
    }

    pub async fn get_gift(&self, id: Uuid) -> PResult<Gift> {
        self.store
            .find_gift(id)
            .await?
            .ok_or_else(|| PromotionError::not_found("Gift", id))
    }

    pub async fn list_gifts(&self) -> PResult<Vec<Gift>> {
        self.store.list_gifts().await
    }
}
