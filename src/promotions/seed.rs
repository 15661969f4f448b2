// Catalog seeding
//
// Applies a JSON seed document through the catalog. Seeding is idempotent:
// entities whose id (or slug, for either kind of category) already exists are
// skipped and never overwritten, so re-running a seed never resets stock.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PResult, PromotionError};
use crate::promotions::catalog::PromotionCatalog;
use crate::promotions::models::{NewCategory, NewDiscount, NewGift, NewGiftCategory};

/// Seed document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub categories: Vec<NewCategory>,
    #[serde(default)]
    pub gift_categories: Vec<NewGiftCategory>,
    #[serde(default)]
    pub discounts: Vec<NewDiscount>,
    #[serde(default)]
    pub gifts: Vec<NewGift>,
}

impl SeedData {
    pub fn from_json(json: &str) -> PResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> PResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PromotionError::Validation(format!("Cannot read seed file {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}

/// Counts of created and skipped entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub categories_created: usize,
    pub categories_skipped: usize,
    pub gift_categories_created: usize,
    pub gift_categories_skipped: usize,
    pub discounts_created: usize,
    pub discounts_skipped: usize,
    pub gifts_created: usize,
    pub gifts_skipped: usize,
}

/// Applies `seed` through `catalog`, skipping anything already present
///
/// Discounts and gifts without an explicit id cannot be matched against
/// existing rows, so they are always created; seed files meant to be re-run
/// should carry ids.
pub async fn apply_seed(catalog: &PromotionCatalog, seed: SeedData) -> PResult<SeedReport> {
    let mut report = SeedReport::default();

    let existing_categories = catalog.list_categories().await?;
    let category_ids: HashSet<String> = existing_categories.iter().map(|c| c.id.clone()).collect();
    let category_slugs: HashSet<String> =
        existing_categories.iter().map(|c| c.slug.clone()).collect();

    for category in seed.categories {
        if category_ids.contains(category.id.trim()) || category_slugs.contains(&category.slug) {
            tracing::debug!("Skipping existing category {}", category.id);
            report.categories_skipped += 1;
            continue;
        }
        catalog.create_category(category).await?;
        report.categories_created += 1;
    }

    let existing_gift_categories = catalog.list_gift_categories().await?;
    let gift_category_ids: HashSet<_> = existing_gift_categories.iter().map(|c| c.id).collect();
    let gift_category_slugs: HashSet<String> = existing_gift_categories
        .into_iter()
        .map(|c| c.slug)
        .collect();

    for category in seed.gift_categories {
        let known_id = category.id.map_or(false, |id| gift_category_ids.contains(&id));
        if known_id || gift_category_slugs.contains(&category.slug) {
            tracing::debug!("Skipping existing gift category {}", category.slug);
            report.gift_categories_skipped += 1;
            continue;
        }
        catalog.create_gift_category(category).await?;
        report.gift_categories_created += 1;
    }

    let discount_ids: HashSet<_> = catalog
        .list_discounts()
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();

    for discount in seed.discounts {
        if discount.id.map_or(false, |id| discount_ids.contains(&id)) {
            report.discounts_skipped += 1;
            continue;
        }
        catalog.create_discount(discount).await?;
        report.discounts_created += 1;
    }

    let gift_ids: HashSet<_> = catalog
        .list_gifts()
        .await?
        .into_iter()
        .map(|g| g.id)
        .collect();

    for gift in seed.gifts {
        if gift.id.map_or(false, |id| gift_ids.contains(&id)) {
            report.gifts_skipped += 1;
            continue;
        }
        catalog.create_gift(gift).await?;
        report.gifts_created += 1;
    }

    tracing::info!("Seed applied: {:?}", report);
    Ok(report)
}
