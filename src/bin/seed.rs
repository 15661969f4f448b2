//! # Promotions Catalog Seeder
//!
//! Loads categories, gift categories, discounts and gifts from a JSON
//! document into PostgreSQL. Safe to re-run: anything already present is
//! skipped, and gift stock is never reset.
//!
//! ## Usage
//! ```bash
//! # Seed from a file
//! cargo run --bin seed -- --file ./seed/promotions.json
//!
//! # Or point SEED_FILE at it
//! SEED_FILE=./seed/promotions.json cargo run --bin seed
//! ```

use std::env;
use std::sync::Arc;

use gift_promotions::clock::SystemClock;
use gift_promotions::config::PromotionConfig;
use gift_promotions::db;
use gift_promotions::promotions::{
    apply_seed, CatalogCache, CatalogDefaults, PromotionCatalog, SeedData,
};
use gift_promotions::store::{PgPromotionStore, PromotionStore};
use tracing_subscriber::EnvFilter;

const DEFAULT_SEED_FILE: &str = "./seed/promotions.json";

fn print_usage() {
    println!("Promotions Catalog Seeder");
    println!();
    println!("Usage: seed [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -f, --file <PATH>  Seed document (default: $SEED_FILE or {})", DEFAULT_SEED_FILE);
    println!("  -h, --help         Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut seed_file = env::var("SEED_FILE").unwrap_or_else(|_| DEFAULT_SEED_FILE.to_string());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    seed_file = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let config = PromotionConfig::from_env()?;
    tracing::info!("Seeding promotions catalog from {}", seed_file);

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let store: Arc<dyn PromotionStore> = Arc::new(PgPromotionStore::new(pool));
    let cache = Arc::new(CatalogCache::new(store.clone(), config.catalog_cache_ttl()));
    let catalog = PromotionCatalog::new(
        store,
        cache,
        Arc::new(SystemClock),
        CatalogDefaults::from(&config),
    );

    let seed = SeedData::from_file(&seed_file).await?;
    let report = apply_seed(&catalog, seed).await?;

    tracing::info!(
        "Categories: {} created, {} skipped",
        report.categories_created,
        report.categories_skipped
    );
    tracing::info!(
        "Gift categories: {} created, {} skipped",
        report.gift_categories_created,
        report.gift_categories_skipped
    );
    tracing::info!(
        "Discounts: {} created, {} skipped",
        report.discounts_created,
        report.discounts_skipped
    );
    tracing::info!(
        "Gifts: {} created, {} skipped",
        report.gifts_created,
        report.gifts_skipped
    );

    Ok(())
}
