// Gift promotions library
//
// Discounts, gift eligibility and atomic gift stock reservation for a
// storefront, behind a storage trait with in-memory and PostgreSQL backends.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod promotions;
pub mod store;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, PromotionConfig};
pub use error::{PResult, PromotionError};
pub use promotions::{EngineSettings, EvaluationResult, PromotionEngine};
pub use store::{InMemoryPromotionStore, PgPromotionStore, PromotionStore};
