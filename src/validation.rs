// Validation utilities module
// Provides custom validation functions for promotional catalog rules

use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;
use validator::ValidationError;

fn slug_pattern() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern is a valid regex")
    })
}

/// Validates that a slug is lowercase words separated by single hyphens
/// Valid: "rings", "gold-bangles-2024"; invalid: "Rings", "gold--bangles", "-rings"
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug_pattern().is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug"))
    }
}

/// Validates that a discount percentage lies in (0, 100]
pub fn validate_discount_percent(percent: &Decimal) -> Result<(), ValidationError> {
    if *percent <= Decimal::ZERO || *percent > Decimal::ONE_HUNDRED {
        Err(ValidationError::new("discount_percent_out_of_range"))
    } else {
        Ok(())
    }
}

/// Validates that a gift code is non-blank alphanumerics, hyphens or underscores
/// Case is not checked here; codes are normalized to uppercase before storage
pub fn validate_gift_code(code: &str) -> Result<(), ValidationError> {
    let trimmed = code.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Err(ValidationError::new("invalid_gift_code"))
    } else {
        Ok(())
    }
}

/// Normalizes a gift code for storage and comparison
pub fn normalize_gift_code(code: &str) -> String {
    code.trim().to_uppercase()
}
