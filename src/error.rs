// Error handling for the promotions engine
// Provides the error taxonomy shared by the resolver, matcher, reservation and stores

use std::time::Duration;
use thiserror::Error;

/// Main error type for the promotions engine
///
/// Expected business outcomes (an exhausted gift, a duplicate reservation) are
/// not errors; they are returned as `ReservationOutcome` values. This enum only
/// carries caller errors, malformed promotional data and store failures.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Referenced entity does not exist
    /// Treated as a caller error, never as an empty result
    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },

    /// Malformed promotional configuration (e.g. non-numeric amount threshold)
    /// The offending entity is excluded from evaluation and reported
    #[error("Invalid configuration for {entity} {id}: {reason}")]
    Configuration {
        entity: String,
        id: String,
        reason: String,
    },

    /// Input rejected by catalog validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Uniqueness or reference constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database operation errors
    /// Automatically converted from sqlx::Error
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Store did not answer within the allotted time
    #[error("Store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// Store reported a transient inconsistency the caller may retry
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Schema migration failures
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Gift event could not be delivered to the notification subsystem
    #[error("Notification delivery failed: {0}")]
    Notification(String),
}

/// Result type alias for promotion operations
pub type PResult<T> = Result<T, PromotionError>;

impl PromotionError {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        PromotionError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn configuration(entity: &str, id: impl ToString, reason: impl Into<String>) -> Self {
        PromotionError::Configuration {
            entity: entity.to_string(),
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the operation that produced this error
    ///
    /// Connection loss, pool exhaustion, timeouts, serialization failures and
    /// deadlocks are transient. Constraint violations and bad input are not.
    pub fn is_transient(&self) -> bool {
        match self {
            PromotionError::StoreTimeout(_) | PromotionError::StoreUnavailable(_) => true,
            PromotionError::Store(err) => match err {
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => true,
                // 40xxx: transaction rollback (serialization, deadlock), 08xxx: connection exception
                sqlx::Error::Database(db) => db
                    .code()
                    .map(|code| code.starts_with("40") || code.starts_with("08"))
                    .unwrap_or(false),
                _ => false,
            },
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for PromotionError {
    fn from(err: validator::ValidationErrors) -> Self {
        PromotionError::Validation(err.to_string())
    }
}

impl From<redis::RedisError> for PromotionError {
    fn from(err: redis::RedisError) -> Self {
        PromotionError::Notification(err.to_string())
    }
}
