// Gift Stock Reservation
//
// Claims one unit of a gift for one order. The claim and the stock decrement
// are a single atomic store operation, so correctness under contention never
// depends on a lock held in this process. Business outcomes come back as
// `ReservationOutcome`; `Err` is reserved for store failures and timeouts.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{PResult, PromotionError};
use crate::promotions::metrics::PerformanceMetrics;
use crate::promotions::models::Reservation;
use crate::store::PromotionStore;

/// Default bound on a single store round-trip
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a reservation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Stock decremented by one and the reservation recorded
    Reserved(Reservation),

    /// The order already holds this gift; nothing changed
    AlreadyReserved(Reservation),

    /// Stock was zero at the moment of the decrement
    OutOfStock,

    /// No gift with this id
    NotFound,

    /// The gift exists but is not active
    Unavailable,
}

impl ReservationOutcome {
    /// The reservation the order holds after this attempt, if any
    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            ReservationOutcome::Reserved(r) | ReservationOutcome::AlreadyReserved(r) => Some(r),
            ReservationOutcome::OutOfStock
            | ReservationOutcome::NotFound
            | ReservationOutcome::Unavailable => None,
        }
    }

    /// Whether this attempt changed stock
    pub fn is_new(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved(_))
    }
}

/// Gift Stock Reservation
pub struct GiftStockReservation {
    store: Arc<dyn PromotionStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    metrics: PerformanceMetrics,
}

impl GiftStockReservation {
    /// Create a new GiftStockReservation
    pub fn new(
        store: Arc<dyn PromotionStore>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            store,
            clock,
            timeout,
            metrics,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reserve one unit of `gift_id` for `order_id` within the configured timeout
    pub async fn reserve(&self, gift_id: Uuid, order_id: &str) -> PResult<ReservationOutcome> {
        self.reserve_with_timeout(gift_id, order_id, self.timeout)
            .await
    }

    /// Reserve with an explicit bound on the store round-trip
    ///
    /// A timeout is reported as `StoreTimeout`, never as `OutOfStock`. The
    /// store may still commit after the deadline; re-reserving the same pair
    /// is safe and returns `AlreadyReserved`.
    pub async fn reserve_with_timeout(
        &self,
        gift_id: Uuid,
        order_id: &str,
        timeout: Duration,
    ) -> PResult<ReservationOutcome> {
        if order_id.trim().is_empty() {
            return Err(PromotionError::Validation("order_id must not be empty".to_string()));
        }

        let _timer = self.metrics.start_reservation();
        let reserved_at = self.clock.now();

        let attempt = self
            .store
            .conditional_decrement(gift_id, order_id, reserved_at);

        let outcome = match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                self.metrics.record_reservation_failure();
                tracing::error!(
                    "Reservation of gift {} for order {} failed: {}",
                    gift_id,
                    order_id,
                    e
                );
                return Err(e);
            }
            Err(_) => {
                self.metrics.record_reservation_failure();
                tracing::error!(
                    "Reservation of gift {} for order {} timed out after {:?}",
                    gift_id,
                    order_id,
                    timeout
                );
                return Err(PromotionError::StoreTimeout(timeout));
            }
        };

        match &outcome {
            ReservationOutcome::Reserved(_) => {
                self.metrics.record_gift_reserved();
                tracing::info!("Reserved gift {} for order {}", gift_id, order_id);
            }
            ReservationOutcome::AlreadyReserved(_) => {
                self.metrics.record_gift_already_reserved();
                tracing::debug!("Gift {} already reserved for order {}", gift_id, order_id);
            }
            ReservationOutcome::OutOfStock => {
                self.metrics.record_gift_out_of_stock();
                tracing::warn!("Gift {} out of stock for order {}", gift_id, order_id);
            }
            ReservationOutcome::NotFound => {
                self.metrics.record_gift_not_found();
                tracing::warn!("Gift {} not found while reserving for order {}", gift_id, order_id);
            }
            ReservationOutcome::Unavailable => {
                self.metrics.record_gift_unavailable();
                tracing::warn!("Gift {} is inactive; not reserved for order {}", gift_id, order_id);
            }
        }

        Ok(outcome)
    }

    /// Compensating release for a cancelled order
    ///
    /// Deletes the reservation and returns its unit to stock in one store
    /// operation. Returns false when the order held no reservation.
    pub async fn release(&self, gift_id: Uuid, order_id: &str) -> PResult<bool> {
        let released = tokio::time::timeout(
            self.timeout,
            self.store.release_reservation(gift_id, order_id),
        )
        .await
        .map_err(|_| PromotionError::StoreTimeout(self.timeout))??;

        if released {
            self.metrics.record_gift_released();
            tracing::info!("Released gift {} from order {}", gift_id, order_id);
        }
        Ok(released)
    }

    /// Reservation held by `order_id` for `gift_id`, if any
    pub async fn find(&self, gift_id: Uuid, order_id: &str) -> PResult<Option<Reservation>> {
        self.store.find_reservation(gift_id, order_id).await
    }
}
