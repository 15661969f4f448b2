// Performance Metrics for the Promotions Engine
//
// Tracks evaluation and reservation timings, catalog cache hit rates,
// reservation outcomes and notification failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Performance threshold for slow operations (100ms)
const SLOW_OPERATION_THRESHOLD_MS: u64 = 100;

/// Performance metrics for the promotions engine
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    // Cache metrics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Operation counts
    evaluations: AtomicU64,
    reservations: AtomicU64,

    // Timing metrics (in microseconds)
    total_evaluation_time_us: AtomicU64,
    total_reservation_time_us: AtomicU64,

    // Slow operation counts
    slow_evaluations: AtomicU64,
    slow_reservations: AtomicU64,

    // Reservation outcomes
    gifts_reserved: AtomicU64,
    gifts_already_reserved: AtomicU64,
    gifts_out_of_stock: AtomicU64,
    gifts_not_found: AtomicU64,
    gifts_unavailable: AtomicU64,
    reservation_failures: AtomicU64,
    gifts_released: AtomicU64,

    notification_failures: AtomicU64,
}

impl PerformanceMetrics {
    /// Create a new PerformanceMetrics instance
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get cache hit rate (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing an order evaluation
    pub fn start_evaluation(&self) -> OperationTimer {
        OperationTimer::new(OperationType::Evaluation, self.clone())
    }

    /// Start timing a single gift reservation
    pub fn start_reservation(&self) -> OperationTimer {
        OperationTimer::new(OperationType::Reservation, self.clone())
    }

    pub fn record_gift_reserved(&self) {
        self.inner.gifts_reserved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gift_already_reserved(&self) {
        self.inner.gifts_already_reserved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gift_out_of_stock(&self) {
        self.inner.gifts_out_of_stock.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gift_not_found(&self) {
        self.inner.gifts_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gift_unavailable(&self) {
        self.inner.gifts_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reservation that failed with a store error or timeout
    pub fn record_reservation_failure(&self) {
        self.inner.reservation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gift_released(&self) {
        self.inner.gifts_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_failure(&self) {
        self.inner.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evaluation(&self, duration: Duration) {
        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_evaluation_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            self.inner.slow_evaluations.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow order evaluation: {}ms", duration.as_millis());
        }
    }

    fn record_reservation(&self, duration: Duration) {
        self.inner.reservations.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_reservation_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            self.inner.slow_reservations.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow gift reservation: {}ms", duration.as_millis());
        }
    }

    fn average_ms(count: &AtomicU64, total_us: &AtomicU64) -> f64 {
        let count = count.load(Ordering::Relaxed);
        let total_us = total_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    /// Get average order evaluation time in milliseconds
    pub fn avg_evaluation_time_ms(&self) -> f64 {
        Self::average_ms(&self.inner.evaluations, &self.inner.total_evaluation_time_us)
    }

    /// Get average reservation time in milliseconds
    pub fn avg_reservation_time_ms(&self) -> f64 {
        Self::average_ms(&self.inner.reservations, &self.inner.total_reservation_time_us)
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSummary {
            cache_hit_rate: self.cache_hit_rate(),
            cache_hits: load(&self.inner.cache_hits),
            cache_misses: load(&self.inner.cache_misses),
            evaluations: load(&self.inner.evaluations),
            avg_evaluation_time_ms: self.avg_evaluation_time_ms(),
            slow_evaluations: load(&self.inner.slow_evaluations),
            reservations: load(&self.inner.reservations),
            avg_reservation_time_ms: self.avg_reservation_time_ms(),
            slow_reservations: load(&self.inner.slow_reservations),
            gifts_reserved: load(&self.inner.gifts_reserved),
            gifts_already_reserved: load(&self.inner.gifts_already_reserved),
            gifts_out_of_stock: load(&self.inner.gifts_out_of_stock),
            gifts_not_found: load(&self.inner.gifts_not_found),
            gifts_unavailable: load(&self.inner.gifts_unavailable),
            reservation_failures: load(&self.inner.reservation_failures),
            gifts_released: load(&self.inner.gifts_released),
            notification_failures: load(&self.inner.notification_failures),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            "Promotions Performance Metrics:\n\
             Cache: {:.1}% hit rate ({} hits, {} misses)\n\
             Evaluations: {} orders, avg {:.2}ms, {} slow\n\
             Reservations: {} attempts, avg {:.2}ms, {} slow\n\
             Outcomes: {} reserved, {} already reserved, {} out of stock, {} not found, {} unavailable, {} failed, {} released\n\
             Notifications: {} failed",
            summary.cache_hit_rate * 100.0,
            summary.cache_hits,
            summary.cache_misses,
            summary.evaluations,
            summary.avg_evaluation_time_ms,
            summary.slow_evaluations,
            summary.reservations,
            summary.avg_reservation_time_ms,
            summary.slow_reservations,
            summary.gifts_reserved,
            summary.gifts_already_reserved,
            summary.gifts_out_of_stock,
            summary.gifts_not_found,
            summary.gifts_unavailable,
            summary.reservation_failures,
            summary.gifts_released,
            summary.notification_failures,
        );
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of operation being timed
#[derive(Debug, Clone, Copy)]
enum OperationType {
    Evaluation,
    Reservation,
}

/// Timer for tracking operation duration
///
/// The duration is recorded exactly once, when the timer is dropped.
pub struct OperationTimer {
    start: Instant,
    operation_type: OperationType,
    metrics: PerformanceMetrics,
}

impl OperationTimer {
    fn new(operation_type: OperationType, metrics: PerformanceMetrics) -> Self {
        Self {
            start: Instant::now(),
            operation_type,
            metrics,
        }
    }

    /// Complete the timer and record the duration
    pub fn complete(self) {
        drop(self);
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();

        match self.operation_type {
            OperationType::Evaluation => self.metrics.record_evaluation(duration),
            OperationType::Reservation => self.metrics.record_reservation(duration),
        }
    }
}

/// Summary of performance metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub cache_hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evaluations: u64,
    pub avg_evaluation_time_ms: f64,
    pub slow_evaluations: u64,
    pub reservations: u64,
    pub avg_reservation_time_ms: f64,
    pub slow_reservations: u64,
    pub gifts_reserved: u64,
    pub gifts_already_reserved: u64,
    pub gifts_out_of_stock: u64,
    pub gifts_not_found: u64,
    pub gifts_unavailable: u64,
    pub reservation_failures: u64,
    pub gifts_released: u64,
    pub notification_failures: u64,
}
