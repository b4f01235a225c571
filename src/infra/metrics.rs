//! Lock-free metrics collection and periodic reporting
//!
//! Counters are monotonic atomics; only the main-cycle latency window is
//! reset on report (via atomic swap).
//!
//! All atomics use Relaxed ordering. These are statistical counters only
//! and never drive control decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[derive(Default)]
pub struct Metrics {
    cycles_total: AtomicU64,
    /// Sum of cycle durations since last report (reset on report)
    cycle_time_sum_us: AtomicU64,
    /// Max cycle duration since last report (reset on report)
    cycle_time_max_us: AtomicU64,
    /// Cycles since last report (reset on report)
    cycles_since_report: AtomicU64,
    occupancy_flips_total: AtomicU64,
    credentials_presented_total: AtomicU64,
    credentials_dropped_total: AtomicU64,
    access_granted_total: AtomicU64,
    access_denied_invalid_total: AtomicU64,
    access_denied_no_space_total: AtomicU64,
    validation_failures_total: AtomicU64,
    registrations_ok_total: AtomicU64,
    registrations_failed_total: AtomicU64,
    barrier_opens_total: AtomicU64,
    barrier_closes_total: AtomicU64,
    countdown_cancelled_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_cycle(&self, duration_us: u64) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.cycles_since_report.fetch_add(1, Ordering::Relaxed);
        self.cycle_time_sum_us.fetch_add(duration_us, Ordering::Relaxed);
        update_atomic_max(&self.cycle_time_max_us, duration_us);
    }

    #[inline]
    pub fn record_occupancy_flip(&self) {
        self.occupancy_flips_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_credential_presented(&self) {
        self.credentials_presented_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_credential_dropped(&self) {
        self.credentials_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_access_granted(&self) {
        self.access_granted_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_access_denied_invalid(&self) {
        self.access_denied_invalid_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_access_denied_no_space(&self) {
        self.access_denied_no_space_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Validation call failed (transport, status, decode or timeout)
    #[inline]
    pub fn record_validation_failure(&self) {
        self.validation_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_registration(&self, ok: bool) {
        if ok {
            self.registrations_ok_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.registrations_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_barrier_open(&self) {
        self.barrier_opens_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_barrier_close(&self) {
        self.barrier_closes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_countdown_cancelled(&self) {
        self.countdown_cancelled_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a summary. Resets the cycle latency window.
    pub fn report(&self) -> MetricsSummary {
        let cycles_window = self.cycles_since_report.swap(0, Ordering::Relaxed);
        let sum_us = self.cycle_time_sum_us.swap(0, Ordering::Relaxed);
        let max_us = self.cycle_time_max_us.swap(0, Ordering::Relaxed);
        let avg_us = if cycles_window > 0 { sum_us / cycles_window } else { 0 };

        MetricsSummary {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycle_avg_us: avg_us,
            cycle_max_us: max_us,
            occupancy_flips: self.occupancy_flips_total.load(Ordering::Relaxed),
            credentials_presented: self.credentials_presented_total.load(Ordering::Relaxed),
            credentials_dropped: self.credentials_dropped_total.load(Ordering::Relaxed),
            access_granted: self.access_granted_total.load(Ordering::Relaxed),
            access_denied_invalid: self.access_denied_invalid_total.load(Ordering::Relaxed),
            access_denied_no_space: self.access_denied_no_space_total.load(Ordering::Relaxed),
            validation_failures: self.validation_failures_total.load(Ordering::Relaxed),
            registrations_ok: self.registrations_ok_total.load(Ordering::Relaxed),
            registrations_failed: self.registrations_failed_total.load(Ordering::Relaxed),
            barrier_opens: self.barrier_opens_total.load(Ordering::Relaxed),
            barrier_closes: self.barrier_closes_total.load(Ordering::Relaxed),
            countdown_cancelled: self.countdown_cancelled_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub cycles_total: u64,
    pub cycle_avg_us: u64,
    pub cycle_max_us: u64,
    pub occupancy_flips: u64,
    pub credentials_presented: u64,
    pub credentials_dropped: u64,
    pub access_granted: u64,
    pub access_denied_invalid: u64,
    pub access_denied_no_space: u64,
    pub validation_failures: u64,
    pub registrations_ok: u64,
    pub registrations_failed: u64,
    pub barrier_opens: u64,
    pub barrier_closes: u64,
    pub countdown_cancelled: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            cycles = %self.cycles_total,
            cycle_avg_us = %self.cycle_avg_us,
            cycle_max_us = %self.cycle_max_us,
            occupancy_flips = %self.occupancy_flips,
            credentials = %self.credentials_presented,
            credentials_dropped = %self.credentials_dropped,
            granted = %self.access_granted,
            denied_invalid = %self.access_denied_invalid,
            denied_no_space = %self.access_denied_no_space,
            validation_failures = %self.validation_failures,
            registrations_ok = %self.registrations_ok,
            registrations_failed = %self.registrations_failed,
            barrier_opens = %self.barrier_opens,
            barrier_closes = %self.barrier_closes,
            countdown_cancelled = %self.countdown_cancelled,
            "metrics_summary"
        );
    }
}
