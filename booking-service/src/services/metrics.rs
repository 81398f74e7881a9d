//! Metrics module for booking-service.
//! Provides Prometheus metrics for checkout, settlement and cancellation flows.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "booking_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Checkout sessions opened against the gateway
pub static CHECKOUT_SESSIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Settlement outcomes (paid / failed / duplicate / expired)
pub static SETTLEMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Booking cancellations by initiator
pub static CANCELLATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    CHECKOUT_SESSIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_checkout_sessions_total",
                "Checkout sessions opened, by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register CHECKOUT_SESSIONS_TOTAL")
    });

    SETTLEMENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_settlements_total",
                "Gateway settlement events processed, by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register SETTLEMENTS_TOTAL")
    });

    CANCELLATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_cancellations_total",
                "Booking cancellations, by initiator"
            ),
            &["initiator"]
        )
        .expect("Failed to register CANCELLATIONS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a checkout session attempt.
pub fn record_checkout_session(outcome: &str) {
    if let Some(counter) = CHECKOUT_SESSIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a settlement outcome.
pub fn record_settlement(outcome: &str) {
    if let Some(counter) = SETTLEMENTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a booking cancellation.
pub fn record_cancellation(initiator: &str) {
    if let Some(counter) = CANCELLATIONS_TOTAL.get() {
        counter.with_label_values(&[initiator]).inc();
    }
}
