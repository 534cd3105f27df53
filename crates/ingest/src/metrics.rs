use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

pub static WEBHOOKS_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ingest_webhooks_received_total",
        "Webhook deliveries received, grouped by provider",
        &["provider"]
    )
    .expect("webhooks received counter")
});

pub static EVENTS_RECORDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ingest_events_recorded_total",
        "Canonical events persisted, grouped by provider and event type",
        &["provider", "event_type"]
    )
    .expect("events recorded counter")
});

pub static EVENTS_IGNORED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ingest_events_ignored_total",
        "Deliveries dropped by policy, grouped by provider and reason",
        &["provider", "reason"]
    )
    .expect("events ignored counter")
});

pub static DUPLICATES_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "ingest_duplicates_skipped_total",
        "Opened deliveries skipped because an equivalent event already exists"
    )
    .expect("duplicates skipped counter")
});

pub static REVISIONS_RECORDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "ingest_revisions_recorded_total",
        "Revision links created for pushes addressing a change request"
    )
    .expect("revisions recorded counter")
});

pub static UPSTREAM_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ingest_upstream_errors_total",
        "Failed provider REST calls, grouped by provider and operation",
        &["provider", "operation"]
    )
    .expect("upstream errors counter")
});

pub static INGEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ingest_delivery_duration_seconds",
        "Time spent handling one webhook delivery, grouped by provider",
        &["provider"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("ingest duration histogram")
});
