//! Metrics collection for the email service.
//!
//! Prometheus counters for delivery legs and provider API calls.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static EMAIL_SENT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static EMAIL_PROVIDER_CALLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize metrics collection. Call once at process start.
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let sent_counter = IntCounterVec::new(
        Opts::new(
            "email_sent_total",
            "Total notification emails by leg and status",
        ),
        &["leg", "status"],
    )
    .expect("Failed to create email_sent_total metric");

    let provider_calls_counter = IntCounterVec::new(
        Opts::new(
            "email_provider_calls_total",
            "Total provider send attempts by provider and status",
        ),
        &["provider", "status"],
    )
    .expect("Failed to create email_provider_calls_total metric");

    registry
        .register(Box::new(sent_counter.clone()))
        .expect("Failed to register email_sent_total");
    registry
        .register(Box::new(provider_calls_counter.clone()))
        .expect("Failed to register email_provider_calls_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    EMAIL_SENT_TOTAL
        .set(sent_counter)
        .expect("Failed to set email_sent_total");
    EMAIL_PROVIDER_CALLS_TOTAL
        .set(provider_calls_counter)
        .expect("Failed to set email_provider_calls_total");
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record one notification leg (user confirmation or admin alert).
pub fn record_email(leg: &str, status: &str) {
    if let Some(counter) = EMAIL_SENT_TOTAL.get() {
        counter.with_label_values(&[leg, status]).inc();
    }
}

/// Record one provider send attempt.
pub fn record_provider_call(provider: &str, status: &str) {
    if let Some(counter) = EMAIL_PROVIDER_CALLS_TOTAL.get() {
        counter.with_label_values(&[provider, status]).inc();
    }
}
