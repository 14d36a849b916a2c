use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;


lazy_static! {
    pub static ref NOTIFY_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_notify_total", "Notifications delivered to subscribers"),
        &["source"]
    )
    .expect("metric can not be created");

    pub static ref EMPTY_PLACEHOLDER_COUNTER: IntCounter = IntCounter::new(
        "registry_empty_placeholder_total",
        "Empty-protocol placeholders synthesized for categories without entries"
    )
    .expect("metric can not be created");

    pub static ref WILDCARD_EXPANSION_COUNTER: IntCounter = IntCounter::new(
        "registry_wildcard_expansion_total",
        "Service names expanded from wildcard subscriptions"
    )
    .expect("metric can not be created");

    pub static ref REMOTE_FAILURE_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_remote_failure_total", "Failed remote registry operations"),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref RECOVERY_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_recovery_total", "Reconnect-triggered recovery runs"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(NOTIFY_COUNTER.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(EMPTY_PLACEHOLDER_COUNTER.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WILDCARD_EXPANSION_COUNTER.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REMOTE_FAILURE_COUNTER.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(RECOVERY_COUNTER.clone()))
        .expect("collector can be registered");
}

/// Renders the crate's metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
