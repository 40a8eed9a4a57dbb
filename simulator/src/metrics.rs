use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "particle_sim_requests_total",
            "API requests served, by endpoint and status code"
        ),
        &["endpoint", "status"]
    )
    .unwrap();
    pub static ref READINGS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "particle_sim_readings_total",
        "Simulated sensor readings recorded"
    ))
    .unwrap();
    pub static ref DEVICES_ONLINE: IntGauge = IntGauge::with_opts(Opts::new(
        "particle_sim_devices_online",
        "Simulated devices currently online"
    ))
    .unwrap();
}

static INIT: Once = Once::new();

/// Registers all collectors. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(REQUESTS_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(READINGS_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(DEVICES_ONLINE.clone())).unwrap();
    });
}

pub fn record_request(endpoint: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[endpoint, &status.to_string()])
        .inc();
}

pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counter_exported() {
        init_metrics();
        init_metrics();
        record_request("variable", 200);

        let text = gather_metrics().unwrap();
        assert!(text.contains("particle_sim_requests_total"));
        assert!(text.contains("endpoint=\"variable\""));
    }
}
