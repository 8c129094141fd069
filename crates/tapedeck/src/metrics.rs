//! Prometheus metrics for tapedeck.
//!
//! Tracks capture activity on the proxy side and fixture matching on the
//! mock side.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    /// Exchanges appended to the capture store
    pub static ref CAPTURED_TOTAL: CounterVec = register_counter_vec!(
        "tapedeck_captured_total",
        "Total number of exchanges captured",
        &["method", "service"]
    )
    .unwrap();

    /// Forwarding failures (never captured)
    pub static ref FORWARD_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "tapedeck_forward_errors_total",
        "Total number of requests that could not be forwarded",
        &["kind"]  // kind: upstream|timeout|invalid|tunnel
    )
    .unwrap();

    /// Upstream round trip duration
    pub static ref UPSTREAM_DURATION_MS: HistogramVec = register_histogram_vec!(
        "tapedeck_upstream_duration_ms",
        "Duration of forwarded requests in milliseconds",
        &["method", "status"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();

    /// CONNECT tunnels established
    pub static ref TUNNELS_TOTAL: IntCounter = register_int_counter!(
        "tapedeck_tunnels_total",
        "Total number of CONNECT tunnels established"
    )
    .unwrap();

    /// Bytes relayed through CONNECT tunnels
    pub static ref TUNNEL_BYTES_TOTAL: CounterVec = register_counter_vec!(
        "tapedeck_tunnel_bytes_total",
        "Bytes relayed through CONNECT tunnels",
        &["direction"]  // direction: upstream|downstream
    )
    .unwrap();

    /// Mock requests by outcome
    pub static ref MOCK_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "tapedeck_mock_requests_total",
        "Total number of requests answered by the mock server",
        &["method", "outcome"]  // outcome: matched|not_found
    )
    .unwrap();

    /// Fixture reloads
    pub static ref RELOADS_TOTAL: IntCounter = register_int_counter!(
        "tapedeck_fixture_reloads_total",
        "Total number of fixture registry reloads"
    )
    .unwrap();

    /// Routes in the active registry
    pub static ref LOADED_ROUTES: IntGauge = register_int_gauge!(
        "tapedeck_loaded_routes",
        "Number of routes in the active fixture registry"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_capture(method: &str, service: &str) {
    CAPTURED_TOTAL.with_label_values(&[method, service]).inc();
}

pub fn record_forward_error(kind: &str) {
    FORWARD_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_upstream_duration(method: &str, status: u16, duration_ms: f64) {
    UPSTREAM_DURATION_MS
        .with_label_values(&[method, &status.to_string()])
        .observe(duration_ms);
}

pub fn record_tunnel_opened() {
    TUNNELS_TOTAL.inc();
}

pub fn record_tunnel_bytes(upstream: u64, downstream: u64) {
    TUNNEL_BYTES_TOTAL
        .with_label_values(&["upstream"])
        .inc_by(upstream as f64);
    TUNNEL_BYTES_TOTAL
        .with_label_values(&["downstream"])
        .inc_by(downstream as f64);
}

pub fn record_mock_request(method: &str, matched: bool) {
    let outcome = if matched { "matched" } else { "not_found" };
    MOCK_REQUESTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
}

pub fn record_reload(routes: usize) {
    RELOADS_TOTAL.inc();
    LOADED_ROUTES.set(routes as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_metrics_contains_registered_families() {
        record_capture("GET", "users");
        record_mock_request("GET", false);
        record_reload(3);

        let text = collect_metrics();
        assert!(text.contains("tapedeck_captured_total"));
        assert!(text.contains("tapedeck_mock_requests_total"));
        assert!(text.contains("tapedeck_loaded_routes"));
    }
}
