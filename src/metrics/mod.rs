//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - HTTP requests per route
//! - RPC calls and provider failover
//! - Transaction submission
//! - Signature verification

use crate::error::{GatewayError, GatewayResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

lazy_static! {
    // HTTP metrics
    pub static ref HTTP_REQUESTS: CounterVec = register_counter_vec!(
        "wallet_gateway_http_requests_total",
        "Total HTTP requests by route and status",
        &["method", "route", "status"]
    ).unwrap();

    pub static ref HTTP_LATENCY: HistogramVec = register_histogram_vec!(
        "wallet_gateway_http_request_duration_seconds",
        "HTTP request latency",
        &["route"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // RPC metrics
    pub static ref RPC_CALLS: CounterVec = register_counter_vec!(
        "wallet_gateway_rpc_calls_total",
        "Total RPC calls by method and outcome",
        &["method", "outcome"]
    ).unwrap();

    pub static ref RPC_LATENCY: HistogramVec = register_histogram_vec!(
        "wallet_gateway_rpc_duration_seconds",
        "RPC call latency",
        &["method"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]
    ).unwrap();

    pub static ref PROVIDER_FAILOVERS: IntCounter = register_int_counter!(
        "wallet_gateway_provider_failovers_total",
        "Total switches to the next RPC provider"
    ).unwrap();

    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "wallet_gateway_transactions_submitted_total",
        "Total transactions submitted",
        &["kind"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "wallet_gateway_transactions_failed_total",
        "Total transactions that failed to submit",
        &["kind"]
    ).unwrap();

    // Wallet metrics
    pub static ref SIGNATURE_CHECKS: CounterVec = register_counter_vec!(
        "wallet_gateway_signature_checks_total",
        "Total signature verifications by result",
        &["result"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> GatewayResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::Config(format!("Cannot bind metrics port {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> (StatusCode, String) {
    match render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Render all registered metrics in the text exposition format
pub fn render() -> GatewayResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| GatewayError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_http_request(method: &str, route: &str, status: u16, latency: Duration) {
    HTTP_REQUESTS
        .with_label_values(&[method, route, &status.to_string()])
        .inc();
    HTTP_LATENCY
        .with_label_values(&[route])
        .observe(latency.as_secs_f64());
}

pub fn record_rpc_call(method: &str, outcome: &str, latency: Duration) {
    RPC_CALLS.with_label_values(&[method, outcome]).inc();
    RPC_LATENCY
        .with_label_values(&[method])
        .observe(latency.as_secs_f64());
}

pub fn record_failover() {
    PROVIDER_FAILOVERS.inc();
}

pub fn record_tx_submitted(kind: &str) {
    TX_SUBMITTED.with_label_values(&[kind]).inc();
}

pub fn record_tx_failed(kind: &str) {
    TX_FAILED.with_label_values(&[kind]).inc();
}

pub fn record_signature_check(valid: bool) {
    SIGNATURE_CHECKS
        .with_label_values(&[if valid { "valid" } else { "invalid" }])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_metrics_are_rendered() {
        record_tx_submitted("transfer");
        record_signature_check(true);
        record_http_request("GET", "/health", 200, Duration::from_millis(3));

        let body = render().unwrap();
        assert!(body.contains("wallet_gateway_transactions_submitted_total"));
        assert!(body.contains("wallet_gateway_signature_checks_total"));
        assert!(body.contains("wallet_gateway_http_requests_total"));
    }
}
