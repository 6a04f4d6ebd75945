//! HTTP API: wallet and transaction endpoints plus health checks

pub mod response;
mod transactions;
pub mod validation;
mod wallet;

use crate::chain::{network_name, ChainClient};
use crate::config::{ServerConfig, Settings};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::tx::{
    GasEstimator, GasPolicy, NonceManager, SendPolicy, TransactionBuilder, TransactionSender,
};
use crate::wallet::WalletService;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use response::ApiError;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn ChainClient>,
    pub wallet: Arc<WalletService>,
    pub gas: Arc<GasEstimator>,
    pub builder: Arc<TransactionBuilder>,
    pub sender: Arc<TransactionSender>,
}

impl AppState {
    /// Wire services around one chain client
    pub fn new(client: Arc<dyn ChainClient>, settings: &Settings) -> Self {
        let policy = GasPolicy {
            gas_limit_buffer_percent: settings.transactions.gas_limit_buffer_percent,
            gas_price_buffer_percent: settings.transactions.gas_price_buffer_percent,
            max_gas_price_gwei: settings.chain.max_gas_price_gwei,
        };

        let nonces = Arc::new(NonceManager::new());
        let gas = Arc::new(GasEstimator::new(client.clone(), policy));
        let builder = Arc::new(TransactionBuilder::new(
            client.clone(),
            gas.clone(),
            nonces.clone(),
        ));
        let sender = Arc::new(TransactionSender::new(
            client.clone(),
            builder.clone(),
            nonces,
            SendPolicy::from(&settings.transactions),
        ));

        Self {
            wallet: Arc::new(WalletService::new(client.clone())),
            client,
            gas,
            builder,
            sender,
        }
    }
}

/// Build the API router
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/wallet/balance", get(wallet::balance_without_address))
        .route("/api/wallet/balance/:address", get(wallet::get_balance))
        .route("/api/wallet/estimate-gas", post(wallet::estimate_gas))
        .route("/api/wallet/verify", post(wallet::verify))
        .route("/api/transactions/prepare", post(transactions::prepare))
        .route("/api/transactions/send-signed", post(transactions::send_signed))
        .route("/api/transactions/transfer", post(transactions::transfer))
        .route("/api/transactions/:hash", get(transactions::status))
        .route_layer(middleware::from_fn(track_requests))
        .fallback(not_found)
        .layer(middleware::from_fn(envelope_method_not_allowed))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run_server(
    config: ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> GatewayResult<()> {
    let app = router(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Config(format!("Cannot bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn track_requests(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    metrics::record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

/// Replace the router's bare 405 with the error envelope, keeping `Allow`
async fn envelope_method_not_allowed(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let mut enveloped =
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    if let Some(allow) = response.headers().get(header::ALLOW) {
        enveloped.headers_mut().insert(header::ALLOW, allow.clone());
    }
    enveloped
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found")
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - the node must answer
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let chain_id = state.client.chain_id().await;
    let block_number = state.client.block_number().await;

    match (chain_id, block_number) {
        (Ok(chain_id), Ok(block_number)) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                chain_id: Some(chain_id),
                network: Some(network_name(chain_id)),
                block_number: Some(block_number),
                error: None,
            }),
        ),
        (Err(e), _) | (_, Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                chain_id: None,
                network: None,
                block_number: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessResponse {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[cfg(test)]
mod tests;
