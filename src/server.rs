//! HTTP API server.
//!
//! Exposes the source catalog and the analysis pipeline as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/proxy` | Single-source lookup (`apiName`, `endpoint`, `params`) |
//! | `GET`  | `/api/health` | Liveness, uptime, version |
//! | `GET`  | `/api/status` | Per-source availability |
//! | `POST` | `/api/analyze` | Full analysis; `?format=csv` for the tabular export |
//! | `GET`  | `/api/history` | Recent analyses, newest first |
//! | `GET`  | `/api/metrics` | Lookup performance summary |
//!
//! # Error Contract
//!
//! ```json
//! { "success": false, "error": { "message": "Unsupported API: X", "code": "API_ERROR", "timestamp": "..." } }
//! ```
//!
//! Codes: `BAD_REQUEST` (400, including unreadable `/api/analyze` bodies),
//! `MALFORMED_PARAMETERS` (400), `NOT_FOUND` (404), `API_ERROR` (500).
//! Clients over their request budget get a 429 with code
//! `RATE_LIMIT_EXCEEDED`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::SourceError;
use crate::limiter::FixedWindowLimiter;
use crate::models::LookupParams;
use crate::pipeline::Analyzer;
use crate::registry::SourceRegistry;
use crate::report::{to_structured, to_tabular};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    analyzer: Arc<Analyzer>,
    /// Per-client request budget for `/api/*`.
    clients: Arc<FixedWindowLimiter>,
    started: Instant,
}

/// Starts the HTTP server with the built-in sources.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_sources(config, SourceRegistry::with_builtins()).await
}

/// Starts the HTTP server over a caller-assembled registry.
///
/// # Example
///
/// ```rust,no_run
/// use pharmascope::registry::SourceRegistry;
/// use pharmascope::server::run_server_with_sources;
///
/// # async fn example(config: &pharmascope::config::Config) -> anyhow::Result<()> {
/// let mut sources = SourceRegistry::with_builtins();
/// // sources.register(SourceDescriptor::new(...));
/// run_server_with_sources(config, sources).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_sources(
    config: &Config,
    registry: SourceRegistry,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let source_count = registry.len();
    let app = build_router(config, registry);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(
        bind = %bind_addr,
        sources = source_count,
        environment = %config.server.environment,
        "server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Build the application router.
pub fn build_router(config: &Config, registry: SourceRegistry) -> Router {
    let clients = FixedWindowLimiter::new(
        Duration::from_secs(config.server.client_rate_window_secs),
        config.server.client_rate_limit,
    );
    let state = AppState {
        config: Arc::new(config.clone()),
        analyzer: Arc::new(Analyzer::with_registry(registry, config)),
        clients: Arc::new(clients),
        started: Instant::now(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/proxy", get(handle_proxy))
        .route("/api/health", get(handle_health))
        .route("/api/status", get(handle_status))
        .route("/api/analyze", post(handle_analyze))
        .route("/api/history", get(handle_history))
        .route("/api/metrics", get(handle_metrics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            limit_clients,
        ))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": {
                "message": self.message,
                "code": self.code,
                "timestamp": Utc::now().to_rfc3339(),
            }
        });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "BAD_REQUEST",
        message: message.into(),
    }
}

/// Maps source errors onto the HTTP contract. Malformed parameters are the
/// caller's fault; everything else is reported as a 500 `API_ERROR`.
impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::MalformedParameters(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "MALFORMED_PARAMETERS",
                message: err.to_string(),
            },
            _ => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "API_ERROR",
                message: err.to_string(),
            },
        }
    }
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "NOT_FOUND",
        message: "Endpoint not found".to_string(),
    }
}

// ============ Client rate limit ============

async fn limit_clients(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.clients.allow(&client) {
        tracing::warn!(%client, "client rate limit exceeded");
        let body = json!({
            "error": "Too many requests from this IP, please try again later.",
            "code": "RATE_LIMIT_EXCEEDED",
        });
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }

    next.run(req).await
}

// ============ GET /api/proxy ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyQuery {
    api_name: Option<String>,
    endpoint: Option<String>,
    params: Option<String>,
}

/// Parse the `params` query value into lookup parameters. It must be a JSON
/// object; absent or empty means no parameters.
fn parse_params(raw: Option<&str>) -> Result<LookupParams, SourceError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(LookupParams::new()),
        Some(raw) => raw,
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(_) => Err(SourceError::MalformedParameters(
            "params must be a JSON object".to_string(),
        )),
        Err(e) => Err(SourceError::MalformedParameters(e.to_string())),
    }
}

/// Handler for `GET /api/proxy`.
///
/// Looks up one source directly, after a simulated network delay. The
/// coordinator's rate limiter and cache are not involved. A missing
/// `apiName` is treated as an unknown source.
async fn handle_proxy(
    State(state): State<AppState>,
    Query(q): Query<ProxyQuery>,
) -> Result<Json<Value>, AppError> {
    let started = Instant::now();
    let api_name = q
        .api_name
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "undefined".to_string());
    let params = parse_params(q.params.as_deref())?;
    let descriptor = state.analyzer.registry().resolve(&api_name)?;
    let endpoint = q
        .endpoint
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| descriptor.endpoint.clone());

    tracing::debug!(api = %api_name, %endpoint, "proxy request");

    let (min, max) = state.config.server.simulated_latency_ms;
    let delay = rand::thread_rng().gen_range(min..=max);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let payload = descriptor.source().lookup(&endpoint, &params).await?;

    Ok(Json(json!({
        "success": true,
        "data": payload.to_wire(),
        "metadata": {
            "apiName": api_name,
            "endpoint": endpoint,
            "timestamp": Utc::now().to_rfc3339(),
            "processingTime": started.elapsed().as_millis() as u64,
            "cached": false,
            "demo": true,
        }
    })))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    /// Seconds since the server started.
    uptime: f64,
    version: &'static str,
    environment: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started.elapsed().as_secs_f64(),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.server.environment.clone(),
    })
}

// ============ GET /api/status ============

/// Handler for `GET /api/status`.
///
/// Every registered source is reported online with a simulated latency.
async fn handle_status(State(state): State<AppState>) -> Json<Value> {
    let now = Utc::now().to_rfc3339();
    let mut rng = rand::thread_rng();
    let databases: serde_json::Map<String, Value> = state
        .analyzer
        .registry()
        .descriptors()
        .iter()
        .map(|d| {
            (
                d.id.clone(),
                json!({
                    "online": true,
                    "latency": rng.gen_range(100..600),
                    "lastChecked": now,
                }),
            )
        })
        .collect();

    Json(json!({
        "databases": databases,
        "overall": "operational",
        "timestamp": now,
    }))
}

// ============ POST /api/analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    query: String,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Deserialize)]
struct FormatQuery {
    format: Option<String>,
}

/// Handler for `POST /api/analyze`.
///
/// Returns `{ success, report }`, or the CSV export when `?format=csv`.
async fn handle_analyze(
    State(state): State<AppState>,
    Query(fmt): Query<FormatQuery>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let csv = match fmt.format.as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(other) => return Err(bad_request(format!("unknown format: {}", other))),
    };

    let report = state.analyzer.analyze(&req.query, &req.sources).await?;

    if csv {
        Ok((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            to_tabular(&report),
        )
            .into_response())
    } else {
        Ok(Json(json!({
            "success": true,
            "report": to_structured(&report),
        }))
        .into_response())
    }
}

// ============ GET /api/history, /api/metrics ============

async fn handle_history(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "history": state.analyzer.history().entries(),
    }))
}

async fn handle_metrics(State(state): State<AppState>) -> Json<Value> {
    let coordinator = state.analyzer.coordinator();
    Json(json!({
        "success": true,
        "metrics": coordinator.metrics().report(),
        "cacheEntries": coordinator.cache().entry_count(),
    }))
}
