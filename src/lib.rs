//! Hireboard is a job board API for employers and job seekers.
#![forbid(unsafe_code)]

pub mod account;
pub mod application;
pub mod blob;
pub mod config;
mod crypto;
pub mod database;
pub mod error;
mod middleware;
pub mod portfolio;
pub mod position;
pub mod profile;
mod router;
pub mod skill;
pub mod telemetry;
pub mod token;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

/// Extra room for the JSON around base64 assets.
const BODY_MARGIN: usize = 64 * 1024;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<&str>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(middleware::TOKEN_HEADER, token);
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub crypto: Arc<crypto::Crypto>,
    pub token: Arc<token::TokenService>,
    pub blob: Arc<dyn blob::BlobStore>,
    pub metrics: Option<PrometheusHandle>,
}

/// Prometheus registry, when the recorder is installed.
async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::default()),
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.storage.max_size / 3 * 4 + BODY_MARGIN;

    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            HeaderName::from_static(middleware::TOKEN_HEADER),
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        )
        // Base64 assets travel inside JSON bodies.
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `GET /metrics` goes to `render_metrics`.
        .route("/metrics", get(render_metrics))
        .nest("/auth", router::auth::router(state.clone()))
        .nest("/companies", router::companies::router(state.clone()))
        .nest("/societies", router::societies::router(state.clone()))
        .nest("/positions", router::positions::router(state.clone()))
        .nest("/skills", router::skills::router())
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .nest_service("/uploads", ServeDir::new(&state.config.storage.directory))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let path = std::env::var("CONFIG_PATH").map(PathBuf::from).unwrap_or_default();
    let config = config::Configuration::default().path(path).read()?;

    let db = match config.postgres {
        Some(ref config) => database::Database::postgres(config).await?,
        None => {
            tracing::warn!("missing `postgres` entry on `config.yaml` file, data only lives in memory");
            database::Database::memory()
        },
    };

    let salt = std::env::var("SALT").map_err(|_| "missing `SALT` environment variable")?;
    let crypto = Arc::new(crypto::Crypto::new(config.argon2.clone(), &salt)?);

    // handle jwt.
    let manager = token::TokenManager::new(&config.url, &config.token)?;
    let token = Arc::new(token::TokenService::new(
        manager,
        db.revocations.clone(),
        crypto::Hasher::new(&salt),
    ));

    let blob = Arc::new(blob::DiskBlobStore::new(
        config.storage.directory.clone(),
        config.public_storage_url()?,
    ));

    let metrics = telemetry::setup_metrics_recorder()
        .inspect_err(|err| tracing::warn!(error = %err, "prometheus recorder not installed"))
        .ok();

    Ok(AppState {
        config,
        db,
        crypto,
        token,
        blob,
        metrics,
    })
}
