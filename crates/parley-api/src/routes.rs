//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, the upload
//! body limit, and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use parley_core::config::ParleyConfig;
use parley_core::error::ParleyError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Body limit for everything except turn submission.
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;
/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.api.port;
    let origins: Vec<HeaderValue> = ["127.0.0.1", "localhost"]
        .iter()
        .filter_map(|host| format!("http://{}:{}", host, port).parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let upload_limit = state
        .config
        .session
        .max_upload_mb
        .saturating_mul(1024 * 1024)
        .saturating_add(MULTIPART_OVERHEAD);

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::ui))
        .route("/ui", get(handlers::ui));

    let limiter = RateLimiter::new(state.config.api.rate_limit_per_sec);

    let api_routes = Router::new()
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/{id}", get(handlers::get_session))
        .route(
            "/api/sessions/{id}/turns",
            post(handlers::submit_turn).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/sessions/{id}/reset", post(handlers::reset_session))
        .route("/api/sessions/{id}/cancel", post(handlers::cancel_turn))
        .route(
            "/api/sessions/{id}/settings",
            put(handlers::update_settings).layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .route("/api/sessions/{id}/speech", get(handlers::speech))
        .route("/api/sessions/{id}/export", get(handlers::export))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    public_routes
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Runs until `shutdown` resolves, then drains in-flight requests.
pub async fn start_server(
    config: &ParleyConfig,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ParleyError> {
    let addr = format!("{}:{}", config.api.host, config.api.port);

    let router = create_router(state);

    tracing::info!("Starting API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ParleyError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
