use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::{middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::middleware::csp::ContentSecurityPolicy;
use crate::middleware::headers::{security_headers, HeaderPolicy};
use crate::middleware::query::lowercase_query_keys;
use crate::routes;
use crate::state::AppState;

/// Build the full application router with all middleware layers.
///
/// Shared by `main.rs` and the integration tests so both exercise the same
/// middleware stack.
pub fn build_app_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    let csp = ContentSecurityPolicy::with_overrides(&config.csp_sources)
        .unwrap_or_else(|e| panic!("Invalid CSP configuration: {e}"));
    let header_policy = Arc::new(HeaderPolicy::new(&config, &csp));
    let request_id_header = HeaderName::from_static("x-request-id");

    // Static files take precedence; paths without a file render pages.
    let pages = routes::pages::router(&config).with_state(state.clone());

    Router::new()
        .merge(routes::health::router())
        .fallback_service(routes::static_files::service(&config, pages))
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Query keys are matched case-insensitively by pages and cache control.
        .layer(middleware::from_fn(lowercase_query_keys))
        // Security, CSP and CORS headers; answers OPTIONS.
        .layer(middleware::from_fn_with_state(header_policy, security_headers))
        .layer(CompressionLayer::new())
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // Shared state.
        .with_state(state)
}
