//! HTTP routes and middleware stack for Datagate.

mod data;
mod fallback;
pub mod types;

use axum::Router;
use axum::handler::HandlerWithoutStateExt;
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{error_pipeline_middleware, panic_fault};
use crate::rate_limit::rate_limit_middleware;
use crate::request_id::{X_REQUEST_ID, request_id_middleware};
use crate::sanitize::sanitize_middleware;
use crate::security::harden;
use crate::state::AppState;

pub use fallback::not_found;

/// Builds the main application router.
///
/// Layers, outermost first: hardening headers, CORS, compression, request
/// ID, access log, error pipeline, panic catcher, sanitizer. The rate limiter
/// only wraps `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/v1/data", get(data::get_data).fallback(not_found))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let app = Router::new().nest("/api", api);

    // Static files for everything outside the API; misses become 404 faults.
    let app = match state.public_dir() {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(not_found.into_service()),
        ),
        None => app.fallback(not_found),
    };

    let app = app
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sanitize_middleware,
        ))
        .layer(CatchPanicLayer::custom(panic_fault))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error_pipeline_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state))
        .with_state(state);

    harden(app)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = state.cors_origins();

    // No origins configured → no CORS headers (deny cross-origin by default).
    if origins.is_empty() {
        return CorsLayer::new();
    }

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            X_REQUEST_ID.clone(),
        ])
        .expose_headers([
            X_REQUEST_ID.clone(),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
        ]);

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured with wildcard origin, all cross-origin requests allowed");
        base.allow_origin(tower_http::cors::Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        base.allow_origin(parsed)
    }
}
