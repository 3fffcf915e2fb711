//! Terminal error layer: renders every parked [`Fault`] into the response the
//! client sees.
//!
//! Handlers and middleware return `Fault`, `AppError` or `RawFault` values;
//! those convert into placeholder responses carrying the fault (see
//! `datagate_errors::http`). This layer sits outside all of them, takes the
//! fault back out and runs it through [`respond`] with the configured
//! environment.
//!
//! [`StartupError`] covers the failures that happen before any request.

use std::any::Any;
use std::net::AddrParseError;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use datagate_errors::http::take_fault;
use datagate_errors::{Fault, RawFault, respond};

use crate::state::AppState;

pub use datagate_errors::{AppError, Environment};

/// Failures that stop the server before or while it serves.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid bind host {host:?}: {source}")]
    InvalidHost {
        host: String,
        source: AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Runs the error pipeline on any response carrying a fault.
///
/// Headers set on the placeholder (rate-limit counters, `Retry-After`) are
/// kept; the status code and body are replaced.
pub async fn error_pipeline_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let Some(fault) = take_fault(&mut response) else {
        return response;
    };

    let mut rendered = respond(&fault, state.environment()).into_response();
    for (name, value) in response.headers() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rendered.headers_mut().append(name.clone(), value.clone());
        }
    }
    rendered
}

/// Turns a handler panic into a non-operational fault.
pub fn panic_fault(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };

    Fault::from(RawFault::named("Panic", message)).into_response()
}
