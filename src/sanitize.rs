//! Input sanitization for query strings and JSON bodies.
//!
//! Three rules apply to everything a client sends before it reaches a
//! handler:
//! - keys starting with `$` or containing `.` are dropped (operator injection),
//! - `<` and `>` in string values are escaped as HTML entities,
//! - a repeated query key keeps only its last value.

use axum::body::Body;
use axum::extract::{OriginalUri, Request, State};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderValue, Uri, header};
use axum::middleware::Next;
use axum::response::Response;
use datagate_errors::{AppError, Fault, RawFault};
use serde_json::Value;

use crate::state::AppState;

/// Whether a key could smuggle a query operator or a nested path.
pub fn is_forbidden_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Escapes markup delimiters in a string value.
pub fn escape_markup(value: &str) -> String {
    if !value.contains(['<', '>']) {
        return value.to_string();
    }
    value.replace('<', "&lt;").replace('>', "&gt;")
}

/// Sanitizes a JSON document recursively.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_markup(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !is_forbidden_key(k))
                .map(|(k, v)| (k, sanitize_json(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Sanitizes a raw query string and re-encodes it.
///
/// Keys keep the position of their first occurrence and the value of their
/// last.
pub fn sanitize_query(raw: &str) -> Result<String, AppError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
        .map_err(|e| AppError::new(format!("Invalid query string: {e}"), 400))?;

    let mut kept: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        if is_forbidden_key(&key) {
            continue;
        }
        let value = escape_markup(&value);
        match kept.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => kept.push((key, value)),
        }
    }

    serde_urlencoded::to_string(&kept)
        .map_err(|e| AppError::new(format!("Invalid query string: {e}"), 400))
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
}

fn declared_length(req: &Request) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn too_large(limit: usize) -> Fault {
    RawFault::named(
        "PayloadTooLargeError",
        format!("request entity too large (limit {limit} bytes)"),
    )
    .with_status_code(413)
    .into()
}

fn rewrite_query(uri: &Uri, query: &str) -> Result<Uri, AppError> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{query}", uri.path())
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| AppError::new(format!("Invalid query string: {e}"), 400))?,
    );
    Uri::from_parts(parts).map_err(|e| AppError::new(format!("Invalid request URI: {e}"), 400))
}

async fn sanitize_body(req: Request, limit: usize) -> Result<Request, Fault> {
    if declared_length(&req).is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    let (mut parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| too_large(limit))?;
    if bytes.is_empty() {
        return Ok(Request::from_parts(parts, Body::empty()));
    }

    let document: Value = serde_json::from_slice(&bytes).map_err(|e| {
        Fault::from(RawFault::named("SyntaxError", e.to_string()).with_status_code(400))
    })?;
    let cleaned = serde_json::to_vec(&sanitize_json(document))
        .map_err(|e| Fault::from(RawFault::new(e.to_string())))?;

    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
    Ok(Request::from_parts(parts, Body::from(cleaned)))
}

/// Sanitizes the query string and any JSON body before routing.
pub async fn sanitize_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Fault> {
    if req.extensions().get::<OriginalUri>().is_none() {
        let original = OriginalUri(req.uri().clone());
        req.extensions_mut().insert(original);
    }

    if let Some(raw) = req.uri().query() {
        let cleaned = sanitize_query(raw)?;
        if cleaned != raw {
            tracing::debug!(query = raw, "query string sanitized");
            *req.uri_mut() = rewrite_query(req.uri(), &cleaned)?;
        }
    }

    if is_json(&req) {
        req = sanitize_body(req, state.body_limit()).await?;
    }

    Ok(next.run(req).await)
}
