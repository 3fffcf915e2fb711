//! Catch-all for routes and methods nothing else handled.

use axum::extract::OriginalUri;
use datagate_errors::AppError;

/// Raises a 404 naming the URL exactly as the client sent it.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let url = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    AppError::not_found(url)
}
