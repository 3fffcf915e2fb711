//! The data endpoint.

use axum::extract::{Json, RawQuery, State};
use datagate_errors::Fault;

use crate::source::DataQuery;
use crate::state::AppState;

use super::types::DataResponse;

/// Fetch the data document.
///
/// Success is delegated to the configured data source; any fault it raises
/// goes to the error pipeline untouched.
pub async fn get_data(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<DataResponse>, Fault> {
    let query = DataQuery::parse(raw.as_deref())?;
    let data = state.source().fetch(&query).await?;
    Ok(Json(DataResponse::new(data)))
}
