//! Response types for the Datagate HTTP API.

use serde::Serialize;
use serde_json::Value;

/// Successful `/api/v1/data` response.
#[derive(Debug, Serialize)]
pub struct DataResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Number of items in `data`: the array length, or 1 for a single document.
    pub results: usize,
    pub data: Value,
}

impl DataResponse {
    pub fn new(data: Value) -> Self {
        let results = match &data {
            Value::Array(items) => items.len(),
            _ => 1,
        };
        Self {
            status: "success",
            results,
            data,
        }
    }
}
