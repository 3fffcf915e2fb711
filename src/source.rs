//! Data sources behind `/api/v1/data`.
//!
//! The endpoint itself knows nothing about where data lives; it asks a
//! [`DataSource`] and forwards either the document or the fault.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use datagate_errors::{AppError, Fault, RawFault};
use serde_json::Value;

/// Query parameters of a data request, after sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuery {
    params: BTreeMap<String, String>,
}

impl DataQuery {
    /// Parses a raw query string. A repeated key keeps its last value.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let Some(raw) = raw.filter(|q| !q.is_empty()) else {
            return Ok(Self::default());
        };
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
            .map_err(|e| AppError::new(format!("Invalid query string: {e}"), 400))?;
        Ok(Self {
            params: pairs.into_iter().collect(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The parameters as a JSON object.
    pub fn to_json(&self) -> Value {
        self.iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

/// Producer of the document served by the data endpoint.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches the document for `query`, or the fault that prevented it.
    async fn fetch(&self, query: &DataQuery) -> Result<Value, Fault>;
}

/// Serves a fixed document.
#[derive(Debug, Clone)]
pub struct StaticSource {
    document: Value,
}

impl StaticSource {
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(Value::Array(Vec::new()))
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn fetch(&self, _query: &DataQuery) -> Result<Value, Fault> {
        Ok(self.document.clone())
    }
}

/// Reads a JSON document from disk on every request.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for FileSource {
    async fn fetch(&self, _query: &DataQuery) -> Result<Value, Fault> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            RawFault::named(
                "FileReadError",
                format!("failed to read {}: {e}", self.path.display()),
            )
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RawFault::named(
                "SyntaxError",
                format!("invalid JSON in {}: {e}", self.path.display()),
            )
            .into()
        })
    }
}
