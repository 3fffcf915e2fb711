//! Pipeline input: raw upstream faults and the tagged view over them.

use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::app_error::{AppError, Status};

/// Discriminator names recognized by the classifiers.
pub const CAST_ERROR: &str = "CastError";
pub const VALIDATION_ERROR: &str = "ValidationError";
pub const JSON_WEB_TOKEN_ERROR: &str = "JsonWebTokenError";
pub const TOKEN_EXPIRED_ERROR: &str = "TokenExpiredError";

/// Driver code for a unique index violation.
pub const DUPLICATE_KEY_CODE: i64 = 11000;

/// A single field failure inside a schema-validation fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFault {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub message: String,
}

/// An error of unknown shape arriving from a lower layer.
///
/// Every discriminating field is optional. The JSON representation uses the
/// camelCase keys drivers and token verifiers emit, so faults can be decoded
/// straight from upstream payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFault {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errmsg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Per-field failures, in the order the validator reported them.
    #[serde(
        default,
        deserialize_with = "field_faults",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<FieldFault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Only `"fail"` and `"error"` are kept; numeric HTTP-library statuses
    /// decode as absent.
    #[serde(
        default,
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_operational: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl RawFault {
    /// A fault carrying only a message, like a plain runtime error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// A fault with a `name` discriminator.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn with_errmsg(mut self, errmsg: impl Into<String>) -> Self {
        self.errmsg = Some(errmsg.into());
        self
    }

    #[must_use]
    pub fn with_path_value(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path = Some(path.into());
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_field_error(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(FieldFault {
            path: path.into(),
            message: message.into(),
        });
        self
    }

    #[must_use]
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    #[must_use]
    pub fn with_operational(mut self, is_operational: bool) -> Self {
        self.is_operational = Some(is_operational);
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// The fault's own trace, or a one-line summary when it has none.
    pub fn stack_or_summary(&self) -> String {
        self.stack.clone().unwrap_or_else(|| self.to_string())
    }

    /// The fault's status code, or 500 when it is missing or not an HTTP
    /// status.
    pub fn resolved_status_code(&self) -> u16 {
        self.status_code
            .filter(|code| (100..=599).contains(code))
            .unwrap_or(500)
    }

    /// Resolves an unclassified fault: status code 500 and status `error`
    /// when missing, non-operational unless the fault says otherwise.
    pub fn resolve(&self) -> AppError {
        AppError::from_parts(
            self.message.clone(),
            self.resolved_status_code(),
            self.status.unwrap_or(Status::Error),
            self.is_operational.unwrap_or(false),
            self.stack_or_summary(),
        )
    }

    /// Copy with the defaults filled in, as exposed in development bodies.
    pub(crate) fn resolved_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.status_code = Some(self.resolved_status_code());
        copy.status.get_or_insert(Status::Error);
        copy
    }
}

/// Accepts field failures as a list, or as an object keyed by field path the
/// way schema validators report them. Object entries keep their input order.
fn field_faults<'de, D>(deserializer: D) -> Result<Vec<FieldFault>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FieldFaults;

    impl<'de> Visitor<'de> for FieldFaults {
        type Value = Vec<FieldFault>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list or map of field errors")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut faults = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(fault) = seq.next_element::<FieldFault>()? {
                faults.push(fault);
            }
            Ok(faults)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut faults = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, mut fault)) = map.next_entry::<String, FieldFault>()? {
                if fault.path.is_empty() {
                    fault.path = key;
                }
                faults.push(fault);
            }
            Ok(faults)
        }
    }

    deserializer.deserialize_any(FieldFaults)
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<Status>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Status::deserialize(value).ok())
}

impl fmt::Display for RawFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.name.as_deref().unwrap_or("Error"),
            self.message
        )
    }
}

/// Anything that can reach the response stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Fault {
    /// Raised on purpose by application code.
    #[error(transparent)]
    App(AppError),

    /// Arrived from a lower layer with an unknown shape.
    #[error("{0}")]
    Upstream(RawFault),
}

impl Fault {
    /// The original, unrewritten message.
    pub fn message(&self) -> &str {
        match self {
            Self::App(err) => err.message(),
            Self::Upstream(raw) => &raw.message,
        }
    }

    /// Working copy with a resolved status code and status. Raw faults are
    /// not classified here.
    pub fn resolve(&self) -> AppError {
        match self {
            Self::App(err) => err.clone(),
            Self::Upstream(raw) => raw.resolve(),
        }
    }
}

impl From<AppError> for Fault {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<RawFault> for Fault {
    fn from(raw: RawFault) -> Self {
        Self::Upstream(raw)
    }
}

// ---------------------------------------------------------------------------
// Tagged view
// ---------------------------------------------------------------------------

/// The recognized shapes of a raw fault, decided once by [`FaultKind::of`].
#[derive(Debug, Clone, PartialEq)]
pub enum FaultKind<'a> {
    /// A value could not be cast to the type a field expects.
    Cast {
        path: Option<&'a str>,
        value: Option<&'a Value>,
    },
    /// Schema validation rejected one or more fields.
    Validation { messages: Vec<&'a str> },
    /// The bearer token could not be verified.
    MalformedToken,
    /// The bearer token is past its expiry.
    ExpiredToken,
    /// A unique index rejected the write.
    DuplicateKey { driver_message: &'a str },
    /// None of the above.
    Unrecognized,
}

impl<'a> FaultKind<'a> {
    /// Inspects the fault's discriminators in a fixed order: cast,
    /// validation, malformed token, expired token, duplicate key. The first
    /// match decides the variant.
    pub fn of(raw: &'a RawFault) -> Self {
        match raw.name.as_deref() {
            Some(CAST_ERROR) => {
                return Self::Cast {
                    path: raw.path.as_deref(),
                    value: raw.value.as_ref(),
                };
            }
            Some(VALIDATION_ERROR) => {
                return Self::Validation {
                    messages: raw.errors.iter().map(|e| e.message.as_str()).collect(),
                };
            }
            Some(JSON_WEB_TOKEN_ERROR) => return Self::MalformedToken,
            Some(TOKEN_EXPIRED_ERROR) => return Self::ExpiredToken,
            _ => {}
        }

        if raw.code == Some(DUPLICATE_KEY_CODE) {
            return Self::DuplicateKey {
                driver_message: raw.errmsg.as_deref().unwrap_or(&raw.message),
            };
        }

        Self::Unrecognized
    }
}
