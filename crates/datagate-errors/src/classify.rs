//! Classifiers: rewrite recognized raw faults into operational errors with a
//! message that is safe to show to clients.

use serde_json::Value;

use crate::app_error::AppError;
use crate::fault::{FaultKind, RawFault};

const MALFORMED_TOKEN_MESSAGE: &str = "invalid credentials, please log in again";
const EXPIRED_TOKEN_MESSAGE: &str = "expired token credentials, please log in again";

/// Classifies a raw fault. Returns `None` when the fault has no recognized
/// shape and must be resolved as-is.
pub fn classify(raw: &RawFault) -> Option<AppError> {
    let stack = raw.stack_or_summary();
    match FaultKind::of(raw) {
        FaultKind::Cast { path, value } => Some(cast_error(path, value, stack)),
        FaultKind::Validation { messages } => Some(validation_error(&messages, stack)),
        FaultKind::MalformedToken => Some(AppError::with_stack(
            MALFORMED_TOKEN_MESSAGE.to_string(),
            401,
            stack,
        )),
        FaultKind::ExpiredToken => Some(AppError::with_stack(
            EXPIRED_TOKEN_MESSAGE.to_string(),
            401,
            stack,
        )),
        FaultKind::DuplicateKey { driver_message } => duplicate_key_error(driver_message, stack),
        FaultKind::Unrecognized => None,
    }
}

fn cast_error(path: Option<&str>, value: Option<&Value>, stack: String) -> AppError {
    let path = path.unwrap_or("value");
    let value = match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    };
    AppError::with_stack(format!("Invalid {path}: {value}"), 400, stack)
}

fn validation_error(messages: &[&str], stack: String) -> AppError {
    AppError::with_stack(
        format!("invalid input data{}", messages.join(". ")),
        400,
        stack,
    )
}

/// `None` when the driver message carries no quoted value to report.
fn duplicate_key_error(driver_message: &str, stack: String) -> Option<AppError> {
    let value = first_quoted_token(driver_message)?;
    Some(AppError::with_stack(
        format!("duplicated value {value}, please use another value"),
        400,
        stack,
    ))
}

/// First `"..."` run in `text`, quotes included.
fn first_quoted_token(text: &str) -> Option<&str> {
    let start = text.find('"')?;
    let len = text[start + 1..].find('"')?;
    Some(&text[start..start + len + 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_error::Status;
    use crate::fault::{
        CAST_ERROR, DUPLICATE_KEY_CODE, JSON_WEB_TOKEN_ERROR, TOKEN_EXPIRED_ERROR,
        VALIDATION_ERROR,
    };

    #[test]
    fn cast_fault() {
        let raw = RawFault::named(CAST_ERROR, "Cast to ObjectId failed").with_path_value("id", "abc");
        let err = classify(&raw).unwrap();
        assert_eq!(err.message(), "Invalid id: abc");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.status(), Status::Fail);
        assert!(err.is_operational());
    }

    #[test]
    fn cast_fault_renders_non_string_values_as_json() {
        let raw = RawFault::named(CAST_ERROR, "cast").with_path_value("age", serde_json::json!(12));
        assert_eq!(classify(&raw).unwrap().message(), "Invalid age: 12");

        let raw = RawFault::named(CAST_ERROR, "cast");
        assert_eq!(classify(&raw).unwrap().message(), "Invalid value: null");
    }

    #[test]
    fn duplicate_key_extracts_first_quoted_token() {
        let raw = RawFault::new("E11000").with_code(DUPLICATE_KEY_CODE).with_errmsg(
            r#"E11000 duplicate key error collection: app.users index: email_1 dup key: { email: "a@b.com" }"#,
        );
        let err = classify(&raw).unwrap();
        assert_eq!(
            err.message(),
            r#"duplicated value "a@b.com", please use another value"#
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn duplicate_key_without_quoted_value_stays_unclassified() {
        let raw = RawFault::new("E11000")
            .with_code(DUPLICATE_KEY_CODE)
            .with_errmsg("E11000 duplicate key error");
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn validation_joins_field_messages() {
        let raw = RawFault::named(VALIDATION_ERROR, "Validation failed")
            .with_field_error("name", "name is required")
            .with_field_error("email", "email is invalid");
        let err = classify(&raw).unwrap();
        assert_eq!(
            err.message(),
            "invalid input dataname is required. email is invalid"
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn token_faults() {
        let err = classify(&RawFault::named(JSON_WEB_TOKEN_ERROR, "jwt malformed")).unwrap();
        assert_eq!(err.message(), MALFORMED_TOKEN_MESSAGE);
        assert_eq!(err.status_code(), 401);

        let err = classify(&RawFault::named(TOKEN_EXPIRED_ERROR, "jwt expired")).unwrap();
        assert_eq!(err.message(), EXPIRED_TOKEN_MESSAGE);
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.status(), Status::Fail);
    }

    #[test]
    fn unrecognized_fault_is_not_classified() {
        assert!(classify(&RawFault::new("db connection refused")).is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        let raw = RawFault::named(CAST_ERROR, "cast").with_path_value("id", "abc");
        let first = classify(&raw).unwrap();
        let second = classify(&raw).unwrap();
        assert_eq!(first.message(), second.message());
        assert_eq!(first.stack(), second.stack());
    }

    #[test]
    fn quoted_token_edges() {
        assert_eq!(first_quoted_token(r#"a "b" "c""#), Some(r#""b""#));
        assert_eq!(first_quoted_token(r#"empty """#), Some(r#""""#));
        assert_eq!(first_quoted_token(r#"unterminated "x"#), None);
        assert_eq!(first_quoted_token("none"), None);
    }
}
