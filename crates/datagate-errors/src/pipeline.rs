//! The terminal error response stage.
//!
//! ```text
//! Fault ──► respond(fault, env)
//!             ├─ Development ─► resolve defaults ─► {status, message, error, stack}
//!             └─ Production  ─► log ─► classify ─► operational?  {status, message}
//!                                                  otherwise     500 {status, "something went wrong"}
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::app_error::{AppError, Status};
use crate::classify::classify;
use crate::environment::Environment;
use crate::fault::Fault;

/// Message returned in production for every non-operational error.
pub const GENERIC_MESSAGE: &str = "something went wrong";

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    /// Development body with full diagnostics.
    Detailed {
        status: Status,
        message: String,
        error: Value,
        stack: String,
    },
    /// Production body.
    Public { status: Status, message: String },
}

impl ErrorBody {
    pub fn status(&self) -> Status {
        match self {
            Self::Detailed { status, .. } | Self::Public { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Detailed { message, .. } | Self::Public { message, .. } => message,
        }
    }
}

/// A fully rendered error response: status code plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub body: ErrorBody,
}

/// Renders the single response for a failed request.
pub fn respond(fault: &Fault, env: Environment) -> ErrorResponse {
    match env {
        Environment::Development => development_response(fault),
        Environment::Production => production_response(fault),
    }
}

fn development_response(fault: &Fault) -> ErrorResponse {
    let resolved = fault.resolve();
    tracing::debug!(
        status_code = resolved.status_code(),
        error = %fault,
        "request failed"
    );

    ErrorResponse {
        status_code: resolved.status_code(),
        body: ErrorBody::Detailed {
            status: resolved.status(),
            message: fault.message().to_string(),
            error: diagnostic_object(fault),
            stack: resolved.stack().into_owned(),
        },
    }
}

fn production_response(fault: &Fault) -> ErrorResponse {
    tracing::error!(error = ?fault, "request failed");

    let error = match fault {
        Fault::App(err) => err.clone(),
        Fault::Upstream(raw) => classify(raw).unwrap_or_else(|| raw.resolve()),
    };

    if error.is_operational() {
        public_response(&error)
    } else {
        ErrorResponse {
            status_code: 500,
            body: ErrorBody::Public {
                status: Status::Error,
                message: GENERIC_MESSAGE.to_string(),
            },
        }
    }
}

fn public_response(error: &AppError) -> ErrorResponse {
    ErrorResponse {
        status_code: error.status_code(),
        body: ErrorBody::Public {
            status: error.status(),
            message: error.message().to_string(),
        },
    }
}

/// The fault as a JSON object, with resolved status code and status.
fn diagnostic_object(fault: &Fault) -> Value {
    let value = match fault {
        Fault::App(err) => serde_json::to_value(err),
        Fault::Upstream(raw) => serde_json::to_value(raw.resolved_copy()),
    };
    value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::fault::{
        CAST_ERROR, DUPLICATE_KEY_CODE, JSON_WEB_TOKEN_ERROR, RawFault, TOKEN_EXPIRED_ERROR,
    };

    fn production(fault: impl Into<Fault>) -> (u16, Value) {
        let response = respond(&fault.into(), Environment::Production);
        (
            response.status_code,
            serde_json::to_value(&response.body).unwrap(),
        )
    }

    #[test]
    fn production_cast_fault() {
        let raw = RawFault::named(CAST_ERROR, "Cast to ObjectId failed").with_path_value("id", "abc");
        assert_eq!(
            production(raw),
            (400, json!({"status": "fail", "message": "Invalid id: abc"}))
        );
    }

    #[test]
    fn production_duplicate_key_fault() {
        let raw = RawFault::new("E11000").with_code(DUPLICATE_KEY_CODE).with_errmsg(
            r#"E11000 duplicate key error... index: email_1 dup key: { email: "a@b.com" }"#,
        );
        let (code, body) = production(raw);
        assert_eq!(code, 400);
        assert_eq!(body["status"], "fail");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with(r#"duplicated value "a@b.com""#)
        );
    }

    #[test]
    fn production_expired_token_fault() {
        assert_eq!(
            production(RawFault::named(TOKEN_EXPIRED_ERROR, "jwt expired")),
            (
                401,
                json!({
                    "status": "fail",
                    "message": "expired token credentials, please log in again"
                })
            )
        );
    }

    #[test]
    fn production_malformed_token_fault() {
        let (code, body) = production(RawFault::named(JSON_WEB_TOKEN_ERROR, "jwt malformed"));
        assert_eq!(code, 401);
        assert_eq!(body["message"], "invalid credentials, please log in again");
    }

    #[test]
    fn production_hides_unclassified_faults() {
        assert_eq!(
            production(RawFault::new("db connection refused")),
            (500, json!({"status": "error", "message": GENERIC_MESSAGE}))
        );
    }

    #[test]
    fn production_hides_non_operational_status_codes() {
        let raw = RawFault::named("PayloadTooLargeError", "request entity too large")
            .with_status_code(413);
        assert_eq!(
            production(raw),
            (500, json!({"status": "error", "message": GENERIC_MESSAGE}))
        );
    }

    #[test]
    fn production_shows_operational_upstream_faults() {
        let raw = RawFault::new("slow down")
            .with_status_code(429)
            .with_operational(true);
        assert_eq!(
            production(raw),
            (429, json!({"status": "error", "message": "slow down"}))
        );
    }

    #[test]
    fn out_of_range_status_codes_render_as_500() {
        let raw = RawFault::new("x").with_status_code(0).with_operational(true);
        assert_eq!(
            production(raw.clone()),
            (500, json!({"status": "error", "message": "x"}))
        );

        let response = respond(&Fault::from(raw), Environment::Development);
        assert_eq!(response.status_code, 500);
        let body = serde_json::to_value(&response.body).unwrap();
        assert_eq!(body["error"]["statusCode"], 500);
    }

    #[derive(Clone)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logs_of(fault: impl Into<Fault>, env: Environment) -> String {
        let buffer = LogBuffer(Arc::new(Mutex::new(Vec::new())));
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        let fault = fault.into();
        tracing::subscriber::with_default(subscriber, || {
            respond(&fault, env);
        });
        String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn production_logs_fault_before_classification() {
        let raw = RawFault::named(CAST_ERROR, "Cast to ObjectId failed").with_path_value("id", "abc");
        let logs = logs_of(raw, Environment::Production);
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("request failed"), "{logs}");
        assert!(logs.contains("Cast to ObjectId failed"), "{logs}");
        assert!(!logs.contains("Invalid id"), "{logs}");

        let logs = logs_of(RawFault::new("db connection refused"), Environment::Production);
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("db connection refused"), "{logs}");
    }

    #[test]
    fn development_logs_at_debug() {
        let logs = logs_of(AppError::new("bad input", 400), Environment::Development);
        assert!(logs.contains("DEBUG"), "{logs}");
        assert!(!logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("bad input"), "{logs}");
    }

    #[test]
    fn production_shows_application_errors() {
        assert_eq!(
            production(AppError::not_found("/nope")),
            (
                404,
                json!({"status": "fail", "message": "can not find /nope route"})
            )
        );
    }

    #[test]
    fn development_exposes_diagnostics() {
        let fault = Fault::from(
            RawFault::named(CAST_ERROR, "Cast to ObjectId failed").with_path_value("id", "abc"),
        );
        let response = respond(&fault, Environment::Development);
        assert_eq!(response.status_code, 500);

        let body = serde_json::to_value(&response.body).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Cast to ObjectId failed");
        assert_eq!(body["stack"], "CastError: Cast to ObjectId failed");
        assert_eq!(body["error"]["name"], CAST_ERROR);
        assert_eq!(body["error"]["path"], "id");
        assert_eq!(body["error"]["statusCode"], 500);
        assert_eq!(body["error"]["status"], "error");
    }

    #[test]
    fn development_keeps_application_status() {
        let fault = Fault::from(AppError::new("bad input", 400));
        let response = respond(&fault, Environment::Development);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body.status(), Status::Fail);
        assert_eq!(response.body.message(), "bad input");

        let body = serde_json::to_value(&response.body).unwrap();
        assert_eq!(body["error"]["isOperational"], true);
        assert!(body["stack"].as_str().unwrap().starts_with("Error: bad input"));
    }

    #[test]
    fn responses_are_idempotent() {
        let faults = [
            Fault::from(RawFault::new("db connection refused")),
            Fault::from(RawFault::named(CAST_ERROR, "cast").with_path_value("id", "abc")),
            Fault::from(AppError::new("teapot", 418)),
        ];
        for fault in &faults {
            for env in [Environment::Development, Environment::Production] {
                let first = serde_json::to_vec(&respond(fault, env).body).unwrap();
                let second = serde_json::to_vec(&respond(fault, env).body).unwrap();
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn status_code_is_always_resolved() {
        let faults = [
            Fault::from(RawFault::new("a")),
            Fault::from(RawFault::named("Whatever", "b").with_operational(true)),
        ];
        for fault in &faults {
            for env in [Environment::Development, Environment::Production] {
                assert_eq!(respond(fault, env).status_code, 500);
            }
        }
    }
}
