//! The canonical application error.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Coarse outcome reported to clients alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The client sent something wrong (4xx).
    Fail,
    /// The server failed (everything else).
    Error,
}

impl Status {
    /// Derives the status from an HTTP status code.
    pub fn for_code(status_code: u16) -> Self {
        if (400..500).contains(&status_code) {
            Self::Fail
        } else {
            Self::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

/// An error with a resolved status code, ready to be rendered.
///
/// Errors built with [`AppError::new`] are *operational*: they were raised on
/// purpose and their message is safe to show to clients. Errors resolved from
/// an unclassified [`RawFault`](crate::RawFault) keep whatever operational flag
/// the fault carried, defaulting to non-operational.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct AppError {
    message: String,
    status_code: u16,
    status: Status,
    is_operational: bool,
    #[serde(skip)]
    stack: Trace,
}

/// Diagnostic trace carried by an [`AppError`].
#[derive(Debug, Clone)]
enum Trace {
    Text(String),
    /// Frames captured at construction. Symbols are resolved only when the
    /// trace is read, which production responses never do.
    Captured(Arc<Backtrace>),
}

impl AppError {
    /// Creates an operational error. The status is derived from the code.
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        let message = message.into();
        let stack = capture_trace(&message);
        Self {
            message,
            status_code,
            status: Status::for_code(status_code),
            is_operational: true,
            stack,
        }
    }

    /// The error raised for any route or method nothing else handled.
    pub fn not_found(original_url: &str) -> Self {
        Self::new(format!("can not find {original_url} route"), 404)
    }

    /// Builds an operational error that inherits an existing trace instead of
    /// capturing a new one. Used by the classifiers so their output only
    /// depends on their input.
    pub(crate) fn with_stack(message: String, status_code: u16, stack: String) -> Self {
        Self {
            message,
            status_code,
            status: Status::for_code(status_code),
            is_operational: true,
            stack: Trace::Text(stack),
        }
    }

    /// Builds an error from already-resolved parts.
    pub(crate) fn from_parts(
        message: String,
        status_code: u16,
        status: Status,
        is_operational: bool,
        stack: String,
    ) -> Self {
        Self {
            message,
            status_code,
            status,
            is_operational,
            stack: Trace::Text(stack),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_operational(&self) -> bool {
        self.is_operational
    }

    /// Diagnostic trace. Only ever exposed in development responses.
    ///
    /// First line is `Error: <message>`; the captured backtrace follows when
    /// `RUST_BACKTRACE` enabled capture at construction.
    pub fn stack(&self) -> Cow<'_, str> {
        match &self.stack {
            Trace::Text(text) => Cow::Borrowed(text),
            Trace::Captured(backtrace) => {
                Cow::Owned(format!("Error: {}\n{backtrace}", self.message))
            }
        }
    }
}

fn capture_trace(message: &str) -> Trace {
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        Trace::Captured(Arc::new(backtrace))
    } else {
        Trace::Text(format!("Error: {message}"))
    }
}
