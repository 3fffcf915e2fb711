//! Datagate Errors: classification and response pipeline for request failures.
//!
//! Every failure raised while handling a request ends up here as a [`Fault`]:
//! either an [`AppError`] raised on purpose by application code, or a
//! [`RawFault`] of unknown shape coming from a lower layer (validation
//! library, token verifier, data-layer driver).
//!
//! [`respond`] is the single terminal stage. It resolves defaults, classifies
//! raw faults into operational errors, and produces the JSON body for the
//! active [`Environment`].
//!
//! **Zero transport dependencies** unless the `http` feature is enabled, in
//! which case the types also implement `axum::response::IntoResponse`.

pub mod app_error;
pub mod classify;
pub mod environment;
pub mod fault;
#[cfg(feature = "http")]
pub mod http;
pub mod pipeline;

pub use app_error::{AppError, Status};
pub use classify::classify;
pub use environment::Environment;
pub use fault::{Fault, FaultKind, FieldFault, RawFault};
pub use pipeline::{ErrorBody, ErrorResponse, GENERIC_MESSAGE, respond};
