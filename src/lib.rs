//! Datagate Server - a data endpoint behind a hardened middleware stack.
//!
//! Every failure (handler faults, middleware rejections, unmatched routes,
//! panics) is rendered by one terminal error pipeline from the
//! `datagate-errors` crate, with the response shape chosen by the deployment
//! environment.

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod request_id;
pub mod routes;
pub mod sanitize;
pub mod security;
pub mod source;
pub mod state;

pub use routes::router;
pub use state::AppState;
