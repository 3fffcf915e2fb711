//! HTTP response conversion (`http` feature).
//!
//! A [`Fault`] returned from a handler or middleware does not render itself:
//! it rides on a placeholder 500 response as an extension, and the server's
//! terminal layer renders it with [`respond`](crate::respond) once the
//! environment is known. Use [`take_fault`] there.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::app_error::AppError;
use crate::fault::{Fault, RawFault};
use crate::pipeline::ErrorResponse;

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Fault::from(self).into_response()
    }
}

impl IntoResponse for RawFault {
    fn into_response(self) -> Response {
        Fault::from(self).into_response()
    }
}

/// Removes a parked fault from a response, if there is one.
pub fn take_fault(response: &mut Response) -> Option<Fault> {
    response.extensions_mut().remove::<Fault>()
}
