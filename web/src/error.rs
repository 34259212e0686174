use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use sse::error::{Error as SseError, SseErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(SseError);

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    message: &'static str,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        log::warn!("Refusing event stream: {}", self.0);

        let (status, message) = match self.0.error_kind {
            SseErrorKind::HubUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "streaming unsupported")
            }
            SseErrorKind::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, "service unavailable"),
        };

        let body = ErrorBody {
            code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<SseError> for Error {
    fn from(err: SseError) -> Self {
        Self(err)
    }
}
