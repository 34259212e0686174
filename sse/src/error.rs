//! Error types for the `sse` crate.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub error_kind: SseErrorKind,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SseErrorKind {
    // The hub loop is no longer running
    HubUnavailable,
    // The hub's inbound notification queue is at capacity
    QueueFull,
}

impl Error {
    pub(crate) fn hub_unavailable() -> Self {
        Error {
            error_kind: SseErrorKind::HubUnavailable,
        }
    }

    pub(crate) fn queue_full() -> Self {
        Error {
            error_kind: SseErrorKind::QueueFull,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.error_kind {
            SseErrorKind::HubUnavailable => write!(f, "SSE Error: hub is not running"),
            SseErrorKind::QueueFull => write!(f, "SSE Error: notification queue is full"),
        }
    }
}

impl StdError for Error {}
