//! Axum handlers for the event-stream endpoints.
//!
//! The hub, registry and message types live in the `sse` crate; this module
//! only turns a subscription into an HTTP response.

pub(crate) mod handler;
