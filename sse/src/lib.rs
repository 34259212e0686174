//! Server-Sent Events (SSE) infrastructure for live patient updates.
//!
//! This crate provides the in-process publish/subscribe hub that fans patient
//! data change notifications out to many long-lived SSE connections.
//!
//! # Architecture
//!
//! - **Single-writer registry**: one hub task owns the `ConnectionRegistry`;
//!   handlers only talk to it through channels, so the registry needs no locks.
//! - **One entry per identity**: subscribing under an identity that is already
//!   registered replaces the old entry, whose stream then ends.
//! - **Broadcast, group and identity scopes**: a notification goes to every
//!   subscriber, to a hospital group, or to a single identity.
//! - **Patience-bounded delivery**: a subscriber that does not accept a message
//!   within the patience window loses it; publishers and other subscribers
//!   never wait on a slow consumer.
//! - **Ephemeral messages**: a subscriber that is offline misses the event and
//!   sees fresh data on its next load.
//!
//! # Message Flow
//!
//! 1. Browser opens `/listen/{identity}` (or `/events/patient/{hospital_key}`)
//! 2. Handler calls `Manager::subscribe`, the hub registers the channel
//! 3. The change-feed adapter emits `DomainEvent::PatientDataChanged`
//! 4. `SseDomainEventHandler` publishes a group-scoped `Notification`
//! 5. The hub delivers the payload to each matching subscriber channel
//! 6. Each handler writes `data: <payload>\n\n` to its own connection
//!
//! # Example: Sending an event
//!
//! ```rust,ignore
//! use sse::message::Notification;
//!
//! app_state.sse_manager.publish(Notification::to_group(hospital_key, payload))?;
//! ```
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, SubscriberId and ConnectionId
//! - `delivery`: patience-bounded send to one subscriber
//! - `manager`: the hub loop and its cloneable `Manager` handle
//! - `message`: notification and scope definitions

pub mod connection;
pub mod delivery;
pub mod domain_event_handler;
pub mod error;
pub mod manager;
pub mod message;

pub use connection::SubscriberId;
pub use manager::{HubConfig, Manager, RegistrySnapshot, Subscription};
