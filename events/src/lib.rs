//! Event system infrastructure for the VitalSign API.
//!
//! This crate provides the event system that decouples change detection in the
//! patient document store from the push-notification infrastructure (SSE).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//! - **ChangeFeed**: The store's live stream of patient document batches
//! - **watch_patient_data**: The adapter loop turning batches into events
//!
//! This crate has no dependencies on internal crates (entity, sse, etc.),
//! avoiding circular dependencies. Document data is carried as serialized JSON values.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub mod change_feed;
pub mod error;

pub use change_feed::{group_by_hospital, watch_patient_data, ChangeFeed, PatientDocument};

/// Domain events that represent business-level changes in the system.
///
/// Document data is carried as `serde_json::Value` to avoid dependencies on
/// the entity crate.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// Emitted once per hospital present in a change-feed batch.
    /// Triggers SSE notifications to every subscriber of that hospital.
    PatientDataChanged {
        /// Hospital the patients belong to; used as the fan-out group key.
        hospital_key: String,
        /// JSON array of the hospital's patient documents from the batch.
        patients: Value,
    },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers, in registration order.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) {
            let DomainEvent::PatientDataChanged { hospital_key, .. } = event;
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, hospital_key));
        }
    }

    #[tokio::test]
    async fn publish_calls_handlers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(Recorder {
                label: "first",
                seen: seen.clone(),
            }))
            .with_handler(Arc::new(Recorder {
                label: "second",
                seen: seen.clone(),
            }));

        publisher
            .publish(DomainEvent::PatientDataChanged {
                hospital_key: "hosp-1".to_string(),
                patients: json!([]),
            })
            .await;

        assert_eq!(publisher.handler_count(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:hosp-1".to_string(), "second:hosp-1".to_string()]
        );
    }

    #[tokio::test]
    async fn with_handler_leaves_the_source_publisher_untouched() {
        let base = EventPublisher::default();
        let extended = base.clone().with_handler(Arc::new(Recorder {
            label: "only",
            seen: Arc::new(Mutex::new(Vec::new())),
        }));

        assert_eq!(base.handler_count(), 0);
        assert_eq!(extended.handler_count(), 1);
    }
}
