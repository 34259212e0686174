use crate::message::Notification;
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;

/// Handles domain events by converting them to SSE notifications for the hub.
///
/// The change-feed adapter decides which hospital a batch belongs to; this
/// handler only serializes the documents and routes them to that group.
pub struct SseDomainEventHandler {
    sse_manager: Manager,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Manager) -> Self {
        Self { sse_manager }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::PatientDataChanged {
                hospital_key,
                patients,
            } => {
                let payload = match serde_json::to_vec(patients) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize patients for hospital {hospital_key}: {e}");
                        return;
                    }
                };

                debug!("Handling PatientDataChanged event for hospital {hospital_key}");

                if let Err(e) = self
                    .sse_manager
                    .publish(Notification::to_group(hospital_key.as_str(), payload))
                {
                    debug!("Dropped patient update for hospital {hospital_key}: {e}");
                }
            }
        }
    }
}
