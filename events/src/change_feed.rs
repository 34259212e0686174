//! Bridges the document store's change feed into `DomainEvent`s.
//!
//! The store side is abstracted behind [`ChangeFeed`]; this module only knows
//! how to group a batch of patient documents by hospital and hand one
//! `PatientDataChanged` event per hospital to the [`EventPublisher`].

use crate::error::Error;
use crate::{DomainEvent, EventPublisher};
use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::collections::BTreeMap;

/// One patient document as observed in a change-feed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientDocument {
    pub id: String,
    pub hospital_key: String,
    /// The full serialized document, forwarded to subscribers as-is.
    pub document: Value,
}

/// A live, possibly infinite sequence of patient document batches.
#[async_trait]
pub trait ChangeFeed: Send {
    /// Waits for the next batch. Returns `None` once the feed has ended.
    async fn next_batch(&mut self) -> Option<Result<Vec<PatientDocument>, Error>>;
}

/// Groups a batch by hospital key. Documents without a hospital key belong to
/// no subscriber group and are skipped.
pub fn group_by_hospital(batch: Vec<PatientDocument>) -> BTreeMap<String, Vec<Value>> {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();

    for patient in batch {
        if patient.hospital_key.is_empty() {
            debug!("Skipping patient document {} without a hospital key", patient.id);
            continue;
        }
        groups
            .entry(patient.hospital_key)
            .or_default()
            .push(patient.document);
    }

    groups
}

/// Consumes `feed` until it ends, publishing one `PatientDataChanged` event per
/// hospital present in each batch. A batch is fully published before the next
/// one is awaited.
///
/// Transient read errors never stop the loop: they are logged as warnings, and
/// every `escalate_after` failures in a row without a successful batch are
/// logged as an error so an outage stands out. Only a fatal feed error ends
/// the loop with an error; the caller decides what the process does then.
pub async fn watch_patient_data<F>(
    feed: &mut F,
    publisher: &EventPublisher,
    escalate_after: u32,
) -> Result<(), Error>
where
    F: ChangeFeed + ?Sized,
{
    let escalate_after = escalate_after.max(1);
    let mut consecutive_errors: u32 = 0;

    while let Some(next) = feed.next_batch().await {
        let batch = match next {
            Ok(batch) => {
                if consecutive_errors >= escalate_after {
                    info!("Patient change feed recovered after {consecutive_errors} failed read(s)");
                }
                consecutive_errors = 0;
                batch
            }
            Err(e) if e.is_transient() => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                if consecutive_errors % escalate_after == 0 {
                    error!(
                        "Patient change feed has failed {consecutive_errors} reads in a row, live updates are stalled: {e}"
                    );
                } else {
                    warn!("Patient change feed read failed ({consecutive_errors} in a row): {e}");
                }
                continue;
            }
            Err(e) => return Err(e),
        };

        let groups = group_by_hospital(batch);
        debug!("Patient change batch touches {} hospital(s)", groups.len());

        for (hospital_key, patients) in groups {
            publisher
                .publish(DomainEvent::PatientDataChanged {
                    hospital_key,
                    patients: Value::Array(patients),
                })
                .await;
        }
    }

    info!("Patient change feed ended");
    Ok(())
}
