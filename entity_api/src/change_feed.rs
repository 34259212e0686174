//! A `ChangeFeed` over the patient_data table, driven by polling `updated_at`.

use super::error::Error;
use super::patient_data;
use async_trait::async_trait;
use entity::patient_data::Model;
use events::{ChangeFeed, PatientDocument};
use log::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::DatabaseConnection;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Polls the store for patient documents whose `updated_at` reached the
/// cursor. Each non-empty poll yields, as one batch, every patient of every
/// hospital touched since the previous batch.
///
/// The cursor starts at the newest `updated_at` present when the feed is
/// first polled, so documents written before start-up are not replayed. The
/// cursor is inclusive: documents already emitted at the cursor timestamp are
/// remembered, so a row committed late with that same timestamp is still seen.
pub struct PollingChangeFeed {
    db: Arc<DatabaseConnection>,
    ticker: Interval,
    cursor: Option<DateTimeWithTimeZone>,
    seen_at_cursor: HashSet<String>,
    primed: bool,
}

impl PollingChangeFeed {
    pub fn new(db: Arc<DatabaseConnection>, period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            db,
            ticker,
            cursor: None,
            seen_at_cursor: HashSet::new(),
            primed: false,
        }
    }

    pub fn cursor(&self) -> Option<DateTimeWithTimeZone> {
        self.cursor
    }

    async fn prime(&mut self) -> Result<(), Error> {
        let db = self.db.as_ref();

        if let Some(latest) = patient_data::find_latest(db).await? {
            let at_cursor = patient_data::find_updated_at(db, latest.updated_at).await?;
            self.seen_at_cursor = at_cursor.into_iter().map(|p| p.id).collect();
            self.cursor = Some(latest.updated_at);
        }
        self.primed = true;

        info!("Watching patient data for changes from {:?}", self.cursor);
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<PatientDocument>, Error> {
        if !self.primed {
            self.prime().await?;
            return Ok(Vec::new());
        }

        let db = self.db.as_ref();
        let changed: Vec<Model> = patient_data::find_updated_since(db, self.cursor)
            .await?
            .into_iter()
            .filter(|p| {
                !(Some(p.updated_at) == self.cursor && self.seen_at_cursor.contains(&p.id))
            })
            .collect();
        let Some(newest) = changed.last().map(|p| p.updated_at) else {
            return Ok(Vec::new());
        };

        let newest_ids: Vec<String> = changed
            .iter()
            .filter(|p| p.updated_at == newest)
            .map(|p| p.id.clone())
            .collect();
        let hospital_keys: Vec<String> = changed
            .into_iter()
            .map(|p| p.hospital_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let snapshot = patient_data::find_by_hospital_keys(db, &hospital_keys).await?;
        let batch = snapshot
            .into_iter()
            .map(to_document)
            .collect::<Result<Vec<_>, Error>>()?;

        // Only advance once the whole batch was read, so a failed read is retried.
        if self.cursor != Some(newest) {
            self.cursor = Some(newest);
            self.seen_at_cursor.clear();
        }
        self.seen_at_cursor.extend(newest_ids);
        debug!(
            "Patient change batch: {} document(s) across {} hospital(s)",
            batch.len(),
            hospital_keys.len()
        );

        Ok(batch)
    }
}

fn to_document(patient: Model) -> Result<PatientDocument, Error> {
    let document = serde_json::to_value(&patient)?;
    Ok(PatientDocument {
        id: patient.id,
        hospital_key: patient.hospital_key,
        document,
    })
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    async fn next_batch(&mut self) -> Option<Result<Vec<PatientDocument>, events::error::Error>> {
        loop {
            self.ticker.tick().await;

            match self.poll().await {
                Ok(batch) if batch.is_empty() => continue,
                Ok(batch) => return Some(Ok(batch)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
