//! SeaORM entities for the documents the VitalSign API watches.

pub mod patient_data;
