use super::error::Error;
use entity::patient_data::{Column, Entity, Model};
use log::*;
use sea_orm::{entity::prelude::*, DatabaseConnection, QueryOrder};

/// The most recently updated patient document, if any exist.
pub async fn find_latest(db: &DatabaseConnection) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .order_by_desc(Column::UpdatedAt)
        .one(db)
        .await?)
}

/// Patient documents updated at or after `since`, oldest first.
/// Without a cursor every document counts as updated.
pub async fn find_updated_since(
    db: &DatabaseConnection,
    since: Option<DateTimeWithTimeZone>,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find();
    if let Some(since) = since {
        query = query.filter(Column::UpdatedAt.gte(since));
    }

    let patients = query.order_by_asc(Column::UpdatedAt).all(db).await?;
    debug!("Found {} patient document(s) updated since {since:?}", patients.len());

    Ok(patients)
}

/// Patient documents whose last update happened exactly at `at`.
pub async fn find_updated_at(
    db: &DatabaseConnection,
    at: DateTimeWithTimeZone,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::UpdatedAt.eq(at))
        .all(db)
        .await?)
}

/// Every patient document belonging to one of `hospital_keys`.
pub async fn find_by_hospital_keys(
    db: &DatabaseConnection,
    hospital_keys: &[String],
) -> Result<Vec<Model>, Error> {
    if hospital_keys.is_empty() {
        return Ok(Vec::new());
    }

    Ok(Entity::find()
        .filter(Column::HospitalKey.is_in(hospital_keys.iter().cloned()))
        .order_by_asc(Column::HospitalKey)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}
