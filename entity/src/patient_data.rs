//! SeaORM Entity for the patient_data collection.
//! One row per admitted patient; `updated_at` drives change detection.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(schema_name = "vitalsign", table_name = "patient_data")]
pub struct Model {
    /// Document id assigned by the store
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Hospital number
    #[serde(rename = "HN")]
    pub hn: String,

    pub date_of_admit: String,

    pub date_of_birth: String,

    #[sea_orm(column_type = "Text")]
    pub diagnosis: String,

    pub is_read: bool,

    pub is_show_notify: bool,

    pub name: String,

    pub sex: String,

    pub surname: String,

    pub patient_room_key: String,

    /// Owning hospital; also the SSE fan-out group key
    pub hospital_key: String,

    #[serde(skip_serializing)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
