//! Crop diagnosis entity - One photo sent to the crop doctor.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Progress of an image upload through the crop doctor
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[sea_orm(string_value = "idle")]
    Idle,
    #[sea_orm(string_value = "compressing")]
    Compressing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "analyzing")]
    Analyzing,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "error")]
    Error,
}

/// Crop diagnosis database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crop_diagnoses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    /// Crop hint from the farmer, may be empty
    pub crop_hint: String,
    /// MIME type of the uploaded image
    pub content_type: String,
    pub image_size: i64,
    pub status: UploadStatus,
    pub crop: String,
    pub disease_en: String,
    pub disease_kn: String,
    pub severity: String,
    pub confidence: f64,
    #[sea_orm(column_type = "Text")]
    pub treatment_en: String,
    #[sea_orm(column_type = "Text")]
    pub treatment_kn: String,
    #[sea_orm(column_type = "Text")]
    pub prevention_en: String,
    #[sea_orm(column_type = "Text")]
    pub prevention_kn: String,
    /// Set when `status` is `error`
    pub error_message: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
