//! Soil sample entity - Lab readings plus the rule engine's verdict.
//!
//! List-valued outputs (recommended crops, fertilizers, tips) are stored as
//! JSON arrays of strings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Soil sample database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "soil_samples")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Farmer who submitted the sample
    pub user_id: i64,
    /// Label chosen by the farmer
    pub sample_name: String,
    /// Where the sample was taken
    pub location: String,
    /// 0 to 14
    pub ph: f64,
    /// kg/ha
    pub nitrogen: f64,
    /// kg/ha
    pub phosphorus: f64,
    /// kg/ha
    pub potassium: f64,
    /// Percent, optional
    pub organic_carbon: Option<f64>,
    /// Percent, optional
    pub moisture: Option<f64>,
    /// sandy, loamy, clay, ... optional
    pub texture: Option<String>,
    /// kharif, rabi or summer, optional
    pub season: Option<String>,
    /// black, red, alluvial or laterite
    pub soil_type: String,
    /// Weighted 0..100 score
    pub fertility_score: f64,
    /// low, medium or high
    pub fertility_level: String,
    pub nitrogen_status: String,
    pub phosphorus_status: String,
    pub potassium_status: String,
    /// JSON array of crop names
    pub recommended_crops: Json,
    /// JSON array
    pub organic_fertilizers: Json,
    /// JSON array
    pub chemical_fertilizers: Json,
    /// JSON array
    pub irrigation_tips: Json,
    /// JSON array
    pub soil_health_tips: Json,
    /// Human-readable summary
    #[sea_orm(column_type = "Text")]
    pub explanation: String,
    /// 0.75 to 0.85
    pub confidence: f64,
    /// Engine version that produced the result
    pub model_version: String,
    /// When the sample was analysed
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
