//! A farmer's rating of a soil analysis result.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "soil_feedback")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub sample_id: i64,
    /// 1 to 5
    pub rating: i32,
    pub feedback_text: String,
    /// Whether the soil type and fertility matched the farmer's experience
    pub is_accurate: bool,
    /// Whether the recommendations were usable
    pub is_helpful: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
