//! Crop plan entity - What a farmer intends to grow and when.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a crop plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CropPlanStatus {
    #[sea_orm(string_value = "planned")]
    Planned,
    #[sea_orm(string_value = "planted")]
    Planted,
    #[sea_orm(string_value = "growing")]
    Growing,
    #[sea_orm(string_value = "harvested")]
    Harvested,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl CropPlanStatus {
    /// Plans that still occupy land.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Planned | Self::Planted | Self::Growing)
    }
}

/// Crop plan database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crop_plans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub farmer_id: i64,
    pub crop_id: i64,
    /// Area to be planted
    pub planned_area: f64,
    /// acre, hectare or guntha
    pub area_unit: String,
    pub planting_date: Date,
    /// Always later than `planting_date`
    pub expected_harvest_date: Date,
    pub estimated_yield: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub estimated_revenue: Option<f64>,
    pub status: CropPlanStatus,
    pub notes: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Revenue minus cost, when both are known.
    #[must_use]
    pub fn estimated_profit(&self) -> Option<f64> {
        match (self.estimated_revenue, self.estimated_cost) {
            (Some(revenue), Some(cost)) => Some(revenue - cost),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::crop::Entity",
        from = "Column::CropId",
        to = "super::crop::Column::Id"
    )]
    Crop,
}

impl Related<super::crop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Crop.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
