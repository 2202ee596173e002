//! Livestock entity - One tagged animal owned by a farmer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Health state of an animal
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[sea_orm(string_value = "healthy")]
    Healthy,
    #[sea_orm(string_value = "sick")]
    Sick,
    #[sea_orm(string_value = "under_treatment")]
    UnderTreatment,
    #[sea_orm(string_value = "quarantine")]
    Quarantine,
}

/// Livestock database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "livestock")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub farmer_id: i64,
    pub livestock_type_id: i64,
    /// Ear tag, unique per farmer
    pub tag_number: String,
    pub breed: String,
    pub age_months: Option<i32>,
    /// Weight in kg
    pub weight: Option<f64>,
    pub purchase_date: Option<Date>,
    pub purchase_price: Option<f64>,
    pub health_status: HealthStatus,
    pub notes: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::livestock_type::Entity",
        from = "Column::LivestockTypeId",
        to = "super::livestock_type::Column::Id"
    )]
    LivestockType,
}

impl Related<super::livestock_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LivestockType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
