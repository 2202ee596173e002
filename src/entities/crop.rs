//! Crop entity - Reference data for income records and crop plans.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Growing season of a crop
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Monsoon season
    #[sea_orm(string_value = "kharif")]
    Kharif,
    /// Winter season
    #[sea_orm(string_value = "rabi")]
    Rabi,
    /// Summer season
    #[sea_orm(string_value = "zaid")]
    Zaid,
    /// Grown all year
    #[sea_orm(string_value = "perennial")]
    Perennial,
}

/// Crop database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crops")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Crop name, e.g. "Tomato"
    pub name: String,
    /// Variety, may be empty
    pub variety: String,
    /// Season the crop belongs to
    pub season: Season,
}

impl Model {
    /// Name with variety in parentheses when one is set.
    #[must_use]
    pub fn label(&self) -> String {
        if self.variety.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.variety)
        }
    }
}

/// Defines relationships between Crop and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One crop has many income records
    #[sea_orm(has_many = "super::income::Entity")]
    Incomes,
}

impl Related<super::income::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Incomes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
