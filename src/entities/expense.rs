//! Expense entity - Money a farmer spent on the farm.
//!
//! Expenses are never physically removed. A set `deleted_at` hides the record
//! from active listings and aggregates; clearing it restores the record.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Farmer who owns the record
    pub farmer_id: i64,
    /// Expense category
    pub category_id: i64,
    /// Amount in rupees
    pub amount: f64,
    /// Day the money was spent
    pub date: Date,
    /// Free-form notes
    pub notes: String,
    /// Soft delete marker - set when the record is in history
    pub deleted_at: Option<DateTimeUtc>,
    /// When the record was created
    pub created_at: DateTimeUtc,
    /// When the record was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Whether the record is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Defines relationships between Expense and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one category
    #[sea_orm(
        belongs_to = "super::expense_category::Entity",
        from = "Column::CategoryId",
        to = "super::expense_category::Column::Id"
    )]
    Category,
}

impl Related<super::expense_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
