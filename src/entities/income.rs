//! Income entity - Produce a farmer sold.
//!
//! `total_amount` is derived from quantity and rate when the record is written.
//! Soft delete works exactly like expenses.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Settlement state of a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum IncomePaymentStatus {
    /// Nothing received yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Part of the money received
    #[sea_orm(string_value = "partial")]
    Partial,
    /// Fully paid
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Income database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "incomes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Farmer who owns the record
    pub farmer_id: i64,
    /// Crop that was sold
    pub crop_id: i64,
    /// Quantity sold
    pub quantity: f64,
    /// Unit of the quantity (kg, quintal, ton, bag, piece)
    pub unit: String,
    /// Price per unit in rupees
    pub rate_per_unit: f64,
    /// quantity x rate, rounded to paise
    pub total_amount: f64,
    /// Who bought the produce
    pub buyer_name: String,
    /// Buyer phone, may be empty
    pub buyer_contact: String,
    /// Day of sale
    pub sale_date: Date,
    /// Settlement state
    pub payment_status: IncomePaymentStatus,
    /// Free-form notes
    pub notes: String,
    /// Soft delete marker
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

/// Defines relationships between Income and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each income record belongs to one crop
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
