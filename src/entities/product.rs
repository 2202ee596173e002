//! Product entity - Produce listed on the marketplace by a farmer.
//!
//! Listings are soft-deleted through `deleted_at`, and a listing whose stock
//! reaches zero at checkout flips to [`ListingStatus::SoldOut`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Visibility of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Not yet published
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Visible and purchasable
    #[sea_orm(string_value = "active")]
    Active,
    /// Stock ran out
    #[sea_orm(string_value = "sold_out")]
    SoldOut,
    /// Hidden by the farmer
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Selling farmer
    pub farmer_id: i64,
    /// Marketplace category
    pub category_id: i64,
    /// Product name
    pub name: String,
    /// Variety, may be empty
    pub variety: String,
    /// Long description
    pub description: String,
    /// Sales unit (kg, quintal, dozen, ...)
    pub unit: String,
    /// Stock on hand
    pub quantity_available: f64,
    /// Smallest quantity a buyer may order
    pub min_order_quantity: f64,
    /// Current price per unit
    pub price_per_unit: f64,
    /// Price before discount, shown struck through
    pub original_price: Option<f64>,
    /// Grade label, e.g. "A"
    pub quality_grade: String,
    /// Certified organic
    pub is_organic: bool,
    /// Visibility
    pub listing_status: ListingStatus,
    /// Promoted on the home page
    pub is_featured: bool,
    /// Origin state
    pub state: String,
    /// Origin district
    pub district: String,
    /// Mean review rating, 0 when unrated
    pub rating: f64,
    /// Number of reviews
    pub review_count: i32,
    /// Detail page views
    pub views_count: i32,
    /// Number of order lines sold
    pub sales_count: i32,
    /// Soft delete marker
    pub deleted_at: Option<DateTimeUtc>,
    /// When the listing was created
    pub created_at: DateTimeUtc,
    /// When the listing was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Largest whole quantity that can go in a cart line.
    #[must_use]
    pub fn max_cart_quantity(&self) -> i32 {
        #[allow(clippy::cast_possible_truncation)]
        let max = self.quantity_available.max(0.0).floor() as i32;
        max
    }

    /// Listed, not deleted and visible to buyers.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.deleted_at.is_none() && self.listing_status == ListingStatus::Active
    }
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one category
    #[sea_orm(
        belongs_to = "super::product_category::Entity",
        from = "Column::CategoryId",
        to = "super::product_category::Column::Id"
    )]
    Category,
}

impl Related<super::product_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
