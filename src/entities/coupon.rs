//! Coupon entity - Discount codes redeemable at checkout.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a coupon reduces the bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` percent of the subtotal
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// Flat rupee amount
    #[sea_orm(string_value = "fixed_amount")]
    FixedAmount,
    /// Waives the delivery charge
    #[sea_orm(string_value = "free_shipping")]
    FreeShipping,
}

/// Coupon database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Upper-case redemption code
    #[sea_orm(unique)]
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    /// Smallest subtotal the coupon applies to
    pub min_order_value: f64,
    /// Cap for percentage coupons
    pub max_discount_amount: Option<f64>,
    pub valid_from: DateTimeUtc,
    pub valid_until: DateTimeUtc,
    pub is_active: bool,
    /// Number of orders that used the code
    pub used_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
