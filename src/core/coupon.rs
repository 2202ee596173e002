//! Coupon validation and discount arithmetic.

use crate::{
    core::round_money,
    entities::{Coupon, DiscountType, coupon},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, prelude::*};
use serde::Serialize;

/// Answer of the validate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponCheck {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<coupon::Model>,
}

/// What a valid coupon does to an order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouponEffect {
    pub discount: f64,
    pub free_shipping: bool,
}

/// Works out the effect of `coupon` on `subtotal` at `now`. The error string
/// is shown to the buyer as-is.
pub fn evaluate(
    coupon: &coupon::Model,
    subtotal: f64,
    now: DateTime<Utc>,
) -> std::result::Result<CouponEffect, String> {
    if !coupon.is_active {
        return Err("Invalid coupon code".to_string());
    }
    if now < coupon.valid_from {
        return Err("Coupon is not active yet".to_string());
    }
    if now > coupon.valid_until {
        return Err("Coupon expired".to_string());
    }
    if subtotal < coupon.min_order_value {
        return Err(format!(
            "Minimum order value for this coupon is {:.2}",
            coupon.min_order_value
        ));
    }

    let effect = match coupon.discount_type {
        DiscountType::Percentage => {
            let raw = subtotal * coupon.discount_value / 100.0;
            let capped = coupon.max_discount_amount.map_or(raw, |cap| raw.min(cap));
            CouponEffect {
                discount: round_money(capped),
                free_shipping: false,
            }
        }
        DiscountType::FixedAmount => CouponEffect {
            discount: round_money(coupon.discount_value.min(subtotal)),
            free_shipping: false,
        },
        DiscountType::FreeShipping => CouponEffect {
            discount: 0.0,
            free_shipping: true,
        },
    };
    Ok(effect)
}

async fn find_by_code<C: ConnectionTrait>(db: &C, code: &str) -> Result<Option<coupon::Model>> {
    Coupon::find()
        .filter(coupon::Column::Code.eq(code.trim().to_uppercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

pub async fn validate_coupon(db: &DatabaseConnection, code: &str, subtotal: f64) -> Result<CouponCheck> {
    let Some(coupon) = find_by_code(db, code).await? else {
        return Ok(CouponCheck {
            valid: false,
            message: "Invalid coupon code".to_string(),
            discount: None,
            coupon: None,
        });
    };

    Ok(match evaluate(&coupon, subtotal, Utc::now()) {
        Ok(effect) => CouponCheck {
            valid: true,
            message: "Coupon applied".to_string(),
            discount: Some(effect.discount),
            coupon: Some(coupon),
        },
        Err(message) => CouponCheck {
            valid: false,
            message,
            discount: None,
            coupon: None,
        },
    })
}

/// Coupons a buyer can redeem right now, soonest to expire first.
pub async fn list_active_coupons(db: &DatabaseConnection) -> Result<Vec<coupon::Model>> {
    let now = Utc::now();
    Coupon::find()
        .filter(coupon::Column::IsActive.eq(true))
        .filter(coupon::Column::ValidFrom.lte(now))
        .filter(coupon::Column::ValidUntil.gte(now))
        .order_by_asc(coupon::Column::ValidUntil)
        .order_by_asc(coupon::Column::Code)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Checkout variant: an unusable code is a validation error.
pub async fn apply_coupon<C: ConnectionTrait>(
    db: &C,
    code: &str,
    subtotal: f64,
) -> Result<(coupon::Model, CouponEffect)> {
    let coupon = find_by_code(db, code)
        .await?
        .ok_or_else(|| Error::validation("Invalid coupon code"))?;
    let effect = evaluate(&coupon, subtotal, Utc::now()).map_err(Error::validation)?;
    Ok((coupon, effect))
}
