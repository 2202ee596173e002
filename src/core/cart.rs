//! Shopping cart - One line per product, with a price snapshot taken when
//! the line is created.
//!
//! Quantities are whole units between 1 and the product's whole stock.

use crate::{
    core::{catalog, coupon::CouponEffect, round_money},
    entities::{CartItem, Product, cart_item, product},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GST-style tax on the (discounted) subtotal.
pub const TAX_RATE: f64 = 0.05;
/// Delivery is free when the subtotal is strictly above this.
pub const FREE_DELIVERY_ABOVE: f64 = 500.0;
pub const DELIVERY_CHARGE: f64 = 50.0;

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: i64,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: cart_item::Model,
    pub product_name: String,
    pub unit: String,
    pub max_quantity: i32,
    pub line_total: f64,
}

/// Money figures of a cart or an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CartTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub delivery: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub item_count: usize,
    pub total_quantity: i64,
    #[serde(flatten)]
    pub totals: CartTotals,
}

/// Clamps a requested quantity into `[1, max]`. `max` below 1 still yields 1;
/// stock is checked again at checkout.
#[must_use]
pub fn clamp_quantity(requested: i32, max: i32) -> i32 {
    requested.clamp(1, max.max(1))
}

/// Totals for a subtotal, optionally reduced by a coupon. Tax is charged on
/// the discounted subtotal; the free-delivery threshold looks at the
/// undiscounted one.
#[must_use]
pub fn compute_totals(subtotal: f64, coupon: Option<CouponEffect>) -> CartTotals {
    let subtotal = round_money(subtotal);
    let discount = coupon.map_or(0.0, |c| round_money(c.discount.min(subtotal)));
    let free_shipping = coupon.is_some_and(|c| c.free_shipping);

    let taxable = subtotal - discount;
    let tax = round_money(taxable * TAX_RATE);
    let delivery = if free_shipping || subtotal > FREE_DELIVERY_ABOVE {
        0.0
    } else {
        DELIVERY_CHARGE
    };

    CartTotals {
        subtotal,
        discount,
        tax,
        delivery,
        total: round_money(taxable + tax + delivery),
    }
}

/// Cart rows joined with their products, oldest first.
pub(crate) async fn load_lines<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<Vec<(cart_item::Model, Option<product::Model>)>> {
    CartItem::find()
        .find_also_related(Product)
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .order_by_asc(cart_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn to_line(item: cart_item::Model, product: Option<&product::Model>) -> CartLine {
    let line_total = round_money(item.unit_price * f64::from(item.quantity));
    CartLine {
        product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
        unit: product.map(|p| p.unit.clone()).unwrap_or_default(),
        max_quantity: product.map_or(0, product::Model::max_cart_quantity),
        line_total,
        item,
    }
}

pub async fn list_cart(db: &DatabaseConnection, user_id: i64) -> Result<Vec<CartLine>> {
    let rows = load_lines(db, user_id).await?;
    Ok(rows
        .into_iter()
        .map(|(item, product)| to_line(item, product.as_ref()))
        .collect())
}

pub async fn cart_summary(db: &DatabaseConnection, user_id: i64) -> Result<CartSummary> {
    let items = list_cart(db, user_id).await?;
    let subtotal = items.iter().map(|l| l.line_total).sum();
    Ok(CartSummary {
        item_count: items.len(),
        total_quantity: items.iter().map(|l| i64::from(l.item.quantity)).sum(),
        totals: compute_totals(subtotal, None),
        items,
    })
}

async fn find_line(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<cart_item::Model> {
    CartItem::find_by_id(id)
        .filter(cart_item::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Cart item", id))
}

/// Adds a product, or grows the existing line for it.
pub async fn add_to_cart(db: &DatabaseConnection, user_id: i64, request: AddToCart) -> Result<CartLine> {
    let product = catalog::find_product(db, request.product_id).await?;
    if !product.is_purchasable() {
        return Err(Error::invalid_state(format!("{} is not available right now.", product.name)));
    }
    let max = product.max_cart_quantity();
    if max < 1 {
        return Err(Error::InsufficientStock {
            product: product.name,
            available: product.quantity_available,
            requested: f64::from(request.quantity),
        });
    }

    let existing = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::ProductId.eq(product.id))
        .one(db)
        .await?;

    let now = Utc::now();
    let item = match existing {
        Some(line) => {
            let quantity = clamp_quantity(line.quantity.saturating_add(request.quantity), max);
            let mut active: cart_item::ActiveModel = line.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            cart_item::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product.id),
                quantity: Set(clamp_quantity(request.quantity, max)),
                unit_price: Set(product.price_per_unit),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    debug!("User {} cart: product {} x{}", user_id, product.id, item.quantity);
    Ok(to_line(item, Some(&product)))
}

/// Sets a line's quantity. Out-of-range values leave the line unchanged.
pub async fn set_quantity(db: &DatabaseConnection, user_id: i64, id: i64, quantity: i32) -> Result<CartLine> {
    let line = find_line(db, user_id, id).await?;
    let product = Product::find_by_id(line.product_id).one(db).await?;
    let max = product.as_ref().map_or(0, product::Model::max_cart_quantity);

    if quantity < 1 || quantity > max {
        return Ok(to_line(line, product.as_ref()));
    }

    let mut active: cart_item::ActiveModel = line.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;
    Ok(to_line(updated, product.as_ref()))
}

pub async fn remove_from_cart(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<()> {
    let line = find_line(db, user_id, id).await?;
    line.delete(db).await?;
    Ok(())
}

/// Empties the cart; returns how many lines were removed.
pub async fn clear_cart<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64> {
    let result = CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
