//! Orders - Checkout and the fulfilment state machine.
//!
//! Checkout turns the buyer's cart into one order in a single transaction:
//! stock is checked and decremented, the cart is emptied and every farmer
//! with produce in the order is notified. Afterwards the order moves
//! `pending -> confirmed -> shipped -> delivered`, or is cancelled from
//! `pending` or `confirmed`, which puts the stock back.

use crate::{
    core::{
        activity, address,
        cart::{self, CartTotals, compute_totals},
        coupon,
        notification::notify,
        round_money,
    },
    entities::{
        Coupon, ListingStatus, NotificationKind, Order, OrderItem, OrderPaymentStatus, OrderStatus,
        PaymentMethod, Product, UserRole, coupon as coupon_entity, order, order_item, product, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutInput {
    /// Fills the delivery fields from a saved address
    pub address_id: Option<i64>,
    #[serde(default)]
    pub delivery_name: String,
    #[serde(default)]
    pub delivery_phone: String,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default)]
    pub delivery_city: String,
    #[serde(default)]
    pub delivery_state: String,
    #[serde(default)]
    pub delivery_pincode: String,
    pub payment_method: Option<PaymentMethod>,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub buyer_notes: String,
}

/// Fulfilment steps a user can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    Confirm,
    Ship,
    Deliver,
    Cancel { reason: String },
}

impl OrderAction {
    const fn target(&self) -> OrderStatus {
        match self {
            Self::Confirm => OrderStatus::Confirmed,
            Self::Ship => OrderStatus::Shipped,
            Self::Deliver => OrderStatus::Delivered,
            Self::Cancel { .. } => OrderStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Status an order moves to, or [`Error::InvalidState`] for anything outside
/// the allowed transitions.
pub fn next_status(current: OrderStatus, action: &OrderAction) -> Result<OrderStatus> {
    let allowed = matches!(
        (current, action),
        (OrderStatus::Pending, OrderAction::Confirm)
            | (OrderStatus::Confirmed, OrderAction::Ship)
            | (OrderStatus::Shipped, OrderAction::Deliver)
            | (OrderStatus::Pending | OrderStatus::Confirmed, OrderAction::Cancel { .. })
    );
    if allowed {
        Ok(action.target())
    } else {
        Err(Error::invalid_state(format!(
            "Cannot move an order from {} to {}.",
            status_label(current),
            status_label(action.target())
        )))
    }
}

const fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Shipped => "shipped",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Cancelled => "cancelled",
    }
}

/// `KS-YYYYMMDD-XXXXXXXX`, the suffix being random upper-case hex.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("KS-{}-{}", now.format("%Y%m%d"), suffix.to_uppercase())
}

/// Only cash on delivery stays unpaid; the other methods are settled at once.
const fn initial_payment_status(method: PaymentMethod) -> OrderPaymentStatus {
    match method {
        PaymentMethod::Cod => OrderPaymentStatus::Pending,
        PaymentMethod::Upi | PaymentMethod::Card | PaymentMethod::NetBanking => OrderPaymentStatus::Paid,
    }
}

async fn resolve_delivery(db: &DatabaseConnection, buyer_id: i64, input: &mut CheckoutInput) -> Result<()> {
    if let Some(address_id) = input.address_id {
        let saved = address::get_address(db, buyer_id, address_id).await?;
        input.delivery_name = saved.full_name;
        input.delivery_phone = saved.phone;
        input.delivery_address = saved.address_line;
        input.delivery_city = saved.city;
        input.delivery_state = saved.state;
        input.delivery_pincode = saved.pincode;
    }
    for (field, value) in [
        ("delivery_name", &input.delivery_name),
        ("delivery_phone", &input.delivery_phone),
        ("delivery_address", &input.delivery_address),
        ("delivery_city", &input.delivery_city),
        ("delivery_pincode", &input.delivery_pincode),
    ] {
        if value.trim().is_empty() {
            return Err(Error::validation(format!("{field} is required.")));
        }
    }
    Ok(())
}

/// Places an order for everything in the buyer's cart.
pub async fn checkout(db: &DatabaseConnection, buyer: &user::Model, mut input: CheckoutInput) -> Result<OrderView> {
    resolve_delivery(db, buyer.id, &mut input).await?;
    let payment_method = input.payment_method.unwrap_or(PaymentMethod::Cod);
    let coupon_code = input
        .coupon_code
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());

    let txn = db.begin().await?;

    let lines = cart::load_lines(&txn, buyer.id).await?;
    if lines.is_empty() {
        return Err(Error::validation("Your cart is empty."));
    }

    let mut checked = Vec::with_capacity(lines.len());
    for (item, product) in lines {
        let product = product
            .filter(product::Model::is_purchasable)
            .ok_or_else(|| Error::not_found("Product", item.product_id))?;
        if f64::from(item.quantity) > product.quantity_available {
            return Err(Error::InsufficientStock {
                product: product.name,
                available: product.quantity_available,
                requested: f64::from(item.quantity),
            });
        }
        checked.push((item, product));
    }

    let subtotal: f64 = checked
        .iter()
        .map(|(item, _)| item.unit_price * f64::from(item.quantity))
        .sum();
    let applied = match &coupon_code {
        Some(code) => Some(coupon::apply_coupon(&txn, code, round_money(subtotal)).await?),
        None => None,
    };
    let totals: CartTotals = compute_totals(subtotal, applied.as_ref().map(|(_, effect)| *effect));

    let now = Utc::now();
    let order = order::ActiveModel {
        order_number: Set(generate_order_number(now)),
        buyer_id: Set(buyer.id),
        status: Set(OrderStatus::Pending),
        payment_method: Set(payment_method),
        payment_status: Set(initial_payment_status(payment_method)),
        subtotal: Set(totals.subtotal),
        discount_amount: Set(totals.discount),
        tax_amount: Set(totals.tax),
        delivery_charge: Set(totals.delivery),
        total_amount: Set(totals.total),
        coupon_code: Set(coupon_code.unwrap_or_default()),
        delivery_name: Set(input.delivery_name.trim().to_string()),
        delivery_phone: Set(input.delivery_phone.trim().to_string()),
        delivery_address: Set(input.delivery_address.trim().to_string()),
        delivery_city: Set(input.delivery_city.trim().to_string()),
        delivery_state: Set(input.delivery_state.trim().to_string()),
        delivery_pincode: Set(input.delivery_pincode.trim().to_string()),
        buyer_notes: Set(input.buyer_notes.trim().to_string()),
        cancellation_reason: Set(String::new()),
        confirmed_at: Set(None),
        shipped_at: Set(None),
        delivered_at: Set(None),
        cancelled_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(checked.len());
    let mut farmers = BTreeSet::new();
    for (line, product) in checked {
        let quantity = f64::from(line.quantity);
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product.id),
            farmer_id: Set(product.farmer_id),
            product_name: Set(product.name.clone()),
            unit: Set(product.unit.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            line_total: Set(round_money(line.unit_price * quantity)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        items.push(item);
        farmers.insert(product.farmer_id);

        let remaining = (product.quantity_available - quantity).max(0.0);
        let sales = product.sales_count + 1;
        let mut stock: product::ActiveModel = product.into();
        stock.quantity_available = Set(remaining);
        if remaining <= 0.0 {
            stock.listing_status = Set(ListingStatus::SoldOut);
        }
        stock.sales_count = Set(sales);
        stock.updated_at = Set(now);
        stock.update(&txn).await?;
    }

    if let Some((coupon, _)) = &applied {
        Coupon::update_many()
            .col_expr(
                coupon_entity::Column::UsedCount,
                Expr::col(coupon_entity::Column::UsedCount).add(1),
            )
            .filter(coupon_entity::Column::Id.eq(coupon.id))
            .exec(&txn)
            .await?;
    }

    cart::clear_cart(&txn, buyer.id).await?;

    for farmer_id in farmers {
        notify(
            &txn,
            farmer_id,
            NotificationKind::Order,
            "New order received",
            format!("Order {} from {} is waiting for confirmation.", order.order_number, buyer.display_name()),
            Some(order.id),
        )
        .await?;
    }
    activity::record(
        &txn,
        buyer.id,
        activity::ORDER_PLACED,
        format!("Order {} for {:.2}", order.order_number, order.total_amount),
    )
    .await?;

    txn.commit().await?;
    info!(
        "Order {} placed by user {} ({} items, total {:.2})",
        order.order_number,
        buyer.id,
        items.len(),
        order.total_amount
    );
    Ok(OrderView { order, items })
}

async fn items_of<C: ConnectionTrait>(db: &C, order_id: i64) -> Result<Vec<order_item::Model>> {
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn with_items(db: &DatabaseConnection, orders: Vec<order::Model>) -> Result<Vec<OrderView>> {
    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let all_items = OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?;
    Ok(orders
        .into_iter()
        .map(|order| {
            let items = all_items.iter().filter(|i| i.order_id == order.id).cloned().collect();
            OrderView { order, items }
        })
        .collect())
}

/// The user's purchases, or with `as_farmer` the orders containing the
/// user's produce. Newest first.
pub async fn list_orders(db: &DatabaseConnection, user_id: i64, as_farmer: bool) -> Result<Vec<OrderView>> {
    let query = if as_farmer {
        let order_ids: Vec<i64> = OrderItem::find()
            .select_only()
            .column(order_item::Column::OrderId)
            .filter(order_item::Column::FarmerId.eq(user_id))
            .distinct()
            .into_tuple()
            .all(db)
            .await?;
        Order::find().filter(order::Column::Id.is_in(order_ids))
    } else {
        Order::find().filter(order::Column::BuyerId.eq(user_id))
    };
    let orders = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;
    with_items(db, orders).await
}

fn is_seller_of(user_id: i64, items: &[order_item::Model]) -> bool {
    items.iter().any(|i| i.farmer_id == user_id)
}

/// One order, visible to its buyer, the farmers in it and admins.
pub async fn get_order(db: &DatabaseConnection, viewer: &user::Model, id: i64) -> Result<OrderView> {
    let order = Order::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", id))?;
    let items = items_of(db, id).await?;
    let visible = order.buyer_id == viewer.id || viewer.role == UserRole::Admin || is_seller_of(viewer.id, &items);
    if !visible {
        return Err(Error::not_found("Order", id));
    }
    Ok(OrderView { order, items })
}

fn ensure_may(actor: &user::Model, view: &OrderView, action: &OrderAction) -> Result<()> {
    if actor.role == UserRole::Admin {
        return Ok(());
    }
    let permitted = match action {
        OrderAction::Cancel { .. } => view.order.buyer_id == actor.id,
        OrderAction::Confirm | OrderAction::Ship | OrderAction::Deliver => {
            actor.role == UserRole::Farmer && is_seller_of(actor.id, &view.items)
        }
    };
    if permitted {
        Ok(())
    } else {
        Err(Error::forbidden("You are not allowed to change this order."))
    }
}

async fn restock<C: ConnectionTrait>(db: &C, items: &[order_item::Model]) -> Result<()> {
    for item in items {
        let Some(product) = Product::find_by_id(item.product_id).one(db).await? else {
            continue;
        };
        let restored = product.quantity_available + f64::from(item.quantity);
        let relist = product.listing_status == ListingStatus::SoldOut && restored > 0.0;
        let mut active: product::ActiveModel = product.into();
        active.quantity_available = Set(restored);
        if relist {
            active.listing_status = Set(ListingStatus::Active);
        }
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
    }
    Ok(())
}

/// Applies a fulfilment step and notifies the buyer.
pub async fn transition(
    db: &DatabaseConnection,
    actor: &user::Model,
    id: i64,
    action: OrderAction,
) -> Result<OrderView> {
    let view = get_order(db, actor, id).await?;
    ensure_may(actor, &view, &action)?;
    let next = next_status(view.order.status, &action)?;

    let now = Utc::now();
    let OrderView { order, items } = view;
    let buyer_id = order.buyer_id;
    let order_number = order.order_number.clone();
    let was_paid = order.payment_status == OrderPaymentStatus::Paid;

    let txn = db.begin().await?;
    let mut active: order::ActiveModel = order.into();
    active.status = Set(next);
    active.updated_at = Set(now);
    match &action {
        OrderAction::Confirm => active.confirmed_at = Set(Some(now)),
        OrderAction::Ship => active.shipped_at = Set(Some(now)),
        OrderAction::Deliver => active.delivered_at = Set(Some(now)),
        OrderAction::Cancel { reason } => {
            active.cancelled_at = Set(Some(now));
            active.cancellation_reason = Set(reason.trim().to_string());
            if was_paid {
                active.payment_status = Set(OrderPaymentStatus::Refunded);
            }
        }
    }
    let updated = active.update(&txn).await?;

    if let OrderAction::Cancel { reason } = &action {
        restock(&txn, &items).await?;
        activity::record(
            &txn,
            actor.id,
            activity::ORDER_CANCELLED,
            format!("Order {order_number} cancelled: {}", reason.trim()),
        )
        .await?;
    }

    notify(
        &txn,
        buyer_id,
        NotificationKind::Order,
        format!("Order {}", status_label(next)),
        format!("Your order {order_number} is now {}.", status_label(next)),
        Some(updated.id),
    )
    .await?;
    txn.commit().await?;

    info!("Order {} moved to {} by user {}", order_number, status_label(next), actor.id);
    Ok(OrderView { order: updated, items })
}
