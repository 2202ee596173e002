//! `/api/marketplace/` - Catalog, cart, checkout, orders and the buyer's
//! side collections (wishlist, reviews, addresses, notifications).
//!
//! Product browsing is public. Everything else needs a bearer token.

use crate::{
    api::{
        AppState,
        extract::{AuthUser, Json, Path, Query},
        response::ApiResponse,
    },
    core::{
        Page, address,
        address::AddressInput,
        cart::{self, AddToCart, CartLine, CartSummary},
        catalog::{self, CategoryNode, ProductFilter, ProductInput, ProductView},
        coupon::{self, CouponCheck},
        notification,
        order::{self, CheckoutInput, OrderAction, OrderView},
        review::{self, ReviewInput, ReviewView},
        wishlist::{self, WishlistEntry},
    },
    entities::{coupon as coupon_entity, delivery_address, notification as notification_entity, product_category, wishlist_item},
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::{get, patch, post},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
    pub subtotal: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub as_farmer: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub product_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub product_id: Option<i64>,
}

// --- Catalog ---

async fn categories(State(state): State<AppState>) -> Result<ApiResponse<Vec<product_category::Model>>> {
    Ok(ApiResponse::success(catalog::list_categories(&state.db).await?))
}

async fn category_tree(State(state): State<AppState>) -> Result<ApiResponse<Vec<CategoryNode>>> {
    Ok(ApiResponse::success(catalog::category_tree(&state.db).await?))
}

async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<ApiResponse<Page<ProductView>>> {
    Ok(ApiResponse::success(catalog::list_products(&state.db, &filter).await?))
}

async fn featured_products(State(state): State<AppState>) -> Result<ApiResponse<Vec<ProductView>>> {
    Ok(ApiResponse::success(catalog::featured_products(&state.db).await?))
}

async fn trending_products(State(state): State<AppState>) -> Result<ApiResponse<Vec<ProductView>>> {
    Ok(ApiResponse::success(catalog::trending_products(&state.db).await?))
}

async fn my_products(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<ProductView>>> {
    Ok(ApiResponse::success(catalog::farmer_products(&state.db, caller.id()).await?))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> Result<ApiResponse<ProductView>> {
    Ok(ApiResponse::success(catalog::get_product(&state.db, id).await?))
}

async fn create_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<ProductInput>,
) -> Result<ApiResponse<ProductView>> {
    let created = catalog::create_product(&state.db, &caller.user, input).await?;
    Ok(ApiResponse::created("Product listed successfully", created))
}

async fn update_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> Result<ApiResponse<ProductView>> {
    let updated = catalog::update_product(&state.db, &caller.user, id, input).await?;
    Ok(ApiResponse::with_message("Product updated", updated))
}

async fn delete_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    catalog::delete_product(&state.db, &caller.user, id).await?;
    Ok(ApiResponse::message("Product removed"))
}

async fn product_reviews(State(state): State<AppState>, Path(id): Path<i64>) -> Result<ApiResponse<Vec<ReviewView>>> {
    Ok(ApiResponse::success(review::product_reviews(&state.db, id).await?))
}

// --- Cart ---

async fn list_cart(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<CartLine>>> {
    Ok(ApiResponse::success(cart::list_cart(&state.db, caller.id()).await?))
}

async fn add_to_cart(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(request): Json<AddToCart>,
) -> Result<ApiResponse<CartLine>> {
    let line = cart::add_to_cart(&state.db, caller.id(), request).await?;
    Ok(ApiResponse::with_message("Added to cart", line))
}

async fn cart_summary(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<CartSummary>> {
    Ok(ApiResponse::success(cart::cart_summary(&state.db, caller.id()).await?))
}

async fn set_quantity(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<QuantityUpdate>,
) -> Result<ApiResponse<CartLine>> {
    Ok(ApiResponse::success(
        cart::set_quantity(&state.db, caller.id(), id, update.quantity).await?,
    ))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    cart::remove_from_cart(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::message("Removed from cart"))
}

async fn clear_cart(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<()>> {
    let removed = cart::clear_cart(&state.db, caller.id()).await?;
    Ok(ApiResponse::message(format!("Removed {removed} items from cart")))
}

// --- Coupons and orders ---

async fn list_coupons(State(state): State<AppState>) -> Result<ApiResponse<Vec<coupon_entity::Model>>> {
    Ok(ApiResponse::success(coupon::list_active_coupons(&state.db).await?))
}

async fn validate_coupon(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(request): Json<CouponRequest>,
) -> Result<ApiResponse<CouponCheck>> {
    Ok(ApiResponse::success(
        coupon::validate_coupon(&state.db, &request.code, request.subtotal).await?,
    ))
}

async fn checkout(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<CheckoutInput>,
) -> Result<ApiResponse<OrderView>> {
    let placed = order::checkout(&state.db, &caller.user, input).await?;
    Ok(ApiResponse::created(
        format!("Order {} placed successfully", placed.order.order_number),
        placed,
    ))
}

async fn list_orders(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<ApiResponse<Vec<OrderView>>> {
    Ok(ApiResponse::success(
        order::list_orders(&state.db, caller.id(), query.as_farmer).await?,
    ))
}

async fn get_order(State(state): State<AppState>, caller: AuthUser, Path(id): Path<i64>) -> Result<ApiResponse<OrderView>> {
    Ok(ApiResponse::success(order::get_order(&state.db, &caller.user, id).await?))
}

async fn apply(state: &AppState, caller: &AuthUser, id: i64, action: OrderAction) -> Result<ApiResponse<OrderView>> {
    let updated = order::transition(&state.db, &caller.user, id, action).await?;
    Ok(ApiResponse::with_message("Order updated", updated))
}

async fn confirm_order(State(state): State<AppState>, caller: AuthUser, Path(id): Path<i64>) -> Result<ApiResponse<OrderView>> {
    apply(&state, &caller, id, OrderAction::Confirm).await
}

async fn ship_order(State(state): State<AppState>, caller: AuthUser, Path(id): Path<i64>) -> Result<ApiResponse<OrderView>> {
    apply(&state, &caller, id, OrderAction::Ship).await
}

async fn deliver_order(State(state): State<AppState>, caller: AuthUser, Path(id): Path<i64>) -> Result<ApiResponse<OrderView>> {
    apply(&state, &caller, id, OrderAction::Deliver).await
}

async fn cancel_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<CancelRequest>,
) -> Result<ApiResponse<OrderView>> {
    apply(&state, &caller, id, OrderAction::Cancel { reason: request.reason }).await
}

// --- Wishlist ---

async fn list_wishlist(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<WishlistEntry>>> {
    Ok(ApiResponse::success(wishlist::list_wishlist(&state.db, caller.id()).await?))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(request): Json<WishlistRequest>,
) -> Result<ApiResponse<wishlist_item::Model>> {
    let item = wishlist::add_to_wishlist(&state.db, caller.id(), request.product_id).await?;
    Ok(ApiResponse::with_message("Added to wishlist", item))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    wishlist::remove_from_wishlist(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::message("Removed from wishlist"))
}

// --- Reviews ---

async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<ApiResponse<Vec<ReviewView>>> {
    Ok(ApiResponse::success(review::list_reviews(&state.db, query.product_id).await?))
}

async fn create_review(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<ReviewInput>,
) -> Result<ApiResponse<ReviewView>> {
    let created = review::create_review(&state.db, &caller.user, input).await?;
    Ok(ApiResponse::created("Thank you for your review", created))
}

// --- Delivery addresses ---

async fn list_addresses(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiResponse<Vec<delivery_address::Model>>> {
    Ok(ApiResponse::success(address::list_addresses(&state.db, caller.id()).await?))
}

async fn create_address(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<AddressInput>,
) -> Result<ApiResponse<delivery_address::Model>> {
    let created = address::create_address(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Address saved", created))
}

async fn get_address(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<delivery_address::Model>> {
    Ok(ApiResponse::success(address::get_address(&state.db, caller.id(), id).await?))
}

async fn update_address(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<AddressInput>,
) -> Result<ApiResponse<delivery_address::Model>> {
    let updated = address::update_address(&state.db, caller.id(), id, input).await?;
    Ok(ApiResponse::with_message("Address updated", updated))
}

async fn delete_address(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    address::delete_address(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::message("Address removed"))
}

// --- Notifications ---

async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiResponse<Vec<notification_entity::Model>>> {
    Ok(ApiResponse::success(notification::list_notifications(&state.db, caller.id()).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<notification_entity::Model>> {
    Ok(ApiResponse::success(notification::mark_read(&state.db, caller.id(), id).await?))
}

async fn mark_all_read(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<()>> {
    let updated = notification::mark_all_read(&state.db, caller.id()).await?;
    Ok(ApiResponse::message(format!("{updated} notifications marked as read")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories/", get(categories))
        .route("/categories/tree/", get(category_tree))
        .route("/products/", get(list_products).post(create_product))
        .route("/products/featured/", get(featured_products))
        .route("/products/trending/", get(trending_products))
        .route("/products/mine/", get(my_products))
        .route(
            "/products/{id}/",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/reviews/", get(product_reviews))
        .route("/cart/", get(list_cart).post(add_to_cart))
        .route("/cart/summary/", get(cart_summary))
        .route("/cart/clear/", post(clear_cart))
        .route("/cart/{id}/", patch(set_quantity).delete(remove_from_cart))
        .route("/coupons/", get(list_coupons))
        .route("/coupons/validate/", post(validate_coupon))
        .route("/orders/", get(list_orders).post(checkout))
        .route("/orders/{id}/", get(get_order))
        .route("/orders/{id}/confirm/", post(confirm_order))
        .route("/orders/{id}/ship/", post(ship_order))
        .route("/orders/{id}/deliver/", post(deliver_order))
        .route("/orders/{id}/cancel/", post(cancel_order))
        .route("/wishlist/", get(list_wishlist).post(add_to_wishlist))
        .route("/wishlist/{id}/", axum::routing::delete(remove_from_wishlist))
        .route("/reviews/", get(list_reviews).post(create_review))
        .route("/delivery-addresses/", get(list_addresses).post(create_address))
        .route(
            "/delivery-addresses/{id}/",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route("/notifications/", get(list_notifications))
        .route("/notifications/mark_all_read/", post(mark_all_read))
        .route("/notifications/mark-all-read/", post(mark_all_read))
        .route("/notifications/{id}/mark_read/", post(mark_read))
        .route("/notifications/{id}/mark-read/", post(mark_read))
}
