//! Marketplace catalog - Categories and product listings.
//!
//! The public listing shows only active, non-deleted products. Farmers and
//! admins may list produce; only the listing's owner may change or remove it.

use crate::{
    core::{Page, page_params, round_money},
    entities::{ListingStatus, Product, ProductCategory, User, UserRole, product, product_category, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    Condition, PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Size of the featured strip on the home page.
pub const FEATURED_LIMIT: u64 = 10;
/// Size of the trending strip.
pub const TRENDING_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Popular,
}

/// Query parameters of the public product listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<i64>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub organic: Option<bool>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    #[serde(alias = "category")]
    pub category_id: i64,
    pub name: String,
    #[serde(default)]
    pub variety: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub quantity_available: f64,
    #[serde(default = "default_min_order")]
    pub min_order_quantity: f64,
    pub price_per_unit: f64,
    pub original_price: Option<f64>,
    #[serde(default)]
    pub quality_grade: String,
    #[serde(default)]
    pub is_organic: bool,
    pub listing_status: Option<ListingStatus>,
    #[serde(default)]
    pub is_featured: bool,
    /// Defaults to the seller's profile state
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
}

fn default_unit() -> String {
    "kg".to_string()
}

const fn default_min_order() -> f64 {
    1.0
}

/// A product with the names a listing card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: product::Model,
    pub category_name: String,
    pub farmer_name: String,
}

/// An active category with its active sub-categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: product_category::Model,
    pub children: Vec<CategoryNode>,
}

pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<product_category::Model>> {
    ProductCategory::find()
        .filter(product_category::Column::IsActive.eq(true))
        .order_by_asc(product_category::Column::DisplayOrder)
        .order_by_asc(product_category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active categories nested under their parents. A category whose parent is
/// missing or inactive is shown as a root.
pub async fn category_tree(db: &DatabaseConnection) -> Result<Vec<CategoryNode>> {
    let categories = list_categories(db).await?;
    let known: HashSet<i64> = categories.iter().map(|c| c.id).collect();

    let mut children: HashMap<i64, Vec<product_category::Model>> = HashMap::new();
    let mut roots = Vec::new();
    for category in categories {
        match category.parent_id.filter(|p| known.contains(p) && *p != category.id) {
            Some(parent) => children.entry(parent).or_default().push(category),
            None => roots.push(category),
        }
    }

    Ok(roots.into_iter().map(|c| build_node(c, &mut children)).collect())
}

fn build_node(
    category: product_category::Model,
    children: &mut HashMap<i64, Vec<product_category::Model>>,
) -> CategoryNode {
    let kids = children.remove(&category.id).unwrap_or_default();
    CategoryNode {
        children: kids.into_iter().map(|c| build_node(c, children)).collect(),
        category,
    }
}

async fn farmer_names(db: &DatabaseConnection, ids: Vec<i64>) -> Result<HashMap<i64, String>> {
    let users = User::find().filter(user::Column::Id.is_in(ids)).all(db).await?;
    Ok(users.into_iter().map(|u| (u.id, u.display_name())).collect())
}

async fn to_views(
    db: &DatabaseConnection,
    rows: Vec<(product::Model, Option<product_category::Model>)>,
) -> Result<Vec<ProductView>> {
    let names = farmer_names(db, rows.iter().map(|(p, _)| p.farmer_id).collect()).await?;
    Ok(rows
        .into_iter()
        .map(|(product, category)| ProductView {
            farmer_name: names.get(&product.farmer_id).cloned().unwrap_or_default(),
            category_name: category.map(|c| c.name).unwrap_or_default(),
            product,
        })
        .collect())
}

async fn to_view(db: &DatabaseConnection, product: product::Model) -> Result<ProductView> {
    let category = ProductCategory::find_by_id(product.category_id).one(db).await?;
    let mut views = to_views(db, vec![(product, category)]).await?;
    views
        .pop()
        .ok_or_else(|| Error::validation("Product could not be loaded"))
}

fn listed() -> Condition {
    Condition::all()
        .add(product::Column::DeletedAt.is_null())
        .add(product::Column::ListingStatus.eq(ListingStatus::Active))
}

/// Public, paginated product search.
pub async fn list_products(db: &DatabaseConnection, filter: &ProductFilter) -> Result<Page<ProductView>> {
    let mut condition = listed();
    if let Some(category) = filter.category {
        condition = condition.add(product::Column::CategoryId.eq(category));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(product::Column::Name.contains(term))
                .add(product::Column::Variety.contains(term))
                .add(product::Column::Description.contains(term)),
        );
    }
    if let Some(min) = filter.min_price {
        condition = condition.add(product::Column::PricePerUnit.gte(min));
    }
    if let Some(max) = filter.max_price {
        condition = condition.add(product::Column::PricePerUnit.lte(max));
    }
    if let Some(organic) = filter.organic {
        condition = condition.add(product::Column::IsOrganic.eq(organic));
    }
    if let Some(state) = filter.state.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(product::Column::State.eq(state));
    }
    if let Some(district) = filter.district.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(product::Column::District.eq(district));
    }
    if let Some(featured) = filter.featured {
        condition = condition.add(product::Column::IsFeatured.eq(featured));
    }

    let query = Product::find().find_also_related(ProductCategory).filter(condition);
    let query = match filter.sort {
        ProductSort::Newest => query.order_by_desc(product::Column::CreatedAt),
        ProductSort::PriceAsc => query.order_by_asc(product::Column::PricePerUnit),
        ProductSort::PriceDesc => query.order_by_desc(product::Column::PricePerUnit),
        ProductSort::Rating => query
            .order_by_desc(product::Column::Rating)
            .order_by_desc(product::Column::ReviewCount),
        ProductSort::Popular => query
            .order_by_desc(product::Column::SalesCount)
            .order_by_desc(product::Column::ViewsCount),
    }
    .order_by_desc(product::Column::Id);

    let (page, page_size) = page_params(filter.page, filter.page_size);
    let paginator = query.paginate(db, page_size);
    let count = paginator.num_items().await?;
    let rows = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        count,
        page,
        page_size,
        results: to_views(db, rows).await?,
    })
}

pub async fn featured_products(db: &DatabaseConnection) -> Result<Vec<ProductView>> {
    let rows = Product::find()
        .find_also_related(ProductCategory)
        .filter(listed())
        .filter(product::Column::IsFeatured.eq(true))
        .order_by_desc(product::Column::Rating)
        .order_by_desc(product::Column::CreatedAt)
        .limit(FEATURED_LIMIT)
        .all(db)
        .await?;
    to_views(db, rows).await
}

/// Best-selling listings, ties broken by views.
pub async fn trending_products(db: &DatabaseConnection) -> Result<Vec<ProductView>> {
    let rows = Product::find()
        .find_also_related(ProductCategory)
        .filter(listed())
        .order_by_desc(product::Column::SalesCount)
        .order_by_desc(product::Column::ViewsCount)
        .order_by_desc(product::Column::Id)
        .limit(TRENDING_LIMIT)
        .all(db)
        .await?;
    to_views(db, rows).await
}

/// Every non-deleted listing of one farmer, drafts included.
pub async fn farmer_products(db: &DatabaseConnection, farmer_id: i64) -> Result<Vec<ProductView>> {
    let rows = Product::find()
        .find_also_related(ProductCategory)
        .filter(product::Column::FarmerId.eq(farmer_id))
        .filter(product::Column::DeletedAt.is_null())
        .order_by_desc(product::Column::CreatedAt)
        .all(db)
        .await?;
    to_views(db, rows).await
}

/// Loads a non-deleted product.
pub async fn find_product(db: &DatabaseConnection, id: i64) -> Result<product::Model> {
    Product::find_by_id(id)
        .filter(product::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Product", id))
}

/// Product detail. Each call counts as one view.
pub async fn get_product(db: &DatabaseConnection, id: i64) -> Result<ProductView> {
    find_product(db, id).await?;
    Product::update_many()
        .col_expr(
            product::Column::ViewsCount,
            Expr::col(product::Column::ViewsCount).add(1),
        )
        .filter(product::Column::Id.eq(id))
        .exec(db)
        .await?;
    let product = find_product(db, id).await?;
    to_view(db, product).await
}

fn ensure_seller(seller: &user::Model) -> Result<()> {
    match seller.role {
        UserRole::Farmer | UserRole::Admin => Ok(()),
        UserRole::Buyer => Err(Error::forbidden("Only farmers can list products.")),
    }
}

fn ensure_owner(seller: &user::Model, product: &product::Model) -> Result<()> {
    if product.farmer_id == seller.id {
        Ok(())
    } else {
        Err(Error::forbidden("You can only change your own products."))
    }
}

async fn validate(db: &DatabaseConnection, input: &ProductInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(Error::validation("Product name is required."));
    }
    if !input.price_per_unit.is_finite() || input.price_per_unit <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: input.price_per_unit,
        });
    }
    if !input.quantity_available.is_finite() || input.quantity_available < 0.0 {
        return Err(Error::validation("Quantity available cannot be negative."));
    }
    if !input.min_order_quantity.is_finite() || input.min_order_quantity <= 0.0 {
        return Err(Error::validation("Minimum order quantity must be positive."));
    }
    if matches!(input.original_price, Some(p) if !p.is_finite() || p < 0.0) {
        return Err(Error::validation("Original price cannot be negative."));
    }
    let category = ProductCategory::find_by_id(input.category_id)
        .one(db)
        .await?
        .filter(|c| c.is_active);
    if category.is_none() {
        return Err(Error::not_found("Product category", input.category_id));
    }
    Ok(())
}

fn or_profile(value: &str, profile: &str) -> String {
    let value = value.trim();
    if value.is_empty() { profile } else { value }.to_string()
}

pub async fn create_product(
    db: &DatabaseConnection,
    seller: &user::Model,
    input: ProductInput,
) -> Result<ProductView> {
    ensure_seller(seller)?;
    validate(db, &input).await?;

    let now = Utc::now();
    let product = product::ActiveModel {
        farmer_id: Set(seller.id),
        category_id: Set(input.category_id),
        name: Set(input.name.trim().to_string()),
        variety: Set(input.variety.trim().to_string()),
        description: Set(input.description),
        unit: Set(input.unit),
        quantity_available: Set(input.quantity_available),
        min_order_quantity: Set(input.min_order_quantity),
        price_per_unit: Set(round_money(input.price_per_unit)),
        original_price: Set(input.original_price.map(round_money)),
        quality_grade: Set(input.quality_grade),
        is_organic: Set(input.is_organic),
        listing_status: Set(input.listing_status.unwrap_or(ListingStatus::Active)),
        is_featured: Set(input.is_featured),
        state: Set(or_profile(&input.state, &seller.state)),
        district: Set(or_profile(&input.district, &seller.district)),
        rating: Set(0.0),
        review_count: Set(0),
        views_count: Set(0),
        sales_count: Set(0),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("User {} listed product {} ({})", seller.id, product.id, product.name);
    to_view(db, product).await
}

pub async fn update_product(
    db: &DatabaseConnection,
    seller: &user::Model,
    id: i64,
    input: ProductInput,
) -> Result<ProductView> {
    ensure_seller(seller)?;
    let existing = find_product(db, id).await?;
    ensure_owner(seller, &existing)?;
    validate(db, &input).await?;

    let mut active: product::ActiveModel = existing.clone().into();
    active.category_id = Set(input.category_id);
    active.name = Set(input.name.trim().to_string());
    active.variety = Set(input.variety.trim().to_string());
    active.description = Set(input.description);
    active.unit = Set(input.unit);
    active.quantity_available = Set(input.quantity_available);
    active.min_order_quantity = Set(input.min_order_quantity);
    active.price_per_unit = Set(round_money(input.price_per_unit));
    active.original_price = Set(input.original_price.map(round_money));
    active.quality_grade = Set(input.quality_grade);
    active.is_organic = Set(input.is_organic);
    active.is_featured = Set(input.is_featured);
    active.state = Set(or_profile(&input.state, &existing.state));
    active.district = Set(or_profile(&input.district, &existing.district));

    // Restocking a sold-out listing puts it back on sale
    let status = match input.listing_status {
        Some(status) => status,
        None if existing.listing_status == ListingStatus::SoldOut && input.quantity_available > 0.0 => {
            ListingStatus::Active
        }
        None => existing.listing_status,
    };
    active.listing_status = Set(status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    to_view(db, updated).await
}

/// Soft-deletes a listing.
pub async fn delete_product(db: &DatabaseConnection, seller: &user::Model, id: i64) -> Result<()> {
    ensure_seller(seller)?;
    let existing = find_product(db, id).await?;
    ensure_owner(seller, &existing)?;

    let now = Utc::now();
    let mut active: product::ActiveModel = existing.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;

    info!("User {} removed product {}", seller.id, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn input(category_id: i64, name: &str, price: f64) -> ProductInput {
        ProductInput {
            category_id,
            name: name.to_string(),
            variety: String::new(),
            description: String::new(),
            unit: "kg".to_string(),
            quantity_available: 50.0,
            min_order_quantity: 1.0,
            price_per_unit: price,
            original_price: None,
            quality_grade: "A".to_string(),
            is_organic: false,
            listing_status: None,
            is_featured: false,
            state: String::new(),
            district: String::new(),
        }
    }

    #[tokio::test]
    async fn test_categories_follow_display_order() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_product_category(&db, "Fruits", 2).await?;
        create_test_product_category(&db, "Vegetables", 1).await?;
        let names: Vec<String> = list_categories(&db).await?.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Vegetables", "Fruits"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_only_sellers_create_and_owner_edits() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let other = create_test_farmer(&db, "suresh").await?;
        let buyer = create_test_buyer(&db, "bhavya").await?;
        let veg = create_test_product_category(&db, "Vegetables", 1).await?;

        assert!(matches!(
            create_product(&db, &buyer, input(veg.id, "Tomato", 20.0)).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            create_product(&db, &farmer, input(veg.id, "Tomato", 0.0)).await,
            Err(Error::InvalidAmount { .. })
        ));

        let created = create_product(&db, &farmer, input(veg.id, "Tomato", 20.0)).await?;
        assert_eq!(created.category_name, "Vegetables");
        assert_eq!(created.product.state, farmer.state);
        assert_eq!(created.product.listing_status, ListingStatus::Active);

        let id = created.product.id;
        assert!(matches!(
            update_product(&db, &other, id, input(veg.id, "Onion", 10.0)).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            delete_product(&db, &other, id).await,
            Err(Error::Forbidden { .. })
        ));

        let updated = update_product(&db, &farmer, id, input(veg.id, "Tomato", 22.5)).await?;
        assert_eq!(updated.product.price_per_unit, 22.5);

        delete_product(&db, &farmer, id).await?;
        assert!(matches!(get_product(&db, id).await, Err(Error::NotFound { .. })));
        assert!(list_products(&db, &ProductFilter::default()).await?.results.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_filters_sort_and_pages() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let veg = create_test_product_category(&db, "Vegetables", 1).await?;
        let fruit = create_test_product_category(&db, "Fruits", 2).await?;
        create_product(&db, &farmer, input(veg.id, "Tomato", 20.0)).await?;
        create_product(&db, &farmer, input(veg.id, "Brinjal", 35.0)).await?;
        let mut mango = input(fruit.id, "Mango", 80.0);
        mango.is_organic = true;
        mango.description = "Alphonso from Ramanagara".to_string();
        create_product(&db, &farmer, mango).await?;
        let mut draft = input(veg.id, "Beans", 5.0);
        draft.listing_status = Some(ListingStatus::Draft);
        create_product(&db, &farmer, draft).await?;

        let all = list_products(&db, &ProductFilter::default()).await?;
        assert_eq!(all.count, 3);

        let cheap_first = list_products(
            &db,
            &ProductFilter {
                sort: ProductSort::PriceAsc,
                ..Default::default()
            },
        )
        .await?;
        let names: Vec<&str> = cheap_first.results.iter().map(|p| p.product.name.as_str()).collect();
        assert_eq!(names, vec!["Tomato", "Brinjal", "Mango"]);

        let ranged = list_products(
            &db,
            &ProductFilter {
                min_price: Some(30.0),
                max_price: Some(50.0),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(ranged.count, 1);

        let search = list_products(
            &db,
            &ProductFilter {
                search: Some("alphonso".to_string()),
                organic: Some(true),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(search.results[0].product.name, "Mango");

        let by_category = list_products(
            &db,
            &ProductFilter {
                category: Some(veg.id),
                page: Some(2),
                page_size: Some(1),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(by_category.count, 2);
        assert_eq!(by_category.page, 2);
        assert_eq!(by_category.results.len(), 1);

        assert_eq!(farmer_products(&db, farmer.id).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_counts_views_and_featured() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let veg = create_test_product_category(&db, "Vegetables", 1).await?;
        let mut featured = input(veg.id, "Tomato", 20.0);
        featured.is_featured = true;
        let created = create_product(&db, &farmer, featured).await?;
        create_product(&db, &farmer, input(veg.id, "Onion", 20.0)).await?;

        get_product(&db, created.product.id).await?;
        let second = get_product(&db, created.product.id).await?;
        assert_eq!(second.product.views_count, 2);
        assert_eq!(second.farmer_name, farmer.display_name());

        let strip = featured_products(&db).await?;
        assert_eq!(strip.len(), 1);
        assert_eq!(strip[0].product.id, created.product.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_trending_orders_by_sales_then_views() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let veg = create_test_product_category(&db, "Vegetables", 1).await?;
        let tomato = create_product(&db, &farmer, input(veg.id, "Tomato", 20.0)).await?;
        let onion = create_product(&db, &farmer, input(veg.id, "Onion", 20.0)).await?;
        let chilli = create_product(&db, &farmer, input(veg.id, "Chilli", 20.0)).await?;
        let mut draft = input(veg.id, "Beans", 20.0);
        draft.listing_status = Some(ListingStatus::Draft);
        let draft = create_product(&db, &farmer, draft).await?;

        for (id, sales) in [(onion.product.id, 5), (chilli.product.id, 5), (draft.product.id, 50)] {
            Product::update_many()
                .col_expr(product::Column::SalesCount, Expr::value(sales))
                .filter(product::Column::Id.eq(id))
                .exec(&db)
                .await?;
        }
        get_product(&db, chilli.product.id).await?;

        let ids: Vec<i64> = trending_products(&db).await?.into_iter().map(|v| v.product.id).collect();
        assert_eq!(ids, vec![chilli.product.id, onion.product.id, tomato.product.id]);
        Ok(())
    }

    #[tokio::test]
    async fn test_category_tree_nests_children() -> Result<()> {
        let db = setup_test_db().await?;
        let veg = create_test_product_category(&db, "Vegetables", 1).await?;
        let seeds = create_test_product_category(&db, "Seeds", 2).await?;
        let leafy = create_test_product_category(&db, "Leafy", 1).await?;
        let orphan = create_test_product_category(&db, "Orphan", 3).await?;
        for (id, parent) in [(leafy.id, veg.id), (orphan.id, 999)] {
            ProductCategory::update_many()
                .col_expr(product_category::Column::ParentId, Expr::value(parent))
                .filter(product_category::Column::Id.eq(id))
                .exec(&db)
                .await?;
        }

        let tree = category_tree(&db).await?;
        let roots: Vec<&str> = tree.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(roots, vec!["Vegetables", "Seeds", "Orphan"]);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].category.id, leafy.id);
        assert!(tree[1].children.is_empty());
        assert_eq!(seeds.parent_id, None);
        Ok(())
    }
}
