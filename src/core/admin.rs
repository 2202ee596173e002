//! Admin dashboard - Platform statistics, user management and the activity
//! trail. Callers check the admin role before reaching these functions.

use crate::{
    core::{Page, activity, auth, page_params},
    entities::{
        ActivityLog, Conversation, CropDiagnosis, Expense, Income, Order, OrderStatus, Product,
        SoilSample, User, UserRole, activity_log, conversation, crop_diagnosis, expense, income,
        order, product, soil_sample, user,
    },
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Window for the "active users" figure.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_ACTIVITY_LIMIT: u64 = 50;
pub const MAX_ACTIVITY_LIMIT: u64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsersByRole {
    pub farmers: u64,
    pub buyers: u64,
    pub admins: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStats {
    pub total_users: u64,
    pub users_by_role: UsersByRole,
    pub active_users_30d: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub total_revenue: f64,
    pub expense_records: u64,
    pub income_records: u64,
    pub soil_samples: u64,
    pub crop_diagnoses: u64,
    pub conversations: u64,
}

async fn count_role(db: &DatabaseConnection, role: UserRole) -> Result<u64> {
    User::find()
        .filter(user::Column::Role.eq(role))
        .count(db)
        .await
        .map_err(Into::into)
}

pub async fn platform_stats(db: &DatabaseConnection) -> Result<PlatformStats> {
    let users_by_role = UsersByRole {
        farmers: count_role(db, UserRole::Farmer).await?,
        buyers: count_role(db, UserRole::Buyer).await?,
        admins: count_role(db, UserRole::Admin).await?,
    };
    let since = Utc::now() - Duration::days(ACTIVE_WINDOW_DAYS);
    let active_users_30d = User::find()
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::LastLoginAt.gte(since))
        .count(db)
        .await?;

    let revenue: Vec<f64> = Order::find()
        .select_only()
        .column(order::Column::TotalAmount)
        .filter(order::Column::Status.ne(OrderStatus::Cancelled))
        .into_tuple()
        .all(db)
        .await?;

    Ok(PlatformStats {
        total_users: users_by_role.farmers + users_by_role.buyers + users_by_role.admins,
        users_by_role,
        active_users_30d,
        total_products: Product::find()
            .filter(product::Column::DeletedAt.is_null())
            .count(db)
            .await?,
        total_orders: Order::find().count(db).await?,
        total_revenue: crate::core::round_money(revenue.iter().sum()),
        expense_records: Expense::find()
            .filter(expense::Column::DeletedAt.is_null())
            .count(db)
            .await?,
        income_records: Income::find()
            .filter(income::Column::DeletedAt.is_null())
            .count(db)
            .await?,
        soil_samples: SoilSample::find().count(db).await?,
        crop_diagnoses: CropDiagnosis::find().count(db).await?,
        conversations: Conversation::find().count(db).await?,
    })
}

/// Query parameters of the user listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

pub async fn list_users(db: &DatabaseConnection, filter: &UserFilter) -> Result<Page<user::Model>> {
    let mut condition = Condition::all();
    if let Some(role) = filter.role {
        condition = condition.add(user::Column::Role.eq(role));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(user::Column::Username.contains(term))
                .add(user::Column::FirstName.contains(term))
                .add(user::Column::LastName.contains(term))
                .add(user::Column::Email.contains(term))
                .add(user::Column::Phone.contains(term)),
        );
    }

    let (page, page_size) = page_params(filter.page, filter.page_size);
    let paginator = User::find()
        .filter(condition)
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .paginate(db, page_size);

    Ok(Page {
        count: paginator.num_items().await?,
        page,
        page_size,
        results: paginator.fetch_page(page - 1).await?,
    })
}

/// Per-user record counts shown on the user detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub expenses: u64,
    pub income: u64,
    pub products: u64,
    pub orders: u64,
    pub soil_samples: u64,
    pub crop_diagnoses: u64,
    pub conversations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: user::Model,
    pub counts: UserCounts,
}

pub async fn user_detail(db: &DatabaseConnection, user_id: i64) -> Result<UserDetail> {
    let user = auth::get_user(db, user_id).await?;
    let counts = UserCounts {
        expenses: Expense::find()
            .filter(expense::Column::FarmerId.eq(user_id))
            .filter(expense::Column::DeletedAt.is_null())
            .count(db)
            .await?,
        income: Income::find()
            .filter(income::Column::FarmerId.eq(user_id))
            .filter(income::Column::DeletedAt.is_null())
            .count(db)
            .await?,
        products: Product::find()
            .filter(product::Column::FarmerId.eq(user_id))
            .filter(product::Column::DeletedAt.is_null())
            .count(db)
            .await?,
        orders: Order::find()
            .filter(order::Column::BuyerId.eq(user_id))
            .count(db)
            .await?,
        soil_samples: SoilSample::find()
            .filter(soil_sample::Column::UserId.eq(user_id))
            .count(db)
            .await?,
        crop_diagnoses: CropDiagnosis::find()
            .filter(crop_diagnosis::Column::UserId.eq(user_id))
            .count(db)
            .await?,
        conversations: Conversation::find()
            .filter(conversation::Column::UserId.eq(user_id))
            .count(db)
            .await?,
    };
    Ok(UserDetail { user, counts })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserUpdate {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// Changes a user's role or active flag. Deactivating a user also signs them
/// out everywhere.
pub async fn update_user(
    db: &DatabaseConnection,
    admin: &user::Model,
    user_id: i64,
    update: AdminUserUpdate,
) -> Result<user::Model> {
    let target = auth::get_user(db, user_id).await?;
    if target.id == admin.id {
        if update.is_active == Some(false) {
            return Err(Error::validation("You cannot deactivate your own account."));
        }
        if update.role.is_some_and(|role| role != UserRole::Admin) {
            return Err(Error::validation("You cannot remove your own admin role."));
        }
    }

    let deactivating = target.is_active && update.is_active == Some(false);
    let mut active: user::ActiveModel = target.into();
    if let Some(role) = update.role {
        active.role = Set(role);
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    if deactivating {
        let revoked = auth::revoke_all_tokens(db, updated.id).await?;
        activity::record(db, admin.id, activity::USER_DEACTIVATED, format!("user {}", updated.username)).await?;
        info!("Admin {} deactivated user {} ({} tokens revoked)", admin.id, updated.id, revoked);
    }
    Ok(updated)
}

pub async fn deactivate_user(db: &DatabaseConnection, admin: &user::Model, user_id: i64) -> Result<user::Model> {
    update_user(
        db,
        admin,
        user_id,
        AdminUserUpdate {
            role: None,
            is_active: Some(false),
        },
    )
    .await
}

/// Recent activity, newest first. `limit` defaults to 50 and is capped at 500.
pub async fn recent_activity(db: &DatabaseConnection, limit: Option<u64>) -> Result<Vec<activity_log::Model>> {
    let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, MAX_ACTIVITY_LIMIT);
    activity::recent(db, limit).await
}

/// Entries for one user, newest first.
pub async fn user_activity(db: &DatabaseConnection, user_id: i64, limit: u64) -> Result<Vec<activity_log::Model>> {
    ActivityLog::find()
        .filter(activity_log::Column::UserId.eq(user_id))
        .order_by_desc(activity_log::Column::CreatedAt)
        .order_by_desc(activity_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{auth::LoginOutcome, cart, order as orders};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_stats_count_users_and_revenue() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_admin(&db, "root").await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let buyer = create_test_buyer(&db, "priya").await?;
        let tomato = create_test_product(&db, farmer.id, "Tomato", 40.0, 100.0).await?;

        cart::add_to_cart(&db, buyer.id, cart::AddToCart { product_id: tomato.id, quantity: 20 }).await?;
        let delivery = orders::CheckoutInput {
            delivery_name: "Priya".to_string(),
            delivery_phone: "9876543210".to_string(),
            delivery_address: "4 Temple Street".to_string(),
            delivery_city: "Hassan".to_string(),
            delivery_pincode: "573201".to_string(),
            ..Default::default()
        };
        let placed = orders::checkout(&db, &buyer, delivery).await?;

        let stats = platform_stats(&db).await?;
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.users_by_role.admins, 1);
        assert_eq!(stats.total_products, 1);
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.total_revenue, placed.order.total_amount);

        orders::transition(&db, &admin, placed.order.id, orders::OrderAction::Cancel { reason: "test".into() })
            .await?;
        assert_eq!(platform_stats(&db).await?.total_revenue, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_users_filters_and_paginates() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_admin(&db, "root").await?;
        create_test_farmer(&db, "ramesh").await?;
        create_test_farmer(&db, "rajesh").await?;
        create_test_buyer(&db, "priya").await?;

        let farmers = list_users(
            &db,
            &UserFilter {
                role: Some(UserRole::Farmer),
                ..UserFilter::default()
            },
        )
        .await?;
        assert_eq!(farmers.count, 2);

        let search = list_users(
            &db,
            &UserFilter {
                search: Some("ra".into()),
                page_size: Some(1),
                ..UserFilter::default()
            },
        )
        .await?;
        assert_eq!(search.count, 2);
        assert_eq!(search.results.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_deactivation_revokes_tokens() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_admin(&db, "root").await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let settings = test_settings();

        let LoginOutcome { access_token, .. } =
            auth::login(&db, "ramesh", TEST_PASSWORD, settings.token_ttl()).await?;
        assert_eq!(auth::authenticate(&db, &access_token).await?.id, farmer.id);

        let updated = deactivate_user(&db, &admin, farmer.id).await?;
        assert!(!updated.is_active);
        assert!(matches!(
            auth::authenticate(&db, &access_token).await,
            Err(Error::Unauthorized { .. })
        ));

        let trail = recent_activity(&db, None).await?;
        assert_eq!(trail[0].action, activity::USER_DEACTIVATED);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_cannot_lock_themselves_out() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_admin(&db, "root").await?;

        assert!(matches!(
            deactivate_user(&db, &admin, admin.id).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            update_user(
                &db,
                &admin,
                admin.id,
                AdminUserUpdate {
                    role: Some(UserRole::Buyer),
                    is_active: None
                }
            )
            .await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_user_detail_counts() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        create_test_product(&db, farmer.id, "Onion", 30.0, 10.0).await?;

        let detail = user_detail(&db, farmer.id).await?;
        assert_eq!(detail.counts.products, 1);
        assert_eq!(detail.counts.orders, 0);
        assert!(matches!(user_detail(&db, 999).await, Err(Error::NotFound { .. })));
        Ok(())
    }
}
