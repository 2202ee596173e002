//! `/api/auth/admin/` - Platform statistics, user management and the
//! activity trail. Every handler requires the admin role.

use crate::{
    api::{
        AppState,
        extract::{AdminUser, Json, Path, Query},
        response::ApiResponse,
    },
    core::{
        Page,
        admin::{self, AdminUserUpdate, PlatformStats, UserDetail, UserFilter},
    },
    entities::{activity_log, user},
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::get,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u64>,
}

async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<ApiResponse<PlatformStats>> {
    Ok(ApiResponse::success(admin::platform_stats(&state.db).await?))
}

async fn users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<UserFilter>,
) -> Result<ApiResponse<Page<user::Model>>> {
    Ok(ApiResponse::success(admin::list_users(&state.db, &filter).await?))
}

async fn user_detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<UserDetail>> {
    Ok(ApiResponse::success(admin::user_detail(&state.db, id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    AdminUser(caller): AdminUser,
    Path(id): Path<i64>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<ApiResponse<user::Model>> {
    let user = admin::update_user(&state.db, &caller, id, update).await?;
    Ok(ApiResponse::with_message("User updated", user))
}

async fn deactivate_user(
    State(state): State<AppState>,
    AdminUser(caller): AdminUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<user::Model>> {
    let user = admin::deactivate_user(&state.db, &caller, id).await?;
    Ok(ApiResponse::with_message("User deactivated", user))
}

async fn activity(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ActivityQuery>,
) -> Result<ApiResponse<Vec<activity_log::Model>>> {
    Ok(ApiResponse::success(admin::recent_activity(&state.db, query.limit).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats/", get(stats))
        .route("/users/", get(users))
        .route(
            "/users/{id}/",
            get(user_detail).put(update_user).delete(deactivate_user),
        )
        .route("/activity/", get(activity))
}
