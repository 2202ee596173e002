//! `/api/auth/` - Signup, login, logout and the caller's profile.

use crate::{
    api::{
        AppState,
        extract::{AuthUser, Json},
        response::ApiResponse,
    },
    core::auth::{self, LoginOutcome, ProfileUpdate, SignupInput},
    entities::user,
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> Result<ApiResponse<LoginOutcome>> {
    let user = auth::signup(&state.db, input, state.settings.password_hash_cost).await?;
    let (access_token, expires_at) = auth::issue_token(&state.db, user.id, state.settings.token_ttl()).await?;
    info!("New {:?} account: {}", user.role, user.username);
    Ok(ApiResponse::created(
        "Account created successfully",
        LoginOutcome {
            access_token,
            token_type: "Bearer",
            expires_at,
            user,
        },
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<ApiResponse<LoginOutcome>> {
    let outcome = auth::login(
        &state.db,
        &request.username,
        &request.password,
        state.settings.token_ttl(),
    )
    .await?;
    Ok(ApiResponse::with_message("Login successful", outcome))
}

async fn logout(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<()>> {
    auth::logout(&state.db, &caller.token).await?;
    Ok(ApiResponse::message("Logged out"))
}

async fn profile(caller: AuthUser) -> ApiResponse<user::Model> {
    ApiResponse::success(caller.user)
}

async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<ApiResponse<user::Model>> {
    let user = auth::update_profile(&state.db, caller.id(), update).await?;
    Ok(ApiResponse::with_message("Profile updated", user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup/", post(signup))
        .route("/login/", post(login))
        .route("/logout/", post(logout))
        .route("/profile/", get(profile).put(update_profile))
        .nest("/admin", super::admin::router())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::routes::testing::TestApp;
    use crate::test_utils::{TEST_PASSWORD, create_test_farmer, unconfigured_providers};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_signup_login_profile_logout() {
        let app = TestApp::new(unconfigured_providers()).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/signup/",
                None,
                Some(json!({"username": "ramesh", "password": "long-enough", "phone": "9000000001"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["role"], "farmer");
        assert!(body["data"]["user"].get("password_hash").is_none());

        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login/",
                None,
                Some(json!({"username": "ramesh", "password": "long-enough"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["access_token"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(
                Method::PUT,
                "/api/auth/profile/",
                Some(&token),
                Some(json!({"district": "Hassan"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["district"], "Hassan");

        let (status, _) = app.call(Method::POST, "/api/auth/logout/", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = app.call(Method::GET, "/api/auth/profile/", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_auth_failures_use_the_envelope() {
        let app = TestApp::new(unconfigured_providers()).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();

        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login/",
                None,
                Some(json!({"username": "ramesh", "password": "wrong-password"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/signup/",
                None,
                Some(json!({"username": "ramesh", "password": TEST_PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .call(Method::POST, "/api/auth/signup/", None, Some(json!({"username": 5})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = app.call(Method::GET, "/api/auth/profile/", Some("nonsense"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
