//! Accounts and bearer tokens.
//!
//! Passwords are hashed with bcrypt on the blocking thread pool. Login issues
//! an opaque random token; only its SHA-256 digest is stored, so a leaked
//! database cannot be replayed as a credential. A token is valid until its
//! `expires_at` or until logout. Expired rows are purged whenever a new token
//! is issued.

use crate::{
    core::activity,
    entities::{AuthToken, User, UserRole, auth_token, user},
    errors::{Error, Result},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Shortest accepted username.
pub const MIN_USERNAME_LEN: usize = 3;
/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Self-service registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Option<UserRole>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: user::Model,
}

/// Hex SHA-256 of a presented token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn normalize_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let (password, hash) = (password.to_string(), hash.to_string());
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

async fn ensure_phone_free(db: &DatabaseConnection, phone: &str, except: Option<i64>) -> Result<()> {
    let mut query = User::find().filter(user::Column::Phone.eq(phone));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict("Phone number is already registered"));
    }
    Ok(())
}

/// Registers a new account.
///
/// The role defaults to farmer. Admin accounts can only be created by an
/// existing admin promoting a user.
pub async fn signup(db: &DatabaseConnection, input: SignupInput, hash_cost: u32) -> Result<user::Model> {
    let username = input.username.trim().to_string();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(Error::validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let role = input.role.unwrap_or(UserRole::Farmer);
    if role == UserRole::Admin {
        return Err(Error::validation("Admin accounts cannot be created by signup"));
    }

    if User::find()
        .filter(user::Column::Username.eq(&username))
        .one(db)
        .await?
        .is_some()
    {
        return Err(Error::conflict("Username is already taken"));
    }
    let phone = normalize_phone(input.phone);
    if let Some(phone) = &phone {
        ensure_phone_free(db, phone, None).await?;
    }

    let password_hash = hash_password(input.password, hash_cost).await?;
    let now = Utc::now();
    let created = user::ActiveModel {
        username: Set(username),
        phone: Set(phone),
        email: Set(input.email.trim().to_string()),
        password_hash: Set(password_hash),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        role: Set(role),
        state: Set(input.state.trim().to_string()),
        district: Set(input.district.trim().to_string()),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    activity::record(db, created.id, activity::SIGNUP, format!("{} joined as {:?}", created.username, role)).await?;
    info!("New {:?} account {}", role, created.username);
    Ok(created)
}

/// Issues a fresh token for `user_id` and returns it with its expiry.
/// Tokens of any user that have already expired are deleted first.
pub async fn issue_token(
    db: &DatabaseConnection,
    user_id: i64,
    ttl: chrono::Duration,
) -> Result<(String, DateTime<Utc>)> {
    let token = generate_token();
    let now = Utc::now();
    let expires_at = now + ttl;

    let purged = AuthToken::delete_many()
        .filter(auth_token::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?
        .rows_affected;
    if purged > 0 {
        info!("Purged {} expired tokens", purged);
    }

    auth_token::ActiveModel {
        user_id: Set(user_id),
        token_hash: Set(hash_token(&token)),
        expires_at: Set(expires_at),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok((token, expires_at))
}

/// Checks credentials and issues a token.
pub async fn login(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    ttl: chrono::Duration,
) -> Result<LoginOutcome> {
    let invalid = || Error::Unauthorized {
        message: "Invalid username or password".to_string(),
    };

    let found = User::find()
        .filter(user::Column::Username.eq(username.trim()))
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(password, &found.password_hash).await? {
        warn!("Failed login for {}", found.username);
        return Err(invalid());
    }
    if !found.is_active {
        return Err(Error::forbidden("This account has been deactivated"));
    }

    let (access_token, expires_at) = issue_token(db, found.id, ttl).await?;

    let mut active: user::ActiveModel = found.into();
    active.last_login_at = Set(Some(Utc::now()));
    let user = active.update(db).await?;

    activity::record(db, user.id, activity::LOGIN, format!("{} logged in", user.username)).await?;

    Ok(LoginOutcome {
        access_token,
        token_type: "Bearer",
        expires_at,
        user,
    })
}

/// Resolves a presented bearer token to its active user.
pub async fn authenticate(db: &DatabaseConnection, token: &str) -> Result<user::Model> {
    let unauthorized = |message: &str| Error::Unauthorized {
        message: message.to_string(),
    };

    let stored = AuthToken::find()
        .filter(auth_token::Column::TokenHash.eq(hash_token(token)))
        .one(db)
        .await?
        .ok_or_else(|| unauthorized("Invalid token"))?;

    if stored.expires_at <= Utc::now() {
        AuthToken::delete_by_id(stored.id).exec(db).await?;
        return Err(unauthorized("Token has expired"));
    }

    let user = User::find_by_id(stored.user_id)
        .one(db)
        .await?
        .ok_or_else(|| unauthorized("Invalid token"))?;
    if !user.is_active {
        return Err(unauthorized("Account is deactivated"));
    }
    Ok(user)
}

/// Deletes the presented token. Unknown tokens are ignored.
pub async fn logout(db: &DatabaseConnection, token: &str) -> Result<()> {
    AuthToken::delete_many()
        .filter(auth_token::Column::TokenHash.eq(hash_token(token)))
        .exec(db)
        .await?;
    Ok(())
}

/// Deletes every token of a user; returns how many were revoked.
pub async fn revoke_all_tokens(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    let result = AuthToken::delete_many()
        .filter(auth_token::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn get_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))
}

/// Applies a partial profile update.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: i64,
    update: ProfileUpdate,
) -> Result<user::Model> {
    let current = get_user(db, user_id).await?;
    let mut active: user::ActiveModel = current.into();

    if let Some(first_name) = update.first_name {
        active.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = update.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if let Some(email) = update.email {
        active.email = Set(email.trim().to_string());
    }
    if update.phone.is_some() {
        let phone = normalize_phone(update.phone);
        if let Some(phone) = &phone {
            ensure_phone_free(db, phone, Some(user_id)).await?;
        }
        active.phone = Set(phone);
    }
    if let Some(state) = update.state {
        active.state = Set(state.trim().to_string());
    }
    if let Some(district) = update.district {
        active.district = Set(district.trim().to_string());
    }
    active.updated_at = Set(Utc::now());

    active.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    const TEST_COST: u32 = 4;

    fn signup_input(username: &str) -> SignupInput {
        SignupInput {
            username: username.to_string(),
            password: TEST_PASSWORD.to_string(),
            email: format!("{username}@example.com"),
            phone: None,
            first_name: "Ramesh".to_string(),
            last_name: "Gowda".to_string(),
            role: None,
            state: "Karnataka".to_string(),
            district: "Mandya".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_defaults_to_farmer() -> Result<()> {
        let db = setup_test_db().await?;
        let user = signup(&db, signup_input("ramesh"), TEST_COST).await?;
        assert_eq!(user.role, UserRole::Farmer);
        assert!(user.is_active);
        assert_ne!(user.password_hash, TEST_PASSWORD);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let mut short_name = signup_input("ab");
        short_name.username = "ab".to_string();
        assert!(matches!(
            signup(&db, short_name, TEST_COST).await,
            Err(Error::Validation { .. })
        ));

        let mut short_password = signup_input("suresh");
        short_password.password = "1234567".to_string();
        assert!(matches!(
            signup(&db, short_password, TEST_COST).await,
            Err(Error::Validation { .. })
        ));

        let mut admin = signup_input("mallika");
        admin.role = Some(UserRole::Admin);
        assert!(matches!(
            signup(&db, admin, TEST_COST).await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicates() -> Result<()> {
        let db = setup_test_db().await?;
        let mut first = signup_input("ramesh");
        first.phone = Some("9876543210".to_string());
        signup(&db, first, TEST_COST).await?;

        assert!(matches!(
            signup(&db, signup_input("ramesh"), TEST_COST).await,
            Err(Error::Conflict { .. })
        ));

        let mut same_phone = signup_input("kavya");
        same_phone.phone = Some(" 9876543210 ".to_string());
        assert!(matches!(
            signup(&db, same_phone, TEST_COST).await,
            Err(Error::Conflict { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_login_and_authenticate() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;

        let outcome = login(&db, "ramesh", TEST_PASSWORD, chrono::Duration::hours(1)).await?;
        assert!(outcome.user.last_login_at.is_some());
        assert!(outcome.expires_at > Utc::now());

        let resolved = authenticate(&db, &outcome.access_token).await?;
        assert_eq!(resolved.id, farmer.id);

        // Only the digest is stored
        let stored = AuthToken::find().one(&db).await?.unwrap();
        assert_ne!(stored.token_hash, outcome.access_token);
        assert_eq!(stored.token_hash, hash_token(&outcome.access_token));
        Ok(())
    }

    #[tokio::test]
    async fn test_login_failures() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let ttl = chrono::Duration::hours(1);

        assert!(matches!(
            login(&db, "ramesh", "wrong-password", ttl).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            login(&db, "nobody", TEST_PASSWORD, ttl).await,
            Err(Error::Unauthorized { .. })
        ));

        let mut active: user::ActiveModel = farmer.into();
        active.is_active = Set(false);
        active.update(&db).await?;
        assert!(matches!(
            login(&db, "ramesh", TEST_PASSWORD, ttl).await,
            Err(Error::Forbidden { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_and_removed() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let (token, _) = issue_token(&db, farmer.id, chrono::Duration::seconds(-5)).await?;

        assert!(matches!(
            authenticate(&db, &token).await,
            Err(Error::Unauthorized { .. })
        ));
        assert!(AuthToken::find().one(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_issuing_a_token_purges_expired_ones() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let other = create_test_buyer(&db, "kavya").await?;
        let (stale, _) = issue_token(&db, other.id, chrono::Duration::seconds(-5)).await?;

        login(&db, "ramesh", TEST_PASSWORD, chrono::Duration::hours(1)).await?;

        let remaining = AuthToken::find().all(&db).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, farmer.id);
        assert_ne!(remaining[0].token_hash, hash_token(&stale));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_signup_and_login_on_multi_thread_runtime() -> Result<()> {
        let db = setup_test_db().await?;
        let (first, second) = tokio::join!(
            signup(&db, signup_input("ramesh"), TEST_COST),
            signup(&db, signup_input("suresh"), TEST_COST),
        );
        let (first, second) = (first?, second?);
        assert!(bcrypt::verify(TEST_PASSWORD, &first.password_hash)?);
        assert_ne!(first.password_hash, second.password_hash);

        let outcome = login(&db, "suresh", TEST_PASSWORD, chrono::Duration::hours(1)).await?;
        assert_eq!(outcome.user.id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_logout_and_revoke() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let ttl = chrono::Duration::hours(1);
        let (first, _) = issue_token(&db, farmer.id, ttl).await?;
        let (second, _) = issue_token(&db, farmer.id, ttl).await?;

        logout(&db, &first).await?;
        assert!(authenticate(&db, &first).await.is_err());
        assert!(authenticate(&db, &second).await.is_ok());

        assert_eq!(revoke_all_tokens(&db, farmer.id).await?, 1);
        assert!(authenticate(&db, &second).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_profile_partial() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let other = create_test_buyer(&db, "kavya").await?;
        update_profile(
            &db,
            other.id,
            ProfileUpdate {
                phone: Some("9000000001".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let updated = update_profile(
            &db,
            farmer.id,
            ProfileUpdate {
                district: Some("Hassan".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.district, "Hassan");
        assert_eq!(updated.first_name, farmer.first_name);

        let clash = update_profile(
            &db,
            farmer.id,
            ProfileUpdate {
                phone: Some("9000000001".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(clash, Err(Error::Conflict { .. })));
        Ok(())
    }
}
