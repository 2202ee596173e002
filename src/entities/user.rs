//! User entity - Farmers, buyers and administrators.
//!
//! The role decides what a user may do on the marketplace and whether the
//! admin dashboard is reachable. Passwords are stored as bcrypt hashes only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Grows and sells produce, keeps farm records
    #[sea_orm(string_value = "farmer")]
    Farmer,
    /// Buys from the marketplace
    #[sea_orm(string_value = "buyer")]
    Buyer,
    /// Full access to the admin dashboard
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login name, unique across the platform
    #[sea_orm(unique)]
    pub username: String,
    /// Mobile number, unique when present
    #[sea_orm(unique)]
    pub phone: Option<String>,
    /// Contact email
    pub email: String,
    /// bcrypt hash of the password
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Account role
    pub role: UserRole,
    /// State of residence (used for marketplace location filters)
    pub state: String,
    /// District of residence
    pub district: String,
    /// Inactive users cannot log in
    pub is_active: bool,
    /// Last successful login
    pub last_login_at: Option<DateTimeUtc>,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the profile was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Display name: first and last name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user holds many auth tokens
    #[sea_orm(has_many = "super::auth_token::Entity")]
    AuthTokens,
}

impl Related<super::auth_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
