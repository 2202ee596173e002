//! Auth token entity - Opaque bearer tokens issued at login.
//!
//! Only the SHA-256 of a token is persisted; the raw value is returned once.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Auth token database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_tokens")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the token
    pub user_id: i64,
    /// Hex SHA-256 of the raw token
    #[sea_orm(unique)]
    pub token_hash: String,
    /// Tokens past this instant are rejected
    pub expires_at: DateTimeUtc,
    /// When the token was issued
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `AuthToken` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each token belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
