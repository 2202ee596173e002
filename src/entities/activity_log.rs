//! Activity log entity - Audit trail shown on the admin dashboard.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_logs")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who performed the action
    pub user_id: i64,
    /// Short action key, e.g. `"login"` or `"expense_deleted"`
    pub action: String,
    /// Free-form detail
    pub detail: String,
    /// When the action happened
    pub created_at: DateTimeUtc,
}

/// `ActivityLog` has no navigable relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
