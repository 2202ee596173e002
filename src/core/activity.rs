//! Activity log - An append-only trail of notable user actions shown on the
//! admin dashboard.

use crate::{
    entities::{ActivityLog, activity_log},
    errors::Result,
};
use sea_orm::{ConnectionTrait, QueryOrder, QuerySelect, Set, prelude::*};

pub const SIGNUP: &str = "signup";
pub const LOGIN: &str = "login";
pub const RECORD_DELETED: &str = "record_deleted";
pub const RECORD_RESTORED: &str = "record_restored";
pub const ORDER_PLACED: &str = "order_placed";
pub const ORDER_CANCELLED: &str = "order_cancelled";
pub const USER_DEACTIVATED: &str = "user_deactivated";

/// Appends an entry. Generic over the connection so it can join a caller's
/// transaction.
pub async fn record<C>(db: &C, user_id: i64, action: &str, detail: impl Into<String>) -> Result<()>
where
    C: ConnectionTrait,
{
    activity_log::ActiveModel {
        user_id: Set(user_id),
        action: Set(action.to_string()),
        detail: Set(detail.into()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Most recent entries first.
pub async fn recent(db: &DatabaseConnection, limit: u64) -> Result<Vec<activity_log::Model>> {
    ActivityLog::find()
        .order_by_desc(activity_log::Column::CreatedAt)
        .order_by_desc(activity_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() -> Result<()> {
        let db = setup_test_db().await?;
        record(&db, 1, LOGIN, "first").await?;
        record(&db, 1, RECORD_DELETED, "second").await?;
        record(&db, 2, LOGIN, "third").await?;

        let entries = recent(&db, 2).await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].detail, "third");
        assert_eq!(entries[1].action, RECORD_DELETED);
        Ok(())
    }
}
