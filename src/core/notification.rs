//! In-app notifications for order events.

use crate::{
    entities::{Notification, NotificationKind, notification},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set, prelude::*, sea_query::Expr};

/// Queues a notification. Generic over the connection so checkout can notify
/// inside its transaction.
pub async fn notify<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    order_id: Option<i64>,
) -> Result<notification::Model> {
    notification::ActiveModel {
        user_id: Set(user_id),
        kind: Set(kind),
        title: Set(title.into()),
        message: Set(message.into()),
        order_id: Set(order_id),
        is_read: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Newest first.
pub async fn list_notifications(db: &DatabaseConnection, user_id: i64) -> Result<Vec<notification::Model>> {
    Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn unread_count(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(db)
        .await
        .map_err(Into::into)
}

pub async fn mark_read(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<notification::Model> {
    let found = Notification::find_by_id(id)
        .filter(notification::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Notification", id))?;
    if found.is_read {
        return Ok(found);
    }
    let mut active: notification::ActiveModel = found.into();
    active.is_read = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Marks everything read; returns how many changed.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_mark_read_flow() -> Result<()> {
        let db = setup_test_db().await?;
        let buyer = create_test_buyer(&db, "bhavya").await?;
        let other = create_test_buyer(&db, "kiran").await?;
        let first = notify(&db, buyer.id, NotificationKind::Order, "Order placed", "KS-1", None).await?;
        notify(&db, buyer.id, NotificationKind::System, "Welcome", "Hello", None).await?;

        let listed = list_notifications(&db, buyer.id).await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "Welcome");
        assert_eq!(unread_count(&db, buyer.id).await?, 2);

        assert!(matches!(
            mark_read(&db, other.id, first.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(mark_read(&db, buyer.id, first.id).await?.is_read);
        assert_eq!(mark_all_read(&db, buyer.id).await?, 1);
        assert_eq!(unread_count(&db, buyer.id).await?, 0);
        Ok(())
    }
}
