//! Wishlist - Products a user wants to come back to.

use crate::{
    core::catalog,
    entities::{Product, WishlistItem, product, wishlist_item},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WishlistEntry {
    #[serde(flatten)]
    pub item: wishlist_item::Model,
    pub product: Option<product::Model>,
}

pub async fn list_wishlist(db: &DatabaseConnection, user_id: i64) -> Result<Vec<WishlistEntry>> {
    let rows = WishlistItem::find()
        .find_also_related(Product)
        .filter(wishlist_item::Column::UserId.eq(user_id))
        .order_by_desc(wishlist_item::Column::CreatedAt)
        .order_by_desc(wishlist_item::Column::Id)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(item, product)| WishlistEntry {
            item,
            product: product.filter(|p| p.deleted_at.is_none()),
        })
        .collect())
}

/// Adds a product; adding it twice returns the existing entry.
pub async fn add_to_wishlist(db: &DatabaseConnection, user_id: i64, product_id: i64) -> Result<wishlist_item::Model> {
    catalog::find_product(db, product_id).await?;

    let existing = WishlistItem::find()
        .filter(wishlist_item::Column::UserId.eq(user_id))
        .filter(wishlist_item::Column::ProductId.eq(product_id))
        .one(db)
        .await?;
    if let Some(item) = existing {
        return Ok(item);
    }

    wishlist_item::ActiveModel {
        user_id: Set(user_id),
        product_id: Set(product_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Removes one of the user's wishlist entries by its own id.
pub async fn remove_from_wishlist(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<()> {
    let result = WishlistItem::delete_many()
        .filter(wishlist_item::Column::Id.eq(id))
        .filter(wishlist_item::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Wishlist item", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_add_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let buyer = create_test_buyer(&db, "bhavya").await?;
        let tomato = create_test_product(&db, farmer.id, "Tomato", 20.0, 10.0).await?;

        let first = add_to_wishlist(&db, buyer.id, tomato.id).await?;
        let second = add_to_wishlist(&db, buyer.id, tomato.id).await?;
        assert_eq!(first.id, second.id);

        let listed = list_wishlist(&db, buyer.id).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product.as_ref().map(|p| p.id), Some(tomato.id));

        assert!(matches!(
            add_to_wishlist(&db, buyer.id, 999).await,
            Err(Error::NotFound { .. })
        ));

        let stranger = create_test_buyer(&db, "kavya").await?;
        assert!(matches!(
            remove_from_wishlist(&db, stranger.id, first.id).await,
            Err(Error::NotFound { .. })
        ));
        remove_from_wishlist(&db, buyer.id, first.id).await?;
        assert!(matches!(
            remove_from_wishlist(&db, buyer.id, first.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(list_wishlist(&db, buyer.id).await?.is_empty());
        Ok(())
    }
}
