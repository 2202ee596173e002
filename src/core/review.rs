//! Product reviews. One review per user and product; the product's rating
//! and review count are recomputed on every new review.

use crate::{
    core::{catalog, notification::notify},
    entities::{NotificationKind, Product, Review, User, product, review, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub product_id: i64,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: review::Model,
    pub reviewer_name: String,
}

/// Mean rating to one decimal place, 0 for no ratings.
#[must_use]
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / ratings.len() as f64;
    (mean * 10.0).round() / 10.0
}

pub async fn list_reviews(db: &DatabaseConnection, product_id: Option<i64>) -> Result<Vec<ReviewView>> {
    let mut query = Review::find();
    if let Some(product_id) = product_id {
        query = query.filter(review::Column::ProductId.eq(product_id));
    }
    let reviews = query
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .all(db)
        .await?;

    let user_ids: Vec<i64> = reviews.iter().map(|r| r.user_id).collect();
    let names: HashMap<i64, String> = User::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name()))
        .collect();

    Ok(reviews
        .into_iter()
        .map(|review| ReviewView {
            reviewer_name: names.get(&review.user_id).cloned().unwrap_or_default(),
            review,
        })
        .collect())
}

pub async fn create_review(db: &DatabaseConnection, reviewer: &user::Model, input: ReviewInput) -> Result<ReviewView> {
    if !(1..=5).contains(&input.rating) {
        return Err(Error::validation("Rating must be between 1 and 5."));
    }
    let product = catalog::find_product(db, input.product_id).await?;
    if product.farmer_id == reviewer.id {
        return Err(Error::forbidden("You cannot review your own product."));
    }

    let already = Review::find()
        .filter(review::Column::ProductId.eq(product.id))
        .filter(review::Column::UserId.eq(reviewer.id))
        .one(db)
        .await?;
    if already.is_some() {
        return Err(Error::conflict("You have already reviewed this product."));
    }

    let txn = db.begin().await?;
    let created = review::ActiveModel {
        product_id: Set(product.id),
        user_id: Set(reviewer.id),
        rating: Set(input.rating),
        comment: Set(input.comment.trim().to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let ratings: Vec<i32> = Review::find()
        .filter(review::Column::ProductId.eq(product.id))
        .all(&txn)
        .await?
        .iter()
        .map(|r| r.rating)
        .collect();
    let farmer_id = product.farmer_id;
    let product_name = product.name.clone();
    let mut active: product::ActiveModel = product.into();
    active.rating = Set(average_rating(&ratings));
    active.review_count = Set(i32::try_from(ratings.len()).unwrap_or(i32::MAX));
    active.update(&txn).await?;

    notify(
        &txn,
        farmer_id,
        NotificationKind::Review,
        "New review",
        format!("{} rated {} {} out of 5.", reviewer.display_name(), product_name, input.rating),
        None,
    )
    .await?;
    txn.commit().await?;

    Ok(ReviewView {
        review: created,
        reviewer_name: reviewer.display_name(),
    })
}

/// Reviews of one product; fails for unknown products.
pub async fn product_reviews(db: &DatabaseConnection, product_id: i64) -> Result<Vec<ReviewView>> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;
    list_reviews(db, Some(product_id)).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[5, 4]), 4.5);
        assert_eq!(average_rating(&[5, 4, 4]), 4.3);
    }

    #[tokio::test]
    async fn test_one_review_per_user_and_rating_recomputed() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let first = create_test_buyer(&db, "bhavya").await?;
        let second = create_test_buyer(&db, "kiran").await?;
        let tomato = create_test_product(&db, farmer.id, "Tomato", 20.0, 10.0).await?;

        let input = |rating| ReviewInput {
            product_id: tomato.id,
            rating,
            comment: "fresh".to_string(),
        };
        assert!(matches!(
            create_review(&db, &first, input(6)).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            create_review(&db, &farmer, input(5)).await,
            Err(Error::Forbidden { .. })
        ));

        create_review(&db, &first, input(5)).await?;
        assert!(matches!(
            create_review(&db, &first, input(3)).await,
            Err(Error::Conflict { .. })
        ));
        create_review(&db, &second, input(2)).await?;

        let product = catalog::find_product(&db, tomato.id).await?;
        assert_eq!(product.rating, 3.5);
        assert_eq!(product.review_count, 2);

        let reviews = product_reviews(&db, tomato.id).await?;
        assert_eq!(reviews.len(), 2);
        assert_eq!(list_reviews(&db, None).await?.len(), 2);
        Ok(())
    }
}
