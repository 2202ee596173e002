//! Saved delivery addresses. A user has at most one default address, and
//! deleting an address only hides it.

use crate::{
    entities::{DeliveryAddress, delivery_address},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub label: String,
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

fn validate(input: &AddressInput) -> Result<()> {
    for (field, value) in [
        ("full_name", &input.full_name),
        ("phone", &input.phone),
        ("address_line", &input.address_line),
        ("city", &input.city),
    ] {
        if value.trim().is_empty() {
            return Err(Error::validation(format!("{field} is required.")));
        }
    }
    let pincode = input.pincode.trim();
    if pincode.len() != 6 || !pincode.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation("Pincode must be 6 digits."));
    }
    Ok(())
}

async fn clear_default<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<()> {
    DeliveryAddress::update_many()
        .col_expr(delivery_address::Column::IsDefault, Expr::value(false))
        .filter(delivery_address::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Active addresses, default first.
pub async fn list_addresses(db: &DatabaseConnection, user_id: i64) -> Result<Vec<delivery_address::Model>> {
    DeliveryAddress::find()
        .filter(delivery_address::Column::UserId.eq(user_id))
        .filter(delivery_address::Column::IsActive.eq(true))
        .order_by_desc(delivery_address::Column::IsDefault)
        .order_by_desc(delivery_address::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_address(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<delivery_address::Model> {
    DeliveryAddress::find_by_id(id)
        .filter(delivery_address::Column::UserId.eq(user_id))
        .filter(delivery_address::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Delivery address", id))
}

pub async fn create_address(
    db: &DatabaseConnection,
    user_id: i64,
    input: AddressInput,
) -> Result<delivery_address::Model> {
    validate(&input)?;
    let txn = db.begin().await?;
    if input.is_default {
        clear_default(&txn, user_id).await?;
    }
    let created = delivery_address::ActiveModel {
        user_id: Set(user_id),
        label: Set(input.label.trim().to_string()),
        full_name: Set(input.full_name.trim().to_string()),
        phone: Set(input.phone.trim().to_string()),
        address_line: Set(input.address_line.trim().to_string()),
        city: Set(input.city.trim().to_string()),
        state: Set(input.state.trim().to_string()),
        pincode: Set(input.pincode.trim().to_string()),
        is_default: Set(input.is_default),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    Ok(created)
}

pub async fn update_address(
    db: &DatabaseConnection,
    user_id: i64,
    id: i64,
    input: AddressInput,
) -> Result<delivery_address::Model> {
    let existing = get_address(db, user_id, id).await?;
    validate(&input)?;

    let txn = db.begin().await?;
    if input.is_default {
        clear_default(&txn, user_id).await?;
    }
    let mut active: delivery_address::ActiveModel = existing.into();
    active.label = Set(input.label.trim().to_string());
    active.full_name = Set(input.full_name.trim().to_string());
    active.phone = Set(input.phone.trim().to_string());
    active.address_line = Set(input.address_line.trim().to_string());
    active.city = Set(input.city.trim().to_string());
    active.state = Set(input.state.trim().to_string());
    active.pincode = Set(input.pincode.trim().to_string());
    active.is_default = Set(input.is_default);
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Hides the address. It stops being the default.
pub async fn delete_address(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<()> {
    let existing = get_address(db, user_id, id).await?;
    let mut active: delivery_address::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.is_default = Set(false);
    active.update(db).await?;
    Ok(())
}
