//! Reference data: expense categories, crops and livestock types.

use crate::{
    entities::{
        Crop, ExpenseCategory, LivestockType, Season, crop, expense_category, livestock_type,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CropInput {
    pub name: String,
    #[serde(default)]
    pub variety: String,
    pub season: Season,
}

pub async fn list_expense_categories(db: &DatabaseConnection) -> Result<Vec<expense_category::Model>> {
    ExpenseCategory::find()
        .order_by_asc(expense_category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn create_expense_category(
    db: &DatabaseConnection,
    input: CategoryInput,
) -> Result<expense_category::Model> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("Category name cannot be empty"));
    }
    if ExpenseCategory::find()
        .filter(expense_category::Column::Name.eq(&name))
        .one(db)
        .await?
        .is_some()
    {
        return Err(Error::conflict(format!("Category '{name}' already exists")));
    }

    expense_category::ActiveModel {
        name: Set(name),
        description: Set(input.description.trim().to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

pub async fn list_crops(db: &DatabaseConnection) -> Result<Vec<crop::Model>> {
    Crop::find()
        .order_by_asc(crop::Column::Name)
        .order_by_asc(crop::Column::Variety)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Adds a crop. The same name and variety cannot be added twice.
pub async fn create_crop(db: &DatabaseConnection, input: CropInput) -> Result<crop::Model> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("Crop name cannot be empty"));
    }
    let variety = input.variety.trim().to_string();
    if Crop::find()
        .filter(crop::Column::Name.eq(&name))
        .filter(crop::Column::Variety.eq(&variety))
        .one(db)
        .await?
        .is_some()
    {
        return Err(Error::conflict(format!("Crop '{name}' already exists")));
    }

    crop::ActiveModel {
        name: Set(name),
        variety: Set(variety),
        season: Set(input.season),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

pub async fn list_livestock_types(db: &DatabaseConnection) -> Result<Vec<livestock_type::Model>> {
    LivestockType::find()
        .order_by_asc(livestock_type::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
