//! Livestock register. Tag numbers are unique per farmer.

use crate::{
    entities::{HealthStatus, Livestock, LivestockType, livestock, livestock_type},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct LivestockInput {
    #[serde(alias = "livestock_type")]
    pub livestock_type_id: i64,
    pub tag_number: String,
    #[serde(default)]
    pub breed: String,
    pub age_months: Option<i32>,
    pub weight: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<f64>,
    pub health_status: Option<HealthStatus>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivestockView {
    #[serde(flatten)]
    pub animal: livestock::Model,
    pub livestock_type_name: String,
}

impl LivestockView {
    fn new(animal: livestock::Model, kind: Option<livestock_type::Model>) -> Self {
        Self {
            animal,
            livestock_type_name: kind.map(|k| k.name).unwrap_or_default(),
        }
    }
}

fn validate(input: &LivestockInput) -> Result<String> {
    let tag = input.tag_number.trim().to_string();
    if tag.is_empty() {
        return Err(Error::validation("Tag number is required"));
    }
    if input.age_months.is_some_and(|age| age < 0) {
        return Err(Error::validation("Age cannot be negative"));
    }
    for value in [input.weight, input.purchase_price].into_iter().flatten() {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidAmount { amount: value });
        }
    }
    Ok(tag)
}

async fn load_type(db: &DatabaseConnection, id: i64) -> Result<livestock_type::Model> {
    LivestockType::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Livestock type", id))
}

async fn ensure_tag_free(
    db: &DatabaseConnection,
    farmer_id: i64,
    tag: &str,
    except: Option<i64>,
) -> Result<()> {
    let mut query = Livestock::find()
        .filter(livestock::Column::FarmerId.eq(farmer_id))
        .filter(livestock::Column::TagNumber.eq(tag));
    if let Some(id) = except {
        query = query.filter(livestock::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!(
            "An animal with tag '{tag}' is already registered"
        )));
    }
    Ok(())
}

async fn find_owned(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<livestock::Model> {
    Livestock::find_by_id(id)
        .filter(livestock::Column::FarmerId.eq(farmer_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Livestock", id))
}

pub async fn list_livestock(db: &DatabaseConnection, farmer_id: i64) -> Result<Vec<LivestockView>> {
    let rows = Livestock::find()
        .find_also_related(LivestockType)
        .filter(livestock::Column::FarmerId.eq(farmer_id))
        .order_by_asc(livestock::Column::TagNumber)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(animal, kind)| LivestockView::new(animal, kind))
        .collect())
}

pub async fn create_livestock(
    db: &DatabaseConnection,
    farmer_id: i64,
    input: LivestockInput,
) -> Result<LivestockView> {
    let tag = validate(&input)?;
    let kind = load_type(db, input.livestock_type_id).await?;
    ensure_tag_free(db, farmer_id, &tag, None).await?;

    let now = Utc::now();
    let animal = livestock::ActiveModel {
        farmer_id: Set(farmer_id),
        livestock_type_id: Set(input.livestock_type_id),
        tag_number: Set(tag),
        breed: Set(input.breed.trim().to_string()),
        age_months: Set(input.age_months),
        weight: Set(input.weight),
        purchase_date: Set(input.purchase_date),
        purchase_price: Set(input.purchase_price),
        health_status: Set(input.health_status.unwrap_or(HealthStatus::Healthy)),
        notes: Set(input.notes.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(LivestockView::new(animal, Some(kind)))
}

pub async fn get_livestock(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<LivestockView> {
    let animal = find_owned(db, farmer_id, id).await?;
    let kind = LivestockType::find_by_id(animal.livestock_type_id).one(db).await?;
    Ok(LivestockView::new(animal, kind))
}

pub async fn update_livestock(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
    input: LivestockInput,
) -> Result<LivestockView> {
    let existing = find_owned(db, farmer_id, id).await?;
    let tag = validate(&input)?;
    let kind = load_type(db, input.livestock_type_id).await?;
    ensure_tag_free(db, farmer_id, &tag, Some(id)).await?;

    let health_status = input.health_status.unwrap_or(existing.health_status);
    let mut active: livestock::ActiveModel = existing.into();
    active.livestock_type_id = Set(input.livestock_type_id);
    active.tag_number = Set(tag);
    active.breed = Set(input.breed.trim().to_string());
    active.age_months = Set(input.age_months);
    active.weight = Set(input.weight);
    active.purchase_date = Set(input.purchase_date);
    active.purchase_price = Set(input.purchase_price);
    active.health_status = Set(health_status);
    active.notes = Set(input.notes.trim().to_string());
    active.updated_at = Set(Utc::now());
    let animal = active.update(db).await?;

    Ok(LivestockView::new(animal, Some(kind)))
}

pub async fn delete_livestock(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<()> {
    find_owned(db, farmer_id, id).await?.delete(db).await?;
    Ok(())
}
