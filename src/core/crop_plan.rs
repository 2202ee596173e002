//! Crop plans - What a farmer intends to plant, where and when.

use crate::{
    entities::{Crop, CropPlan, CropPlanStatus, crop, crop_plan},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};

pub const AREA_UNITS: [&str; 3] = ["acre", "hectare", "guntha"];

#[derive(Debug, Clone, Deserialize)]
pub struct CropPlanInput {
    #[serde(alias = "crop")]
    pub crop_id: i64,
    pub planned_area: f64,
    #[serde(default = "default_area_unit")]
    pub area_unit: String,
    pub planting_date: NaiveDate,
    pub expected_harvest_date: NaiveDate,
    pub estimated_yield: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub estimated_revenue: Option<f64>,
    pub status: Option<CropPlanStatus>,
    #[serde(default)]
    pub notes: String,
}

fn default_area_unit() -> String {
    "acre".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropPlanView {
    #[serde(flatten)]
    pub plan: crop_plan::Model,
    pub crop_name: String,
    pub estimated_profit: Option<f64>,
}

impl CropPlanView {
    fn new(plan: crop_plan::Model, crop: Option<crop::Model>) -> Self {
        Self {
            estimated_profit: plan.estimated_profit(),
            crop_name: crop.map(|c| c.label()).unwrap_or_default(),
            plan,
        }
    }
}

fn validate(input: &CropPlanInput) -> Result<()> {
    if !input.planned_area.is_finite() || input.planned_area <= 0.0 {
        return Err(Error::validation("Planned area must be greater than zero"));
    }
    if !AREA_UNITS.contains(&input.area_unit.as_str()) {
        return Err(Error::validation(format!(
            "Area unit must be one of: {}",
            AREA_UNITS.join(", ")
        )));
    }
    if input.expected_harvest_date <= input.planting_date {
        return Err(Error::validation(
            "Expected harvest date must be after the planting date",
        ));
    }
    for value in [input.estimated_yield, input.estimated_cost, input.estimated_revenue]
        .into_iter()
        .flatten()
    {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidAmount { amount: value });
        }
    }
    Ok(())
}

async fn load_crop(db: &DatabaseConnection, crop_id: i64) -> Result<crop::Model> {
    Crop::find_by_id(crop_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Crop", crop_id))
}

async fn find_owned(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<crop_plan::Model> {
    CropPlan::find_by_id(id)
        .filter(crop_plan::Column::FarmerId.eq(farmer_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Crop plan", id))
}

pub async fn list_crop_plans(db: &DatabaseConnection, farmer_id: i64) -> Result<Vec<CropPlanView>> {
    let rows = CropPlan::find()
        .find_also_related(Crop)
        .filter(crop_plan::Column::FarmerId.eq(farmer_id))
        .order_by_desc(crop_plan::Column::PlantingDate)
        .order_by_desc(crop_plan::Column::Id)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(plan, crop)| CropPlanView::new(plan, crop))
        .collect())
}

pub async fn create_crop_plan(
    db: &DatabaseConnection,
    farmer_id: i64,
    input: CropPlanInput,
) -> Result<CropPlanView> {
    validate(&input)?;
    let crop = load_crop(db, input.crop_id).await?;

    let now = Utc::now();
    let plan = crop_plan::ActiveModel {
        farmer_id: Set(farmer_id),
        crop_id: Set(input.crop_id),
        planned_area: Set(input.planned_area),
        area_unit: Set(input.area_unit),
        planting_date: Set(input.planting_date),
        expected_harvest_date: Set(input.expected_harvest_date),
        estimated_yield: Set(input.estimated_yield),
        estimated_cost: Set(input.estimated_cost),
        estimated_revenue: Set(input.estimated_revenue),
        status: Set(input.status.unwrap_or(CropPlanStatus::Planned)),
        notes: Set(input.notes.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(CropPlanView::new(plan, Some(crop)))
}

pub async fn get_crop_plan(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<CropPlanView> {
    let plan = find_owned(db, farmer_id, id).await?;
    let crop = Crop::find_by_id(plan.crop_id).one(db).await?;
    Ok(CropPlanView::new(plan, crop))
}

pub async fn update_crop_plan(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
    input: CropPlanInput,
) -> Result<CropPlanView> {
    let existing = find_owned(db, farmer_id, id).await?;
    validate(&input)?;
    let crop = load_crop(db, input.crop_id).await?;

    let status = input.status.unwrap_or(existing.status);
    let mut active: crop_plan::ActiveModel = existing.into();
    active.crop_id = Set(input.crop_id);
    active.planned_area = Set(input.planned_area);
    active.area_unit = Set(input.area_unit);
    active.planting_date = Set(input.planting_date);
    active.expected_harvest_date = Set(input.expected_harvest_date);
    active.estimated_yield = Set(input.estimated_yield);
    active.estimated_cost = Set(input.estimated_cost);
    active.estimated_revenue = Set(input.estimated_revenue);
    active.status = Set(status);
    active.notes = Set(input.notes.trim().to_string());
    active.updated_at = Set(Utc::now());
    let plan = active.update(db).await?;

    Ok(CropPlanView::new(plan, Some(crop)))
}

pub async fn delete_crop_plan(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<()> {
    let plan = find_owned(db, farmer_id, id).await?;
    plan.delete(db).await?;
    Ok(())
}
