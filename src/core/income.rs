//! Income business logic - Produce sales with the same soft-delete rules as
//! expenses. `total_amount` is always derived from quantity and rate.

use crate::{
    core::{
        activity,
        records::{self, RecordFilter, RecordSummary},
        round_money,
    },
    entities::{Crop, Income, IncomePaymentStatus, crop, income},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Units a sale can be measured in.
pub const UNITS: [&str; 5] = ["kg", "quintal", "ton", "bag", "piece"];

#[derive(Debug, Clone, Deserialize)]
pub struct IncomeInput {
    #[serde(alias = "crop")]
    pub crop_id: i64,
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub rate_per_unit: f64,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub buyer_contact: String,
    pub sale_date: NaiveDate,
    pub payment_status: Option<IncomePaymentStatus>,
    #[serde(default)]
    pub notes: String,
}

fn default_unit() -> String {
    "kg".to_string()
}

/// An income record with a readable crop label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeView {
    #[serde(flatten)]
    pub income: income::Model,
    pub crop_name: String,
}

impl IncomeView {
    fn from_pair(pair: (income::Model, Option<crop::Model>)) -> Self {
        let (income, crop) = pair;
        Self {
            income,
            crop_name: crop.map(|c| c.label()).unwrap_or_default(),
        }
    }
}

/// quantity x rate, rounded to paise.
#[must_use]
pub fn total_amount(quantity: f64, rate_per_unit: f64) -> f64 {
    round_money(quantity * rate_per_unit)
}

fn validate(input: &IncomeInput) -> Result<()> {
    if !input.quantity.is_finite() || input.quantity <= 0.0 {
        return Err(Error::validation("Quantity must be greater than zero"));
    }
    if !input.rate_per_unit.is_finite() || input.rate_per_unit < 0.0 {
        return Err(Error::InvalidAmount {
            amount: input.rate_per_unit,
        });
    }
    if !UNITS.contains(&input.unit.as_str()) {
        return Err(Error::validation(format!(
            "Unit must be one of: {}",
            UNITS.join(", ")
        )));
    }
    Ok(())
}

async fn crop_label(db: &DatabaseConnection, crop_id: i64) -> Result<String> {
    Crop::find_by_id(crop_id)
        .one(db)
        .await?
        .map(|c| c.label())
        .ok_or_else(|| Error::not_found("Crop", crop_id))
}

async fn find_owned(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<income::Model> {
    Income::find_by_id(id)
        .filter(income::Column::FarmerId.eq(farmer_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Income", id))
}

async fn with_crop(db: &DatabaseConnection, income: income::Model) -> Result<IncomeView> {
    let crop_name = crop_label(db, income.crop_id).await?;
    Ok(IncomeView { income, crop_name })
}

/// Active income records of a farmer, newest sale first.
pub async fn list_income(
    db: &DatabaseConnection,
    farmer_id: i64,
    filter: &RecordFilter,
) -> Result<Vec<IncomeView>> {
    let mut query = Income::find()
        .find_also_related(Crop)
        .filter(income::Column::FarmerId.eq(farmer_id))
        .filter(income::Column::DeletedAt.is_null());

    if let Some(crop_id) = filter.category {
        query = query.filter(income::Column::CropId.eq(crop_id));
    }
    if let Some(start) = filter.start_date {
        query = query.filter(income::Column::SaleDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(income::Column::SaleDate.lte(end));
    }
    if let Some(term) = filter.search_term() {
        query = query.filter(
            Condition::any()
                .add(income::Column::Notes.contains(term))
                .add(income::Column::BuyerName.contains(term))
                .add(crop::Column::Name.contains(term)),
        );
    }

    let rows = query
        .order_by_desc(income::Column::SaleDate)
        .order_by_desc(income::Column::CreatedAt)
        .order_by_desc(income::Column::Id)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(IncomeView::from_pair).collect())
}

pub async fn create_income(
    db: &DatabaseConnection,
    farmer_id: i64,
    input: IncomeInput,
) -> Result<IncomeView> {
    validate(&input)?;
    let crop_name = crop_label(db, input.crop_id).await?;

    let now = Utc::now();
    let income = income::ActiveModel {
        farmer_id: Set(farmer_id),
        crop_id: Set(input.crop_id),
        quantity: Set(input.quantity),
        unit: Set(input.unit),
        rate_per_unit: Set(input.rate_per_unit),
        total_amount: Set(total_amount(input.quantity, input.rate_per_unit)),
        buyer_name: Set(input.buyer_name.trim().to_string()),
        buyer_contact: Set(input.buyer_contact.trim().to_string()),
        sale_date: Set(input.sale_date),
        payment_status: Set(input.payment_status.unwrap_or(IncomePaymentStatus::Pending)),
        notes: Set(input.notes.trim().to_string()),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(IncomeView { income, crop_name })
}

pub async fn get_income(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<IncomeView> {
    let income = find_owned(db, farmer_id, id).await?;
    with_crop(db, income).await
}

pub async fn update_income(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
    input: IncomeInput,
) -> Result<IncomeView> {
    let existing = find_owned(db, farmer_id, id).await?;
    records::ensure_active(existing.deleted_at, "income record")?;
    validate(&input)?;
    crop_label(db, input.crop_id).await?;

    let payment_status = input.payment_status.unwrap_or(existing.payment_status);
    let mut active: income::ActiveModel = existing.into();
    active.crop_id = Set(input.crop_id);
    active.quantity = Set(input.quantity);
    active.unit = Set(input.unit);
    active.rate_per_unit = Set(input.rate_per_unit);
    active.total_amount = Set(total_amount(input.quantity, input.rate_per_unit));
    active.buyer_name = Set(input.buyer_name.trim().to_string());
    active.buyer_contact = Set(input.buyer_contact.trim().to_string());
    active.sale_date = Set(input.sale_date);
    active.payment_status = Set(payment_status);
    active.notes = Set(input.notes.trim().to_string());
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    with_crop(db, updated).await
}

pub async fn delete_income(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<IncomeView> {
    let existing = find_owned(db, farmer_id, id).await?;
    records::ensure_can_delete(existing.deleted_at, "income record")?;

    let now = Utc::now();
    let txn = db.begin().await?;
    let mut active: income::ActiveModel = existing.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    let deleted = active.update(&txn).await?;
    activity::record(
        &txn,
        farmer_id,
        activity::RECORD_DELETED,
        format!(
            "Income #{} of {:.2} moved to history",
            deleted.id, deleted.total_amount
        ),
    )
    .await?;
    txn.commit().await?;

    info!("Farmer {} deleted income {}", farmer_id, id);
    with_crop(db, deleted).await
}

pub async fn restore_income(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<IncomeView> {
    let existing = find_owned(db, farmer_id, id).await?;
    records::ensure_can_restore(existing.deleted_at, "income record")?;

    let txn = db.begin().await?;
    let mut active: income::ActiveModel = existing.into();
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now());
    let restored = active.update(&txn).await?;
    activity::record(
        &txn,
        farmer_id,
        activity::RECORD_RESTORED,
        format!("Income #{} restored", restored.id),
    )
    .await?;
    txn.commit().await?;

    info!("Farmer {} restored income {}", farmer_id, id);
    with_crop(db, restored).await
}

/// Deleted income records, most recently deleted first.
pub async fn income_history(db: &DatabaseConnection, farmer_id: i64) -> Result<Vec<IncomeView>> {
    let rows = Income::find()
        .find_also_related(Crop)
        .filter(income::Column::FarmerId.eq(farmer_id))
        .filter(income::Column::DeletedAt.is_not_null())
        .order_by_desc(income::Column::DeletedAt)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(IncomeView::from_pair).collect())
}

pub async fn income_summary(db: &DatabaseConnection, farmer_id: i64) -> Result<RecordSummary> {
    let all = Income::find()
        .filter(income::Column::FarmerId.eq(farmer_id))
        .all(db)
        .await?;

    let (active, deleted): (Vec<_>, Vec<_>) = all.iter().partition(|i| !i.is_deleted());
    Ok(RecordSummary {
        active_count: active.len() as u64,
        deleted_count: deleted.len() as u64,
        active_total: round_money(active.iter().map(|i| i.total_amount).sum()),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn sale(crop_id: i64, quantity: f64, rate: f64, date: &str) -> IncomeInput {
        IncomeInput {
            crop_id,
            quantity,
            unit: "quintal".to_string(),
            rate_per_unit: rate,
            buyer_name: "APMC Mandya".to_string(),
            buyer_contact: String::new(),
            sale_date: date.parse().unwrap(),
            payment_status: None,
            notes: String::new(),
        }
    }

    #[test]
    fn test_total_amount_rounds_to_paise() {
        assert_eq!(total_amount(12.5, 2150.0), 26875.0);
        assert_eq!(total_amount(3.333, 10.0), 33.33);
    }

    #[tokio::test]
    async fn test_create_income_derives_total() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let rice = create_test_crop(&db, "Rice").await?;

        let created = create_income(&db, farmer.id, sale(rice.id, 10.0, 2300.0, "2026-11-02")).await?;
        assert_eq!(created.income.total_amount, 23000.0);
        assert_eq!(created.income.payment_status, IncomePaymentStatus::Pending);
        assert!(created.crop_name.starts_with("Rice"));

        let mut bad_unit = sale(rice.id, 1.0, 1.0, "2026-11-02");
        bad_unit.unit = "sack".to_string();
        assert!(matches!(
            create_income(&db, farmer.id, bad_unit).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            create_income(&db, farmer.id, sale(rice.id, 0.0, 1.0, "2026-11-02")).await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_income_soft_delete_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let rice = create_test_crop(&db, "Rice").await?;
        let kept = create_income(&db, farmer.id, sale(rice.id, 2.0, 100.0, "2026-11-01")).await?;
        let gone = create_income(&db, farmer.id, sale(rice.id, 5.0, 100.0, "2026-11-02")).await?;

        delete_income(&db, farmer.id, gone.income.id).await?;
        let summary = income_summary(&db, farmer.id).await?;
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.active_total, kept.income.total_amount);

        assert!(matches!(
            delete_income(&db, farmer.id, gone.income.id).await,
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(income_history(&db, farmer.id).await?.len(), 1);

        restore_income(&db, farmer.id, gone.income.id).await?;
        assert_eq!(list_income(&db, farmer.id, &RecordFilter::default()).await?.len(), 2);
        assert!(income_history(&db, farmer.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_recomputes_total_and_keeps_status() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let rice = create_test_crop(&db, "Rice").await?;
        let mut first = sale(rice.id, 2.0, 100.0, "2026-11-01");
        first.payment_status = Some(IncomePaymentStatus::Completed);
        let created = create_income(&db, farmer.id, first).await?;

        let updated = update_income(
            &db,
            farmer.id,
            created.income.id,
            sale(rice.id, 4.0, 150.0, "2026-11-03"),
        )
        .await?;
        assert_eq!(updated.income.total_amount, 600.0);
        assert_eq!(updated.income.payment_status, IncomePaymentStatus::Completed);
        Ok(())
    }
}
