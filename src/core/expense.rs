//! Expense business logic - Recording, correcting, soft-deleting and
//! restoring what a farmer spends.
//!
//! Every function is scoped to the calling farmer: a record owned by somebody
//! else is reported as not found. Active listings, summaries and everything
//! downstream (dashboard, charts, exports) only see records whose
//! `deleted_at` is empty.

use crate::{
    core::{
        activity,
        records::{self, RecordFilter, RecordSummary},
        round_money,
    },
    entities::{Expense, ExpenseCategory, expense, expense_category},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Smallest amount an expense may carry.
pub const MIN_AMOUNT: f64 = 0.01;

/// Fields a farmer supplies when creating or editing an expense.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    #[serde(alias = "category")]
    pub category_id: i64,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

/// An expense together with its category name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseView {
    #[serde(flatten)]
    pub expense: expense::Model,
    pub category_name: String,
}

impl ExpenseView {
    fn from_pair(pair: (expense::Model, Option<expense_category::Model>)) -> Self {
        let (expense, category) = pair;
        Self {
            expense,
            category_name: category.map(|c| c.name).unwrap_or_default(),
        }
    }
}

fn validate(input: &ExpenseInput) -> Result<()> {
    if !input.amount.is_finite() || input.amount < MIN_AMOUNT {
        return Err(Error::InvalidAmount {
            amount: input.amount,
        });
    }
    Ok(())
}

async fn category_name(db: &DatabaseConnection, category_id: i64) -> Result<String> {
    ExpenseCategory::find_by_id(category_id)
        .one(db)
        .await?
        .map(|c| c.name)
        .ok_or_else(|| Error::not_found("Expense category", category_id))
}

async fn find_owned(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<expense::Model> {
    Expense::find_by_id(id)
        .filter(expense::Column::FarmerId.eq(farmer_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Expense", id))
}

async fn with_category(db: &DatabaseConnection, expense: expense::Model) -> Result<ExpenseView> {
    let category_name = category_name(db, expense.category_id).await?;
    Ok(ExpenseView {
        expense,
        category_name,
    })
}

/// Active expenses of a farmer, newest first.
pub async fn list_expenses(
    db: &DatabaseConnection,
    farmer_id: i64,
    filter: &RecordFilter,
) -> Result<Vec<ExpenseView>> {
    let mut query = Expense::find()
        .find_also_related(ExpenseCategory)
        .filter(expense::Column::FarmerId.eq(farmer_id))
        .filter(expense::Column::DeletedAt.is_null());

    if let Some(category_id) = filter.category {
        query = query.filter(expense::Column::CategoryId.eq(category_id));
    }
    if let Some(start) = filter.start_date {
        query = query.filter(expense::Column::Date.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(expense::Column::Date.lte(end));
    }
    if let Some(term) = filter.search_term() {
        query = query.filter(
            Condition::any()
                .add(expense::Column::Notes.contains(term))
                .add(expense_category::Column::Name.contains(term)),
        );
    }

    let rows = query
        .order_by_desc(expense::Column::Date)
        .order_by_desc(expense::Column::CreatedAt)
        .order_by_desc(expense::Column::Id)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(ExpenseView::from_pair).collect())
}

/// Records a new expense. New records are always active.
pub async fn create_expense(
    db: &DatabaseConnection,
    farmer_id: i64,
    input: ExpenseInput,
) -> Result<ExpenseView> {
    validate(&input)?;
    let category_name = category_name(db, input.category_id).await?;

    let now = Utc::now();
    let expense = expense::ActiveModel {
        farmer_id: Set(farmer_id),
        category_id: Set(input.category_id),
        amount: Set(round_money(input.amount)),
        date: Set(input.date),
        notes: Set(input.notes.trim().to_string()),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(ExpenseView {
        expense,
        category_name,
    })
}

/// One expense of the farmer, active or deleted.
pub async fn get_expense(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<ExpenseView> {
    let expense = find_owned(db, farmer_id, id).await?;
    with_category(db, expense).await
}

/// Edits an active expense. Deleted expenses must be restored first.
pub async fn update_expense(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
    input: ExpenseInput,
) -> Result<ExpenseView> {
    let existing = find_owned(db, farmer_id, id).await?;
    records::ensure_active(existing.deleted_at, "expense")?;
    validate(&input)?;
    category_name(db, input.category_id).await?;

    let mut active: expense::ActiveModel = existing.into();
    active.category_id = Set(input.category_id);
    active.amount = Set(round_money(input.amount));
    active.date = Set(input.date);
    active.notes = Set(input.notes.trim().to_string());
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    with_category(db, updated).await
}

/// Soft-deletes an expense. Deleting twice is an [`Error::InvalidState`].
pub async fn delete_expense(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<ExpenseView> {
    let existing = find_owned(db, farmer_id, id).await?;
    records::ensure_can_delete(existing.deleted_at, "expense")?;

    let now = Utc::now();
    let txn = db.begin().await?;
    let mut active: expense::ActiveModel = existing.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    let deleted = active.update(&txn).await?;
    activity::record(
        &txn,
        farmer_id,
        activity::RECORD_DELETED,
        format!("Expense #{} of {:.2} moved to history", deleted.id, deleted.amount),
    )
    .await?;
    txn.commit().await?;

    info!("Farmer {} deleted expense {}", farmer_id, id);
    with_category(db, deleted).await
}

/// Brings a deleted expense back. Restoring an active one is an
/// [`Error::InvalidState`].
pub async fn restore_expense(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
) -> Result<ExpenseView> {
    let existing = find_owned(db, farmer_id, id).await?;
    records::ensure_can_restore(existing.deleted_at, "expense")?;

    let txn = db.begin().await?;
    let mut active: expense::ActiveModel = existing.into();
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now());
    let restored = active.update(&txn).await?;
    activity::record(
        &txn,
        farmer_id,
        activity::RECORD_RESTORED,
        format!("Expense #{} restored", restored.id),
    )
    .await?;
    txn.commit().await?;

    info!("Farmer {} restored expense {}", farmer_id, id);
    with_category(db, restored).await
}

/// Deleted expenses, most recently deleted first.
pub async fn expense_history(db: &DatabaseConnection, farmer_id: i64) -> Result<Vec<ExpenseView>> {
    let rows = Expense::find()
        .find_also_related(ExpenseCategory)
        .filter(expense::Column::FarmerId.eq(farmer_id))
        .filter(expense::Column::DeletedAt.is_not_null())
        .order_by_desc(expense::Column::DeletedAt)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(ExpenseView::from_pair).collect())
}

pub async fn expense_summary(db: &DatabaseConnection, farmer_id: i64) -> Result<RecordSummary> {
    let all = Expense::find()
        .filter(expense::Column::FarmerId.eq(farmer_id))
        .all(db)
        .await?;

    let (active, deleted): (Vec<_>, Vec<_>) = all.iter().partition(|e| !e.is_deleted());
    Ok(RecordSummary {
        active_count: active.len() as u64,
        deleted_count: deleted.len() as u64,
        active_total: round_money(active.iter().map(|e| e.amount).sum()),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn input(category_id: i64, amount: f64, date: &str, notes: &str) -> ExpenseInput {
        ExpenseInput {
            category_id,
            amount,
            date: date.parse().unwrap(),
            notes: notes.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_expense_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;

        for bad in [0.0, 0.001, -5.0, f64::NAN, f64::INFINITY] {
            let result = create_expense(&db, farmer.id, input(seeds.id, bad, "2026-03-01", "")).await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }

        let missing_category = create_expense(&db, farmer.id, input(999, 10.0, "2026-03-01", "")).await;
        assert!(matches!(missing_category, Err(Error::NotFound { .. })));

        let ok = create_expense(&db, farmer.id, input(seeds.id, 0.01, "2026-03-01", "")).await?;
        assert_eq!(ok.expense.amount, 0.01);
        assert_eq!(ok.category_name, "Seed");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_restore_cycle() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;
        let created = create_expense(&db, farmer.id, input(seeds.id, 1200.0, "2026-03-01", "paddy seed")).await?;
        let id = created.expense.id;

        let deleted = delete_expense(&db, farmer.id, id).await?;
        assert!(deleted.expense.deleted_at.is_some());

        // Appears in history only
        assert!(list_expenses(&db, farmer.id, &RecordFilter::default()).await?.is_empty());
        let history = expense_history(&db, farmer.id).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].expense.id, id);

        // Second delete is refused
        assert!(matches!(
            delete_expense(&db, farmer.id, id).await,
            Err(Error::InvalidState { .. })
        ));
        // Editing a deleted record is refused
        assert!(matches!(
            update_expense(&db, farmer.id, id, input(seeds.id, 5.0, "2026-03-02", "")).await,
            Err(Error::InvalidState { .. })
        ));
        // Still readable by id
        assert!(get_expense(&db, farmer.id, id).await?.expense.deleted_at.is_some());

        let restored = restore_expense(&db, farmer.id, id).await?;
        assert!(restored.expense.deleted_at.is_none());
        assert_eq!(restored.expense.amount, created.expense.amount);
        assert_eq!(restored.expense.notes, created.expense.notes);
        assert_eq!(restored.expense.date, created.expense.date);
        assert!(expense_history(&db, farmer.id).await?.is_empty());
        assert_eq!(list_expenses(&db, farmer.id, &RecordFilter::default()).await?.len(), 1);

        assert!(matches!(
            restore_expense(&db, farmer.id, id).await,
            Err(Error::InvalidState { .. })
        ));

        let actions: Vec<String> = crate::core::activity::recent(&db, 10)
            .await?
            .into_iter()
            .map(|entry| entry.action)
            .collect();
        assert!(actions.contains(&activity::RECORD_DELETED.to_string()));
        assert!(actions.contains(&activity::RECORD_RESTORED.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_farmers_records_are_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = create_test_farmer(&db, "ramesh").await?;
        let intruder = create_test_farmer(&db, "suresh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;
        let created = create_expense(&db, owner.id, input(seeds.id, 100.0, "2026-03-01", "")).await?;

        assert!(matches!(
            get_expense(&db, intruder.id, created.expense.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            delete_expense(&db, intruder.id, created.expense.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(list_expenses(&db, intruder.id, &RecordFilter::default()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_and_order() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;
        let labour = create_test_expense_category(&db, "Labor").await?;
        create_expense(&db, farmer.id, input(seeds.id, 100.0, "2026-01-10", "ragi seed")).await?;
        create_expense(&db, farmer.id, input(labour.id, 300.0, "2026-02-15", "weeding")).await?;
        create_expense(&db, farmer.id, input(seeds.id, 50.0, "2026-03-20", "")).await?;

        let all = list_expenses(&db, farmer.id, &RecordFilter::default()).await?;
        let dates: Vec<String> = all.iter().map(|e| e.expense.date.to_string()).collect();
        assert_eq!(dates, vec!["2026-03-20", "2026-02-15", "2026-01-10"]);

        let by_category = RecordFilter {
            category: Some(seeds.id),
            ..Default::default()
        };
        assert_eq!(list_expenses(&db, farmer.id, &by_category).await?.len(), 2);

        let february = RecordFilter::between(
            NaiveDate::from_ymd_opt(2026, 2, 1),
            NaiveDate::from_ymd_opt(2026, 2, 28),
        );
        let feb = list_expenses(&db, farmer.id, &february).await?;
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].category_name, "Labor");

        let by_note = RecordFilter {
            search: Some("RAGI".to_string()),
            ..Default::default()
        };
        assert_eq!(list_expenses(&db, farmer.id, &by_note).await?.len(), 1);

        let by_category_name = RecordFilter {
            search: Some("labor".to_string()),
            ..Default::default()
        };
        assert_eq!(list_expenses(&db, farmer.id, &by_category_name).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_counts_only_active_in_total() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;
        create_expense(&db, farmer.id, input(seeds.id, 100.25, "2026-01-10", "")).await?;
        create_expense(&db, farmer.id, input(seeds.id, 200.5, "2026-01-11", "")).await?;
        let gone = create_expense(&db, farmer.id, input(seeds.id, 999.0, "2026-01-12", "")).await?;
        delete_expense(&db, farmer.id, gone.expense.id).await?;

        let summary = expense_summary(&db, farmer.id).await?;
        assert_eq!(summary.active_count, 2);
        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.active_total, 300.75);
        Ok(())
    }
}
