//! Farm analytics - Yearly dashboard figures and chart series.
//!
//! All figures come from active records only. Soft-deleted expenses and income
//! are counted separately so the dashboard can point at the history view.

use crate::{
    core::{
        expense::{self, ExpenseView},
        income::{self, IncomeView},
        records::RecordFilter,
        report::{MONTH_NAMES, calculate_percentage},
        round_money,
    },
    entities::{CropPlan, Expense, Income, Livestock, Loan, LoanStatus, crop_plan, expense as expense_entity, income as income_entity, livestock, loan},
    errors::Result,
};
use chrono::Datelike;
use sea_orm::{PaginatorTrait, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// Headline numbers for the farm dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub year: i32,
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
    pub active_loans: u64,
    pub active_crop_plans: u64,
    pub livestock_count: u64,
    pub deleted_expenses: u64,
    pub deleted_income: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyProfit {
    pub month: &'static str,
    pub total_income: f64,
    pub total_expense: f64,
    pub profit: f64,
}

/// One slice of a breakdown chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub category: String,
    pub total_amount: f64,
    pub percentage: f64,
}

async fn year_records(
    db: &DatabaseConnection,
    farmer_id: i64,
    year: i32,
) -> Result<(Vec<ExpenseView>, Vec<IncomeView>)> {
    let filter = RecordFilter::for_year(year);
    let expenses = expense::list_expenses(db, farmer_id, &filter).await?;
    let income = income::list_income(db, farmer_id, &filter).await?;
    Ok((expenses, income))
}

pub async fn dashboard_stats(db: &DatabaseConnection, farmer_id: i64, year: i32) -> Result<DashboardStats> {
    let (expenses, income) = year_records(db, farmer_id, year).await?;
    let total_expenses = round_money(expenses.iter().map(|e| e.expense.amount).sum());
    let total_income = round_money(income.iter().map(|i| i.income.total_amount).sum());

    let active_loans = Loan::find()
        .filter(loan::Column::FarmerId.eq(farmer_id))
        .filter(loan::Column::Status.eq(LoanStatus::Active))
        .count(db)
        .await?;
    let active_crop_plans = CropPlan::find()
        .filter(crop_plan::Column::FarmerId.eq(farmer_id))
        .all(db)
        .await?
        .iter()
        .filter(|plan| plan.status.is_in_progress())
        .count() as u64;
    let livestock_count = Livestock::find()
        .filter(livestock::Column::FarmerId.eq(farmer_id))
        .count(db)
        .await?;
    let deleted_expenses = Expense::find()
        .filter(expense_entity::Column::FarmerId.eq(farmer_id))
        .filter(expense_entity::Column::DeletedAt.is_not_null())
        .count(db)
        .await?;
    let deleted_income = Income::find()
        .filter(income_entity::Column::FarmerId.eq(farmer_id))
        .filter(income_entity::Column::DeletedAt.is_not_null())
        .count(db)
        .await?;

    Ok(DashboardStats {
        year,
        total_income,
        total_expenses,
        net_profit: round_money(total_income - total_expenses),
        active_loans,
        active_crop_plans,
        livestock_count,
        deleted_expenses,
        deleted_income,
    })
}

/// Twelve rows, January first, zeros for empty months.
pub async fn monthly_profit(db: &DatabaseConnection, farmer_id: i64, year: i32) -> Result<Vec<MonthlyProfit>> {
    let (expenses, income) = year_records(db, farmer_id, year).await?;

    let mut spent = [0.0_f64; 12];
    let mut earned = [0.0_f64; 12];
    for e in &expenses {
        spent[e.expense.date.month0() as usize] += e.expense.amount;
    }
    for i in &income {
        earned[i.income.sale_date.month0() as usize] += i.income.total_amount;
    }

    Ok(MONTH_NAMES
        .iter()
        .enumerate()
        .map(|(m, month)| MonthlyProfit {
            month,
            total_income: round_money(earned[m]),
            total_expense: round_money(spent[m]),
            profit: round_money(earned[m] - spent[m]),
        })
        .collect())
}

/// Groups amounts by label and sorts the slices largest first.
fn breakdown<I>(items: I) -> Vec<Breakdown>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (label, amount) in items {
        *totals.entry(label).or_insert(0.0) += amount;
    }
    let grand_total: f64 = totals.values().sum();

    let mut slices: Vec<Breakdown> = totals
        .into_iter()
        .map(|(category, amount)| Breakdown {
            category,
            total_amount: round_money(amount),
            percentage: calculate_percentage(amount, grand_total),
        })
        .collect();
    slices.sort_by(|a, b| {
        b.total_amount
            .total_cmp(&a.total_amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    slices
}

pub async fn expense_by_category(db: &DatabaseConnection, farmer_id: i64, year: i32) -> Result<Vec<Breakdown>> {
    let expenses = expense::list_expenses(db, farmer_id, &RecordFilter::for_year(year)).await?;
    Ok(breakdown(
        expenses.into_iter().map(|e| (e.category_name, e.expense.amount)),
    ))
}

pub async fn income_by_crop(db: &DatabaseConnection, farmer_id: i64, year: i32) -> Result<Vec<Breakdown>> {
    let income = income::list_income(db, farmer_id, &RecordFilter::for_year(year)).await?;
    Ok(breakdown(
        income.into_iter().map(|i| (i.crop_name, i.income.total_amount)),
    ))
}
