//! Loans - Farm credit with an equated monthly instalment.
//!
//! The EMI follows the usual reducing-balance formula
//! `P·r·(1+r)^n / ((1+r)^n − 1)` with `r` the monthly rate. A zero-interest
//! loan is simply split evenly over the tenure.

use crate::{
    core::round_money,
    entities::{Loan, LoanStatus, LoanType, loan},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct LoanInput {
    pub lender_name: String,
    pub loan_type: LoanType,
    pub principal_amount: f64,
    /// Annual percentage
    pub interest_rate: f64,
    pub loan_date: NaiveDate,
    pub tenure_months: i32,
    /// Overrides the computed instalment
    pub emi_amount: Option<f64>,
    pub status: Option<LoanStatus>,
    #[serde(default)]
    pub purpose: String,
}

/// Monthly instalment for `principal` at `annual_rate` percent over `months`.
#[must_use]
pub fn calculate_emi(principal: f64, annual_rate: f64, months: i32) -> f64 {
    if months <= 0 {
        return round_money(principal);
    }
    let n = f64::from(months);
    let r = annual_rate / 1200.0;
    if r == 0.0 {
        return round_money(principal / n);
    }
    let growth = (1.0 + r).powf(n);
    round_money(principal * r * growth / (growth - 1.0))
}

fn validate(input: &LoanInput) -> Result<()> {
    if input.lender_name.trim().is_empty() {
        return Err(Error::validation("Lender name is required"));
    }
    if !input.principal_amount.is_finite() || input.principal_amount <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: input.principal_amount,
        });
    }
    if !input.interest_rate.is_finite() || !(0.0..=100.0).contains(&input.interest_rate) {
        return Err(Error::validation("Interest rate must be between 0 and 100"));
    }
    if input.tenure_months < 1 {
        return Err(Error::validation("Tenure must be at least one month"));
    }
    if let Some(emi) = input.emi_amount {
        if !emi.is_finite() || emi <= 0.0 {
            return Err(Error::InvalidAmount { amount: emi });
        }
    }
    Ok(())
}

async fn find_owned(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<loan::Model> {
    Loan::find_by_id(id)
        .filter(loan::Column::FarmerId.eq(farmer_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Loan", id))
}

pub async fn list_loans(db: &DatabaseConnection, farmer_id: i64) -> Result<Vec<loan::Model>> {
    Loan::find()
        .filter(loan::Column::FarmerId.eq(farmer_id))
        .order_by_desc(loan::Column::LoanDate)
        .order_by_desc(loan::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Records a loan. The outstanding balance starts at the principal.
pub async fn create_loan(db: &DatabaseConnection, farmer_id: i64, input: LoanInput) -> Result<loan::Model> {
    validate(&input)?;
    let emi = input.emi_amount.map_or_else(
        || calculate_emi(input.principal_amount, input.interest_rate, input.tenure_months),
        round_money,
    );

    let now = Utc::now();
    loan::ActiveModel {
        farmer_id: Set(farmer_id),
        lender_name: Set(input.lender_name.trim().to_string()),
        loan_type: Set(input.loan_type),
        principal_amount: Set(round_money(input.principal_amount)),
        interest_rate: Set(input.interest_rate),
        loan_date: Set(input.loan_date),
        tenure_months: Set(input.tenure_months),
        emi_amount: Set(emi),
        remaining_amount: Set(round_money(input.principal_amount)),
        status: Set(input.status.unwrap_or(LoanStatus::Active)),
        purpose: Set(input.purpose.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

pub async fn get_loan(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<loan::Model> {
    find_owned(db, farmer_id, id).await
}

/// Edits loan terms. The EMI is recomputed unless one is supplied, and the
/// outstanding balance never exceeds the new principal.
pub async fn update_loan(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
    input: LoanInput,
) -> Result<loan::Model> {
    let existing = find_owned(db, farmer_id, id).await?;
    validate(&input)?;
    let emi = input.emi_amount.map_or_else(
        || calculate_emi(input.principal_amount, input.interest_rate, input.tenure_months),
        round_money,
    );
    let principal = round_money(input.principal_amount);
    let remaining = existing.remaining_amount.min(principal);
    let status = input.status.unwrap_or(existing.status);

    let mut active: loan::ActiveModel = existing.into();
    active.lender_name = Set(input.lender_name.trim().to_string());
    active.loan_type = Set(input.loan_type);
    active.principal_amount = Set(principal);
    active.interest_rate = Set(input.interest_rate);
    active.loan_date = Set(input.loan_date);
    active.tenure_months = Set(input.tenure_months);
    active.emi_amount = Set(emi);
    active.remaining_amount = Set(remaining);
    active.status = Set(status);
    active.purpose = Set(input.purpose.trim().to_string());
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

pub async fn delete_loan(db: &DatabaseConnection, farmer_id: i64, id: i64) -> Result<()> {
    find_owned(db, farmer_id, id).await?.delete(db).await?;
    Ok(())
}

/// Applies a repayment. The balance never goes below zero and the loan is
/// completed once it reaches zero.
pub async fn record_payment(
    db: &DatabaseConnection,
    farmer_id: i64,
    id: i64,
    amount: f64,
) -> Result<loan::Model> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    let existing = find_owned(db, farmer_id, id).await?;
    if existing.status != LoanStatus::Active {
        return Err(Error::invalid_state("Payments can only be made on active loans"));
    }

    let remaining = round_money((existing.remaining_amount - amount).max(0.0));
    let mut active: loan::ActiveModel = existing.into();
    active.remaining_amount = Set(remaining);
    if remaining == 0.0 {
        active.status = Set(LoanStatus::Completed);
        info!("Loan {} fully repaid", id);
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}
