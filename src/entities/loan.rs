//! Loan entity - Farm credit with a fixed monthly instalment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    #[sea_orm(string_value = "crop_loan")]
    CropLoan,
    #[sea_orm(string_value = "equipment_loan")]
    EquipmentLoan,
    #[sea_orm(string_value = "personal_loan")]
    PersonalLoan,
    #[sea_orm(string_value = "kisan_credit_card")]
    KisanCreditCard,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Repayment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "defaulted")]
    Defaulted,
}

/// Loan database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub farmer_id: i64,
    pub lender_name: String,
    pub loan_type: LoanType,
    pub principal_amount: f64,
    /// Annual interest rate in percent
    pub interest_rate: f64,
    pub loan_date: Date,
    pub tenure_months: i32,
    /// Monthly instalment
    pub emi_amount: f64,
    /// Outstanding balance, never negative
    pub remaining_amount: f64,
    pub status: LoanStatus,
    pub purpose: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
