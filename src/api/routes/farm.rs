//! `/farm-management/api/` - Expenses and income with soft delete, the other
//! farm records, analytics and exports.

use crate::{
    api::{
        AppState,
        extract::{AuthUser, Json, Path, Query},
        response::ApiResponse,
    },
    core::{
        analytics::{self, Breakdown, DashboardStats, MonthlyProfit},
        crop_plan::{self, CropPlanInput, CropPlanView},
        expense::{self, ExpenseInput, ExpenseView},
        export::{self, ExportFile, ExportFormat},
        income::{self, IncomeInput, IncomeView},
        livestock::{self, LivestockInput, LivestockView},
        loan::{self, LoanInput},
        records::{RecordFilter, RecordSummary},
        reference::{self, CategoryInput, CropInput},
    },
    entities::{crop, expense_category, livestock_type, loan as loan_entity},
    errors::{Error, Result},
};
use axum::{
    Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
}

// --- Expenses ---

async fn list_expenses(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(filter): Query<RecordFilter>,
) -> Result<ApiResponse<Vec<ExpenseView>>> {
    Ok(ApiResponse::success(expense::list_expenses(&state.db, caller.id(), &filter).await?))
}

async fn create_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<ExpenseInput>,
) -> Result<ApiResponse<ExpenseView>> {
    let created = expense::create_expense(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Expense added successfully", created))
}

async fn get_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<ExpenseView>> {
    Ok(ApiResponse::success(expense::get_expense(&state.db, caller.id(), id).await?))
}

async fn update_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<ExpenseInput>,
) -> Result<ApiResponse<ExpenseView>> {
    let updated = expense::update_expense(&state.db, caller.id(), id, input).await?;
    Ok(ApiResponse::with_message("Expense updated successfully", updated))
}

async fn delete_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<ExpenseView>> {
    let deleted = expense::delete_expense(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::with_message("Expense moved to history", deleted))
}

async fn restore_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<ExpenseView>> {
    let restored = expense::restore_expense(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::with_message("Expense restored successfully", restored))
}

async fn expense_history(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<ExpenseView>>> {
    Ok(ApiResponse::success(expense::expense_history(&state.db, caller.id()).await?))
}

async fn expense_summary(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<RecordSummary>> {
    Ok(ApiResponse::success(expense::expense_summary(&state.db, caller.id()).await?))
}

// --- Income ---

async fn list_income(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(filter): Query<RecordFilter>,
) -> Result<ApiResponse<Vec<IncomeView>>> {
    Ok(ApiResponse::success(income::list_income(&state.db, caller.id(), &filter).await?))
}

async fn create_income(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<IncomeInput>,
) -> Result<ApiResponse<IncomeView>> {
    let created = income::create_income(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Income added successfully", created))
}

async fn get_income(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<IncomeView>> {
    Ok(ApiResponse::success(income::get_income(&state.db, caller.id(), id).await?))
}

async fn update_income(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<IncomeInput>,
) -> Result<ApiResponse<IncomeView>> {
    let updated = income::update_income(&state.db, caller.id(), id, input).await?;
    Ok(ApiResponse::with_message("Income updated successfully", updated))
}

async fn delete_income(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<IncomeView>> {
    let deleted = income::delete_income(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::with_message("Income moved to history", deleted))
}

async fn restore_income(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<IncomeView>> {
    let restored = income::restore_income(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::with_message("Income restored successfully", restored))
}

async fn income_history(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<IncomeView>>> {
    Ok(ApiResponse::success(income::income_history(&state.db, caller.id()).await?))
}

async fn income_summary(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<RecordSummary>> {
    Ok(ApiResponse::success(income::income_summary(&state.db, caller.id()).await?))
}

// --- Reference data ---

async fn list_expense_categories(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<ApiResponse<Vec<expense_category::Model>>> {
    Ok(ApiResponse::success(reference::list_expense_categories(&state.db).await?))
}

async fn create_expense_category(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(input): Json<CategoryInput>,
) -> Result<ApiResponse<expense_category::Model>> {
    let created = reference::create_expense_category(&state.db, input).await?;
    Ok(ApiResponse::created("Category created", created))
}

async fn list_crops(State(state): State<AppState>, _caller: AuthUser) -> Result<ApiResponse<Vec<crop::Model>>> {
    Ok(ApiResponse::success(reference::list_crops(&state.db).await?))
}

async fn create_crop(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(input): Json<CropInput>,
) -> Result<ApiResponse<crop::Model>> {
    let created = reference::create_crop(&state.db, input).await?;
    Ok(ApiResponse::created("Crop created", created))
}

async fn list_livestock_types(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<ApiResponse<Vec<livestock_type::Model>>> {
    Ok(ApiResponse::success(reference::list_livestock_types(&state.db).await?))
}

// --- Crop plans ---

async fn list_crop_plans(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<CropPlanView>>> {
    Ok(ApiResponse::success(crop_plan::list_crop_plans(&state.db, caller.id()).await?))
}

async fn create_crop_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<CropPlanInput>,
) -> Result<ApiResponse<CropPlanView>> {
    let created = crop_plan::create_crop_plan(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Crop plan created", created))
}

async fn get_crop_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<CropPlanView>> {
    Ok(ApiResponse::success(crop_plan::get_crop_plan(&state.db, caller.id(), id).await?))
}

async fn update_crop_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<CropPlanInput>,
) -> Result<ApiResponse<CropPlanView>> {
    let updated = crop_plan::update_crop_plan(&state.db, caller.id(), id, input).await?;
    Ok(ApiResponse::with_message("Crop plan updated", updated))
}

async fn delete_crop_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    crop_plan::delete_crop_plan(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::message("Crop plan deleted"))
}

// --- Livestock ---

async fn list_livestock(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<LivestockView>>> {
    Ok(ApiResponse::success(livestock::list_livestock(&state.db, caller.id()).await?))
}

async fn create_livestock(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<LivestockInput>,
) -> Result<ApiResponse<LivestockView>> {
    let created = livestock::create_livestock(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Livestock added", created))
}

async fn get_livestock(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<LivestockView>> {
    Ok(ApiResponse::success(livestock::get_livestock(&state.db, caller.id(), id).await?))
}

async fn update_livestock(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<LivestockInput>,
) -> Result<ApiResponse<LivestockView>> {
    let updated = livestock::update_livestock(&state.db, caller.id(), id, input).await?;
    Ok(ApiResponse::with_message("Livestock updated", updated))
}

async fn delete_livestock(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    livestock::delete_livestock(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::message("Livestock removed"))
}

// --- Loans ---

async fn list_loans(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<loan_entity::Model>>> {
    Ok(ApiResponse::success(loan::list_loans(&state.db, caller.id()).await?))
}

async fn create_loan(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<LoanInput>,
) -> Result<ApiResponse<loan_entity::Model>> {
    let created = loan::create_loan(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Loan added", created))
}

async fn get_loan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<loan_entity::Model>> {
    Ok(ApiResponse::success(loan::get_loan(&state.db, caller.id(), id).await?))
}

async fn update_loan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<LoanInput>,
) -> Result<ApiResponse<loan_entity::Model>> {
    let updated = loan::update_loan(&state.db, caller.id(), id, input).await?;
    Ok(ApiResponse::with_message("Loan updated", updated))
}

async fn delete_loan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>> {
    loan::delete_loan(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::message("Loan deleted"))
}

async fn loan_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(payment): Json<PaymentRequest>,
) -> Result<ApiResponse<loan_entity::Model>> {
    let updated = loan::record_payment(&state.db, caller.id(), id, payment.amount).await?;
    Ok(ApiResponse::with_message("Payment recorded", updated))
}

// --- Analytics ---

async fn dashboard_stats(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<YearQuery>,
) -> Result<ApiResponse<DashboardStats>> {
    Ok(ApiResponse::success(analytics::dashboard_stats(&state.db, caller.id(), query.year()).await?))
}

async fn monthly_profit(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<YearQuery>,
) -> Result<ApiResponse<Vec<MonthlyProfit>>> {
    Ok(ApiResponse::success(analytics::monthly_profit(&state.db, caller.id(), query.year()).await?))
}

async fn expense_by_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<YearQuery>,
) -> Result<ApiResponse<Vec<Breakdown>>> {
    Ok(ApiResponse::success(analytics::expense_by_category(&state.db, caller.id(), query.year()).await?))
}

async fn income_by_crop(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<YearQuery>,
) -> Result<ApiResponse<Vec<Breakdown>>> {
    Ok(ApiResponse::success(analytics::income_by_crop(&state.db, caller.id(), query.year()).await?))
}

// --- Exports ---

fn attachment(file: ExportFile) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
}

async fn export_records(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((kind, format)): Path<(String, String)>,
    Query(range): Query<DateRange>,
) -> Result<impl IntoResponse> {
    let format = match format.as_str() {
        "pdf" => ExportFormat::Pdf,
        "excel" => ExportFormat::Excel,
        other => {
            return Err(Error::NotFound {
                entity: "Export format",
                id: other.to_string(),
            });
        }
    };
    let file = match kind.as_str() {
        "expenses" => export::export_expenses(&state.db, caller.id(), range.start_date, range.end_date, format).await?,
        "income" => export::export_income(&state.db, caller.id(), range.start_date, range.end_date, format).await?,
        other => {
            return Err(Error::NotFound {
                entity: "Export",
                id: other.to_string(),
            });
        }
    };
    Ok(attachment(file))
}

async fn export_analytics(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse> {
    let file = export::export_analytics(&state.db, &caller.user, query.year()).await?;
    Ok(attachment(file))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/expenses/", get(list_expenses).post(create_expense))
        .route("/expenses/history/", get(expense_history))
        .route("/expenses/summary/", get(expense_summary))
        .route(
            "/expenses/{id}/",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/expenses/{id}/restore/", patch(restore_expense))
        .route("/income/", get(list_income).post(create_income))
        .route("/income/history/", get(income_history))
        .route("/income/summary/", get(income_summary))
        .route(
            "/income/{id}/",
            get(get_income).put(update_income).delete(delete_income),
        )
        .route("/income/{id}/restore/", patch(restore_income))
        .route(
            "/expense-categories/",
            get(list_expense_categories).post(create_expense_category),
        )
        .route("/crops/", get(list_crops).post(create_crop))
        .route("/livestock-types/", get(list_livestock_types))
        .route("/crop-plans/", get(list_crop_plans).post(create_crop_plan))
        .route(
            "/crop-plans/{id}/",
            get(get_crop_plan).put(update_crop_plan).delete(delete_crop_plan),
        )
        .route("/livestock/", get(list_livestock).post(create_livestock))
        .route(
            "/livestock/{id}/",
            get(get_livestock).put(update_livestock).delete(delete_livestock),
        )
        .route("/loans/", get(list_loans).post(create_loan))
        .route("/loans/{id}/", get(get_loan).put(update_loan).delete(delete_loan))
        .route("/loans/{id}/payments/", post(loan_payment))
        .route("/dashboard-stats/", get(dashboard_stats))
        .route("/monthly-profit/", get(monthly_profit))
        .route("/expense-by-category/", get(expense_by_category))
        .route("/income-by-crop/", get(income_by_crop))
        .route("/export/analytics/pdf/", get(export_analytics))
        .route("/export/{kind}/{format}/", get(export_records))
}
