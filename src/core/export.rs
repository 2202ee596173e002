//! Expense and income exports as Excel workbooks or PDF tables, plus the
//! yearly analytics report as a PDF.
//!
//! Exports only ever contain active records. The caller decides the date
//! range; the filename carries today's date.

use crate::{
    core::{
        analytics::{self, Breakdown},
        expense::{self, ExpenseView},
        income::{self, IncomeView},
        pdf::{PdfManager, PdfTable},
        records::RecordFilter,
        report::{format_currency_ascii, format_period},
        round_money,
    },
    entities::user,
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_xlsxwriter::{Color, Format, FormatBorder, FormatPattern, Workbook, Worksheet, XlsxError};
use sea_orm::DatabaseConnection;
use tracing::info;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const RUPEE_FORMAT: &str = "₹#,##0.00";
const EXPENSE_HEADERS: [&str; 4] = ["Date", "Category", "Amount", "Notes"];
const INCOME_HEADERS: [&str; 8] = [
    "Date", "Crop", "Quantity", "Unit", "Rate", "Total", "Buyer", "Payment",
];

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Pdf,
}

impl ExportFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Excel => "xlsx",
            Self::Pdf => "pdf",
        }
    }

    const fn content_type(self) -> &'static str {
        match self {
            Self::Excel => XLSX_CONTENT_TYPE,
            Self::Pdf => PDF_CONTENT_TYPE,
        }
    }
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    fn new(stem: &str, format: ExportFormat, bytes: Vec<u8>) -> Self {
        Self {
            filename: export_filename(stem, format, Utc::now().date_naive()),
            content_type: format.content_type(),
            bytes,
        }
    }
}

/// `expenses_20260315.xlsx` style name.
#[must_use]
pub fn export_filename(stem: &str, format: ExportFormat, day: NaiveDate) -> String {
    format!("{stem}_{}.{}", day.format("%Y%m%d"), format.extension())
}

fn xlsx_error(err: XlsxError) -> Error {
    Error::Export {
        message: err.to_string(),
    }
}

pub async fn export_expenses(
    db: &DatabaseConnection,
    farmer_id: i64,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    format: ExportFormat,
) -> Result<ExportFile> {
    let rows = expense::list_expenses(db, farmer_id, &RecordFilter::between(start_date, end_date)).await?;
    info!("Exporting {} expenses for farmer {} as {:?}", rows.len(), farmer_id, format);

    let bytes = match format {
        ExportFormat::Excel => expenses_xlsx(&rows)?,
        ExportFormat::Pdf => expenses_pdf(&rows, start_date, end_date),
    };
    Ok(ExportFile::new("expenses", format, bytes))
}

pub async fn export_income(
    db: &DatabaseConnection,
    farmer_id: i64,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    format: ExportFormat,
) -> Result<ExportFile> {
    let rows = income::list_income(db, farmer_id, &RecordFilter::between(start_date, end_date)).await?;
    info!("Exporting {} income records for farmer {} as {:?}", rows.len(), farmer_id, format);

    let bytes = match format {
        ExportFormat::Excel => income_xlsx(&rows)?,
        ExportFormat::Pdf => income_pdf(&rows, start_date, end_date),
    };
    Ok(ExportFile::new("income", format, bytes))
}

/// Yearly totals, monthly profit and both breakdowns, one table per section.
pub async fn export_analytics(db: &DatabaseConnection, farmer: &user::Model, year: i32) -> Result<ExportFile> {
    let stats = analytics::dashboard_stats(db, farmer.id, year).await?;
    let months = analytics::monthly_profit(db, farmer.id, year).await?;
    let by_category = analytics::expense_by_category(db, farmer.id, year).await?;
    let by_crop = analytics::income_by_crop(db, farmer.id, year).await?;
    info!("Exporting {} analytics for farmer {}", year, farmer.id);

    let title = format!("Farm Analytics Report - {year}");
    let subtitle = format!(
        "Farmer: {}    Report date: {}",
        farmer.display_name(),
        Utc::now().format("%d %B %Y")
    );

    let summary = vec![
        vec!["Total Income".to_string(), format_currency_ascii(stats.total_income)],
        vec!["Total Expenses".to_string(), format_currency_ascii(stats.total_expenses)],
        vec!["Net Profit/Loss".to_string(), format_currency_ascii(stats.net_profit)],
    ];
    let monthly: Vec<Vec<String>> = months
        .iter()
        .map(|m| {
            vec![
                m.month.to_string(),
                format_currency_ascii(m.total_income),
                format_currency_ascii(m.total_expense),
                format_currency_ascii(m.profit),
            ]
        })
        .collect();

    let mut pdf = PdfManager::new();
    pdf.write_table(&PdfTable {
        title: &title,
        subtitle: &subtitle,
        headers: &["Metric", "Amount"],
        rows: &summary,
        footer: None,
    });
    pdf.write_table(&PdfTable {
        title: "Monthly Profit",
        subtitle: &title,
        headers: &["Month", "Income", "Expenses", "Profit"],
        rows: &monthly,
        footer: None,
    });
    pdf.write_table(&PdfTable {
        title: "Expenses by Category",
        subtitle: &title,
        headers: &["Category", "Amount", "Share"],
        rows: &breakdown_rows(&by_category),
        footer: Some(format!("Total: {}", format_currency_ascii(stats.total_expenses))),
    });
    pdf.write_table(&PdfTable {
        title: "Income by Crop",
        subtitle: &title,
        headers: &["Crop", "Amount", "Share"],
        rows: &breakdown_rows(&by_crop),
        footer: Some(format!("Total: {}", format_currency_ascii(stats.total_income))),
    });

    Ok(ExportFile::new(&format!("analytics_{year}"), ExportFormat::Pdf, pdf.finish()))
}

fn breakdown_rows(items: &[Breakdown]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|b| {
            vec![
                b.category.clone(),
                format_currency_ascii(b.total_amount),
                format!("{:.1}%", b.percentage),
            ]
        })
        .collect()
}

struct SheetFormats {
    header: Format,
    money: Format,
    total_label: Format,
    total_money: Format,
}

impl SheetFormats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_font_color(Color::RGB(0xFF_FFFF))
            .set_background_color(Color::RGB(0x2E_7D32))
            .set_pattern(FormatPattern::Solid)
            .set_border(FormatBorder::Thin);
        let money = Format::new().set_num_format(RUPEE_FORMAT);
        let total_label = Format::new().set_bold();
        let total_money = Format::new()
            .set_bold()
            .set_num_format(RUPEE_FORMAT)
            .set_border(FormatBorder::Thin);
        Self {
            header,
            money,
            total_label,
            total_money,
        }
    }
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], formats: &SheetFormats) -> Result<()> {
    for (col, header) in (0u16..).zip(headers) {
        sheet
            .write_with_format(0, col, *header, &formats.header)
            .map_err(xlsx_error)?;
        sheet.set_column_width(col, 16).map_err(xlsx_error)?;
    }
    sheet.set_freeze_panes(1, 0).map_err(xlsx_error)?;
    Ok(())
}

fn expenses_xlsx(rows: &[ExpenseView]) -> Result<Vec<u8>> {
    let formats = SheetFormats::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Expenses").map_err(xlsx_error)?;
    write_headers(sheet, &EXPENSE_HEADERS, &formats)?;
    sheet.set_column_width(3, 40).map_err(xlsx_error)?;

    let mut row = 1u32;
    for view in rows {
        let e = &view.expense;
        sheet.write(row, 0, e.date.to_string()).map_err(xlsx_error)?;
        sheet.write(row, 1, view.category_name.as_str()).map_err(xlsx_error)?;
        sheet
            .write_with_format(row, 2, e.amount, &formats.money)
            .map_err(xlsx_error)?;
        sheet.write(row, 3, e.notes.as_str()).map_err(xlsx_error)?;
        row += 1;
    }

    let total = round_money(rows.iter().map(|v| v.expense.amount).sum());
    sheet
        .write_with_format(row, 1, "Total", &formats.total_label)
        .map_err(xlsx_error)?;
    sheet
        .write_with_format(row, 2, total, &formats.total_money)
        .map_err(xlsx_error)?;

    workbook.save_to_buffer().map_err(xlsx_error)
}

fn income_xlsx(rows: &[IncomeView]) -> Result<Vec<u8>> {
    let formats = SheetFormats::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Income").map_err(xlsx_error)?;
    write_headers(sheet, &INCOME_HEADERS, &formats)?;

    let mut row = 1u32;
    for view in rows {
        let i = &view.income;
        sheet.write(row, 0, i.sale_date.to_string()).map_err(xlsx_error)?;
        sheet.write(row, 1, view.crop_name.as_str()).map_err(xlsx_error)?;
        sheet.write(row, 2, i.quantity).map_err(xlsx_error)?;
        sheet.write(row, 3, i.unit.as_str()).map_err(xlsx_error)?;
        sheet
            .write_with_format(row, 4, i.rate_per_unit, &formats.money)
            .map_err(xlsx_error)?;
        sheet
            .write_with_format(row, 5, i.total_amount, &formats.money)
            .map_err(xlsx_error)?;
        sheet.write(row, 6, i.buyer_name.as_str()).map_err(xlsx_error)?;
        sheet
            .write(row, 7, payment_label(i.payment_status))
            .map_err(xlsx_error)?;
        row += 1;
    }

    let total = round_money(rows.iter().map(|v| v.income.total_amount).sum());
    sheet
        .write_with_format(row, 4, "Total", &formats.total_label)
        .map_err(xlsx_error)?;
    sheet
        .write_with_format(row, 5, total, &formats.total_money)
        .map_err(xlsx_error)?;

    workbook.save_to_buffer().map_err(xlsx_error)
}

const fn payment_label(status: crate::entities::IncomePaymentStatus) -> &'static str {
    use crate::entities::IncomePaymentStatus as S;
    match status {
        S::Pending => "Pending",
        S::Partial => "Partial",
        S::Completed => "Completed",
    }
}

fn expenses_pdf(rows: &[ExpenseView], start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<u8> {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|v| {
            vec![
                v.expense.date.format("%d-%m-%Y").to_string(),
                v.category_name.clone(),
                format_currency_ascii(v.expense.amount),
                v.expense.notes.clone(),
            ]
        })
        .collect();
    let total = rows.iter().map(|v| v.expense.amount).sum::<f64>();
    render_pdf("Expense Report", start, end, &EXPENSE_HEADERS, &body, total)
}

fn income_pdf(rows: &[IncomeView], start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<u8> {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|v| {
            let i = &v.income;
            vec![
                i.sale_date.format("%d-%m-%Y").to_string(),
                v.crop_name.clone(),
                format!("{}", i.quantity),
                i.unit.clone(),
                format_currency_ascii(i.rate_per_unit),
                format_currency_ascii(i.total_amount),
                i.buyer_name.clone(),
                payment_label(i.payment_status).to_string(),
            ]
        })
        .collect();
    let total = rows.iter().map(|v| v.income.total_amount).sum::<f64>();
    render_pdf("Income Report", start, end, &INCOME_HEADERS, &body, total)
}

fn render_pdf(
    title: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    headers: &[&str],
    rows: &[Vec<String>],
    total: f64,
) -> Vec<u8> {
    let period = format_period(start, end);
    let mut pdf = PdfManager::new();
    pdf.write_table(&PdfTable {
        title,
        subtitle: &period,
        headers,
        rows,
        footer: Some(format!(
            "Total ({} records): {}",
            rows.len(),
            format_currency_ascii(round_money(total))
        )),
    });
    pdf.finish()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::expense::{ExpenseInput, create_expense, delete_expense};
    use crate::test_utils::*;

    #[test]
    fn test_export_filename() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(export_filename("expenses", ExportFormat::Excel, day), "expenses_20260305.xlsx");
        assert_eq!(export_filename("income", ExportFormat::Pdf, day), "income_20260305.pdf");
    }

    #[tokio::test]
    async fn test_expense_exports_skip_deleted_records() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;
        for (amount, notes) in [(1500.0, "kept"), (99.0, "zz-removed")] {
            create_expense(
                &db,
                farmer.id,
                ExpenseInput {
                    category_id: seeds.id,
                    amount,
                    date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
                    notes: notes.to_string(),
                },
            )
            .await?;
        }
        let listed = expense::list_expenses(&db, farmer.id, &RecordFilter::default()).await?;
        let removed = listed.iter().find(|v| v.expense.notes == "zz-removed").unwrap();
        delete_expense(&db, farmer.id, removed.expense.id).await?;

        let pdf = export_expenses(&db, farmer.id, None, None, ExportFormat::Pdf).await?;
        assert_eq!(pdf.content_type, PDF_CONTENT_TYPE);
        assert!(pdf.filename.starts_with("expenses_") && pdf.filename.ends_with(".pdf"));
        let text = String::from_utf8_lossy(&pdf.bytes).to_string();
        assert!(text.contains("Rs. 1,500"));
        assert!(!text.contains("zz-removed"));

        let xlsx = export_expenses(&db, farmer.id, None, None, ExportFormat::Excel).await?;
        assert_eq!(xlsx.content_type, XLSX_CONTENT_TYPE);
        // xlsx is a zip archive
        assert!(xlsx.bytes.starts_with(b"PK"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_income_export_still_renders() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let file = export_income(&db, farmer.id, None, None, ExportFormat::Pdf).await?;
        assert!(file.bytes.starts_with(b"%PDF-"));
        let file = export_income(&db, farmer.id, None, None, ExportFormat::Excel).await?;
        assert!(file.bytes.starts_with(b"PK"));
        Ok(())
    }

    #[tokio::test]
    async fn test_analytics_report_lists_year_totals() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let seeds = create_test_expense_category(&db, "Seed").await?;
        for (amount, year) in [(1500.0, 2025), (700.0, 2024)] {
            create_expense(
                &db,
                farmer.id,
                ExpenseInput {
                    category_id: seeds.id,
                    amount,
                    date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
                    notes: String::new(),
                },
            )
            .await?;
        }

        let file = export_analytics(&db, &farmer, 2025).await?;
        assert_eq!(file.content_type, PDF_CONTENT_TYPE);
        assert!(file.filename.starts_with("analytics_2025_") && file.filename.ends_with(".pdf"));
        let text = String::from_utf8_lossy(&file.bytes).to_string();
        assert!(text.contains("Farm Analytics Report - 2025"));
        assert!(text.contains("Expenses by Category"));
        assert!(text.contains("Rs. 1,500"));
        assert!(!text.contains("Rs. 2,200"));
        Ok(())
    }
}
