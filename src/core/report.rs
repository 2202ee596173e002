//! Report formatting helpers.
//!
//! These functions turn numbers into the text shown in exports and charts.
//! They are framework-agnostic and do no I/O.

use chrono::NaiveDate;

/// Month names used by the monthly profit chart and report headings.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Formats an amount with a currency prefix, thousands separators and two
/// decimals. A trailing `.00` is dropped and negatives keep the prefix first.
///
/// # Examples
/// `format_amount("₹", 12000.5)` gives `₹12,000.50`;
/// `format_amount("Rs. ", -500.0)` gives `Rs. -500`.
#[must_use]
pub fn format_amount(prefix: &str, amount: f64) -> String {
    let negative = amount < 0.0;
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative && fixed != "0.00" { "-" } else { "" };
    if fraction == "00" {
        format!("{prefix}{sign}{grouped}")
    } else {
        format!("{prefix}{sign}{grouped}.{fraction}")
    }
}

/// Rupee formatting for reports, e.g. `₹34,566` or `₹12,000.50`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    format_amount("₹", amount)
}

/// Same as [`format_currency`] but with an ASCII prefix for the built-in PDF
/// fonts, which have no rupee glyph.
#[must_use]
pub fn format_currency_ascii(amount: f64) -> String {
    format_amount("Rs. ", amount)
}

/// Share of `part` in `total` as a percentage rounded to 2 dp; 0 when the
/// total is 0.
#[must_use]
pub fn calculate_percentage(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    ((part / total) * 10_000.0).round() / 100.0
}

/// Human-readable period line for report headers.
#[must_use]
pub fn format_period(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    let fmt = |d: NaiveDate| d.format("%d %b %Y").to_string();
    match (start, end) {
        (Some(s), Some(e)) => format!("Period: {} to {}", fmt(s), fmt(e)),
        (Some(s), None) => format!("Period: from {}", fmt(s)),
        (None, Some(e)) => format!("Period: up to {}", fmt(e)),
        (None, None) => "Period: all records".to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_format_currency_cases() {
        let cases = [
            (34566.0, "₹34,566"),
            (12000.5, "₹12,000.50"),
            (1500.0, "₹1,500"),
            (0.0, "₹0"),
            (-500.0, "₹-500"),
            (-1234.56, "₹-1,234.56"),
            (1_000_000.0, "₹1,000,000"),
            (99.99, "₹99.99"),
            (100.0, "₹100"),
        ];
        for (amount, expected) in cases {
            assert_eq!(format_currency(amount), expected, "amount {amount}");
        }
    }

    #[test]
    fn test_format_currency_rounding_edge() {
        assert_eq!(format_currency(999.999), "₹1,000");
        assert_eq!(format_currency(-0.001), "₹0");
    }

    #[test]
    fn test_format_currency_ascii() {
        assert_eq!(format_currency_ascii(1234.5), "Rs. 1,234.50");
    }

    #[test]
    fn test_calculate_percentage() {
        assert_eq!(calculate_percentage(25.0, 100.0), 25.0);
        assert_eq!(calculate_percentage(1.0, 3.0), 33.33);
        assert_eq!(calculate_percentage(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_format_period() {
        let start = NaiveDate::from_ymd_opt(2026, 4, 1);
        let end = NaiveDate::from_ymd_opt(2026, 6, 30);
        assert_eq!(format_period(start, end), "Period: 01 Apr 2026 to 30 Jun 2026");
        assert_eq!(format_period(None, None), "Period: all records");
    }
}
