//! Pieces shared by the soft-deletable farm records (expenses and income).
//!
//! A record is active while `deleted_at` is empty. Deleting sets the
//! timestamp, restoring clears it; nothing is ever removed from the table.

use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Listing filters accepted by the expense and income endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    /// Expense category id or income crop id
    #[serde(alias = "crop")]
    pub category: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

impl RecordFilter {
    /// Filter covering one calendar year.
    #[must_use]
    pub fn for_year(year: i32) -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(year, 1, 1),
            end_date: NaiveDate::from_ymd_opt(year, 12, 31),
            ..Self::default()
        }
    }

    /// Filter covering an optional date range.
    #[must_use]
    pub fn between(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            ..Self::default()
        }
    }

    pub(crate) fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Counts and active total for one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordSummary {
    pub active_count: u64,
    pub deleted_count: u64,
    pub active_total: f64,
}

pub(crate) fn ensure_active(deleted_at: Option<DateTime<Utc>>, label: &str) -> Result<()> {
    if deleted_at.is_some() {
        return Err(Error::invalid_state(format!(
            "This {label} has been deleted. Restore it before making changes."
        )));
    }
    Ok(())
}

pub(crate) fn ensure_can_delete(deleted_at: Option<DateTime<Utc>>, label: &str) -> Result<()> {
    if deleted_at.is_some() {
        return Err(Error::invalid_state(format!(
            "This {label} is already deleted."
        )));
    }
    Ok(())
}

pub(crate) fn ensure_can_restore(deleted_at: Option<DateTime<Utc>>, label: &str) -> Result<()> {
    if deleted_at.is_none() {
        return Err(Error::invalid_state(format!(
            "This {label} is not deleted, so there is nothing to restore."
        )));
    }
    Ok(())
}
