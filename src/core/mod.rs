//! Business logic. Every function takes a database connection and returns
//! [`crate::errors::Result`]; the HTTP layer only translates requests and
//! responses.

pub mod activity;
pub mod auth;

// Farm records
pub mod analytics;
pub mod crop_plan;
pub mod expense;
pub mod export;
pub mod income;
pub mod livestock;
pub mod loan;
pub mod pdf;
pub mod records;
pub mod reference;
pub mod report;

// Marketplace
pub mod address;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod review;
pub mod wishlist;

// Assistants
pub mod chat;
pub mod crop_doctor;
pub mod soil;
pub mod voice;
pub mod weather;

pub mod admin;

use serde::Serialize;

/// Default page size for paginated listings.
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Largest page size a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Rounds a rupee amount to paise.
#[must_use]
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// One page of a larger result set.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Total number of matching rows
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<T>,
}

/// Normalises 1-based page parameters: page defaults to 1, size to
/// [`DEFAULT_PAGE_SIZE`] and is capped at [`MAX_PAGE_SIZE`].
#[must_use]
pub fn page_params(page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, size)
}
