//! Database configuration module for Kisan Sathi.
//!
//! This module handles `SQLite` connections and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs and no hand-written SQL or migration files are needed. Every
//! statement is issued with `IF NOT EXISTS`, which makes startup safe to repeat
//! against an existing database file.

use crate::entities::{
    ActivityLog, AuthToken, CartItem, ChatFeedback, ChatMessage, Conversation, Coupon, Crop,
    CropDiagnosis, CropPlan, DeliveryAddress, Expense, ExpenseCategory, Income, Livestock,
    LivestockType, Loan, Notification, Order, OrderItem, Product, ProductCategory, Review,
    SoilFeedback, SoilSample, User, WishlistItem,
};
use crate::errors::{Error, Result};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;

/// Default database location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/kisan_sathi.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
///
/// For file-backed `SQLite` URLs the parent directory is created first, since
/// `SQLite` will create the file but not the folder holding it.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(dir) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(dir).map_err(|e| Error::Config {
            message: format!("Cannot create database directory {}: {e}", dir.display()),
        })?;
    }

    Database::connect(database_url).await.map_err(Into::into)
}

/// Directory part of a `sqlite://path/file.sqlite?...` URL, if any.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables using `SeaORM`'s schema generation from entity definitions.
///
/// Referenced tables are created before the tables pointing at them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    // Accounts
    create_table(db, &schema, User).await?;
    create_table(db, &schema, AuthToken).await?;
    create_table(db, &schema, ActivityLog).await?;

    // Farm records
    create_table(db, &schema, ExpenseCategory).await?;
    create_table(db, &schema, Expense).await?;
    create_table(db, &schema, Crop).await?;
    create_table(db, &schema, Income).await?;
    create_table(db, &schema, CropPlan).await?;
    create_table(db, &schema, LivestockType).await?;
    create_table(db, &schema, Livestock).await?;
    create_table(db, &schema, Loan).await?;

    // Marketplace
    create_table(db, &schema, ProductCategory).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, CartItem).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, WishlistItem).await?;
    create_table(db, &schema, Review).await?;
    create_table(db, &schema, Coupon).await?;
    create_table(db, &schema, DeliveryAddress).await?;
    create_table(db, &schema, Notification).await?;

    // Assistants
    create_table(db, &schema, Conversation).await?;
    create_table(db, &schema, ChatMessage).await?;
    create_table(db, &schema, ChatFeedback).await?;
    create_table(db, &schema, SoilSample).await?;
    create_table(db, &schema, SoilFeedback).await?;
    create_table(db, &schema, CropDiagnosis).await?;

    Ok(())
}
