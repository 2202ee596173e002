//! Reference data loading from config.toml
//!
//! Expense categories, crops, livestock types, marketplace categories and
//! coupons are defined in a TOML file and inserted at startup. Existing rows
//! are matched by their natural key and never modified, so seeding can run on
//! every start.

use crate::entities::{
    Coupon, Crop, DiscountType, ExpenseCategory, LivestockType, ProductCategory, Season, coupon,
    crop, expense_category, livestock_type, product_category,
};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// The whole seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub expense_categories: Vec<NamedSeed>,
    pub crops: Vec<CropSeed>,
    pub livestock_types: Vec<NamedSeed>,
    pub product_categories: Vec<ProductCategorySeed>,
    pub coupons: Vec<CouponSeed>,
}

/// A name with an optional description.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CropSeed {
    pub name: String,
    #[serde(default)]
    pub variety: String,
    pub season: Season,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductCategorySeed {
    pub name: String,
    #[serde(default)]
    pub name_kannada: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub display_order: i32,
    /// Name of an earlier category this one sits under
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponSeed {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    #[serde(default)]
    pub min_order_value: f64,
    pub max_discount_amount: Option<f64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Loads the seed file at `path`.
///
/// # Errors
/// Returns [`Error::Config`] when the file cannot be read or is not valid TOML
/// for [`SeedConfig`].
pub fn load_seed_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read seed file {}: {e}",
            path.as_ref().display()
        ),
    })?;

    parse_seed_config(&contents)
}

/// Parses seed TOML from a string.
pub fn parse_seed_config(contents: &str) -> Result<SeedConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse seed file: {e}"),
    })
}

/// Inserts every seed row that is not in the database yet.
///
/// Returns the number of rows inserted.
pub async fn seed_reference_data(db: &DatabaseConnection, seed: &SeedConfig) -> Result<usize> {
    let mut inserted = 0;

    for item in &seed.expense_categories {
        let exists = ExpenseCategory::find()
            .filter(expense_category::Column::Name.eq(&item.name))
            .one(db)
            .await?
            .is_some();
        if !exists {
            expense_category::ActiveModel {
                name: Set(item.name.clone()),
                description: Set(item.description.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    for item in &seed.crops {
        let exists = Crop::find()
            .filter(crop::Column::Name.eq(&item.name))
            .filter(crop::Column::Variety.eq(&item.variety))
            .one(db)
            .await?
            .is_some();
        if !exists {
            crop::ActiveModel {
                name: Set(item.name.clone()),
                variety: Set(item.variety.clone()),
                season: Set(item.season),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    for item in &seed.livestock_types {
        let exists = LivestockType::find()
            .filter(livestock_type::Column::Name.eq(&item.name))
            .one(db)
            .await?
            .is_some();
        if !exists {
            livestock_type::ActiveModel {
                name: Set(item.name.clone()),
                description: Set(item.description.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    for item in &seed.product_categories {
        let exists = ProductCategory::find()
            .filter(product_category::Column::Name.eq(&item.name))
            .one(db)
            .await?
            .is_some();
        if !exists {
            let parent_id = match &item.parent {
                Some(parent) => ProductCategory::find()
                    .filter(product_category::Column::Name.eq(parent))
                    .one(db)
                    .await?
                    .map(|p| p.id),
                None => None,
            };
            product_category::ActiveModel {
                name: Set(item.name.clone()),
                name_kannada: Set(item.name_kannada.clone()),
                parent_id: Set(parent_id),
                icon: Set(item.icon.clone()),
                display_order: Set(item.display_order),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    for item in &seed.coupons {
        let code = item.code.trim().to_uppercase();
        let exists = Coupon::find()
            .filter(coupon::Column::Code.eq(&code))
            .one(db)
            .await?
            .is_some();
        if exists {
            debug!("Coupon {} already present", code);
        } else {
            coupon::ActiveModel {
                code: Set(code),
                description: Set(item.description.clone()),
                discount_type: Set(item.discount_type),
                discount_value: Set(item.discount_value),
                min_order_value: Set(item.min_order_value),
                max_discount_amount: Set(item.max_discount_amount),
                valid_from: Set(item.valid_from),
                valid_until: Set(item.valid_until),
                is_active: Set(true),
                used_count: Set(0),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    info!("Seeded {} reference rows", inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;

    const SAMPLE: &str = r#"
        [[expense_categories]]
        name = "Seed"
        description = "Seeds and planting materials"

        [[crops]]
        name = "Rice"
        variety = "IR-64"
        season = "kharif"

        [[livestock_types]]
        name = "Cow"

        [[product_categories]]
        name = "Vegetables"
        display_order = 1

        [[product_categories]]
        name = "Leafy Greens"
        parent = "Vegetables"

        [[coupons]]
        code = "welcome10"
        discount_type = "percentage"
        discount_value = 10.0
        max_discount_amount = 200.0
        valid_from = "2025-01-01T00:00:00Z"
        valid_until = "2027-12-31T23:59:59Z"
    "#;

    #[test]
    fn test_parse_seed_config() {
        let seed = parse_seed_config(SAMPLE).unwrap();
        assert_eq!(seed.expense_categories.len(), 1);
        assert_eq!(seed.crops[0].season, Season::Kharif);
        assert_eq!(seed.livestock_types[0].description, "");
        assert_eq!(seed.coupons[0].discount_type, DiscountType::Percentage);
    }

    #[test]
    fn test_parse_rejects_unknown_season() {
        let bad = r#"
            [[crops]]
            name = "Rice"
            season = "monsoon"
        "#;
        assert!(matches!(
            parse_seed_config(bad),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_bundled_seed_file_parses() {
        let seed = load_seed_config(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
        assert!(!seed.expense_categories.is_empty());
        assert!(!seed.product_categories.is_empty());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let seed = parse_seed_config(SAMPLE)?;

        assert_eq!(seed_reference_data(&db, &seed).await?, 6);
        assert_eq!(seed_reference_data(&db, &seed).await?, 0);

        let leafy = ProductCategory::find()
            .filter(product_category::Column::Name.eq("Leafy Greens"))
            .one(&db)
            .await?
            .unwrap();
        assert!(leafy.parent_id.is_some());

        let coupon = Coupon::find().one(&db).await?.unwrap();
        assert_eq!(coupon.code, "WELCOME10");
        Ok(())
    }
}
