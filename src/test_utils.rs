//! Shared test utilities for Kisan Sathi.
//!
//! This module provides helpers for setting up test databases, factories for
//! the common entities with sensible defaults, and stub providers that stand
//! in for the HTTP-backed AI and weather services.

#![allow(clippy::unwrap_used)]

use crate::{
    config::Settings,
    core::{
        auth::{self, SignupInput},
        catalog::{self, ProductInput},
        reference::{self, CategoryInput, CropInput},
    },
    entities::{
        DiscountType, Season, UserRole, coupon, livestock_type, product, product_category, user,
    },
    errors::Result,
    providers::{
        AudioClip, ChatRequest, ChatResponse, CropImage, DiseaseAnalyzer, DiseaseReport,
        ForecastDay, LlmProvider, ProviderError, Providers, SpeechToText, TextToSpeech,
        Unconfigured, WeatherProvider, WeatherReport,
    },
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Password every test account is created with.
pub const TEST_PASSWORD: &str = "kisan-pass-123";

/// Lowest bcrypt cost, so tests stay fast.
const TEST_HASH_COST: u32 = 4;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Settings with defaults and a throwaway media directory.
pub fn test_settings() -> Settings {
    let media = std::env::temp_dir().join(format!("kisan-sathi-test-{}", uuid::Uuid::new_v4()));
    let media = media.to_string_lossy().into_owned();
    Settings::from_lookup(|key| match key {
        "MEDIA_DIR" => Some(media.clone()),
        "PASSWORD_HASH_COST" => Some(TEST_HASH_COST.to_string()),
        _ => None,
    })
    .unwrap()
}

async fn create_user(db: &DatabaseConnection, username: &str, role: UserRole) -> Result<user::Model> {
    auth::signup(
        db,
        SignupInput {
            username: username.to_string(),
            password: TEST_PASSWORD.to_string(),
            email: format!("{username}@example.com"),
            phone: None,
            first_name: username.to_string(),
            last_name: String::new(),
            role: Some(role),
            state: "Karnataka".to_string(),
            district: "Mandya".to_string(),
        },
        TEST_HASH_COST,
    )
    .await
}

/// Creates a farmer in Mandya, Karnataka with [`TEST_PASSWORD`].
pub async fn create_test_farmer(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    create_user(db, username, UserRole::Farmer).await
}

pub async fn create_test_buyer(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    create_user(db, username, UserRole::Buyer).await
}

/// Admins cannot sign up, so the account is promoted after creation.
pub async fn create_test_admin(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    let created = create_user(db, username, UserRole::Farmer).await?;
    let mut active: user::ActiveModel = created.into();
    active.role = Set(UserRole::Admin);
    active.update(db).await.map_err(Into::into)
}

pub async fn create_test_expense_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<crate::entities::expense_category::Model> {
    reference::create_expense_category(
        db,
        CategoryInput {
            name: name.to_string(),
            description: String::new(),
        },
    )
    .await
}

/// Creates a kharif crop with no variety.
pub async fn create_test_crop(db: &DatabaseConnection, name: &str) -> Result<crate::entities::crop::Model> {
    reference::create_crop(
        db,
        CropInput {
            name: name.to_string(),
            variety: String::new(),
            season: Season::Kharif,
        },
    )
    .await
}

pub async fn create_test_livestock_type(db: &DatabaseConnection, name: &str) -> Result<livestock_type::Model> {
    livestock_type::ActiveModel {
        name: Set(name.to_string()),
        description: Set(String::new()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

pub async fn create_test_product_category(
    db: &DatabaseConnection,
    name: &str,
    display_order: i32,
) -> Result<product_category::Model> {
    product_category::ActiveModel {
        name: Set(name.to_string()),
        name_kannada: Set(String::new()),
        icon: Set(String::new()),
        display_order: Set(display_order),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an active listing for a farmer.
///
/// # Defaults
/// * category: "Vegetables" (created on first use)
/// * unit: "kg", minimum order 1
pub async fn create_test_product(
    db: &DatabaseConnection,
    farmer_id: i64,
    name: &str,
    price: f64,
    quantity: f64,
) -> Result<product::Model> {
    let category = match crate::entities::ProductCategory::find()
        .filter(product_category::Column::Name.eq("Vegetables"))
        .one(db)
        .await?
    {
        Some(existing) => existing,
        None => create_test_product_category(db, "Vegetables", 1).await?,
    };
    let seller = auth::get_user(db, farmer_id).await?;

    let view = catalog::create_product(
        db,
        &seller,
        ProductInput {
            category_id: category.id,
            name: name.to_string(),
            variety: String::new(),
            description: String::new(),
            unit: "kg".to_string(),
            quantity_available: quantity,
            min_order_quantity: 1.0,
            price_per_unit: price,
            original_price: None,
            quality_grade: String::new(),
            is_organic: false,
            listing_status: None,
            is_featured: false,
            state: String::new(),
            district: String::new(),
        },
    )
    .await?;
    Ok(view.product)
}

/// Creates an active coupon valid from yesterday until tomorrow.
pub async fn create_test_coupon(
    db: &DatabaseConnection,
    code: &str,
    discount_type: DiscountType,
    value: f64,
    min_order: f64,
) -> Result<coupon::Model> {
    let now = Utc::now();
    coupon::ActiveModel {
        code: Set(code.to_uppercase()),
        description: Set(String::new()),
        discount_type: Set(discount_type),
        discount_value: Set(value),
        min_order_value: Set(min_order),
        max_discount_amount: Set(None),
        valid_from: Set(now - Duration::days(1)),
        valid_until: Set(now + Duration::days(1)),
        is_active: Set(true),
        used_count: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

// --- Stub providers ---

/// LLM stub that always answers with the same text and remembers the last
/// request it saw.
#[derive(Clone, Default)]
pub struct StubLlm {
    reply: String,
    last: Arc<Mutex<Option<ChatRequest>>>,
}

impl StubLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last: Arc::default(),
        }
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn chat(&self, req: ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        *self.last.lock().unwrap() = Some(req);
        Ok(ChatResponse {
            text: self.reply.clone(),
            tokens_used: 42,
        })
    }
}

/// Speech stub: transcription echoes the language hint, synthesis returns a
/// few fake MP3 bytes.
#[derive(Clone, Copy, Default)]
pub struct StubSpeech;

#[async_trait]
impl SpeechToText for StubSpeech {
    async fn transcribe(
        &self,
        _clip: AudioClip,
        language: Option<String>,
    ) -> std::result::Result<String, ProviderError> {
        Ok(format!("transcribed ({})", language.as_deref().unwrap_or("auto")))
    }
}

#[async_trait]
impl TextToSpeech for StubSpeech {
    async fn synthesize(&self, text: &str, _language: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        let mut bytes = b"ID3".to_vec();
        bytes.extend_from_slice(text.as_bytes());
        Ok(bytes)
    }
}

#[derive(Clone, Copy, Default)]
pub struct StubDisease;

#[async_trait]
impl DiseaseAnalyzer for StubDisease {
    async fn analyze(
        &self,
        _image: &CropImage,
        crop_hint: &str,
    ) -> std::result::Result<DiseaseReport, ProviderError> {
        Ok(DiseaseReport {
            crop: crop_hint.trim().to_string(),
            disease_en: "Early blight".to_string(),
            disease_kn: "ಆರಂಭಿಕ ಅಂಗಮಾರಿ".to_string(),
            severity: "moderate".to_string(),
            confidence: 0.9,
            treatment_en: "Spray mancozeb 2 g per litre.".to_string(),
            treatment_kn: String::new(),
            prevention_en: "Rotate crops.".to_string(),
            prevention_kn: String::new(),
        })
    }
}

/// Weather stub returning a mild three-day forecast and counting calls.
#[derive(Clone, Default)]
pub struct StubWeather {
    calls: Arc<AtomicUsize>,
}

impl StubWeather {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn forecast(&self, _lat: f64, _lon: f64) -> std::result::Result<WeatherReport, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let today = Utc::now().date_naive();
        let daily = (0..3)
            .map(|offset| ForecastDay {
                date: today + Duration::days(offset),
                temp_max_c: 30.0,
                temp_min_c: 20.0,
                precipitation_mm: 1.0,
            })
            .collect();
        Ok(WeatherReport {
            temperature_c: 27.5,
            humidity_pct: 65.0,
            wind_kmh: 8.0,
            weather_code: 2,
            daily,
        })
    }
}

/// Providers wired to the stubs, with the given LLM.
pub fn stub_providers(llm: StubLlm) -> Providers {
    Providers {
        llm: Arc::new(llm),
        speech_to_text: Arc::new(StubSpeech),
        text_to_speech: Arc::new(StubSpeech),
        weather: Arc::new(StubWeather::default()),
        disease: Arc::new(StubDisease),
    }
}

/// Providers as they look when no AI key is configured.
pub fn unconfigured_providers() -> Providers {
    Providers {
        llm: Arc::new(Unconfigured),
        speech_to_text: Arc::new(Unconfigured),
        text_to_speech: Arc::new(StubSpeech),
        weather: Arc::new(StubWeather::default()),
        disease: Arc::new(Unconfigured),
    }
}
