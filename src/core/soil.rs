//! Soil analysis - A deterministic rule engine that turns a soil test into
//! a soil type, a fertility score and practical recommendations.

use crate::{
    core::round_money,
    entities::{SoilFeedback, SoilSample, User, soil_feedback, soil_sample, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub const MODEL_VERSION: &str = "1.0-rule-based";

const BASE_CONFIDENCE: f64 = 0.75;
const CONFIDENCE_STEP: f64 = 0.02;
const MAX_CONFIDENCE: f64 = 0.85;

/// One soil test as submitted by the farmer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoilInput {
    #[serde(default)]
    pub sample_name: String,
    pub location: Option<String>,
    pub ph: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub organic_carbon: Option<f64>,
    pub moisture: Option<f64>,
    pub texture: Option<String>,
    pub season: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilType {
    Black,
    Red,
    Alluvial,
    Laterite,
}

impl SoilType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Alluvial => "alluvial",
            Self::Laterite => "laterite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NutrientStatus {
    Low,
    Adequate,
    High,
}

impl NutrientStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Adequate => "adequate",
            Self::High => "high",
        }
    }
}

/// A fertilizer suggestion for one nutrient (or a maintenance dose).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FertilizerAdvice {
    pub nutrient: String,
    pub products: Vec<String>,
    pub quantity: String,
    pub application: String,
}

impl FertilizerAdvice {
    fn new(nutrient: &str, products: &[&str], quantity: &str, application: &str) -> Self {
        Self {
            nutrient: nutrient.to_string(),
            products: products.iter().map(ToString::to_string).collect(),
            quantity: quantity.to_string(),
            application: application.to_string(),
        }
    }
}

/// Everything the engine derives from a [`SoilInput`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilAnalysis {
    pub soil_type: SoilType,
    pub fertility_score: f64,
    pub fertility_level: Level,
    pub nitrogen_status: NutrientStatus,
    pub phosphorus_status: NutrientStatus,
    pub potassium_status: NutrientStatus,
    pub recommended_crops: Vec<String>,
    pub organic_fertilizers: Vec<FertilizerAdvice>,
    pub chemical_fertilizers: Vec<FertilizerAdvice>,
    pub irrigation_tips: Vec<String>,
    pub soil_health_tips: Vec<String>,
    pub explanation: String,
    pub confidence: f64,
    pub model_version: &'static str,
}

fn texture_of(input: &SoilInput) -> String {
    input
        .texture
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "loamy".to_string())
}

/// Season key for the crop table. `summer` is another name for `zaid`.
fn season_of(input: &SoilInput) -> String {
    let season = input
        .season
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "kharif".to_string());
    if season == "summer" { "zaid".to_string() } else { season }
}

#[must_use]
pub fn classify_soil(ph: f64, organic_carbon: f64, texture: &str) -> SoilType {
    if ph < 6.5 && organic_carbon > 1.5 {
        SoilType::Black
    } else if ph < 7.0 && texture.contains("sandy") {
        SoilType::Red
    } else if texture.contains("clay") && ph > 7.0 {
        SoilType::Black
    } else if texture.contains("loamy") {
        SoilType::Alluvial
    } else if ph < 6.0 {
        SoilType::Laterite
    } else {
        SoilType::Alluvial
    }
}

/// Weighted N/P/K/OC score out of 100, rounded to 2 dp.
#[must_use]
pub fn fertility(n: f64, p: f64, k: f64, organic_carbon: f64) -> (f64, Level) {
    let part = |value: f64, optimum: f64| (value / optimum * 100.0).min(100.0);
    let score = part(n, 280.0) * 0.3 + part(p, 25.0) * 0.3 + part(k, 280.0) * 0.3 + part(organic_carbon, 1.5) * 0.1;
    let score = (score * 100.0).round() / 100.0;
    let level = if score >= 70.0 {
        Level::High
    } else if score >= 40.0 {
        Level::Medium
    } else {
        Level::Low
    };
    (score, level)
}

fn nutrient_status(value: f64, low: f64, high: f64) -> NutrientStatus {
    if value < low {
        NutrientStatus::Low
    } else if value > high {
        NutrientStatus::High
    } else {
        NutrientStatus::Adequate
    }
}

fn crop_table(soil: SoilType, season: &str) -> Option<&'static [&'static str]> {
    let crops: &'static [&'static str] = match (soil, season) {
        (SoilType::Black, "kharif") => &["Cotton", "Soybean", "Sorghum", "Sunflower"],
        (SoilType::Black, "rabi") => &["Wheat", "Chickpea", "Safflower"],
        (SoilType::Black, "zaid") => &["Watermelon", "Cucumber"],
        (SoilType::Red, "kharif") => &["Groundnut", "Millets", "Pulses", "Maize"],
        (SoilType::Red, "rabi") => &["Ragi", "Horsegram", "Sunflower"],
        (SoilType::Red, "zaid") => &["Vegetables", "Fodder crops"],
        (SoilType::Alluvial, "kharif") => &["Rice", "Sugarcane", "Maize", "Cotton"],
        (SoilType::Alluvial, "rabi") => &["Wheat", "Barley", "Mustard", "Potato"],
        (SoilType::Alluvial, "zaid") => &["Vegetables", "Melons"],
        (SoilType::Laterite, "kharif") => &["Cashew", "Coconut", "Arecanut", "Tapioca"],
        (SoilType::Laterite, "rabi") => &["Vegetables", "Pulses"],
        (SoilType::Laterite, "zaid") => &["Vegetables"],
        _ => return None,
    };
    Some(crops)
}

#[must_use]
pub fn recommend_crops(soil: SoilType, ph: f64, season: &str) -> Vec<String> {
    let mut crops: Vec<String> = crop_table(soil, season)
        .unwrap_or(&["Consult agronomist"])
        .iter()
        .map(ToString::to_string)
        .collect();
    if ph < 5.5 {
        crops.retain(|c| c != "Wheat" && c != "Barley");
        crops.push("(Add lime to increase pH)".to_string());
    } else if ph > 8.5 {
        crops.push("(Add gypsum to decrease pH)".to_string());
    }
    crops.truncate(5);
    crops
}

fn organic_fertilizers(n: NutrientStatus, p: NutrientStatus, k: NutrientStatus) -> Vec<FertilizerAdvice> {
    let mut advice = Vec::new();
    if n == NutrientStatus::Low {
        advice.push(FertilizerAdvice::new(
            "nitrogen",
            &["Farmyard Manure (FYM)", "Vermicompost", "Green Manure"],
            "10-15 tons/hectare",
            "Apply 2-3 weeks before sowing",
        ));
    }
    if p == NutrientStatus::Low {
        advice.push(FertilizerAdvice::new(
            "phosphorus",
            &["Rock Phosphate", "Bone Meal", "Compost"],
            "200-300 kg/hectare",
            "Mix with soil during land preparation",
        ));
    }
    if k == NutrientStatus::Low {
        advice.push(FertilizerAdvice::new(
            "potassium",
            &["Wood Ash", "Banana Peel Compost", "Seaweed"],
            "100-150 kg/hectare",
            "Apply as top dressing",
        ));
    }
    if advice.is_empty() {
        advice.push(FertilizerAdvice::new(
            "maintenance",
            &["Vermicompost", "FYM"],
            "5-7 tons/hectare",
            "Apply annually for soil health",
        ));
    }
    advice
}

fn chemical_fertilizers(n: NutrientStatus, p: NutrientStatus, k: NutrientStatus) -> Vec<FertilizerAdvice> {
    let mut advice = Vec::new();
    if n == NutrientStatus::Low {
        advice.push(FertilizerAdvice::new(
            "nitrogen",
            &["Urea (46% N)"],
            "100-150 kg/hectare",
            "Split application: 50% basal, 25% at 30 days, 25% at 60 days",
        ));
    }
    if p == NutrientStatus::Low {
        advice.push(FertilizerAdvice::new(
            "phosphorus",
            &["Single Super Phosphate (SSP)"],
            "150-200 kg/hectare",
            "Full dose as basal application",
        ));
    }
    if k == NutrientStatus::Low {
        advice.push(FertilizerAdvice::new(
            "potassium",
            &["Muriate of Potash (MOP)"],
            "50-75 kg/hectare",
            "Apply as basal or split with nitrogen",
        ));
    }
    if advice.is_empty() {
        advice.push(FertilizerAdvice::new(
            "balanced",
            &["NPK 19:19:19"],
            "50 kg/hectare",
            "Maintenance dose for balanced nutrition",
        ));
    }
    advice
}

fn irrigation_tips(moisture: Option<f64>, texture: &str) -> Vec<String> {
    let mut tips = Vec::new();
    match moisture {
        Some(m) if m < 20.0 => tips.push("Soil moisture is low. Irrigate immediately."),
        Some(m) if m > 80.0 => tips.push("Soil is waterlogged. Improve drainage."),
        Some(_) => tips.push("Soil moisture is adequate."),
        None => {}
    }
    if texture.contains("sandy") {
        tips.push("Sandy soil: irrigate frequently with less water (light and frequent).");
    } else if texture.contains("clay") {
        tips.push("Clay soil: irrigate less often with more water (heavy and infrequent).");
    } else {
        tips.push("Loamy soil: follow a moderate irrigation schedule.");
    }
    tips.push("Use drip irrigation to save water.");
    tips.push("Mulching helps the soil hold moisture.");
    tips.into_iter().map(String::from).collect()
}

fn soil_health_tips(ph: f64, organic_carbon: f64, level: Level) -> Vec<String> {
    let mut tips = Vec::new();
    if ph < 5.5 {
        tips.push("Soil is acidic. Apply lime (2-3 tons/hectare) to raise the pH.");
    } else if ph > 8.5 {
        tips.push("Soil is alkaline. Apply gypsum (1-2 tons/hectare) to lower the pH.");
    } else {
        tips.push("Soil pH is in the optimal range.");
    }
    if organic_carbon < 0.5 {
        tips.push("Organic carbon is very low. Add compost or FYM regularly.");
    } else if organic_carbon < 1.0 {
        tips.push("Increase organic matter with green manuring and crop residue incorporation.");
    } else {
        tips.push("Organic carbon is good. Maintain it with regular organic inputs.");
    }
    if level == Level::Low {
        tips.push("Soil fertility is low. Follow the fertilizer recommendations closely.");
    }
    tips.push("Rotate crops to keep the soil healthy.");
    tips.push("Avoid excessive tillage to preserve soil structure.");
    tips.push("Grow cover crops in the off-season.");
    tips.into_iter().map(String::from).collect()
}

fn explanation(soil: SoilType, level: Level, n: NutrientStatus, p: NutrientStatus, k: NutrientStatus) -> String {
    let mut text = format!(
        "Your soil is classified as {} soil with {} fertility. ",
        soil.as_str().to_uppercase(),
        level.as_str().to_uppercase()
    );
    let deficient: Vec<&str> = [("Nitrogen", n), ("Phosphorus", p), ("Potassium", k)]
        .into_iter()
        .filter(|(_, status)| *status == NutrientStatus::Low)
        .map(|(name, _)| name)
        .collect();
    if deficient.is_empty() {
        text.push_str("All major nutrients are in adequate range. ");
    } else {
        text.push_str(&format!("Deficient nutrients: {}. ", deficient.join(", ")));
        text.push_str("Follow the fertilizer recommendations to improve soil fertility. ");
    }
    text.push_str(
        "The recommended crops are suitable for your soil type and will give good yields with proper management.",
    );
    text
}

fn confidence(input: &SoilInput) -> f64 {
    let supplied = [
        input.organic_carbon.is_some(),
        input.moisture.is_some(),
        input.texture.as_deref().is_some_and(|t| !t.trim().is_empty()),
        input.season.as_deref().is_some_and(|s| !s.trim().is_empty()),
        input.location.as_deref().is_some_and(|l| !l.trim().is_empty()),
    ]
    .into_iter()
    .filter(|given| *given)
    .count();
    #[allow(clippy::cast_precision_loss)]
    let raw = BASE_CONFIDENCE + CONFIDENCE_STEP * supplied as f64;
    (raw.min(MAX_CONFIDENCE) * 100.0).round() / 100.0
}

pub fn validate(input: &SoilInput) -> Result<()> {
    if !(0.0..=14.0).contains(&input.ph) {
        return Err(Error::validation("pH must be between 0 and 14."));
    }
    for (name, value) in [
        ("nitrogen", input.nitrogen),
        ("phosphorus", input.phosphorus),
        ("potassium", input.potassium),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::validation(format!("{name} must be zero or more.")));
        }
    }
    if matches!(input.organic_carbon, Some(oc) if !(0.0..=100.0).contains(&oc)) {
        return Err(Error::validation("Organic carbon must be a percentage."));
    }
    if matches!(input.moisture, Some(m) if !(0.0..=100.0).contains(&m)) {
        return Err(Error::validation("Moisture must be a percentage."));
    }
    Ok(())
}

/// Runs the rule engine. Pure; callers validate first.
#[must_use]
pub fn analyze_soil(input: &SoilInput) -> SoilAnalysis {
    let texture = texture_of(input);
    let season = season_of(input);
    let organic_carbon = input.organic_carbon.unwrap_or(0.0);

    let soil_type = classify_soil(input.ph, organic_carbon, &texture);
    let (fertility_score, fertility_level) =
        fertility(input.nitrogen, input.phosphorus, input.potassium, organic_carbon);
    let n = nutrient_status(input.nitrogen, 200.0, 350.0);
    let p = nutrient_status(input.phosphorus, 15.0, 35.0);
    let k = nutrient_status(input.potassium, 200.0, 350.0);

    SoilAnalysis {
        soil_type,
        fertility_score,
        fertility_level,
        nitrogen_status: n,
        phosphorus_status: p,
        potassium_status: k,
        recommended_crops: recommend_crops(soil_type, input.ph, &season),
        organic_fertilizers: organic_fertilizers(n, p, k),
        chemical_fertilizers: chemical_fertilizers(n, p, k),
        irrigation_tips: irrigation_tips(input.moisture, &texture),
        soil_health_tips: soil_health_tips(input.ph, organic_carbon, fertility_level),
        explanation: explanation(soil_type, fertility_level, n, p, k),
        confidence: confidence(input),
        model_version: MODEL_VERSION,
    }
}

/// Analyzes a sample and stores it together with the result.
pub async fn analyze_and_store(db: &DatabaseConnection, user_id: i64, input: SoilInput) -> Result<soil_sample::Model> {
    validate(&input)?;
    let analysis = analyze_soil(&input);

    let sample_name = if input.sample_name.trim().is_empty() {
        format!("Sample {}", Utc::now().format("%d %b %Y"))
    } else {
        input.sample_name.trim().to_string()
    };

    let sample = soil_sample::ActiveModel {
        user_id: Set(user_id),
        sample_name: Set(sample_name),
        location: Set(input.location.unwrap_or_default().trim().to_string()),
        ph: Set(input.ph),
        nitrogen: Set(input.nitrogen),
        phosphorus: Set(input.phosphorus),
        potassium: Set(input.potassium),
        organic_carbon: Set(input.organic_carbon),
        moisture: Set(input.moisture),
        texture: Set(input.texture),
        season: Set(input.season),
        soil_type: Set(analysis.soil_type.as_str().to_string()),
        fertility_score: Set(analysis.fertility_score),
        fertility_level: Set(analysis.fertility_level.as_str().to_string()),
        nitrogen_status: Set(analysis.nitrogen_status.as_str().to_string()),
        phosphorus_status: Set(analysis.phosphorus_status.as_str().to_string()),
        potassium_status: Set(analysis.potassium_status.as_str().to_string()),
        recommended_crops: Set(serde_json::json!(analysis.recommended_crops)),
        organic_fertilizers: Set(serde_json::json!(analysis.organic_fertilizers)),
        chemical_fertilizers: Set(serde_json::json!(analysis.chemical_fertilizers)),
        irrigation_tips: Set(serde_json::json!(analysis.irrigation_tips)),
        soil_health_tips: Set(serde_json::json!(analysis.soil_health_tips)),
        explanation: Set(analysis.explanation),
        confidence: Set(analysis.confidence),
        model_version: Set(MODEL_VERSION.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Soil sample {} for user {}: {} soil, score {}",
        sample.id, user_id, sample.soil_type, sample.fertility_score
    );
    Ok(sample)
}

pub async fn list_samples(db: &DatabaseConnection, user_id: i64) -> Result<Vec<soil_sample::Model>> {
    SoilSample::find()
        .filter(soil_sample::Column::UserId.eq(user_id))
        .order_by_desc(soil_sample::Column::CreatedAt)
        .order_by_desc(soil_sample::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_sample(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<soil_sample::Model> {
    SoilSample::find_by_id(id)
        .filter(soil_sample::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Soil sample", id))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FertilityDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilDashboard {
    pub total_samples: u64,
    pub average_fertility_score: f64,
    pub fertility_distribution: FertilityDistribution,
    pub latest_sample: Option<soil_sample::Model>,
}

pub async fn dashboard(db: &DatabaseConnection, user_id: i64) -> Result<SoilDashboard> {
    let samples = list_samples(db, user_id).await?;

    let mut distribution = FertilityDistribution::default();
    for sample in &samples {
        match sample.fertility_level.as_str() {
            "high" => distribution.high += 1,
            "medium" => distribution.medium += 1,
            _ => distribution.low += 1,
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let average = if samples.is_empty() {
        0.0
    } else {
        let mean = samples.iter().map(|s| s.fertility_score).sum::<f64>() / samples.len() as f64;
        (mean * 100.0).round() / 100.0
    };

    Ok(SoilDashboard {
        total_samples: samples.len() as u64,
        average_fertility_score: average,
        fertility_distribution: distribution,
        latest_sample: samples.into_iter().next(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackInput {
    #[serde(alias = "sample")]
    pub sample_id: i64,
    pub rating: i32,
    #[serde(default)]
    pub feedback_text: String,
    #[serde(default)]
    pub is_accurate: bool,
    #[serde(default)]
    pub is_helpful: bool,
}

/// Records the farmer's rating of one of their own samples.
pub async fn submit_feedback(
    db: &DatabaseConnection,
    user_id: i64,
    input: FeedbackInput,
) -> Result<soil_feedback::Model> {
    if !(1..=5).contains(&input.rating) {
        return Err(Error::validation("Rating must be between 1 and 5"));
    }
    get_sample(db, user_id, input.sample_id).await?;

    let feedback = soil_feedback::ActiveModel {
        user_id: Set(user_id),
        sample_id: Set(input.sample_id),
        rating: Set(input.rating),
        feedback_text: Set(input.feedback_text.trim().to_string()),
        is_accurate: Set(input.is_accurate),
        is_helpful: Set(input.is_helpful),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Soil feedback {} on sample {}: rating {}",
        feedback.id, feedback.sample_id, feedback.rating
    );
    Ok(feedback)
}

pub async fn list_feedback(db: &DatabaseConnection, user_id: i64) -> Result<Vec<soil_feedback::Model>> {
    SoilFeedback::find()
        .filter(soil_feedback::Column::UserId.eq(user_id))
        .order_by_desc(soil_feedback::Column::CreatedAt)
        .order_by_desc(soil_feedback::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Query parameters of the regional statistics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionFilter {
    pub district: Option<String>,
    pub location: Option<String>,
}

/// Fertility summary of one district and sampling location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalStat {
    pub district: String,
    pub location: String,
    pub avg_fertility: f64,
    pub sample_count: u64,
}

/// Average fertility across all farmers, grouped by the submitting farmer's
/// district and the sample location. Filters match case-insensitively.
pub async fn regional_stats(db: &DatabaseConnection, filter: &RegionFilter) -> Result<Vec<RegionalStat>> {
    let samples = SoilSample::find().all(db).await?;
    let owners: Vec<i64> = samples.iter().map(|s| s.user_id).collect();
    let districts: HashMap<i64, String> = User::find()
        .filter(user::Column::Id.is_in(owners))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.district))
        .collect();

    let wanted = |value: &str, filter: Option<&String>| {
        filter
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .is_none_or(|f| value.eq_ignore_ascii_case(f))
    };

    let mut groups: BTreeMap<(String, String), (f64, u64)> = BTreeMap::new();
    for sample in samples {
        let district = districts.get(&sample.user_id).cloned().unwrap_or_default();
        if !wanted(&district, filter.district.as_ref()) || !wanted(&sample.location, filter.location.as_ref()) {
            continue;
        }
        let entry = groups.entry((district, sample.location)).or_default();
        entry.0 += sample.fertility_score;
        entry.1 += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(groups
        .into_iter()
        .map(|((district, location), (total, count))| RegionalStat {
            district,
            location,
            avg_fertility: round_money(total / count as f64),
            sample_count: count,
        })
        .collect())
}
