//! Crop doctor - Diagnoses plant diseases from a photo.
//!
//! Every upload becomes a diagnosis record that walks the upload state
//! machine. The server receives images already compressed by the client, so
//! a record starts at `ready`, moves to `analyzing` while the vision model
//! runs and ends in `done` or `error`.

use crate::{
    entities::{CropDiagnosis, UploadStatus, crop_diagnosis},
    errors::{Error, Result},
    providers::{CropImage, DiseaseAnalyzer, DiseaseReport},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, warn};

pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Whether an upload may move from `from` to `to`.
#[must_use]
pub const fn can_transition(from: UploadStatus, to: UploadStatus) -> bool {
    use UploadStatus::{Analyzing, Compressing, Done, Error, Idle, Ready};
    matches!(
        (from, to),
        (Idle, Compressing | Ready)
            | (Compressing, Ready)
            | (Ready, Analyzing)
            | (Analyzing, Done)
            | (Idle | Compressing | Ready | Analyzing, Error)
    )
}

pub fn advance(from: UploadStatus, to: UploadStatus) -> Result<UploadStatus> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(Error::invalid_state(format!(
            "Upload cannot move from {from:?} to {to:?}."
        )))
    }
}

/// Image type from the file's magic bytes.
#[must_use]
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Checks size and type. Returns the image with its detected content type.
pub fn validate_image(image: CropImage, max_bytes: usize) -> Result<CropImage> {
    if image.bytes.is_empty() {
        return Err(Error::validation("No image uploaded."));
    }
    if image.bytes.len() > max_bytes {
        return Err(Error::validation(format!(
            "Image is too large ({} bytes, limit {max_bytes}).",
            image.bytes.len()
        )));
    }
    let detected = sniff_image_type(&image.bytes)
        .ok_or_else(|| Error::validation("Only JPEG, PNG or WebP images are supported."))?;
    let declared = image.content_type.to_ascii_lowercase();
    if !declared.is_empty()
        && declared != "application/octet-stream"
        && !ALLOWED_IMAGE_TYPES.contains(&declared.as_str())
    {
        return Err(Error::validation("Only JPEG, PNG or WebP images are supported."));
    }
    Ok(CropImage {
        content_type: detected.to_string(),
        bytes: image.bytes,
    })
}

/// Confidence as a 0..1 fraction; models sometimes answer in percent.
fn normalize_confidence(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    (fraction.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

async fn set_status(
    db: &DatabaseConnection,
    record: crop_diagnosis::Model,
    to: UploadStatus,
    fill: impl FnOnce(&mut crop_diagnosis::ActiveModel),
) -> Result<crop_diagnosis::Model> {
    let next = advance(record.status, to)?;
    let mut active: crop_diagnosis::ActiveModel = record.into();
    active.status = Set(next);
    fill(&mut active);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

fn store_report(active: &mut crop_diagnosis::ActiveModel, report: DiseaseReport) {
    active.crop = Set(report.crop);
    active.disease_en = Set(report.disease_en);
    active.disease_kn = Set(report.disease_kn);
    active.severity = Set(report.severity);
    active.confidence = Set(normalize_confidence(report.confidence));
    active.treatment_en = Set(report.treatment_en);
    active.treatment_kn = Set(report.treatment_kn);
    active.prevention_en = Set(report.prevention_en);
    active.prevention_kn = Set(report.prevention_kn);
}

/// Stores the upload, runs the analysis and records the outcome. A provider
/// failure leaves the record in `error` and is returned to the caller.
pub async fn analyze(
    db: &DatabaseConnection,
    analyzer: &dyn DiseaseAnalyzer,
    user_id: i64,
    image: CropImage,
    crop_hint: &str,
    max_bytes: usize,
) -> Result<crop_diagnosis::Model> {
    let image = validate_image(image, max_bytes)?;
    let crop_hint = crop_hint.trim().to_string();

    let now = Utc::now();
    let record = crop_diagnosis::ActiveModel {
        user_id: Set(user_id),
        crop_hint: Set(crop_hint.clone()),
        content_type: Set(image.content_type.clone()),
        image_size: Set(i64::try_from(image.bytes.len()).unwrap_or(i64::MAX)),
        status: Set(UploadStatus::Idle),
        crop: Set(String::new()),
        disease_en: Set(String::new()),
        disease_kn: Set(String::new()),
        severity: Set(String::new()),
        confidence: Set(0.0),
        treatment_en: Set(String::new()),
        treatment_kn: Set(String::new()),
        prevention_en: Set(String::new()),
        prevention_kn: Set(String::new()),
        error_message: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    // Compressed on the client, so the upload is ready on arrival
    let record = set_status(db, record, UploadStatus::Ready, |_| {}).await?;
    let record = set_status(db, record, UploadStatus::Analyzing, |_| {}).await?;

    match analyzer.analyze(&image, &crop_hint).await {
        Ok(report) => {
            let done = set_status(db, record, UploadStatus::Done, |active| store_report(active, report)).await?;
            info!(
                "Diagnosis {} for user {}: {} ({})",
                done.id, user_id, done.disease_en, done.severity
            );
            Ok(done)
        }
        Err(e) => {
            warn!("Diagnosis {} failed: {}", record.id, e);
            let message = e.to_string();
            set_status(db, record, UploadStatus::Error, |active| {
                active.error_message = Set(message);
            })
            .await?;
            Err(e.into())
        }
    }
}

/// The caller's diagnoses, newest first.
pub async fn history(db: &DatabaseConnection, user_id: i64) -> Result<Vec<crop_diagnosis::Model>> {
    CropDiagnosis::find()
        .filter(crop_diagnosis::Column::UserId.eq(user_id))
        .order_by_desc(crop_diagnosis::Column::CreatedAt)
        .order_by_desc(crop_diagnosis::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_diagnosis(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<crop_diagnosis::Model> {
    CropDiagnosis::find_by_id(id)
        .filter(crop_diagnosis::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Diagnosis", id))
}
