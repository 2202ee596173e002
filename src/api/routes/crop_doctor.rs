//! `/api/crop-doctor/` - Photo diagnosis of crop diseases.

use crate::{
    api::{
        AppState,
        extract::{AuthUser, Path, Upload},
        response::ApiResponse,
    },
    core::crop_doctor,
    entities::crop_diagnosis,
    errors::Result,
    providers::CropImage,
};
use axum::{
    Router,
    extract::{Multipart, State},
    routing::{get, post},
};

async fn analyze(
    State(state): State<AppState>,
    caller: AuthUser,
    multipart: Multipart,
) -> Result<ApiResponse<crop_diagnosis::Model>> {
    let upload = Upload::read(multipart, "image").await?;
    let crop_hint = upload.field("crop").unwrap_or_default().to_string();
    let image = CropImage {
        content_type: upload.content_type,
        bytes: upload.bytes,
    };
    let diagnosis = crop_doctor::analyze(
        &state.db,
        state.providers.disease.as_ref(),
        caller.id(),
        image,
        &crop_hint,
        state.settings.max_upload_bytes,
    )
    .await?;
    Ok(ApiResponse::created("Analysis complete", diagnosis))
}

async fn history(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<crop_diagnosis::Model>>> {
    Ok(ApiResponse::success(crop_doctor::history(&state.db, caller.id()).await?))
}

async fn diagnosis(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<crop_diagnosis::Model>> {
    Ok(ApiResponse::success(crop_doctor::get_diagnosis(&state.db, caller.id(), id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze/", post(analyze))
        .route("/history/", get(history))
        .route("/history/{id}/", get(diagnosis))
}
