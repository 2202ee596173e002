//! `/api/soil/` - Soil test analysis, history, feedback and regional
//! fertility statistics.

use crate::{
    api::{
        AppState,
        extract::{AuthUser, Json, Path, Query},
        response::ApiResponse,
    },
    core::soil::{self, FeedbackInput, RegionFilter, RegionalStat, SoilDashboard, SoilInput},
    entities::{soil_feedback, soil_sample},
    errors::Result,
};
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

async fn analyze(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<SoilInput>,
) -> Result<ApiResponse<soil_sample::Model>> {
    let sample = soil::analyze_and_store(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Soil analysis complete", sample))
}

async fn samples(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<Vec<soil_sample::Model>>> {
    Ok(ApiResponse::success(soil::list_samples(&state.db, caller.id()).await?))
}

async fn sample(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<soil_sample::Model>> {
    Ok(ApiResponse::success(soil::get_sample(&state.db, caller.id(), id).await?))
}

async fn dashboard(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<SoilDashboard>> {
    Ok(ApiResponse::success(soil::dashboard(&state.db, caller.id()).await?))
}

async fn feedback(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiResponse<Vec<soil_feedback::Model>>> {
    Ok(ApiResponse::success(soil::list_feedback(&state.db, caller.id()).await?))
}

async fn submit_feedback(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<FeedbackInput>,
) -> Result<ApiResponse<soil_feedback::Model>> {
    let saved = soil::submit_feedback(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::created("Thank you for your feedback", saved))
}

async fn regional_stats(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(filter): Query<RegionFilter>,
) -> Result<ApiResponse<Vec<RegionalStat>>> {
    Ok(ApiResponse::success(soil::regional_stats(&state.db, &filter).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/samples/", get(samples))
        .route("/samples/analyze/", post(analyze))
        .route("/samples/{id}/", get(sample))
        .route("/dashboard/", get(dashboard))
        .route("/feedback/", get(feedback).post(submit_feedback))
        .route("/regional-stats/", get(regional_stats))
        .route("/regional_stats/", get(regional_stats))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::routes::testing::TestApp;
    use crate::test_utils::{create_test_farmer, unconfigured_providers};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_analyze_and_dashboard() {
        let app = TestApp::new(unconfigured_providers()).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();
        let token = app.token("ramesh").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/soil/samples/analyze/",
                Some(&token),
                Some(json!({
                    "sample_name": "North plot",
                    "ph": 6.8,
                    "nitrogen": 180,
                    "phosphorus": 12,
                    "potassium": 220,
                    "texture": "sandy",
                    "season": "kharif"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["soil_type"], "red");
        assert_eq!(body["data"]["nitrogen_status"], "low");
        assert_eq!(body["data"]["model_version"], "1.0-rule-based");
        assert_eq!(body["data"]["recommended_crops"][0], "Groundnut");

        let (status, _) = app
            .call(
                Method::POST,
                "/api/soil/samples/analyze/",
                Some(&token),
                Some(json!({"ph": 20, "nitrogen": 1, "phosphorus": 1, "potassium": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, board) = app.call(Method::GET, "/api/soil/dashboard/", Some(&token), None).await;
        assert_eq!(board["data"]["total_samples"], 1);
        assert_eq!(board["data"]["latest_sample"]["sample_name"], "North plot");
    }

    #[tokio::test]
    async fn test_feedback_and_regional_stats() {
        let app = TestApp::new(unconfigured_providers()).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();
        let token = app.token("ramesh").await;

        let (_, body) = app
            .call(
                Method::POST,
                "/api/soil/samples/analyze/",
                Some(&token),
                Some(json!({
                    "location": "Maddur",
                    "ph": 7.0,
                    "nitrogen": 280,
                    "phosphorus": 25,
                    "potassium": 280,
                    "organic_carbon": 1.5
                })),
            )
            .await;
        let sample_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = app
            .call(
                Method::POST,
                "/api/soil/feedback/",
                Some(&token),
                Some(json!({"sample": sample_id, "rating": 0})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/soil/feedback/",
                Some(&token),
                Some(json!({"sample": sample_id, "rating": 5, "is_helpful": true})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, body) = app.call(Method::GET, "/api/soil/feedback/", Some(&token), None).await;
        assert_eq!(body["data"][0]["rating"], 5);

        let (status, body) = app
            .call(Method::GET, "/api/soil/regional-stats/?district=Mandya", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["location"], "Maddur");
        assert_eq!(body["data"][0]["sample_count"], 1);
        assert_eq!(body["data"][0]["avg_fertility"], 100.0);

        let (status, _) = app.call(Method::GET, "/api/soil/regional-stats/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
