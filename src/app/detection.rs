use super::{ApiError, ApiResult, AppState};
use crate::core::detection::{decode_data_url, decode_image, encode_jpeg, to_data_url};
use crate::domain::model::{DetectionStatus, Location};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub const HTTP_FRAME_PREFIX: &str = "frame_http";
pub const HTTP_SOURCE: &str = "HTTP upload";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws/detect-image", post(detect_image))
        .route("/start-local-detection", get(start_local_detection))
        .route("/stop-local-detection", get(stop_local_detection))
}

#[derive(Debug, Deserialize)]
pub struct DetectImageRequest {
    pub image: Option<String>,
    pub location: Option<Location>,
}

async fn detect_image(
    State(state): State<AppState>,
    body: std::result::Result<Json<DetectImageRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let Some(image) = request.image.filter(|image| !image.is_empty()) else {
        return Err(ApiError::bad_request("Image missing"));
    };
    let location = request.location.unwrap_or_default();

    let bytes = decode_data_url(&image).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let frame = decode_image(&bytes).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let outcome = state.bridge.analyze(&frame).await?;
    let jpeg = encode_jpeg(&outcome.visualized)?;
    let saved = state
        .bridge
        .persist(&outcome, &jpeg, &location, HTTP_FRAME_PREFIX, HTTP_SOURCE)
        .await?;
    let report_id = saved.and_then(|s| s.report).map(|r| r.id);

    Ok(Json(json!({
        "result_image": to_data_url(&jpeg),
        "label": outcome.label,
        "report_id": report_id,
    })))
}

async fn start_local_detection(State(state): State<AppState>) -> Json<Value> {
    let status: DetectionStatus = state.local_detection.start().await;
    Json(json!({ "status": status }))
}

async fn stop_local_detection(State(state): State<AppState>) -> Json<Value> {
    let status: DetectionStatus = state.local_detection.stop().await;
    Json(json!({ "status": status }))
}
