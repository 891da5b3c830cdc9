use super::{ApiError, ApiResult, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn router() -> Router<AppState> {
    Router::new().route("/location/update", post(update_location))
}

#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub lat: f64,
    pub lon: f64,
}

async fn update_location(
    State(state): State<AppState>,
    body: std::result::Result<Json<LocationUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = body.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    state.location.update(update.lat, update.lon)?;
    Ok(Json(json!({ "status": "ok", "message": "location updated" })))
}
