use super::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub application_status: &'static str,
    pub config_loaded: bool,
    pub database_connection: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let database_connection = state.reports.database_status().await;
    if database_connection != "healthy" {
        tracing::warn!("⚠️ Health check: database {}", database_connection);
    }

    Json(HealthStatus {
        application_status: "ok",
        config_loaded: true,
        database_connection,
    })
}
