use super::AppState;
use crate::core::detection::{
    decode_data_url, decode_image, encode_jpeg, to_data_url, DetectionOutcome,
};
use crate::domain::model::Location;
use crate::utils::error::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

pub const WS_FRAME_PREFIX: &str = "detected_frame";
pub const WS_SOURCE: &str = "WebSocket";

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(websocket_handler))
}

/// 回覆格式：預設為 data URL，`?mode=json` 時回傳偵測結果 JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    #[default]
    Image,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub mode: ReplyMode,
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    image: Option<String>,
    location: Option<Location>,
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.mode))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, mode: ReplyMode) {
    tracing::info!("🔌 WebSocket client connected (mode: {:?})", mode);

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("WebSocket receive error: {}", e);
                break;
            }
        };

        let reply = match message {
            Message::Text(text) => handle_text_frame(&state, &text, mode).await,
            Message::Binary(bytes) => {
                let location = state.location.last_location();
                handle_frame(&state, &bytes, &location, mode).await
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = socket.send(Message::Text(reply)).await {
            tracing::debug!("WebSocket send failed: {}", e);
            break;
        }
    }

    tracing::info!("🔌 WebSocket client disconnected");
}

fn error_reply(message: impl std::fmt::Display) -> String {
    json!({ "error": message.to_string() }).to_string()
}

async fn handle_text_frame(state: &AppState, text: &str, mode: ReplyMode) -> String {
    let payload: FramePayload = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(e) => return error_reply(format!("Error processing input: {}", e)),
    };

    let Some(image) = payload.image.filter(|image| !image.is_empty()) else {
        return error_reply("No image data in payload");
    };

    let bytes = match decode_data_url(&image) {
        Ok(bytes) => bytes,
        Err(e) => return error_reply(format!("Error processing input: {}", e)),
    };

    let location = payload.location.unwrap_or_default();
    handle_frame(state, &bytes, &location, mode).await
}

async fn handle_frame(
    state: &AppState,
    bytes: &[u8],
    location: &Location,
    mode: ReplyMode,
) -> String {
    let Ok(image) = decode_image(bytes) else {
        return error_reply("Failed to decode image.");
    };

    let outcome = match state.bridge.analyze(&image).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("⚠️ Detection failed: {}", e);
            return error_reply(format!("Error during detection/visualization: {}", e));
        }
    };

    match build_reply(state, &outcome, location, mode).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("⚠️ Failed to persist/encode result: {}", e);
            error_reply(format!("Error processing/sending result: {}", e))
        }
    }
}

async fn build_reply(
    state: &AppState,
    outcome: &DetectionOutcome,
    location: &Location,
    mode: ReplyMode,
) -> Result<String> {
    let jpeg = encode_jpeg(&outcome.visualized)?;
    let saved = state
        .bridge
        .persist(outcome, &jpeg, location, WS_FRAME_PREFIX, WS_SOURCE)
        .await?;

    match mode {
        ReplyMode::Image => Ok(to_data_url(&jpeg)),
        ReplyMode::Json => {
            let report_id = saved.and_then(|s| s.report).map(|r| r.id);
            Ok(serde_json::to_string(&json!({
                "detections": outcome.detections,
                "label": outcome.label,
                "report_id": report_id,
            }))?)
        }
    }
}
