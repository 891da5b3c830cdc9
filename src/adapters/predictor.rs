use crate::config::yaml_config::DetectorSettings;
use crate::domain::model::Detection;
use crate::domain::ports::Predictor;
use crate::utils::error::{ReporterError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    image: String,
    model: &'a str,
    config: &'a str,
    device: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// 透過 HTTP 呼叫外部 NanoDet 推論服務
pub struct HttpPredictor {
    client: Client,
    endpoint: String,
    model: String,
    config: String,
    device: String,
}

impl HttpPredictor {
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .clone()
            .ok_or_else(|| ReporterError::MissingConfigError {
                field: "detector.endpoint".to_string(),
            })?;
        let timeout = settings.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        tracing::info!(
            "🧠 Predictor endpoint {} (model={}, device={})",
            endpoint,
            settings.model,
            settings.device
        );

        Ok(Self {
            client,
            endpoint,
            model: settings.model.clone(),
            config: settings.config.clone(),
            device: settings.device.clone(),
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn inference(&self, jpeg: &[u8]) -> Result<Vec<Detection>> {
        let request = InferenceRequest {
            image: STANDARD.encode(jpeg),
            model: &self.model,
            config: &self.config,
            device: &self.device,
        };

        tracing::debug!("Sending {} byte frame to predictor", jpeg.len());
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReporterError::detection(format!(
                "Predictor returned {}: {}",
                status, body
            )));
        }

        let parsed: InferenceResponse = response.json().await?;
        tracing::debug!("Predictor returned {} detections", parsed.detections.len());
        Ok(parsed.detections)
    }
}

/// 未設定推論端點時使用，所有推論都回傳錯誤
pub struct UnavailablePredictor;

#[async_trait]
impl Predictor for UnavailablePredictor {
    async fn inference(&self, _jpeg: &[u8]) -> Result<Vec<Detection>> {
        Err(ReporterError::detection(
            "Detection model is not available (detector.endpoint is not configured)",
        ))
    }
}
