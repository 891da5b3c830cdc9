use crate::utils::error::{ReporterError, Result};
use crate::utils::validation::{validate_length, validate_range, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LNG_RANGE: (f64, f64) = (-180.0, 180.0);
pub const DAMAGE_TYPE_LEN: (usize, usize) = (3, 100);
pub const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DamageSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl DamageSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageSeverity::Low => "low",
            DamageSeverity::Medium => "medium",
            DamageSeverity::High => "high",
            DamageSeverity::Critical => "critical",
        }
    }
}

impl FromStr for DamageSeverity {
    type Err = ReporterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "low" => Ok(DamageSeverity::Low),
            "medium" => Ok(DamageSeverity::Medium),
            "high" => Ok(DamageSeverity::High),
            "critical" => Ok(DamageSeverity::Critical),
            other => Err(ReporterError::InvalidValueError {
                field: "severity".to_string(),
                value: other.to_string(),
                reason: "Expected one of: low, medium, high, critical".to_string(),
            }),
        }
    }
}

impl fmt::Display for DamageSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    InReview,
    InProgress,
    Completed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InReview => "in_review",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Completed => "completed",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = ReporterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "pending" => Ok(ReportStatus::Pending),
            "in_review" => Ok(ReportStatus::InReview),
            "in_progress" => Ok(ReportStatus::InProgress),
            "completed" => Ok(ReportStatus::Completed),
            other => Err(ReporterError::InvalidValueError {
                field: "status".to_string(),
                value: other.to_string(),
                reason: "Expected one of: pending, in_review, in_progress, completed".to_string(),
            }),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已儲存的損壞回報。對外 JSON 中 `damage_type` 欄位名稱為 `type`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub damage_type: String,
    pub severity: DamageSeverity,
    pub description: Option<String>,
    pub status: ReportStatus,
    pub photo_url: Option<String>,
    pub date_reported: NaiveDate,
}

impl Report {
    /// 只套用有提供的欄位
    pub fn apply(&mut self, update: &ReportUpdate) {
        if let Some(lat) = update.lat {
            self.lat = lat;
        }
        if let Some(lng) = update.lng {
            self.lng = lng;
        }
        if let Some(damage_type) = &update.damage_type {
            self.damage_type = damage_type.clone();
        }
        if let Some(severity) = update.severity {
            self.severity = severity;
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type", alias = "damage_type")]
    pub damage_type: String,
    #[serde(default)]
    pub severity: DamageSeverity,
    pub description: Option<String>,
}

impl Validate for NewReport {
    fn validate(&self) -> Result<()> {
        validate_range("lat", self.lat, LAT_RANGE.0, LAT_RANGE.1)?;
        validate_range("lng", self.lng, LNG_RANGE.0, LNG_RANGE.1)?;
        validate_length("type", &self.damage_type, DAMAGE_TYPE_LEN.0, DAMAGE_TYPE_LEN.1)?;
        if let Some(description) = &self.description {
            validate_length("description", description, 0, DESCRIPTION_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportUpdate {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "type", alias = "damage_type")]
    pub damage_type: Option<String>,
    pub severity: Option<DamageSeverity>,
    pub description: Option<String>,
    pub status: Option<ReportStatus>,
}

impl ReportUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ReportUpdate::default()
    }
}

impl Validate for ReportUpdate {
    fn validate(&self) -> Result<()> {
        if let Some(lat) = self.lat {
            validate_range("lat", lat, LAT_RANGE.0, LAT_RANGE.1)?;
        }
        if let Some(lng) = self.lng {
            validate_range("lng", lng, LNG_RANGE.0, LNG_RANGE.1)?;
        }
        if let Some(damage_type) = &self.damage_type {
            validate_length("type", damage_type, DAMAGE_TYPE_LEN.0, DAMAGE_TYPE_LEN.1)?;
        }
        if let Some(description) = &self.description {
            validate_length("description", description, 0, DESCRIPTION_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPage {
    pub total_reports: i64,
    pub reports: Vec<Report>,
    pub current_page: i64,
    pub total_pages: i64,
}

/// 上傳的照片 (原始檔名與內容)
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// 客戶端最後回報的位置，尚未回報時兩者皆為 None
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    /// [x0, y0, x1, y1]，以像素為單位
    pub bbox: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Started,
    AlreadyRunning,
    Stopped,
    NotRunning,
}
