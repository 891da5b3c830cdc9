use crate::domain::model::Location;
use crate::utils::error::Result;
use std::path::PathBuf;

/// 以 JSON 檔案保存客戶端最後一次回報的位置
#[derive(Debug, Clone)]
pub struct LocationStore {
    path: PathBuf,
}

impl LocationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn update(&self, lat: f64, lon: f64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(&Location::new(lat, lon))?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("📍 Location updated: lat={}, lon={}", lat, lon);
        Ok(())
    }

    /// 檔案不存在或內容損壞時回傳空位置
    pub fn last_location(&self) -> Location {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Location::default(),
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Location store {} is corrupt: {}", self.path.display(), e);
            Location::default()
        })
    }
}
