use crate::domain::ports::Storage;
use crate::utils::error::{ReporterError, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// 上傳檔案對外公開的 URL 前綴
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

pub fn public_url(file_name: &str) -> String {
    format!("{}/{}", UPLOADS_URL_PREFIX, file_name)
}

/// 從公開 URL 取出檔名。沒有目錄部分、空檔名或含 `..` 的 URL 會被拒絕。
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let trimmed = url.trim();
    let file_name = trimmed.rsplit('/').next()?;
    if file_name.is_empty()
        || file_name == ".."
        || file_name == "."
        || file_name == trimmed.trim_matches('/')
    {
        return None;
    }
    Some(file_name)
}

pub fn unique_file_name(extension: &str) -> String {
    format!("{}{}", uuid::Uuid::new_v4(), extension)
}

/// 以毫秒時間戳命名的偵測結果影像，例如 `detected_frame_1748009805500.jpg`
pub fn timestamped_file_name(prefix: &str) -> String {
    format!("{}_{}.jpg", prefix, chrono::Utc::now().timestamp_millis())
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(ReporterError::StorageError {
                message: format!("Refusing to access path outside storage: {}", path),
            });
        }
        Ok(self.base_path.join(relative))
    }

    fn ensure_parent(full_path: &Path) -> Result<()> {
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path)?;
        Self::ensure_parent(&full_path)?;

        if let Err(e) = fs::write(&full_path, data) {
            // 寫入失敗時移除可能殘留的部分檔案
            if full_path.exists() {
                if let Err(remove_err) = fs::remove_file(&full_path) {
                    tracing::warn!(
                        "Failed to remove partial file {}: {}",
                        full_path.display(),
                        remove_err
                    );
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path)?;
        Self::ensure_parent(&full_path)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(full_path)?;
        file.write_all(data)?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve(path)?;
        if !full_path.is_file() {
            return Ok(false);
        }
        fs::remove_file(full_path)?;
        Ok(true)
    }
}
