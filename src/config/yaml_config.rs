use crate::utils::error::{ReporterError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub uploads: UploadSettings,
    pub detector: DetectorSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub location: LocationSettings,
    pub monitoring: Option<MonitoringSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    pub model: String,
    pub config: String,
    pub webcam: i32,
    pub threshold: f32,
    pub device: String,
    /// 推論服務的 HTTP 端點
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<String>,
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1".to_string(),
            ],
            static_dir: None,
            max_upload_mb: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    pub store_path: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            store_path: "location_store.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub enabled: bool,
}

impl AppConfig {
    /// 從 YAML 檔案載入配置，相對路徑以設定檔所在目錄為基準
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReporterError::ConfigError {
                message: format!("Configuration file '{}' not found", path.display()),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content).map_err(|e| match e {
            ReporterError::ConfigError { message } => ReporterError::ConfigError {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })?;

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base_dir);
        Ok(config)
    }

    /// 從 YAML 字串解析配置
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        if processed_content.trim().is_empty() {
            return Err(ReporterError::ConfigError {
                message: "Configuration is empty or invalid".to_string(),
            });
        }

        serde_yaml::from_str(&processed_content).map_err(|e| ReporterError::ConfigValidationError {
            field: "yaml_parsing".to_string(),
            message: format!("YAML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATABASE_URL})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::{Captures, Regex};
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

        re.replace_all(content, |caps: &Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// 將相對路徑 (含 SQLite 資料庫檔) 轉成以 base_dir 為基準的路徑
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |value: &str| -> String {
            let path = Path::new(value);
            if path.is_absolute() {
                value.to_string()
            } else {
                base_dir.join(path).to_string_lossy().into_owned()
            }
        };

        self.database.url = resolve_sqlite_url(&self.database.url, base_dir);
        self.uploads.directory = resolve(&self.uploads.directory);
        self.location.store_path = resolve(&self.location.store_path);
        if let Some(static_dir) = &self.server.static_dir {
            self.server.static_dir = Some(resolve(static_dir));
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        PathBuf::from(&self.uploads.directory)
    }

    /// 確保上傳目錄存在
    pub fn ensure_upload_dir(&self) -> Result<PathBuf> {
        let dir = self.upload_dir();
        std::fs::create_dir_all(&dir).map_err(|e| ReporterError::ConfigError {
            message: format!("Failed to create upload directory '{}': {}", dir.display(), e),
        })?;
        Ok(dir)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("database.url", &self.database.url)?;
        validation::validate_path("uploads.directory", &self.uploads.directory)?;
        validation::validate_path("location.store_path", &self.location.store_path)?;

        validation::validate_range("detector.threshold", self.detector.threshold, 0.0, 1.0)?;
        validation::validate_range("detector.webcam", self.detector.webcam, 0, i32::MAX)?;
        if let Some(endpoint) = &self.detector.endpoint {
            validation::validate_url("detector.endpoint", endpoint)?;
        }

        validation::validate_positive_number("server.port", self.server.port as usize, 1)?;
        validation::validate_positive_number("server.max_upload_mb", self.server.max_upload_mb, 1)?;

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// `sqlite://` 或 `sqlite:` 後的相對檔案路徑以 base_dir 為基準；
/// 記憶體資料庫、絕對路徑與其他資料庫 URL 不變
fn resolve_sqlite_url(url: &str, base_dir: &Path) -> String {
    let Some(rest) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return url.to_string();
    };

    let (file, query) = match rest.find('?') {
        Some(pos) => rest.split_at(pos),
        None => (rest, ""),
    };
    if file.is_empty() || file.starts_with(":memory:") || Path::new(file).is_absolute() {
        return url.to_string();
    }

    format!("sqlite://{}{}", base_dir.join(file).display(), query)
}
