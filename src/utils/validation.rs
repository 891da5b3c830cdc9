use crate::utils::error::{ReporterError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ReporterError::InvalidValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// 檢查上傳檔案的副檔名，回傳小寫並帶點的副檔名 (例如 ".jpg")
pub fn validate_file_extension(
    field_name: &str,
    filename: &str,
    allowed_extensions: &[&str],
) -> Result<String> {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .ok_or_else(|| ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: filename.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        })?;

    if !allowed_extensions.contains(&extension.as_str()) {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: filename.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        });
    }

    Ok(extension)
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN 不會落在任何範圍內
    if !(value >= min && value <= max) {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 以字元數 (非位元組) 檢查字串長度
pub fn validate_length(field_name: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ReporterError::InvalidValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Length must be between {} and {} characters", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("detector.endpoint", "https://example.com").is_ok());
        assert!(validate_url("detector.endpoint", "http://127.0.0.1:9000/predict").is_ok());
        assert!(validate_url("detector.endpoint", "").is_err());
        assert!(validate_url("detector.endpoint", "invalid-url").is_err());
        assert!(validate_url("detector.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("server.port", 8000, 1).is_ok());
        assert!(validate_positive_number("server.port", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        let allowed = [".jpg", ".jpeg", ".png"];
        assert_eq!(
            validate_file_extension("photo", "crack.JPG", &allowed).unwrap(),
            ".jpg"
        );
        assert_eq!(
            validate_file_extension("photo", "road.png", &allowed).unwrap(),
            ".png"
        );
        assert!(validate_file_extension("photo", "notes.txt", &allowed).is_err());
        assert!(validate_file_extension("photo", "no_extension", &allowed).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("lat", 45.0, -90.0, 90.0).is_ok());
        assert!(validate_range("lat", -90.0, -90.0, 90.0).is_ok());
        assert!(validate_range("lat", 90.5, -90.0, 90.0).is_err());
        assert!(validate_range("lat", f64::NAN, -90.0, 90.0).is_err());
    }

    #[test]
    fn test_validate_length_counts_chars() {
        assert!(validate_length("type", "jalan", 3, 100).is_ok());
        assert!(validate_length("type", "ab", 3, 100).is_err());
        assert!(validate_length("type", "道路裂", 3, 100).is_ok());
        assert!(validate_length("type", &"x".repeat(101), 3, 100).is_err());
    }
}
