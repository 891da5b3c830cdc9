use crate::adapters::storage::{file_name_from_url, public_url, unique_file_name};
use crate::core::{
    NewReport, PhotoUpload, Report, ReportPage, ReportRepository, ReportUpdate, Storage,
};
use crate::utils::error::{ReporterError, Result};
use crate::utils::validation::{validate_file_extension, Validate};
use std::sync::Arc;

pub const VALID_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];
pub const MAX_PAGE_SIZE: i64 = 100;

/// 分頁計算結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Self {
            page,
            limit,
            offset: (page - 1) * limit,
        }
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total > 0 {
            (total + self.limit - 1) / self.limit
        } else {
            0
        }
    }
}

/// 回報的協調層：驗證、照片檔案處理，以及查無資料時的 NotFound
pub struct ReportService<S: Storage> {
    repo: Arc<dyn ReportRepository>,
    storage: S,
}

impl<S: Storage + Clone> Clone for ReportService<S> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            storage: self.storage.clone(),
        }
    }
}

impl<S: Storage> ReportService<S> {
    pub fn new(repo: Arc<dyn ReportRepository>, storage: S) -> Self {
        Self { repo, storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 儲存上傳照片並回傳公開 URL。副檔名不符或寫入失敗時回傳 None。
    async fn save_photo(&self, photo: &PhotoUpload) -> Option<String> {
        if photo.filename.is_empty() {
            return None;
        }

        let extension =
            match validate_file_extension("photo", &photo.filename, VALID_IMAGE_EXTENSIONS) {
                Ok(ext) => ext,
                Err(e) => {
                    tracing::warn!("⚠️ Photo '{}' not saved: {}", photo.filename, e);
                    return None;
                }
            };

        let file_name = unique_file_name(&extension);
        match self.storage.write_file(&file_name, &photo.data).await {
            Ok(()) => {
                tracing::info!("📁 Photo '{}' saved as {}", photo.filename, file_name);
                Some(public_url(&file_name))
            }
            Err(e) => {
                tracing::error!("❌ Failed to save photo '{}': {}", photo.filename, e);
                None
            }
        }
    }

    async fn delete_photo(&self, photo_url: &str) {
        let Some(file_name) = file_name_from_url(photo_url) else {
            tracing::warn!("Invalid photo_url, not deleting: {}", photo_url);
            return;
        };

        match self.storage.delete_file(file_name).await {
            Ok(true) => tracing::info!("🗑️ Photo {} deleted", file_name),
            Ok(false) => tracing::debug!("Photo {} already gone", file_name),
            Err(e) => tracing::error!("❌ Failed to delete photo {}: {}", file_name, e),
        }
    }

    pub async fn create_report(
        &self,
        report: NewReport,
        photo: Option<PhotoUpload>,
    ) -> Result<Report> {
        report.validate()?;
        tracing::info!("Creating report of type '{}'", report.damage_type);

        let mut photo_url = None;
        if let Some(photo) = &photo {
            photo_url = self.save_photo(photo).await;
            if photo_url.is_none() && !photo.filename.is_empty() {
                tracing::warn!(
                    "⚠️ Photo '{}' could not be stored, report will be created without it",
                    photo.filename
                );
            }
        }

        let created = self.repo.create(&report, photo_url.as_deref()).await?;
        tracing::info!("✅ Report {} created", created.id);
        Ok(created)
    }

    /// 已有照片 URL (例如偵測結果影像) 時直接建立回報
    pub async fn create_report_with_photo_url(
        &self,
        report: NewReport,
        photo_url: &str,
    ) -> Result<Report> {
        report.validate()?;
        let created = self.repo.create(&report, Some(photo_url)).await?;
        tracing::info!("✅ Report {} created with photo {}", created.id, photo_url);
        Ok(created)
    }

    pub async fn get_report(&self, id: i64) -> Result<Report> {
        tracing::debug!("Looking up report {}", id);
        self.repo.get(id).await?.ok_or_else(|| {
            tracing::info!("Report {} not found", id);
            ReporterError::NotFound { id }
        })
    }

    pub async fn list_reports(&self, page: i64, limit: i64) -> Result<ReportPage> {
        let pagination = Pagination::new(page, limit);
        tracing::debug!(
            "Listing reports page={} limit={}",
            pagination.page,
            pagination.limit
        );

        let reports = self.repo.list(pagination.offset, pagination.limit).await?;
        let total_reports = self.repo.count().await?;

        Ok(ReportPage {
            total_reports,
            reports,
            current_page: pagination.page,
            total_pages: pagination.total_pages(total_reports),
        })
    }

    pub async fn update_report(
        &self,
        id: i64,
        update: ReportUpdate,
        new_photo: Option<PhotoUpload>,
    ) -> Result<Report> {
        let mut report = self.get_report(id).await?;
        update.validate()?;
        tracing::info!("Updating report {}", id);

        report.apply(&update);

        let old_photo_url = report.photo_url.clone();
        let mut replaced_photo = false;
        if let Some(photo) = &new_photo {
            match self.save_photo(photo).await {
                Some(new_url) => {
                    report.photo_url = Some(new_url);
                    replaced_photo = true;
                }
                None if !photo.filename.is_empty() => tracing::warn!(
                    "⚠️ New photo '{}' could not be stored, keeping the existing one",
                    photo.filename
                ),
                None => {}
            }
        }

        let updated = self.repo.update(&report).await?.ok_or_else(|| {
            tracing::error!("Report {} disappeared during update", id);
            ReporterError::NotFound { id }
        })?;

        // 新照片成功寫入資料庫後才刪除舊檔
        if replaced_photo {
            if let Some(old_url) = old_photo_url {
                self.delete_photo(&old_url).await;
            }
        }

        Ok(updated)
    }

    pub async fn delete_report(&self, id: i64) -> Result<()> {
        self.get_report(id).await?;
        tracing::info!("Deleting report {}", id);

        let deleted = self
            .repo
            .delete(id)
            .await?
            .ok_or(ReporterError::NotFound { id })?;

        if let Some(photo_url) = &deleted.photo_url {
            self.delete_photo(photo_url).await;
        }
        tracing::info!("🗑️ Report {} deleted", id);
        Ok(())
    }

    /// `/health` 用的資料庫狀態字串
    pub async fn database_status(&self) -> String {
        match self.repo.ping().await {
            Ok(()) => "healthy".to_string(),
            Err(e) => format!("unhealthy: {}", e),
        }
    }
}
