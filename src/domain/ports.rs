use crate::domain::model::{Detection, NewReport, Report};
use crate::utils::error::Result;
use async_trait::async_trait;
use image::DynamicImage;

/// 以相對路徑存取檔案的儲存後端 (上傳照片、偵測結果影像、GPS 紀錄)
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 回傳檔案是否真的存在並被刪除
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, report: &NewReport, photo_url: Option<&str>) -> Result<Report>;
    async fn get(&self, id: i64) -> Result<Option<Report>>;
    /// 依 id 由新到舊排序
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Report>>;
    async fn count(&self) -> Result<i64>;
    async fn update(&self, report: &Report) -> Result<Option<Report>>;
    async fn delete(&self, id: i64) -> Result<Option<Report>>;
    async fn ping(&self) -> Result<()>;
}

/// 外部物件偵測模型 (NanoDet)。輸入為 JPEG 影像。
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn inference(&self, jpeg: &[u8]) -> Result<Vec<Detection>>;
}

pub trait FrameSource {
    /// `Ok(None)` 表示串流結束
    fn read_frame(&mut self) -> Result<Option<DynamicImage>>;
}

pub trait CameraOpener: Send + Sync {
    fn open(&self, device: i32) -> Result<Box<dyn FrameSource>>;
}
