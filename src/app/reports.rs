use super::{ApiError, ApiResult, AppState};
use crate::core::report_service::MAX_PAGE_SIZE;
use crate::core::{NewReport, PhotoUpload, Report, ReportPage, ReportUpdate};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reports", get(list_reports).post(create_report))
        .route("/api/reports/", get(list_reports).post(create_report))
        .route(
            "/api/reports/:id",
            get(get_report).put(update_report).delete(delete_report),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

/// multipart 表單：文字欄位與 (可選的) 照片
#[derive(Debug, Default)]
struct ReportForm {
    fields: HashMap<String, String>,
    photo: Option<PhotoUpload>,
}

impl ReportForm {
    async fn read(multipart: Multipart, photo_field: &str) -> ApiResult<Self> {
        read_form(multipart, photo_field)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))
    }

    /// 空字串視為未提供
    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn optional<T>(&self, name: &str) -> ApiResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text(name)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    ApiError::unprocessable(format!("Invalid value for '{}': {}", name, e))
                })
            })
            .transpose()
    }

    fn required<T>(&self, name: &str) -> ApiResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(name)?
            .ok_or_else(|| ApiError::unprocessable(format!("Field required: {}", name)))
    }

    fn new_report(&self) -> ApiResult<NewReport> {
        Ok(NewReport {
            lat: self.required("lat")?,
            lng: self.required("lng")?,
            damage_type: self.required("type")?,
            severity: self.required("severity")?,
            description: self.optional("description")?,
        })
    }

    fn update(&self) -> ApiResult<ReportUpdate> {
        Ok(ReportUpdate {
            lat: self.optional("lat")?,
            lng: self.optional("lng")?,
            damage_type: self.optional("type")?,
            severity: self.optional("severity")?,
            description: self.optional("description")?,
            status: self.optional("status")?,
        })
    }
}

async fn read_form(
    mut multipart: Multipart,
    photo_field: &str,
) -> std::result::Result<ReportForm, MultipartError> {
    let mut form = ReportForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == photo_field {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            // 瀏覽器未選檔案時仍會送出空的檔案欄位
            if !filename.is_empty() && !data.is_empty() {
                form.photo = Some(PhotoUpload {
                    filename,
                    data: data.to_vec(),
                });
            }
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

fn multipart_body(
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> ApiResult<Multipart> {
    multipart.map_err(|e| ApiError::unprocessable(e.body_text()))
}

async fn create_report(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let form = ReportForm::read(multipart_body(multipart)?, "photo").await?;
    let report = form.new_report()?;
    let created = state.reports.create_report(report, form.photo).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_reports(
    State(state): State<AppState>,
    params: std::result::Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<ReportPage>> {
    let Query(params) = params.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    if params.page < 1 {
        return Err(ApiError::unprocessable("page must be greater than or equal to 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&params.limit) {
        return Err(ApiError::unprocessable(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let page = state.reports.list_reports(params.page, params.limit).await?;
    Ok(Json(page))
}

/// 非整數的 id 與其他無法解析的值一樣回應 422
fn report_id(path: std::result::Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    let Path(id) = path.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    Ok(id)
}

async fn get_report(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Report>> {
    let id = report_id(path)?;
    Ok(Json(state.reports.get_report(id).await?))
}

async fn update_report(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Report>> {
    let id = report_id(path)?;
    let form = ReportForm::read(multipart_body(multipart)?, "new_photo").await?;
    let update = form.update()?;
    let updated = state.reports.update_report(id, update, form.photo).await?;
    Ok(Json(updated))
}

async fn delete_report(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = report_id(path)?;
    state.reports.delete_report(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
