use crate::domain::model::{NewReport, Report};
use crate::domain::ports::ReportRepository;
use crate::utils::error::{ReporterError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS damage_reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        damage_type VARCHAR(100) NOT NULL,
        severity TEXT NOT NULL DEFAULT 'medium',
        description VARCHAR(500),
        status TEXT NOT NULL DEFAULT 'pending',
        photo_url VARCHAR(255),
        date_reported TEXT NOT NULL DEFAULT (date('now'))
    )"#,
    "CREATE INDEX IF NOT EXISTS ix_damage_reports_damage_type ON damage_reports (damage_type)",
];

const SELECT_COLUMNS: &str =
    "id, lat, lng, damage_type, severity, description, status, photo_url, date_reported";

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    lat: f64,
    lng: f64,
    damage_type: String,
    severity: String,
    description: Option<String>,
    status: String,
    photo_url: Option<String>,
    date_reported: String,
}

impl TryFrom<ReportRow> for Report {
    type Error = ReporterError;

    fn try_from(row: ReportRow) -> Result<Self> {
        let date_reported = NaiveDate::parse_from_str(&row.date_reported, "%Y-%m-%d")
            .map_err(|e| ReporterError::StorageError {
                message: format!(
                    "Report {} has invalid date_reported '{}': {}",
                    row.id, row.date_reported, e
                ),
            })?;

        Ok(Report {
            id: row.id,
            lat: row.lat,
            lng: row.lng,
            damage_type: row.damage_type,
            severity: row.severity.parse()?,
            description: row.description,
            status: row.status.parse()?,
            photo_url: row.photo_url,
            date_reported,
        })
    }
}

/// `damage_reports` 資料表的 SQLite 實作
#[derive(Debug, Clone)]
pub struct SqliteReportRepository {
    pool: SqlitePool,
}

impl SqliteReportRepository {
    /// 連線並建立資料表。`sqlite::memory:` 只使用單一連線，避免每個連線各自一個資料庫。
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let in_memory = database_url.contains(":memory:");

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let repo = Self { pool };
        repo.migrate().await?;

        tracing::info!("🗄️ Database ready at {}", redact_url(database_url));
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch(&self, id: i64) -> Result<Option<Report>> {
        let sql = format!("SELECT {} FROM damage_reports WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Report::try_from).transpose()
    }
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn create(&self, report: &NewReport, photo_url: Option<&str>) -> Result<Report> {
        let id = sqlx::query(
            "INSERT INTO damage_reports (lat, lng, damage_type, severity, description, photo_url) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(report.lat)
        .bind(report.lng)
        .bind(&report.damage_type)
        .bind(report.severity.as_str())
        .bind(report.description.as_deref())
        .bind(photo_url)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        tracing::debug!("Inserted report {} ({})", id, report.damage_type);
        self.fetch(id).await?.ok_or_else(|| ReporterError::StorageError {
            message: format!("Report {} vanished right after insert", id),
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Report>> {
        self.fetch(id).await
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Report>> {
        let sql = format!(
            "SELECT {} FROM damage_reports ORDER BY id DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            "Fetched {} reports (offset={}, limit={})",
            rows.len(),
            offset,
            limit
        );
        rows.into_iter().map(Report::try_from).collect()
    }

    async fn count(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(id) FROM damage_reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn update(&self, report: &Report) -> Result<Option<Report>> {
        let affected = sqlx::query(
            "UPDATE damage_reports SET lat = ?, lng = ?, damage_type = ?, severity = ?, \
             description = ?, status = ?, photo_url = ? WHERE id = ?",
        )
        .bind(report.lat)
        .bind(report.lng)
        .bind(&report.damage_type)
        .bind(report.severity.as_str())
        .bind(report.description.as_deref())
        .bind(report.status.as_str())
        .bind(report.photo_url.as_deref())
        .bind(report.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Ok(None);
        }
        self.fetch(report.id).await
    }

    async fn delete(&self, id: i64) -> Result<Option<Report>> {
        let Some(existing) = self.fetch(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM damage_reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(existing))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// 日誌中只顯示 URL 開頭，避免洩漏憑證
fn redact_url(url: &str) -> String {
    let prefix: String = url.chars().take(20).collect();
    if prefix.len() < url.len() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}
