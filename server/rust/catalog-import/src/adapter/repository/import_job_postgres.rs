use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::import_job::{ImportJob, ImportJobStatus, JobProgress};
use crate::domain::repository::ImportJobRepository;

const JOB_COLUMNS: &str = "id, brand_id, file_id, filename, status, total_rows, processed_rows, \
     created_rows, updated_rows, failed_rows, error_summary, created_at, updated_at";

/// ImportJobPostgresRepository は PostgreSQL 実装のジョブリポジトリ。
pub struct ImportJobPostgresRepository {
    pool: PgPool,
}

impl ImportJobPostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_strings(statuses: &[ImportJobStatus]) -> Vec<String> {
    statuses.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl ImportJobRepository for ImportJobPostgresRepository {
    async fn create(&self, job: &ImportJob) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_import.import_jobs
                (id, brand_id, file_id, filename, status, total_rows, processed_rows,
                 created_rows, updated_rows, failed_rows, error_summary, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(job.id)
        .bind(job.brand_id)
        .bind(&job.file_id)
        .bind(&job.filename)
        .bind(job.status.to_string())
        .bind(job.total_rows)
        .bind(job.processed_rows)
        .bind(job.created_rows)
        .bind(job.updated_rows)
        .bind(job.failed_rows)
        .bind(&job.error_summary)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, job_id: Uuid) -> anyhow::Result<Option<ImportJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM catalog_import.import_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, ImportJobRow>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_for_brand(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
    ) -> anyhow::Result<Option<ImportJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM catalog_import.import_jobs WHERE id = $1 AND brand_id = $2"
        );
        let row = sqlx::query_as::<_, ImportJobRow>(&sql)
            .bind(job_id)
            .bind(brand_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn transition(
        &self,
        job_id: Uuid,
        from: &[ImportJobStatus],
        to: ImportJobStatus,
        error_summary: Option<String>,
    ) -> anyhow::Result<Option<ImportJob>> {
        let allowed: Vec<ImportJobStatus> = from
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(to))
            .collect();
        if allowed.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "UPDATE catalog_import.import_jobs \
             SET status = $3, error_summary = COALESCE($4, error_summary), updated_at = NOW() \
             WHERE id = $1 AND status = ANY($2) \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ImportJobRow>(&sql)
            .bind(job_id)
            .bind(status_strings(&allowed))
            .bind(to.to_string())
            .bind(error_summary)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_progress(&self, job_id: Uuid, progress: &JobProgress) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE catalog_import.import_jobs
            SET total_rows = $2, processed_rows = LEAST($3, $2), created_rows = $4,
                updated_rows = $5, failed_rows = $6, updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')
            "#,
        )
        .bind(job_id)
        .bind(progress.total_rows)
        .bind(progress.processed_rows)
        .bind(progress.created_rows)
        .bind(progress.updated_rows)
        .bind(progress.failed_rows)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_statuses(
        &self,
        statuses: &[ImportJobStatus],
    ) -> anyhow::Result<Vec<ImportJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM catalog_import.import_jobs \
             WHERE status = ANY($1) ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, ImportJobRow>(&sql)
            .bind(status_strings(statuses))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_stalled(
        &self,
        statuses: &[ImportJobStatus],
        before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ImportJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM catalog_import.import_jobs \
             WHERE status = ANY($1) AND updated_at < $2 ORDER BY updated_at"
        );
        let rows = sqlx::query_as::<_, ImportJobRow>(&sql)
            .bind(status_strings(statuses))
            .bind(before)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// ImportJobRow はDB行からのマッピング用。
#[derive(sqlx::FromRow)]
struct ImportJobRow {
    id: Uuid,
    brand_id: Uuid,
    file_id: String,
    filename: String,
    status: String,
    total_rows: i64,
    processed_rows: i64,
    created_rows: i64,
    updated_rows: i64,
    failed_rows: i64,
    error_summary: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ImportJobRow> for ImportJob {
    type Error = anyhow::Error;

    fn try_from(row: ImportJobRow) -> anyhow::Result<Self> {
        Ok(ImportJob {
            id: row.id,
            brand_id: row.brand_id,
            file_id: row.file_id,
            filename: row.filename,
            status: ImportJobStatus::from_str_value(&row.status)?,
            total_rows: row.total_rows,
            processed_rows: row.processed_rows,
            created_rows: row.created_rows,
            updated_rows: row.updated_rows,
            failed_rows: row.failed_rows,
            error_summary: row.error_summary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
