use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::import_error::{ErrorPhase, ImportError};
use crate::domain::entity::raw_values::RawValues;
use crate::domain::repository::ImportErrorRepository;
use crate::domain::value_object::PageRequest;

const ERROR_COLUMNS: &str = "id, job_id, row_index, field, message, phase, \
     raw_row_snapshot::text AS raw_row_snapshot, created_at";

/// ImportErrorPostgresRepository は PostgreSQL 実装のエラーリポジトリ。
/// 同一行内の順序は挿入順（seq）で保つ。
pub struct ImportErrorPostgresRepository {
    pool: PgPool,
}

impl ImportErrorPostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportErrorRepository for ImportErrorPostgresRepository {
    async fn insert(&self, errors: &[ImportError]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for error in errors {
            sqlx::query(
                r#"
                INSERT INTO catalog_import.import_errors
                    (id, job_id, row_index, field, message, phase, raw_row_snapshot, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7::json, $8)
                "#,
            )
            .bind(error.id)
            .bind(error.job_id)
            .bind(error.row_index)
            .bind(&error.field)
            .bind(&error.message)
            .bind(error.phase.to_string())
            .bind(serde_json::to_string(&error.raw_row_snapshot)?)
            .bind(error.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list(
        &self,
        job_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<ImportError>, u64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM catalog_import.import_errors WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {ERROR_COLUMNS} FROM catalog_import.import_errors \
             WHERE job_id = $1 ORDER BY row_index, seq LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ImportErrorRow>(&sql)
            .bind(job_id)
            .bind(i64::from(page.limit))
            .bind(i64::try_from(page.offset)?)
            .fetch_all(&self.pool)
            .await?;
        let errors = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<ImportError>>>()?;
        Ok((errors, u64::try_from(total)?))
    }

    async fn list_all(&self, job_id: Uuid) -> anyhow::Result<Vec<ImportError>> {
        let sql = format!(
            "SELECT {ERROR_COLUMNS} FROM catalog_import.import_errors \
             WHERE job_id = $1 ORDER BY row_index, seq"
        );
        let rows = sqlx::query_as::<_, ImportErrorRow>(&sql)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_for_job(&self, job_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM catalog_import.import_errors WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ImportErrorRow {
    id: Uuid,
    job_id: Uuid,
    row_index: i64,
    field: Option<String>,
    message: String,
    phase: String,
    raw_row_snapshot: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ImportErrorRow> for ImportError {
    type Error = anyhow::Error;

    fn try_from(row: ImportErrorRow) -> anyhow::Result<Self> {
        Ok(ImportError {
            id: row.id,
            job_id: row.job_id,
            row_index: row.row_index,
            field: row.field,
            message: row.message,
            phase: ErrorPhase::from_str_value(&row.phase)?,
            raw_row_snapshot: serde_json::from_str::<RawValues>(&row.raw_row_snapshot)?,
            created_at: row.created_at,
        })
    }
}
