use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::product_payload::ProductPayload;
use crate::domain::entity::raw_values::RawValues;
use crate::domain::entity::staging_row::{
    EntityReference, FieldError, ResolutionStatus, StagingRow,
};
use crate::domain::entity::unmapped_value::{UnmappedKey, UnmappedValue};
use crate::domain::repository::{ResolutionCounts, StagingRepository};
use crate::domain::value_object::{EntityType, PageRequest};

const ROW_COLUMNS: &str = "job_id, row_index, raw_values::text AS raw_values, normalized_payload, \
     validation_errors, entity_refs, resolution_status";

/// StagingPostgresRepository は PostgreSQL 実装のステージングリポジトリ。
pub struct StagingPostgresRepository {
    pool: PgPool,
}

impl StagingPostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StagingRepository for StagingPostgresRepository {
    async fn insert_rows(&self, rows: &[StagingRow]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO catalog_import.staging_rows
                    (job_id, row_index, raw_values, normalized_payload, validation_errors,
                     entity_refs, resolution_status)
                VALUES ($1, $2, $3::json, $4, $5, $6, $7)
                ON CONFLICT (job_id, row_index) DO UPDATE
                SET raw_values = EXCLUDED.raw_values,
                    normalized_payload = EXCLUDED.normalized_payload,
                    validation_errors = EXCLUDED.validation_errors,
                    entity_refs = EXCLUDED.entity_refs,
                    resolution_status = EXCLUDED.resolution_status
                "#,
            )
            .bind(row.job_id)
            .bind(row.row_index)
            .bind(serde_json::to_string(&row.raw_values)?)
            .bind(row.normalized_payload.as_ref().map(Json))
            .bind(Json(&row.validation_errors))
            .bind(Json(&row.references))
            .bind(row.resolution_status.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_rows(
        &self,
        job_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<StagingRow>, u64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM catalog_import.staging_rows WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM catalog_import.staging_rows \
             WHERE job_id = $1 ORDER BY row_index LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, StagingRowRecord>(&sql)
            .bind(job_id)
            .bind(i64::from(page.limit))
            .bind(i64::try_from(page.offset)?)
            .fetch_all(&self.pool)
            .await?;
        let rows = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<StagingRow>>>()?;
        Ok((rows, u64::try_from(total)?))
    }

    async fn count_by_status(&self, job_id: Uuid) -> anyhow::Result<ResolutionCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT resolution_status, COUNT(*)
            FROM catalog_import.staging_rows
            WHERE job_id = $1
            GROUP BY resolution_status
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ResolutionCounts::default();
        for (status, count) in rows {
            let count = u64::try_from(count)?;
            match ResolutionStatus::from_str_value(&status)? {
                ResolutionStatus::Resolved => counts.resolved = count,
                ResolutionStatus::Unmapped => counts.unmapped = count,
                ResolutionStatus::Blocked => counts.blocked = count,
            }
        }
        Ok(counts)
    }

    async fn merge_unmapped(&self, job_id: Uuid, values: &[UnmappedValue]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for value in values {
            sqlx::query(
                r#"
                INSERT INTO catalog_import.unmapped_values
                    (job_id, entity_type, source_column, raw_value, affected_row_count)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (job_id, entity_type, source_column, raw_value) DO UPDATE
                SET affected_row_count =
                    catalog_import.unmapped_values.affected_row_count + EXCLUDED.affected_row_count
                "#,
            )
            .bind(job_id)
            .bind(value.entity_type.as_str())
            .bind(&value.source_column)
            .bind(&value.raw_value)
            .bind(value.affected_row_count)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_unmapped(&self, job_id: Uuid) -> anyhow::Result<Vec<UnmappedValue>> {
        let rows = sqlx::query_as::<_, UnmappedValueRow>(
            r#"
            SELECT job_id, entity_type, source_column, raw_value, affected_row_count
            FROM catalog_import.unmapped_values
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        let mut values = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<UnmappedValue>>>()?;
        // EntityType の宣言順で並べるためアプリケーション側でソートする
        values.sort_by_key(UnmappedValue::key);
        Ok(values)
    }

    async fn find_unmapped(
        &self,
        job_id: Uuid,
        key: &UnmappedKey,
    ) -> anyhow::Result<Option<UnmappedValue>> {
        let row = sqlx::query_as::<_, UnmappedValueRow>(
            r#"
            SELECT job_id, entity_type, source_column, raw_value, affected_row_count
            FROM catalog_import.unmapped_values
            WHERE job_id = $1 AND entity_type = $2 AND source_column = $3 AND raw_value = $4
            "#,
        )
        .bind(job_id)
        .bind(key.entity_type.as_str())
        .bind(&key.source_column)
        .bind(&key.raw_value)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn apply_resolution(
        &self,
        job_id: Uuid,
        key: &UnmappedKey,
        entity_id: Uuid,
    ) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM catalog_import.staging_rows \
             WHERE job_id = $1 AND resolution_status = 'UNMAPPED' \
             ORDER BY row_index FOR UPDATE"
        );
        let candidates = sqlx::query_as::<_, StagingRowRecord>(&sql)
            .bind(job_id)
            .fetch_all(&mut *tx)
            .await?;

        let mut updated = 0;
        for record in candidates {
            let mut row: StagingRow = record.try_into()?;
            if !row.apply_resolution(key, entity_id) {
                continue;
            }
            sqlx::query(
                r#"
                UPDATE catalog_import.staging_rows
                SET entity_refs = $3, resolution_status = $4
                WHERE job_id = $1 AND row_index = $2
                "#,
            )
            .bind(job_id)
            .bind(row.row_index)
            .bind(Json(&row.references))
            .bind(row.resolution_status.to_string())
            .execute(&mut *tx)
            .await?;
            updated += 1;
        }

        sqlx::query(
            r#"
            DELETE FROM catalog_import.unmapped_values
            WHERE job_id = $1 AND entity_type = $2 AND source_column = $3 AND raw_value = $4
            "#,
        )
        .bind(job_id)
        .bind(key.entity_type.as_str())
        .bind(&key.source_column)
        .bind(&key.raw_value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn purge(&self, job_id: Uuid) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM catalog_import.staging_rows WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM catalog_import.unmapped_values WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// StagingRowRecord はDB行からのマッピング用。
#[derive(sqlx::FromRow)]
struct StagingRowRecord {
    job_id: Uuid,
    row_index: i64,
    raw_values: String,
    normalized_payload: Option<Json<ProductPayload>>,
    validation_errors: Json<Vec<FieldError>>,
    entity_refs: Json<Vec<EntityReference>>,
    resolution_status: String,
}

impl TryFrom<StagingRowRecord> for StagingRow {
    type Error = anyhow::Error;

    fn try_from(record: StagingRowRecord) -> anyhow::Result<Self> {
        Ok(StagingRow {
            job_id: record.job_id,
            row_index: record.row_index,
            raw_values: serde_json::from_str::<RawValues>(&record.raw_values)?,
            normalized_payload: record.normalized_payload.map(|p| p.0),
            validation_errors: record.validation_errors.0,
            references: record.entity_refs.0,
            resolution_status: ResolutionStatus::from_str_value(&record.resolution_status)?,
        })
    }
}

/// UnmappedValueRow はDB行からのマッピング用。
#[derive(sqlx::FromRow)]
struct UnmappedValueRow {
    job_id: Uuid,
    entity_type: String,
    source_column: String,
    raw_value: String,
    affected_row_count: i64,
}

impl TryFrom<UnmappedValueRow> for UnmappedValue {
    type Error = anyhow::Error;

    fn try_from(row: UnmappedValueRow) -> anyhow::Result<Self> {
        Ok(UnmappedValue {
            job_id: row.job_id,
            entity_type: EntityType::from_str_value(&row.entity_type)?,
            source_column: row.source_column,
            raw_value: row.raw_value,
            affected_row_count: row.affected_row_count,
        })
    }
}
