use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::product_command::ProductCommand;
use crate::domain::repository::{BatchWriteError, ProductCatalogWriter, RowWriteOutcome, WriteKind};

const UNIQUE_VIOLATION: &str = "23505";

/// ProductCatalogPostgresWriter は1バッチを1トランザクションで商品カタログへ upsert する。
pub struct ProductCatalogPostgresWriter {
    pool: PgPool,
}

impl ProductCatalogPostgresWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_row(
        tx: &mut Transaction<'_, Postgres>,
        brand_id: Uuid,
        command: &ProductCommand,
    ) -> Result<WriteKind, BatchWriteError> {
        if let Some(sku) = &command.sku {
            let owner: Option<String> = sqlx::query_scalar(
                r#"
                SELECT p.product_key
                FROM catalog.product_variants v
                JOIN catalog.products p ON p.id = v.product_id
                WHERE v.brand_id = $1 AND v.sku = $2
                "#,
            )
            .bind(brand_id)
            .bind(sku)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| classify(e, command.row_index))?;
            if let Some(owner) = owner.filter(|o| *o != command.product_key) {
                return Err(BatchWriteError::RowRejected {
                    row_index: command.row_index,
                    message: format!("sku {sku} already belongs to product {owner}"),
                });
            }
        }

        let (product_id, inserted): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO catalog.products (id, brand_id, product_key, name, description, attributes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (brand_id, product_key) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                attributes = EXCLUDED.attributes,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(brand_id)
        .bind(&command.product_key)
        .bind(&command.name)
        .bind(&command.description)
        .bind(Json(&command.attributes))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| classify(e, command.row_index))?;

        if let Some(sku) = &command.sku {
            sqlx::query(
                r#"
                INSERT INTO catalog.product_variants (brand_id, sku, product_id, attributes)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (brand_id, sku) DO UPDATE
                SET attributes = EXCLUDED.attributes, updated_at = NOW()
                "#,
            )
            .bind(brand_id)
            .bind(sku)
            .bind(product_id)
            .bind(Json(&command.variant))
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, command.row_index))?;
        }

        Ok(if inserted {
            WriteKind::Created
        } else {
            WriteKind::Updated
        })
    }
}

/// sqlx のエラーを行拒否・帰属不明・システム障害へ分類する。
fn classify(err: sqlx::Error, row_index: i64) -> BatchWriteError {
    if let sqlx::Error::Database(db) = &err {
        return if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            BatchWriteError::RowRejected {
                row_index,
                message: db.message().to_string(),
            }
        } else {
            BatchWriteError::Unattributed(db.message().to_string())
        };
    }
    if matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
    ) {
        BatchWriteError::Systemic(err.into())
    } else {
        BatchWriteError::Unattributed(err.to_string())
    }
}

#[async_trait]
impl ProductCatalogWriter for ProductCatalogPostgresWriter {
    async fn apply_batch(
        &self,
        brand_id: Uuid,
        commands: &[ProductCommand],
    ) -> Result<Vec<RowWriteOutcome>, BatchWriteError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BatchWriteError::Systemic(e.into()))?;
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            // エラー時は tx のドロップでロールバックされる
            let kind = Self::write_row(&mut tx, brand_id, command).await?;
            outcomes.push(RowWriteOutcome {
                row_index: command.row_index,
                kind,
            });
        }
        tx.commit()
            .await
            .map_err(|e| BatchWriteError::Systemic(e.into()))?;
        Ok(outcomes)
    }
}
