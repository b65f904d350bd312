use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::catalog_entity::{CatalogEntity, EntityData};
use crate::domain::repository::CatalogRepository;
use crate::domain::value_object::EntityType;

/// CatalogPostgresRepository は catalog.entities を参照・作成する。
pub struct CatalogPostgresRepository {
    pool: PgPool,
}

impl CatalogPostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for CatalogPostgresRepository {
    async fn list_brand_entities(&self, brand_id: Uuid) -> anyhow::Result<Vec<CatalogEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, brand_id, entity_type, name, attributes
            FROM catalog.entities
            WHERE brand_id = $1
            ORDER BY entity_type, name
            "#,
        )
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_taxonomy(&self) -> anyhow::Result<Vec<CatalogEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, brand_id, entity_type, name, attributes
            FROM catalog.entities
            WHERE brand_id IS NULL
            ORDER BY entity_type, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_entity(
        &self,
        brand_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> anyhow::Result<Option<CatalogEntity>> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, brand_id, entity_type, name, attributes
            FROM catalog.entities
            WHERE id = $1 AND entity_type = $2 AND (brand_id IS NULL OR brand_id = $3)
            "#,
        )
        .bind(entity_id)
        .bind(entity_type.as_str())
        .bind(brand_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_name(
        &self,
        brand_id: Uuid,
        entity_type: EntityType,
        name: &str,
    ) -> anyhow::Result<Option<CatalogEntity>> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, brand_id, entity_type, name, attributes
            FROM catalog.entities
            WHERE brand_id = $1 AND entity_type = $2 AND lower(name) = lower($3)
            "#,
        )
        .bind(brand_id)
        .bind(entity_type.as_str())
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn create_entity(
        &self,
        brand_id: Uuid,
        data: &EntityData,
    ) -> anyhow::Result<CatalogEntity> {
        let name = data
            .display_name()
            .ok_or_else(|| anyhow::anyhow!("{} entities cannot be created", data.entity_type()))?;
        let mut entity = CatalogEntity::brand_owned(brand_id, data.entity_type(), name.trim());
        entity.attributes = data.attributes();

        sqlx::query(
            r#"
            INSERT INTO catalog.entities (id, brand_id, entity_type, name, attributes)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entity.id)
        .bind(brand_id)
        .bind(entity.entity_type.as_str())
        .bind(&entity.name)
        .bind(&entity.attributes)
        .execute(&self.pool)
        .await?;
        Ok(entity)
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    brand_id: Option<Uuid>,
    entity_type: String,
    name: String,
    attributes: serde_json::Value,
}

impl TryFrom<EntityRow> for CatalogEntity {
    type Error = anyhow::Error;

    fn try_from(row: EntityRow) -> anyhow::Result<Self> {
        Ok(CatalogEntity {
            id: row.id,
            brand_id: row.brand_id,
            entity_type: EntityType::from_str_value(&row.entity_type)?,
            name: row.name,
            attributes: row.attributes,
        })
    }
}
