use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entity::catalog_entity::{CatalogEntity, EntityData};
use crate::domain::repository::CatalogRepository;
use crate::domain::value_object::EntityType;

/// InMemoryCatalogRepository はブランドエンティティとタクソノミーのインメモリ実装。
pub struct InMemoryCatalogRepository {
    entities: RwLock<Vec<CatalogEntity>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(Vec::new()),
        }
    }

    /// エンティティを登録する（ブランド所有・タクソノミーとも）。
    pub async fn seed(&self, entity: CatalogEntity) -> Uuid {
        let id = entity.id;
        self.entities.write().await.push(entity);
        id
    }
}

impl Default for InMemoryCatalogRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_brand_entities(&self, brand_id: Uuid) -> anyhow::Result<Vec<CatalogEntity>> {
        Ok(self
            .entities
            .read()
            .await
            .iter()
            .filter(|e| e.brand_id == Some(brand_id))
            .cloned()
            .collect())
    }

    async fn list_taxonomy(&self) -> anyhow::Result<Vec<CatalogEntity>> {
        Ok(self
            .entities
            .read()
            .await
            .iter()
            .filter(|e| e.is_taxonomy())
            .cloned()
            .collect())
    }

    async fn find_entity(
        &self,
        brand_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> anyhow::Result<Option<CatalogEntity>> {
        Ok(self
            .entities
            .read()
            .await
            .iter()
            .find(|e| {
                e.id == entity_id
                    && e.entity_type == entity_type
                    && (e.is_taxonomy() || e.brand_id == Some(brand_id))
            })
            .cloned())
    }

    async fn find_by_name(
        &self,
        brand_id: Uuid,
        entity_type: EntityType,
        name: &str,
    ) -> anyhow::Result<Option<CatalogEntity>> {
        let name = name.trim().to_lowercase();
        Ok(self
            .entities
            .read()
            .await
            .iter()
            .find(|e| {
                e.brand_id == Some(brand_id)
                    && e.entity_type == entity_type
                    && e.name.to_lowercase() == name
            })
            .cloned())
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
        self.entities.write().await.push(entity.clone());
        Ok(entity)
    }
}
