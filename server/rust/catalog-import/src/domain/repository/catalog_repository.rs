use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entity::catalog_entity::{CatalogEntity, EntityData};
use crate::domain::value_object::EntityType;

/// CatalogRepository はブランド固有エンティティと共有タクソノミーへのアクセスを提供する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// ブランドが所有する全エンティティ。
    async fn list_brand_entities(&self, brand_id: Uuid) -> anyhow::Result<Vec<CatalogEntity>>;

    /// 全ブランド共通のタクソノミー。
    async fn list_taxonomy(&self) -> anyhow::Result<Vec<CatalogEntity>>;

    /// ブランドから参照可能なエンティティ（自ブランド所有またはタクソノミー）を ID で検索する。
    async fn find_entity(
        &self,
        brand_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> anyhow::Result<Option<CatalogEntity>>;

    /// ブランド所有エンティティを名前（大文字小文字無視）で検索する。
    async fn find_by_name(
        &self,
        brand_id: Uuid,
        entity_type: EntityType,
        name: &str,
    ) -> anyhow::Result<Option<CatalogEntity>>;

    /// ブランド所有エンティティを新規作成する。
    async fn create_entity(&self, brand_id: Uuid, data: &EntityData)
        -> anyhow::Result<CatalogEntity>;
}
