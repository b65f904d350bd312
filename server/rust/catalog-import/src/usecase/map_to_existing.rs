use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::error::UseCaseError;
use super::resolution_support::{
    apply_resolution, ensure_unmapped, resolvable_job, ResolutionResult,
};
use crate::domain::entity::unmapped_value::UnmappedKey;
use crate::domain::repository::{CatalogRepository, ImportJobRepository, StagingRepository};
use crate::domain::value_object::EntityType;

/// MapToExistingInput は未解決値を既存エンティティへ紐付ける要求。
#[derive(Debug, Clone, Deserialize)]
pub struct MapToExistingInput {
    pub entity_type: EntityType,
    pub raw_value: String,
    pub source_column: String,
    pub entity_id: Uuid,
}

/// MapToExistingUseCase は未解決値をブランドのエンティティまたはタクソノミーへ紐付ける。
pub struct MapToExistingUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl MapToExistingUseCase {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        staging: Arc<dyn StagingRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            jobs,
            staging,
            catalog,
        }
    }

    pub async fn execute(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
        input: MapToExistingInput,
    ) -> Result<ResolutionResult, UseCaseError> {
        resolvable_job(self.jobs.as_ref(), brand_id, job_id).await?;
        let key = UnmappedKey::new(input.entity_type, input.source_column, input.raw_value);
        ensure_unmapped(self.staging.as_ref(), job_id, &key).await?;

        let entity = self
            .catalog
            .find_entity(brand_id, input.entity_type, input.entity_id)
            .await?
            .ok_or_else(|| {
                UseCaseError::NotFound(format!(
                    "{} entity not found: {}",
                    input.entity_type, input.entity_id
                ))
            })?;
        apply_resolution(self.staging.as_ref(), job_id, key, entity.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::catalog_entity::CatalogEntity;
    use crate::domain::entity::import_job::{ImportJob, ImportJobStatus};
    use crate::domain::entity::unmapped_value::UnmappedValue;
    use crate::domain::repository::catalog_repository::MockCatalogRepository;
    use crate::domain::repository::import_job_repository::MockImportJobRepository;
    use crate::domain::repository::staging_repository::MockStagingRepository;

    fn jobs_in(status: ImportJobStatus) -> MockImportJobRepository {
        let mut job = ImportJob::new(Uuid::new_v4(), "f".to_string(), "a.csv".to_string());
        job.status = status;
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_for_brand()
            .returning(move |_, _| Ok(Some(job.clone())));
        jobs
    }

    fn input(entity_id: Uuid) -> MapToExistingInput {
        MapToExistingInput {
            entity_type: EntityType::Category,
            raw_value: "Outerwear".to_string(),
            source_column: "category_name".to_string(),
            entity_id,
        }
    }

    #[tokio::test]
    async fn test_map_category_to_taxonomy_entry() {
        let outerwear = CatalogEntity::taxonomy(EntityType::Category, "Outerwear & Jackets");
        let entity_id = outerwear.id;
        let mut staging = MockStagingRepository::new();
        staging.expect_find_unmapped().returning(|job_id, key| {
            Ok(Some(UnmappedValue::new(job_id, key.clone(), 4)))
        });
        staging
            .expect_apply_resolution()
            .withf(move |_, key, id| key.raw_value == "Outerwear" && *id == entity_id)
            .returning(|_, _, _| Ok(4));
        let mut catalog = MockCatalogRepository::new();
        catalog
            .expect_find_entity()
            .returning(move |_, _, _| Ok(Some(outerwear.clone())));

        let uc = MapToExistingUseCase::new(
            Arc::new(jobs_in(ImportJobStatus::Validated)),
            Arc::new(staging),
            Arc::new(catalog),
        );
        let result = uc
            .execute(Uuid::new_v4(), Uuid::new_v4(), input(entity_id))
            .await
            .unwrap();
        assert_eq!(result.updated_rows, 4);
        assert_eq!(result.entity_id, entity_id);
    }

    #[tokio::test]
    async fn test_unknown_entity_is_not_found() {
        let mut staging = MockStagingRepository::new();
        staging.expect_find_unmapped().returning(|job_id, key| {
            Ok(Some(UnmappedValue::new(job_id, key.clone(), 1)))
        });
        staging.expect_apply_resolution().never();
        let mut catalog = MockCatalogRepository::new();
        catalog.expect_find_entity().returning(|_, _, _| Ok(None));

        let uc = MapToExistingUseCase::new(
            Arc::new(jobs_in(ImportJobStatus::Validated)),
            Arc::new(staging),
            Arc::new(catalog),
        );
        let result = uc
            .execute(Uuid::new_v4(), Uuid::new_v4(), input(Uuid::new_v4()))
            .await;
        assert!(matches!(result, Err(UseCaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolution_rejected_after_approval() {
        let uc = MapToExistingUseCase::new(
            Arc::new(jobs_in(ImportJobStatus::Committing)),
            Arc::new(MockStagingRepository::new()),
            Arc::new(MockCatalogRepository::new()),
        );
        let result = uc
            .execute(Uuid::new_v4(), Uuid::new_v4(), input(Uuid::new_v4()))
            .await;
        assert!(matches!(result, Err(UseCaseError::Conflict(_))));
    }
}
