use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::UseCaseError;
use super::resolution_support::{
    apply_resolution, ensure_unmapped, resolvable_job, ResolutionResult,
};
use crate::domain::entity::catalog_entity::EntityData;
use crate::domain::entity::unmapped_value::UnmappedKey;
use crate::domain::repository::{CatalogRepository, ImportJobRepository, StagingRepository};
use crate::domain::value_object::EntityType;

/// DefineValueInput は新規エンティティを定義して未解決値を解決する要求。
#[derive(Debug, Clone, Deserialize)]
pub struct DefineValueInput {
    pub entity_type: EntityType,
    pub raw_value: String,
    pub source_column: String,
    pub entity_data: EntityData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinedValue {
    pub entity_type: EntityType,
    pub raw_value: String,
    pub entity_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefineFailure {
    pub entity_type: EntityType,
    pub raw_value: String,
    pub message: String,
}

/// BatchDefineResult は値ごとに独立した一括定義の結果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchDefineResult {
    pub created: Vec<DefinedValue>,
    pub success_count: usize,
    pub failures: Vec<DefineFailure>,
}

/// DefineValueUseCase は新しいカタログエンティティを作成し、同じキーを持つ全行へ適用する。
pub struct DefineValueUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl DefineValueUseCase {
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
        input: DefineValueInput,
    ) -> Result<ResolutionResult, UseCaseError> {
        check_input(&input)?;
        resolvable_job(self.jobs.as_ref(), brand_id, job_id).await?;
        self.define(brand_id, job_id, input).await
    }

    /// 値ごとに独立して定義する。1件の失敗は他の値に影響せず、
    /// ストレージ障害も該当値の失敗として記録して処理を続ける。
    pub async fn execute_batch(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
        inputs: Vec<DefineValueInput>,
    ) -> Result<BatchDefineResult, UseCaseError> {
        if inputs.is_empty() {
            return Err(UseCaseError::validation("values must not be empty"));
        }
        resolvable_job(self.jobs.as_ref(), brand_id, job_id).await?;

        let mut result = BatchDefineResult::default();
        for input in inputs {
            let entity_type = input.entity_type;
            let raw_value = input.raw_value.clone();
            let outcome = match check_input(&input) {
                Ok(()) => self.define(brand_id, job_id, input).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(resolved) => result.created.push(DefinedValue {
                    entity_type,
                    raw_value,
                    entity_id: resolved.entity_id,
                }),
                Err(UseCaseError::Internal(e)) => {
                    tracing::error!(
                        job_id = %job_id,
                        entity_type = %entity_type,
                        raw_value = %raw_value,
                        error = %e,
                        "failed to define value"
                    );
                    result.failures.push(DefineFailure {
                        entity_type,
                        raw_value,
                        message: "internal error".to_string(),
                    });
                }
                Err(e) => result.failures.push(DefineFailure {
                    entity_type,
                    raw_value,
                    message: e.to_string(),
                }),
            }
        }
        result.success_count = result.created.len();
        Ok(result)
    }

    async fn define(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
        input: DefineValueInput,
    ) -> Result<ResolutionResult, UseCaseError> {
        let key = UnmappedKey::new(input.entity_type, input.source_column, input.raw_value);
        ensure_unmapped(self.staging.as_ref(), job_id, &key).await?;

        if let Some(name) = input.entity_data.display_name() {
            if let Some(existing) = self
                .catalog
                .find_by_name(brand_id, input.entity_type, name)
                .await?
            {
                return Err(UseCaseError::Conflict(format!(
                    "{} '{}' already exists ({}); map the value to it instead",
                    input.entity_type, existing.name, existing.id
                )));
            }
        }

        let entity = self
            .catalog
            .create_entity(brand_id, &input.entity_data)
            .await?;
        apply_resolution(self.staging.as_ref(), job_id, key, entity.id).await
    }
}

fn check_input(input: &DefineValueInput) -> Result<(), UseCaseError> {
    if !input.entity_type.is_definable() {
        return Err(UseCaseError::UnsupportedOperation(format!(
            "{} values cannot be defined; map them to an existing entity instead",
            input.entity_type
        )));
    }
    if input.entity_data.entity_type() != input.entity_type {
        return Err(UseCaseError::validation(format!(
            "entity_data is {} but entity_type is {}",
            input.entity_data.entity_type(),
            input.entity_type
        )));
    }
    input.entity_data.validate()?;
    Ok(())
}
