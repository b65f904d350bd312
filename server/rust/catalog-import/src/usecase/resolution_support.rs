use serde::Serialize;
use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::import_job::{ImportJob, ImportJobStatus};
use crate::domain::entity::unmapped_value::UnmappedKey;
use crate::domain::repository::{ImportJobRepository, StagingRepository};
use crate::domain::value_object::EntityType;

/// ResolutionResult は未解決値1件の解決結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub entity_type: EntityType,
    pub source_column: String,
    pub raw_value: String,
    pub entity_id: Uuid,
    pub updated_rows: u64,
}

/// 値の解決は VALIDATED のジョブに対してのみ受け付ける。
pub(crate) async fn resolvable_job(
    jobs: &dyn ImportJobRepository,
    brand_id: Uuid,
    job_id: Uuid,
) -> Result<ImportJob, UseCaseError> {
    let job = find_job(jobs, brand_id, job_id).await?;
    if job.status != ImportJobStatus::Validated {
        return Err(UseCaseError::Conflict(format!(
            "values can only be resolved while the job is VALIDATED (job is {})",
            job.status
        )));
    }
    Ok(job)
}

pub(crate) async fn ensure_unmapped(
    staging: &dyn StagingRepository,
    job_id: Uuid,
    key: &UnmappedKey,
) -> Result<(), UseCaseError> {
    match staging.find_unmapped(job_id, key).await? {
        Some(_) => Ok(()),
        None => Err(UseCaseError::NotFound(format!(
            "no unmapped {} value '{}' in column {}",
            key.entity_type, key.raw_value, key.source_column
        ))),
    }
}

/// key に一致する全ステージング行へ entity_id を適用する。
pub(crate) async fn apply_resolution(
    staging: &dyn StagingRepository,
    job_id: Uuid,
    key: UnmappedKey,
    entity_id: Uuid,
) -> Result<ResolutionResult, UseCaseError> {
    let updated_rows = staging.apply_resolution(job_id, &key, entity_id).await?;
    tracing::info!(
        job_id = %job_id,
        entity_type = %key.entity_type,
        raw_value = %key.raw_value,
        entity_id = %entity_id,
        updated_rows,
        "unmapped value resolved"
    );
    Ok(ResolutionResult {
        entity_type: key.entity_type,
        source_column: key.source_column,
        raw_value: key.raw_value,
        entity_id,
        updated_rows,
    })
}
