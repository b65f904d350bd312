use uuid::Uuid;

use super::error::UseCaseError;
use crate::domain::entity::import_job::ImportJob;
use crate::domain::repository::ImportJobRepository;

/// ブランドに属するジョブを取得する。他ブランドのジョブは存在しないものとして扱う。
pub(crate) async fn find_job(
    jobs: &dyn ImportJobRepository,
    brand_id: Uuid,
    job_id: Uuid,
) -> Result<ImportJob, UseCaseError> {
    jobs.find_for_brand(brand_id, job_id)
        .await?
        .ok_or_else(|| UseCaseError::job_not_found(job_id))
}
