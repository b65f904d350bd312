use std::sync::Arc;

use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::unmapped_value::UnmappedValue;
use crate::domain::repository::{ImportJobRepository, StagingRepository};

/// GetUnmappedValuesUseCase はジョブの未解決値を全件返す。
pub struct GetUnmappedValuesUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
}

impl GetUnmappedValuesUseCase {
    pub fn new(jobs: Arc<dyn ImportJobRepository>, staging: Arc<dyn StagingRepository>) -> Self {
        Self { jobs, staging }
    }

    pub async fn execute(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<UnmappedValue>, UseCaseError> {
        find_job(self.jobs.as_ref(), brand_id, job_id).await?;
        Ok(self.staging.list_unmapped(job_id).await?)
    }
}
