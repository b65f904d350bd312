use std::sync::Arc;

use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::staging_row::StagingRow;
use crate::domain::repository::{ImportJobRepository, StagingRepository};
use crate::domain::value_object::{Page, PageRequest};

/// GetStagingPreviewUseCase はステージング行を row_index 順にページングして返す。
/// VALIDATING 中のジョブでは途中までの結果になる。
pub struct GetStagingPreviewUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
}

impl GetStagingPreviewUseCase {
    pub fn new(jobs: Arc<dyn ImportJobRepository>, staging: Arc<dyn StagingRepository>) -> Self {
        Self { jobs, staging }
    }

    pub async fn execute(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<StagingRow>, UseCaseError> {
        find_job(self.jobs.as_ref(), brand_id, job_id).await?;
        let (items, total) = self.staging.list_rows(job_id, &page).await?;
        Ok(Page::new(items, total, &page))
    }
}
