use std::sync::Arc;

use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::import_error::ImportError;
use crate::domain::repository::{ImportErrorRepository, ImportJobRepository};
use crate::domain::value_object::{Page, PageRequest};

/// GetImportErrorsUseCase は行単位エラーを row_index 順にページングして返す。
pub struct GetImportErrorsUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    errors: Arc<dyn ImportErrorRepository>,
}

impl GetImportErrorsUseCase {
    pub fn new(jobs: Arc<dyn ImportJobRepository>, errors: Arc<dyn ImportErrorRepository>) -> Self {
        Self { jobs, errors }
    }

    pub async fn execute(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<ImportError>, UseCaseError> {
        find_job(self.jobs.as_ref(), brand_id, job_id).await?;
        let (items, total) = self.errors.list(job_id, &page).await?;
        Ok(Page::new(items, total, &page))
    }
}
