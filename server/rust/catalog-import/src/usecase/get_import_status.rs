use std::sync::Arc;

use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::import_job::ImportJob;
use crate::domain::repository::ImportJobRepository;

/// GetImportStatusUseCase はジョブの状態とカウンタを取得する。
pub struct GetImportStatusUseCase {
    jobs: Arc<dyn ImportJobRepository>,
}

impl GetImportStatusUseCase {
    pub fn new(jobs: Arc<dyn ImportJobRepository>) -> Self {
        Self { jobs }
    }

    pub async fn execute(&self, brand_id: Uuid, job_id: Uuid) -> Result<ImportJob, UseCaseError> {
        find_job(self.jobs.as_ref(), brand_id, job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::import_job_repository::MockImportJobRepository;

    #[tokio::test]
    async fn test_get_status_found() {
        let brand_id = Uuid::new_v4();
        let job = ImportJob::new(brand_id, "f".to_string(), "spring.csv".to_string());
        let job_id = job.id;
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_for_brand()
            .withf(move |b, j| *b == brand_id && *j == job_id)
            .returning(move |_, _| Ok(Some(job.clone())));

        let uc = GetImportStatusUseCase::new(Arc::new(jobs));
        let result = uc.execute(brand_id, job_id).await.unwrap();
        assert_eq!(result.id, job_id);
    }

    #[tokio::test]
    async fn test_other_brand_job_is_not_found() {
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_for_brand().returning(|_, _| Ok(None));

        let uc = GetImportStatusUseCase::new(Arc::new(jobs));
        let result = uc.execute(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(UseCaseError::NotFound(_))));
    }
}
