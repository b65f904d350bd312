use std::sync::Arc;

use tracing::{error, info};

use super::run_validation::RunValidationUseCase;
use crate::domain::entity::import_job::ImportJobStatus;
use crate::domain::repository::ImportJobRepository;

/// RecoverImportsUseCase は起動時に前回プロセスの PENDING/VALIDATING ジョブの検証を再開する。
/// COMMITTING のジョブはウォッチドッグに任せる。
pub struct RecoverImportsUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    validation: Arc<RunValidationUseCase>,
}

impl RecoverImportsUseCase {
    pub fn new(jobs: Arc<dyn ImportJobRepository>, validation: Arc<RunValidationUseCase>) -> Self {
        Self { jobs, validation }
    }

    pub async fn execute(&self) -> anyhow::Result<usize> {
        let interrupted = self
            .jobs
            .find_by_statuses(&[ImportJobStatus::Pending, ImportJobStatus::Validating])
            .await?;
        let count = interrupted.len();
        if count == 0 {
            info!("no interrupted import jobs to recover");
            return Ok(0);
        }

        info!(count = count, "recovering interrupted import jobs");
        for job in interrupted {
            let job_id = job.id;
            let validation = self.validation.clone();
            tokio::spawn(async move {
                let result = if job.status == ImportJobStatus::Pending {
                    validation.run(job_id).await
                } else {
                    validation.resume(job_id).await
                };
                if let Err(e) = result {
                    error!(job_id = %job_id, error = %e, "failed to recover import job");
                }
            });
        }
        Ok(count)
    }
}
