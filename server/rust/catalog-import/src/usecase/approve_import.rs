use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use super::commit_import::CommitImportUseCase;
use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::import_job::{ImportJob, ImportJobStatus};
use crate::domain::repository::{ImportJobRepository, StagingRepository};
use crate::infrastructure::job_lease::JobLeaseRegistry;
use crate::infrastructure::job_notifier::JobNotifier;

/// ApproveImportUseCase は VALIDATED ジョブを COMMITTING に進め、コミットを開始する。
pub struct ApproveImportUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    leases: Arc<JobLeaseRegistry>,
    notifier: Arc<JobNotifier>,
    commit_uc: Arc<CommitImportUseCase>,
}

impl ApproveImportUseCase {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        staging: Arc<dyn StagingRepository>,
        leases: Arc<JobLeaseRegistry>,
        notifier: Arc<JobNotifier>,
        commit_uc: Arc<CommitImportUseCase>,
    ) -> Self {
        Self {
            jobs,
            staging,
            leases,
            notifier,
            commit_uc,
        }
    }

    /// 未解決行がなければ COMMITTING に遷移させ、バックグラウンドでコミットする。
    pub async fn execute(&self, brand_id: Uuid, job_id: Uuid) -> Result<ImportJob, UseCaseError> {
        let job = find_job(self.jobs.as_ref(), brand_id, job_id).await?;
        if job.status != ImportJobStatus::Validated {
            return Err(UseCaseError::Conflict(format!(
                "job is {}, only VALIDATED jobs can be approved",
                job.status
            )));
        }

        let counts = self.staging.count_by_status(job_id).await?;
        if counts.blocking() > 0 {
            return Err(UseCaseError::Validation {
                message: format!(
                    "{} rows must be resolved before the import can be approved",
                    counts.blocking()
                ),
                details: vec![
                    format!("unmapped rows: {}", counts.unmapped),
                    format!("blocked rows: {}", counts.blocked),
                ],
            });
        }

        let lease = self.leases.acquire(job_id).map_err(|_| {
            UseCaseError::Conflict("job is already being processed".to_string())
        })?;
        let Some(committing) = self
            .jobs
            .transition(
                job_id,
                &[ImportJobStatus::Validated],
                ImportJobStatus::Committing,
                None,
            )
            .await?
        else {
            drop(lease);
            // 承認と同時にキャンセルされた場合、ステージングの削除はここで行う
            if let Some(current) = self.jobs.find_by_id(job_id).await? {
                if current.status == ImportJobStatus::Cancelled {
                    self.staging.purge(job_id).await?;
                }
            }
            return Err(UseCaseError::Conflict(
                "job was modified concurrently".to_string(),
            ));
        };

        info!(job_id = %job_id, "import approved, launching commit");
        self.notifier.status_changed(&committing).await;

        let commit_uc = self.commit_uc.clone();
        let job = committing.clone();
        tokio::spawn(async move {
            if let Err(e) = commit_uc.run(job, lease).await {
                error!(job_id = %job_id, error = %e, "import commit failed");
            }
        });

        Ok(committing)
    }
}
