use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::import_job::{ImportJob, ImportJobStatus};
use crate::domain::repository::{ImportJobRepository, StagingRepository};
use crate::infrastructure::job_lease::JobLeaseRegistry;
use crate::infrastructure::job_notifier::JobNotifier;

/// CancelImportUseCase はジョブをキャンセルする。終端状態のジョブに対しては何もしない。
pub struct CancelImportUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    leases: Arc<JobLeaseRegistry>,
    notifier: Arc<JobNotifier>,
}

impl CancelImportUseCase {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        staging: Arc<dyn StagingRepository>,
        leases: Arc<JobLeaseRegistry>,
        notifier: Arc<JobNotifier>,
    ) -> Self {
        Self {
            jobs,
            staging,
            leases,
            notifier,
        }
    }

    pub async fn execute(&self, brand_id: Uuid, job_id: Uuid) -> Result<ImportJob, UseCaseError> {
        let job = find_job(self.jobs.as_ref(), brand_id, job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }

        let Some(cancelled) = self
            .jobs
            .transition(
                job_id,
                &ImportJobStatus::ACTIVE,
                ImportJobStatus::Cancelled,
                None,
            )
            .await?
        else {
            // 同時に終端へ遷移した
            return find_job(self.jobs.as_ref(), brand_id, job_id).await;
        };

        // ワーカーが動いていればワーカーがバッチ境界で停止してステージングを削除する
        if !self.leases.cancel(job_id) {
            self.staging.purge(job_id).await?;
        }
        info!(job_id = %job_id, previous = %job.status, "import job cancelled");
        self.notifier.status_changed(&cancelled).await;
        Ok(cancelled)
    }
}
