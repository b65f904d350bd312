use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::entity::import_job::ImportJobStatus;
use crate::domain::repository::{ImportErrorRepository, ImportJobRepository, StagingRepository};
use crate::infrastructure::job_lease::JobLeaseRegistry;
use crate::infrastructure::job_notifier::JobNotifier;

const WATCHED: [ImportJobStatus; 2] = [ImportJobStatus::Validating, ImportJobStatus::Committing];

/// StuckJobWatchdog は一定時間進捗のない VALIDATING / COMMITTING ジョブを FAILED にする。
pub struct StuckJobWatchdog {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    errors: Arc<dyn ImportErrorRepository>,
    leases: Arc<JobLeaseRegistry>,
    notifier: Arc<JobNotifier>,
    interval: Duration,
    stall_timeout: Duration,
    cancel_token: CancellationToken,
}

impl StuckJobWatchdog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        staging: Arc<dyn StagingRepository>,
        errors: Arc<dyn ImportErrorRepository>,
        leases: Arc<JobLeaseRegistry>,
        notifier: Arc<JobNotifier>,
        interval: Duration,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            staging,
            errors,
            leases,
            notifier,
            interval,
            stall_timeout,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let watchdog = Arc::clone(self);
        let token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(watchdog.interval) => {
                        if let Err(e) = watchdog.sweep().await {
                            error!(error = %e, "stuck job sweep failed");
                        }
                    }
                }
            }
            info!("stuck job watchdog stopped");
        })
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// 停滞ジョブを1回走査し、FAILED にした件数を返す。
    pub async fn sweep(&self) -> anyhow::Result<usize> {
        let timeout = chrono::Duration::from_std(self.stall_timeout)?;
        let stalled = self.jobs.find_stalled(&WATCHED, Utc::now() - timeout).await?;
        let summary = format!(
            "no progress observed for {} seconds",
            self.stall_timeout.as_secs()
        );

        let mut failed = 0;
        for job in stalled {
            let Some(updated) = self
                .jobs
                .transition(job.id, &[job.status], ImportJobStatus::Failed, Some(summary.clone()))
                .await?
            else {
                continue;
            };
            warn!(job_id = %job.id, status = %job.status, "marking stalled import job as failed");
            failed += 1;

            let had_worker = self.leases.cancel(job.id);
            // 検証途中のステージングは残さない。ワーカーが生きていればワーカー側で削除される
            if job.status == ImportJobStatus::Validating && !had_worker {
                if let Err(e) = self.staging.purge(job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to purge staging of stalled job");
                }
                if let Err(e) = self.errors.delete_for_job(job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to delete errors of stalled job");
                }
            }
            self.notifier.status_changed(&updated).await;
        }
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::import_job::ImportJob;
    use crate::domain::repository::import_error_repository::MockImportErrorRepository;
    use crate::domain::repository::import_job_repository::MockImportJobRepository;
    use crate::domain::repository::staging_repository::MockStagingRepository;
    use crate::infrastructure::event_publisher::NoopImportEventPublisher;
    use crate::infrastructure::metrics::ImportMetrics;
    use uuid::Uuid;

    fn notifier() -> Arc<JobNotifier> {
        Arc::new(JobNotifier::new(
            Arc::new(NoopImportEventPublisher),
            Arc::new(ImportMetrics::new("test")),
        ))
    }

    fn stalled_job(status: ImportJobStatus) -> ImportJob {
        let mut job = ImportJob::new(Uuid::new_v4(), "f".to_string(), "a.csv".to_string());
        job.status = status;
        job
    }

    #[tokio::test]
    async fn test_sweep_fails_stalled_validation_and_purges() {
        let job = stalled_job(ImportJobStatus::Validating);
        let job_id = job.id;
        let found = job.clone();

        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_stalled()
            .returning(move |_, _| Ok(vec![found.clone()]));
        jobs.expect_transition()
            .withf(|_, from, to, summary| {
                *from == [ImportJobStatus::Validating]
                    && *to == ImportJobStatus::Failed
                    && summary.as_deref() == Some("no progress observed for 900 seconds")
            })
            .returning(move |_, _, _, summary| {
                let mut failed = job.clone();
                failed.status = ImportJobStatus::Failed;
                failed.error_summary = summary;
                Ok(Some(failed))
            });
        let mut staging = MockStagingRepository::new();
        staging
            .expect_purge()
            .withf(move |id| *id == job_id)
            .times(1)
            .returning(|_| Ok(()));
        let mut errors = MockImportErrorRepository::new();
        errors.expect_delete_for_job().times(1).returning(|_| Ok(()));

        let watchdog = StuckJobWatchdog::new(
            Arc::new(jobs),
            Arc::new(staging),
            Arc::new(errors),
            Arc::new(JobLeaseRegistry::new()),
            notifier(),
            Duration::from_secs(30),
            Duration::from_secs(900),
        );
        assert_eq!(watchdog.sweep().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_cancels_live_commit_worker() {
        let job = stalled_job(ImportJobStatus::Committing);
        let found = job.clone();
        let leases = Arc::new(JobLeaseRegistry::new());
        let lease = leases.acquire(job.id).unwrap();

        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_stalled()
            .returning(move |_, _| Ok(vec![found.clone()]));
        jobs.expect_transition().returning(move |_, _, _, _| {
            let mut failed = job.clone();
            failed.status = ImportJobStatus::Failed;
            Ok(Some(failed))
        });

        let watchdog = StuckJobWatchdog::new(
            Arc::new(jobs),
            Arc::new(MockStagingRepository::new()),
            Arc::new(MockImportErrorRepository::new()),
            leases,
            notifier(),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        assert_eq!(watchdog.sweep().await.unwrap(), 1);
        assert!(lease.is_cancelled());
    }

    #[tokio::test]
    async fn test_sweep_skips_job_that_moved_on() {
        let job = stalled_job(ImportJobStatus::Validating);
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_stalled()
            .returning(move |_, _| Ok(vec![job.clone()]));
        jobs.expect_transition().returning(|_, _, _, _| Ok(None));

        let watchdog = StuckJobWatchdog::new(
            Arc::new(jobs),
            Arc::new(MockStagingRepository::new()),
            Arc::new(MockImportErrorRepository::new()),
            Arc::new(JobLeaseRegistry::new()),
            notifier(),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        assert_eq!(watchdog.sweep().await.unwrap(), 0);
    }
}
