use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entity::import_error::ImportError;
use crate::domain::entity::import_job::{ImportJob, ImportJobStatus, JobProgress};
use crate::domain::entity::product_command::ProductCommand;
use crate::domain::entity::raw_values::RawValues;
use crate::domain::entity::staging_row::StagingRow;
use crate::domain::repository::{
    BatchWriteError, ImportErrorRepository, ImportJobRepository, ProductCatalogWriter,
    RowWriteOutcome, StagingRepository, WriteKind,
};
use crate::domain::service::batch_planner::{batches_are_disjoint, plan_batches};
use crate::domain::value_object::page::MAX_PAGE_LIMIT;
use crate::domain::value_object::PageRequest;
use crate::infrastructure::job_lease::JobLease;
use crate::infrastructure::job_notifier::JobNotifier;

/// CommitSettings はコミットエンジンの動作設定。
#[derive(Debug, Clone, Copy)]
pub struct CommitSettings {
    pub batch_size: usize,
    pub concurrency: usize,
    pub purge_staging_on_complete: bool,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 4,
            purge_staging_on_complete: false,
        }
    }
}

/// BatchReport は1バッチの処理結果。
#[derive(Debug, Default)]
struct BatchReport {
    rows: usize,
    outcomes: Vec<RowWriteOutcome>,
    failures: Vec<(i64, String)>,
    skipped: bool,
}

/// CommitImportUseCase は VALIDATED ジョブのステージング行を本番カタログへ書き込む。
///
/// 行はソース順にバッチへ分割され、バッチ単位のトランザクションで書き込まれる。
/// 行に起因する失敗はその行を除外してバッチを再試行し、失敗行は ImportError として記録する。
pub struct CommitImportUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    errors: Arc<dyn ImportErrorRepository>,
    writer: Arc<dyn ProductCatalogWriter>,
    notifier: Arc<JobNotifier>,
    settings: CommitSettings,
}

impl CommitImportUseCase {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        staging: Arc<dyn StagingRepository>,
        errors: Arc<dyn ImportErrorRepository>,
        writer: Arc<dyn ProductCatalogWriter>,
        notifier: Arc<JobNotifier>,
        settings: CommitSettings,
    ) -> Self {
        Self {
            jobs,
            staging,
            errors,
            writer,
            notifier,
            settings,
        }
    }

    /// COMMITTING に遷移済みのジョブを処理する。lease は処理完了まで保持される。
    pub async fn run(&self, job: ImportJob, lease: JobLease) -> anyhow::Result<()> {
        match self.commit(&job, &lease).await {
            Ok(progress) => self.finish(&job, &lease, progress).await,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "commit aborted");
                if let Some(failed) = self
                    .jobs
                    .transition(
                        job.id,
                        &[ImportJobStatus::Committing],
                        ImportJobStatus::Failed,
                        Some(format!("commit aborted: {e}")),
                    )
                    .await?
                {
                    self.notifier.status_changed(&failed).await;
                }
                Ok(())
            }
        }
    }

    async fn commit(&self, job: &ImportJob, lease: &JobLease) -> anyhow::Result<JobProgress> {
        let rows = self.load_rows(job.id).await?;
        let mut progress = JobProgress {
            total_rows: rows.len() as i64,
            ..JobProgress::default()
        };
        self.jobs.update_progress(job.id, &progress).await?;

        let mut snapshots: HashMap<i64, RawValues> = HashMap::with_capacity(rows.len());
        let mut commands = Vec::with_capacity(rows.len());
        let mut unready = Vec::new();
        for row in rows {
            match ProductCommand::from_staging_row(&row) {
                Ok(command) => commands.push(command),
                Err(message) => unready.push((row.row_index, message)),
            }
            snapshots.insert(row.row_index, row.raw_values);
        }
        if !unready.is_empty() {
            self.record_failures(job.id, &unready, &snapshots).await?;
            progress.failed_rows += unready.len() as i64;
            progress.processed_rows += unready.len() as i64;
        }

        let batches = plan_batches(commands, self.settings.batch_size);
        let parallelism = if self.settings.concurrency > 1 && batches_are_disjoint(&batches) {
            self.settings.concurrency
        } else {
            1
        };
        info!(
            job_id = %job.id,
            batches = batches.len(),
            parallelism,
            "committing staged rows"
        );

        let mut reports = futures::stream::iter(
            batches
                .into_iter()
                .map(|batch| self.apply_batch(job.brand_id, batch, lease)),
        )
        .buffered(parallelism);

        while let Some(report) = reports.next().await {
            let report = report?;
            if report.skipped {
                continue;
            }
            self.record_failures(job.id, &report.failures, &snapshots)
                .await?;
            for outcome in &report.outcomes {
                match outcome.kind {
                    WriteKind::Created => progress.created_rows += 1,
                    WriteKind::Updated => progress.updated_rows += 1,
                }
            }
            progress.failed_rows += report.failures.len() as i64;
            progress.processed_rows += report.rows as i64;
            self.jobs.update_progress(job.id, &progress).await?;
            self.notifier.progress(job, &progress).await;
        }

        Ok(progress)
    }

    async fn load_rows(&self, job_id: Uuid) -> anyhow::Result<Vec<StagingRow>> {
        let mut rows = Vec::new();
        let mut page = PageRequest {
            limit: MAX_PAGE_LIMIT,
            offset: 0,
        };
        loop {
            let (items, total) = self.staging.list_rows(job_id, &page).await?;
            let fetched = items.len() as u64;
            rows.extend(items);
            page.offset += fetched;
            if fetched == 0 || page.offset >= total {
                break;
            }
        }
        Ok(rows)
    }

    /// キャンセル済みならバッチを開始しない。開始したバッチは最後まで処理する。
    async fn apply_batch(
        &self,
        brand_id: Uuid,
        batch: Vec<ProductCommand>,
        lease: &JobLease,
    ) -> anyhow::Result<BatchReport> {
        if lease.is_cancelled() {
            return Ok(BatchReport {
                skipped: true,
                ..BatchReport::default()
            });
        }
        let started = Instant::now();
        let mut report = BatchReport {
            rows: batch.len(),
            ..BatchReport::default()
        };
        let mut pending = batch;

        while !pending.is_empty() {
            match self.writer.apply_batch(brand_id, &pending).await {
                Ok(outcomes) => {
                    report.outcomes.extend(outcomes);
                    break;
                }
                Err(BatchWriteError::RowRejected { row_index, message }) => {
                    match pending.iter().position(|c| c.row_index == row_index) {
                        Some(position) => {
                            pending.remove(position);
                            report.failures.push((row_index, message));
                        }
                        None => {
                            warn!(row_index, "rejected row is not part of the batch, applying rows one by one");
                            self.apply_row_by_row(brand_id, pending, &mut report).await?;
                            break;
                        }
                    }
                }
                Err(BatchWriteError::Unattributed(message)) => {
                    warn!(error = %message, "batch failed without row attribution, applying rows one by one");
                    self.apply_row_by_row(brand_id, pending, &mut report).await?;
                    break;
                }
                Err(BatchWriteError::Systemic(e)) => return Err(e),
            }
        }

        let metrics = self.notifier.metrics();
        let created = report
            .outcomes
            .iter()
            .filter(|o| o.kind == WriteKind::Created)
            .count() as u64;
        metrics.record_rows("commit", "created", created);
        metrics.record_rows("commit", "updated", report.outcomes.len() as u64 - created);
        metrics.record_rows("commit", "failed", report.failures.len() as u64);
        metrics.record_batch_duration("commit", started.elapsed().as_secs_f64());
        Ok(report)
    }

    async fn apply_row_by_row(
        &self,
        brand_id: Uuid,
        commands: Vec<ProductCommand>,
        report: &mut BatchReport,
    ) -> anyhow::Result<()> {
        for command in commands {
            match self
                .writer
                .apply_batch(brand_id, std::slice::from_ref(&command))
                .await
            {
                Ok(outcomes) => report.outcomes.extend(outcomes),
                Err(BatchWriteError::RowRejected { message, .. } | BatchWriteError::Unattributed(message)) => {
                    report.failures.push((command.row_index, message));
                }
                Err(BatchWriteError::Systemic(e)) => return Err(e),
            }
        }
        Ok(())
    }

    async fn record_failures(
        &self,
        job_id: Uuid,
        failures: &[(i64, String)],
        snapshots: &HashMap<i64, RawValues>,
    ) -> anyhow::Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        let errors: Vec<ImportError> = failures
            .iter()
            .map(|(row_index, message)| {
                ImportError::commit(
                    job_id,
                    *row_index,
                    message.clone(),
                    snapshots.get(row_index).cloned().unwrap_or_default(),
                )
            })
            .collect();
        self.errors.insert(&errors).await
    }

    async fn finish(
        &self,
        job: &ImportJob,
        lease: &JobLease,
        progress: JobProgress,
    ) -> anyhow::Result<()> {
        if lease.is_cancelled() {
            return self.after_interruption(job.id).await;
        }

        let (target, summary) = if progress.failed_rows == 0 {
            (ImportJobStatus::Completed, None)
        } else {
            (
                ImportJobStatus::Failed,
                Some(format!(
                    "{} of {} rows failed to commit",
                    progress.failed_rows, progress.total_rows
                )),
            )
        };

        match self
            .jobs
            .transition(job.id, &[ImportJobStatus::Committing], target, summary)
            .await?
        {
            Some(done) => {
                info!(
                    job_id = %job.id,
                    status = %done.status,
                    created_rows = progress.created_rows,
                    updated_rows = progress.updated_rows,
                    failed_rows = progress.failed_rows,
                    "import commit finished"
                );
                if done.status == ImportJobStatus::Completed
                    && self.settings.purge_staging_on_complete
                {
                    self.staging.purge(job.id).await?;
                }
                self.notifier.status_changed(&done).await;
                Ok(())
            }
            None => self.after_interruption(job.id).await,
        }
    }

    /// 処理中にキャンセルされたジョブのステージングを削除する。コミット済みの行はそのまま残る。
    async fn after_interruption(&self, job_id: Uuid) -> anyhow::Result<()> {
        let current = self.jobs.find_by_id(job_id).await?;
        if current.is_some_and(|j| j.status == ImportJobStatus::Cancelled) {
            info!(job_id = %job_id, "commit cancelled, purging staging");
            self.staging.purge(job_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::product_payload::ProductPayload;
    use crate::domain::repository::import_error_repository::MockImportErrorRepository;
    use crate::domain::repository::import_job_repository::MockImportJobRepository;
    use crate::domain::repository::product_catalog_writer::MockProductCatalogWriter;
    use crate::domain::repository::staging_repository::MockStagingRepository;
    use crate::infrastructure::event_publisher::NoopImportEventPublisher;
    use crate::infrastructure::job_lease::JobLeaseRegistry;
    use crate::infrastructure::metrics::ImportMetrics;

    fn committing_job() -> ImportJob {
        let mut job = ImportJob::new(Uuid::new_v4(), "f".to_string(), "a.csv".to_string());
        job.status = ImportJobStatus::Committing;
        job
    }

    fn staged(job_id: Uuid, row_index: i64, sku: &str) -> StagingRow {
        let mut raw = RawValues::new();
        raw.push("product_name", format!("Product {row_index}"));
        raw.push("sku", sku);
        StagingRow::validated(
            job_id,
            row_index,
            raw,
            ProductPayload {
                product_name: format!("Product {row_index}"),
                upid: None,
                sku: Some(sku.to_string()),
                description: None,
                primary_image_url: None,
                product_image_url: None,
                color_hex: None,
                care_codes: vec![],
                environment_score: None,
                facility_country: None,
                release_date: None,
                materials: vec![],
            },
            vec![],
        )
    }

    fn staging_with(rows: Vec<StagingRow>) -> MockStagingRepository {
        let mut staging = MockStagingRepository::new();
        staging.expect_list_rows().returning(move |_, page| {
            let total = rows.len() as u64;
            let items = rows
                .iter()
                .skip(page.offset_usize())
                .take(page.limit_usize())
                .cloned()
                .collect();
            Ok((items, total))
        });
        staging
    }

    fn finishing_jobs(job: &ImportJob, expect: ImportJobStatus) -> MockImportJobRepository {
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_update_progress().returning(|_, _| Ok(()));
        let template = job.clone();
        jobs.expect_transition()
            .withf(move |_, _, to, _| *to == expect)
            .times(1)
            .returning(move |_, _, to, summary| {
                let mut done = template.clone();
                done.status = to;
                done.error_summary = summary;
                Ok(Some(done))
            });
        jobs
    }

    fn usecase(
        jobs: MockImportJobRepository,
        staging: MockStagingRepository,
        errors: MockImportErrorRepository,
        writer: MockProductCatalogWriter,
        batch_size: usize,
    ) -> CommitImportUseCase {
        CommitImportUseCase::new(
            Arc::new(jobs),
            Arc::new(staging),
            Arc::new(errors),
            Arc::new(writer),
            Arc::new(JobNotifier::new(
                Arc::new(NoopImportEventPublisher),
                Arc::new(ImportMetrics::new("test")),
            )),
            CommitSettings {
                batch_size,
                concurrency: 2,
                purge_staging_on_complete: false,
            },
        )
    }

    fn created(commands: &[ProductCommand]) -> Vec<RowWriteOutcome> {
        commands
            .iter()
            .map(|c| RowWriteOutcome {
                row_index: c.row_index,
                kind: WriteKind::Created,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_rows_commit_and_job_completes() {
        let job = committing_job();
        let rows = (1..=5).map(|i| staged(job.id, i, &format!("S-{i}"))).collect();
        let mut writer = MockProductCatalogWriter::new();
        writer
            .expect_apply_batch()
            .times(3)
            .returning(|_, commands| Ok(created(commands)));

        let registry = Arc::new(JobLeaseRegistry::new());
        let lease = registry.acquire(job.id).unwrap();
        let uc = usecase(
            finishing_jobs(&job, ImportJobStatus::Completed),
            staging_with(rows),
            MockImportErrorRepository::new(),
            writer,
            2,
        );
        uc.run(job, lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_row_is_excluded_and_batch_retried() {
        let job = committing_job();
        let rows = (1..=3).map(|i| staged(job.id, i, &format!("S-{i}"))).collect();
        let mut writer = MockProductCatalogWriter::new();
        writer.expect_apply_batch().returning(|_, commands| {
            if commands.iter().any(|c| c.row_index == 2) {
                Err(BatchWriteError::RowRejected {
                    row_index: 2,
                    message: "duplicate key value violates unique constraint".to_string(),
                })
            } else {
                assert_eq!(commands.len(), 2);
                Ok(created(commands))
            }
        });
        let mut errors = MockImportErrorRepository::new();
        errors
            .expect_insert()
            .withf(|errs| {
                errs.len() == 1
                    && errs[0].row_index == 2
                    && errs[0].raw_row_snapshot.get("sku") == Some("S-2")
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut jobs = MockImportJobRepository::new();
        let template = job.clone();
        jobs.expect_update_progress().returning(|_, _| Ok(()));
        jobs.expect_transition()
            .withf(|_, _, to, summary| {
                *to == ImportJobStatus::Failed
                    && summary.as_deref() == Some("1 of 3 rows failed to commit")
            })
            .times(1)
            .returning(move |_, _, to, _| {
                let mut done = template.clone();
                done.status = to;
                Ok(Some(done))
            });

        let registry = Arc::new(JobLeaseRegistry::new());
        let lease = registry.acquire(job.id).unwrap();
        let uc = usecase(jobs, staging_with(rows), errors, writer, 10);
        uc.run(job, lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_unattributed_failure_falls_back_to_single_rows() {
        let job = committing_job();
        let rows = (1..=2).map(|i| staged(job.id, i, &format!("S-{i}"))).collect();
        let mut writer = MockProductCatalogWriter::new();
        writer.expect_apply_batch().returning(|_, commands| {
            if commands.len() > 1 {
                Err(BatchWriteError::Unattributed("deadlock detected".to_string()))
            } else {
                Ok(created(commands))
            }
        });
        let registry = Arc::new(JobLeaseRegistry::new());
        let lease = registry.acquire(job.id).unwrap();
        let uc = usecase(
            finishing_jobs(&job, ImportJobStatus::Completed),
            staging_with(rows),
            MockImportErrorRepository::new(),
            writer,
            10,
        );
        uc.run(job, lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_systemic_failure_fails_job() {
        let job = committing_job();
        let rows = vec![staged(job.id, 1, "S-1")];
        let mut writer = MockProductCatalogWriter::new();
        writer.expect_apply_batch().returning(|_, _| {
            Err(BatchWriteError::Systemic(anyhow::anyhow!("connection reset")))
        });
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_update_progress().returning(|_, _| Ok(()));
        let template = job.clone();
        jobs.expect_transition()
            .withf(|_, _, to, summary| {
                *to == ImportJobStatus::Failed
                    && summary
                        .as_deref()
                        .is_some_and(|s| s.starts_with("commit aborted"))
            })
            .times(1)
            .returning(move |_, _, to, _| {
                let mut done = template.clone();
                done.status = to;
                Ok(Some(done))
            });
        let registry = Arc::new(JobLeaseRegistry::new());
        let lease = registry.acquire(job.id).unwrap();
        let uc = usecase(
            jobs,
            staging_with(rows),
            MockImportErrorRepository::new(),
            writer,
            10,
        );
        uc.run(job, lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_commit_skips_batches_and_purges() {
        let job = committing_job();
        let rows = (1..=3).map(|i| staged(job.id, i, &format!("S-{i}"))).collect();
        let mut staging = staging_with(rows);
        staging.expect_purge().times(1).returning(|_| Ok(()));
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_update_progress().returning(|_, _| Ok(()));
        let mut cancelled = job.clone();
        cancelled.status = ImportJobStatus::Cancelled;
        jobs.expect_find_by_id()
            .returning(move |_| Ok(Some(cancelled.clone())));

        let registry = Arc::new(JobLeaseRegistry::new());
        let lease = registry.acquire(job.id).unwrap();
        registry.cancel(job.id);
        let uc = usecase(
            jobs,
            staging,
            MockImportErrorRepository::new(),
            MockProductCatalogWriter::new(),
            1,
        );
        uc.run(job, lease).await.unwrap();
    }
}
