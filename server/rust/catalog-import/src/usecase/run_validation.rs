use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entity::import_error::ImportError;
use crate::domain::entity::import_job::{ImportJob, ImportJobStatus, JobProgress};
use crate::domain::entity::staging_row::{ResolutionStatus, StagingRow};
use crate::domain::repository::{
    CatalogRepository, FileStore, ImportErrorRepository, ImportJobRepository, StagingRepository,
};
use crate::domain::service::{check_headers, EntityResolver, RowOutcome, RowValidator};
use crate::infrastructure::job_lease::{JobLease, JobLeaseRegistry};
use crate::infrastructure::job_notifier::JobNotifier;
use crate::infrastructure::spreadsheet::{self, ParseError, RawRow, SheetRows};

/// ValidationFailure はジョブを FAILED にする致命的エラー。
#[derive(Debug, thiserror::Error)]
enum ValidationFailure {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("uploaded file not found: {0}")]
    MissingFile(String),
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

enum StageOutcome {
    Completed(JobProgress),
    Cancelled,
}

/// RunValidationUseCase はバックグラウンドでファイルを解析・検証・解決し、ステージングへ書き込む。
pub struct RunValidationUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    errors: Arc<dyn ImportErrorRepository>,
    catalog: Arc<dyn CatalogRepository>,
    files: Arc<dyn FileStore>,
    notifier: Arc<JobNotifier>,
    leases: Arc<JobLeaseRegistry>,
    batch_size: usize,
}

impl RunValidationUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        staging: Arc<dyn StagingRepository>,
        errors: Arc<dyn ImportErrorRepository>,
        catalog: Arc<dyn CatalogRepository>,
        files: Arc<dyn FileStore>,
        notifier: Arc<JobNotifier>,
        leases: Arc<JobLeaseRegistry>,
        batch_size: usize,
    ) -> Self {
        Self {
            jobs,
            staging,
            errors,
            catalog,
            files,
            notifier,
            leases,
            batch_size: batch_size.max(1),
        }
    }

    /// PENDING のジョブを VALIDATING に進めて検証する。
    pub async fn run(&self, job_id: Uuid) -> anyhow::Result<()> {
        let lease = match self.leases.acquire(job_id) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "validation worker not started");
                return Ok(());
            }
        };
        let Some(job) = self
            .jobs
            .transition(job_id, &[ImportJobStatus::Pending], ImportJobStatus::Validating, None)
            .await?
        else {
            info!(job_id = %job_id, "job is no longer pending, skipping validation");
            return Ok(());
        };
        self.notifier.status_changed(&job).await;
        self.validate(job, &lease).await
    }

    /// 前回のプロセスで VALIDATING のまま残ったジョブを最初からやり直す。
    pub async fn resume(&self, job_id: Uuid) -> anyhow::Result<()> {
        let lease = match self.leases.acquire(job_id) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "validation worker not resumed");
                return Ok(());
            }
        };
        let Some(job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(());
        };
        if job.status != ImportJobStatus::Validating {
            return Ok(());
        }
        self.reset(job_id, true).await?;
        info!(job_id = %job_id, "restarting interrupted validation");
        self.validate(job, &lease).await
    }

    async fn validate(&self, job: ImportJob, lease: &JobLease) -> anyhow::Result<()> {
        match self.stage(&job, lease).await {
            Ok(StageOutcome::Completed(progress)) => self.finish(&job, progress).await,
            Ok(StageOutcome::Cancelled) => {
                // ウォッチドッグによる FAILED 化でもリースは取り消される
                let current = self.jobs.find_by_id(job.id).await?;
                let failed = current.is_some_and(|j| j.status == ImportJobStatus::Failed);
                info!(job_id = %job.id, failed, "validation stopped");
                self.reset(job.id, failed).await
            }
            Err(failure) => self.fail(&job, &failure.to_string()).await,
        }
    }

    async fn stage(
        &self,
        job: &ImportJob,
        lease: &JobLease,
    ) -> Result<StageOutcome, ValidationFailure> {
        let format = job
            .format()
            .ok_or_else(|| ValidationFailure::UnsupportedFormat(job.filename.clone()))?;
        let bytes = self
            .files
            .fetch(job.brand_id, &job.file_id)
            .await?
            .ok_or_else(|| ValidationFailure::MissingFile(job.file_id.clone()))?;

        let mut rows = tokio::task::spawn_blocking(move || spreadsheet::open(format, bytes))
            .await
            .map_err(anyhow::Error::from)??;

        let header_check = check_headers(rows.headers());
        if !header_check.is_acceptable() {
            return Err(ValidationFailure::MissingColumns(header_check.missing));
        }
        if !header_check.unknown.is_empty() {
            warn!(job_id = %job.id, columns = ?header_check.unknown, "ignoring unknown columns");
        }

        let brand_entities = self.catalog.list_brand_entities(job.brand_id).await?;
        let taxonomy = self.catalog.list_taxonomy().await?;
        let mut resolver = EntityResolver::new(&brand_entities, &taxonomy);
        let mut validator = RowValidator::new();
        let mut progress = JobProgress::default();

        loop {
            if lease.is_cancelled() {
                return Ok(StageOutcome::Cancelled);
            }
            let (rest, chunk) = next_chunk(rows, self.batch_size).await?;
            rows = rest;
            let chunk = chunk?;
            if chunk.is_empty() {
                break;
            }

            let started = Instant::now();
            let mut staged = Vec::with_capacity(chunk.len());
            let mut row_errors = Vec::new();
            for raw in chunk {
                match validator.validate(raw.row_index, &raw.values) {
                    RowOutcome::Valid {
                        payload,
                        references,
                    } => {
                        let references = resolver.resolve_row(references);
                        staged.push(StagingRow::validated(
                            job.id,
                            raw.row_index,
                            raw.values,
                            payload,
                            references,
                        ));
                    }
                    RowOutcome::Invalid(field_errors) => {
                        row_errors.extend(field_errors.iter().map(|fe| {
                            ImportError::validation(
                                job.id,
                                raw.row_index,
                                &fe.field,
                                &fe.message,
                                raw.values.clone(),
                            )
                        }));
                        staged.push(StagingRow::blocked(
                            job.id,
                            raw.row_index,
                            raw.values,
                            field_errors,
                        ));
                    }
                }
            }

            let blocked = staged
                .iter()
                .filter(|r| r.resolution_status == ResolutionStatus::Blocked)
                .count() as u64;
            let count = staged.len() as u64;

            self.staging.insert_rows(&staged).await?;
            if !row_errors.is_empty() {
                self.errors.insert(&row_errors).await?;
            }
            let unmapped = resolver.drain_unmapped(job.id);
            if !unmapped.is_empty() {
                self.staging.merge_unmapped(job.id, &unmapped).await?;
            }

            progress.total_rows += staged.len() as i64;
            progress.processed_rows = progress.total_rows;
            self.jobs.update_progress(job.id, &progress).await?;

            let metrics = self.notifier.metrics();
            metrics.record_rows("validation", "staged", count - blocked);
            metrics.record_rows("validation", "blocked", blocked);
            metrics.record_batch_duration("validation", started.elapsed().as_secs_f64());
            self.notifier.progress(job, &progress).await;
        }

        Ok(StageOutcome::Completed(progress))
    }

    async fn finish(&self, job: &ImportJob, progress: JobProgress) -> anyhow::Result<()> {
        match self
            .jobs
            .transition(
                job.id,
                &[ImportJobStatus::Validating],
                ImportJobStatus::Validated,
                None,
            )
            .await?
        {
            Some(validated) => {
                info!(
                    job_id = %job.id,
                    total_rows = progress.total_rows,
                    "import job validated"
                );
                self.notifier.status_changed(&validated).await;
                Ok(())
            }
            None => {
                // 完了直前にキャンセルまたはウォッチドッグで終端化された
                let current = self.jobs.find_by_id(job.id).await?;
                match current.map(|j| j.status) {
                    Some(ImportJobStatus::Cancelled) => self.reset(job.id, false).await,
                    Some(ImportJobStatus::Failed) => self.reset(job.id, true).await,
                    _ => Ok(()),
                }
            }
        }
    }

    async fn fail(&self, job: &ImportJob, summary: &str) -> anyhow::Result<()> {
        error!(job_id = %job.id, error = %summary, "import validation failed");
        if let Err(e) = self.reset(job.id, true).await {
            error!(job_id = %job.id, error = %e, "failed to purge staging of failed job");
        }
        if let Some(failed) = self
            .jobs
            .transition(
                job.id,
                &[ImportJobStatus::Validating],
                ImportJobStatus::Failed,
                Some(summary.to_string()),
            )
            .await?
        {
            self.notifier.status_changed(&failed).await;
        }
        Ok(())
    }

    /// ステージングを削除する。with_errors が true の場合は検証エラーも削除する。
    async fn reset(&self, job_id: Uuid, with_errors: bool) -> anyhow::Result<()> {
        self.staging.purge(job_id).await?;
        if with_errors {
            self.errors.delete_for_job(job_id).await?;
        }
        Ok(())
    }
}

/// パーサから最大 size 行を読み出す。CSV の読み込みはブロッキング I/O のため専用スレッドで行う。
async fn next_chunk(
    mut rows: SheetRows,
    size: usize,
) -> anyhow::Result<(SheetRows, Result<Vec<RawRow>, ParseError>)> {
    let result = tokio::task::spawn_blocking(move || {
        let chunk = rows.by_ref().take(size).collect::<Result<Vec<_>, _>>();
        (rows, chunk)
    })
    .await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::catalog_entity::CatalogEntity;
    use crate::domain::repository::catalog_repository::MockCatalogRepository;
    use crate::domain::repository::file_store::MockFileStore;
    use crate::domain::repository::import_error_repository::MockImportErrorRepository;
    use crate::domain::repository::import_job_repository::MockImportJobRepository;
    use crate::domain::repository::staging_repository::MockStagingRepository;
    use crate::domain::value_object::EntityType;
    use crate::infrastructure::event_publisher::NoopImportEventPublisher;
    use crate::infrastructure::metrics::ImportMetrics;

    fn notifier() -> Arc<JobNotifier> {
        Arc::new(JobNotifier::new(
            Arc::new(NoopImportEventPublisher),
            Arc::new(ImportMetrics::new("test")),
        ))
    }

    fn job_in(status: ImportJobStatus, filename: &str) -> ImportJob {
        let mut job = ImportJob::new(Uuid::new_v4(), "f-1".to_string(), filename.to_string());
        job.status = status;
        job
    }

    fn transitions(job: &ImportJob) -> MockImportJobRepository {
        let mut jobs = MockImportJobRepository::new();
        let template = job.clone();
        jobs.expect_transition().returning(move |_, from, to, summary| {
            let mut next = template.clone();
            assert!(from.iter().any(|s| s.can_transition_to(to)));
            next.status = to;
            next.error_summary = summary;
            Ok(Some(next))
        });
        jobs
    }

    fn usecase(
        jobs: MockImportJobRepository,
        staging: MockStagingRepository,
        errors: MockImportErrorRepository,
        catalog: MockCatalogRepository,
        files: MockFileStore,
    ) -> RunValidationUseCase {
        RunValidationUseCase::new(
            Arc::new(jobs),
            Arc::new(staging),
            Arc::new(errors),
            Arc::new(catalog),
            Arc::new(files),
            notifier(),
            Arc::new(JobLeaseRegistry::new()),
            2,
        )
    }

    fn file(content: &'static str) -> MockFileStore {
        let mut files = MockFileStore::new();
        files
            .expect_fetch()
            .returning(move |_, _| Ok(Some(content.as_bytes().to_vec())));
        files
    }

    #[tokio::test]
    async fn test_stages_rows_in_chunks_and_validates() {
        let job = job_in(ImportJobStatus::Pending, "catalog.csv");
        let mut jobs = transitions(&job);
        jobs.expect_update_progress().times(2).returning(|_, _| Ok(()));

        let mut staging = MockStagingRepository::new();
        staging
            .expect_insert_rows()
            .times(2)
            .returning(|_| Ok(()));
        staging
            .expect_merge_unmapped()
            .withf(|_, values| values.len() == 1 && values[0].raw_value == "Crimson")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut errors = MockImportErrorRepository::new();
        errors
            .expect_insert()
            .withf(|errs| errs.len() == 1 && errs[0].row_index == 3)
            .times(1)
            .returning(|_| Ok(()));

        let brand_id = job.brand_id;
        let mut catalog = MockCatalogRepository::new();
        catalog.expect_list_brand_entities().returning(move |_| {
            Ok(vec![CatalogEntity::brand_owned(brand_id, EntityType::Color, "Red")])
        });
        catalog.expect_list_taxonomy().returning(|| Ok(vec![]));

        let files = file(
            "product_name,sku,color_name\nShirt,S-1,Red\nPants,S-2,Crimson\n,S-3,Red\n",
        );
        let uc = usecase(jobs, staging, errors, catalog, files);
        uc.run(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_columns_fail_the_job() {
        let job = job_in(ImportJobStatus::Pending, "catalog.csv");
        let mut jobs = MockImportJobRepository::new();
        let template = job.clone();
        jobs.expect_transition().returning(move |_, _, to, summary| {
            if to == ImportJobStatus::Failed {
                assert_eq!(
                    summary.as_deref(),
                    Some("missing required columns: upid|sku")
                );
            }
            let mut next = template.clone();
            next.status = to;
            Ok(Some(next))
        });
        let mut staging = MockStagingRepository::new();
        staging.expect_purge().times(1).returning(|_| Ok(()));
        let mut errors = MockImportErrorRepository::new();
        errors.expect_delete_for_job().times(1).returning(|_| Ok(()));

        let uc = usecase(
            jobs,
            staging,
            errors,
            MockCatalogRepository::new(),
            file("product_name,color_name\nShirt,Red\n"),
        );
        uc.run(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_without_reading_file() {
        let job = job_in(ImportJobStatus::Pending, "catalog.pdf");
        let mut staging = MockStagingRepository::new();
        staging.expect_purge().returning(|_| Ok(()));
        let mut errors = MockImportErrorRepository::new();
        errors.expect_delete_for_job().returning(|_| Ok(()));

        let uc = usecase(
            transitions(&job),
            staging,
            errors,
            MockCatalogRepository::new(),
            MockFileStore::new(),
        );
        uc.run(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_job_not_pending_is_skipped() {
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_transition().returning(|_, _, _, _| Ok(None));
        let uc = usecase(
            jobs,
            MockStagingRepository::new(),
            MockImportErrorRepository::new(),
            MockCatalogRepository::new(),
            MockFileStore::new(),
        );
        uc.run(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_stopped_by_watchdog_clears_errors() {
        let job = job_in(ImportJobStatus::Pending, "catalog.csv");
        let job_id = job.id;
        let leases = Arc::new(JobLeaseRegistry::new());
        let mut jobs = MockImportJobRepository::new();
        let validating = {
            let mut j = job.clone();
            j.status = ImportJobStatus::Validating;
            j
        };
        jobs.expect_transition()
            .withf(|_, from, _, _| *from == [ImportJobStatus::Pending])
            .times(1)
            .returning(move |_, _, _, _| Ok(Some(validating.clone())));
        let watchdog = leases.clone();
        jobs.expect_update_progress().returning(move |id, _| {
            watchdog.cancel(id);
            Ok(())
        });
        let failed = {
            let mut j = job.clone();
            j.status = ImportJobStatus::Failed;
            j
        };
        jobs.expect_find_by_id()
            .returning(move |_| Ok(Some(failed.clone())));

        let mut staging = MockStagingRepository::new();
        staging.expect_insert_rows().returning(|_| Ok(()));
        staging.expect_purge().times(1).returning(|_| Ok(()));
        let mut errors = MockImportErrorRepository::new();
        errors.expect_insert().returning(|_| Ok(()));
        errors
            .expect_delete_for_job()
            .withf(move |id| *id == job_id)
            .times(1)
            .returning(|_| Ok(()));

        let mut catalog = MockCatalogRepository::new();
        catalog.expect_list_brand_entities().returning(|_| Ok(vec![]));
        catalog.expect_list_taxonomy().returning(|| Ok(vec![]));

        let uc = RunValidationUseCase::new(
            Arc::new(jobs),
            Arc::new(staging),
            Arc::new(errors),
            Arc::new(catalog),
            Arc::new(file("product_name,sku\n,S-1\nShirt,S-2\n,S-3\n")),
            notifier(),
            leases,
            2,
        );
        uc.run(job_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_before_completion_purges_staging() {
        let job = job_in(ImportJobStatus::Pending, "catalog.csv");
        let cancelled = {
            let mut j = job.clone();
            j.status = ImportJobStatus::Cancelled;
            j
        };
        let mut jobs = MockImportJobRepository::new();
        let validating = {
            let mut j = job.clone();
            j.status = ImportJobStatus::Validating;
            j
        };
        jobs.expect_transition()
            .returning(move |_, from, _, _| {
                if from == [ImportJobStatus::Pending] {
                    Ok(Some(validating.clone()))
                } else {
                    Ok(None)
                }
            });
        jobs.expect_update_progress().returning(|_, _| Ok(()));
        jobs.expect_find_by_id()
            .returning(move |_| Ok(Some(cancelled.clone())));

        let mut staging = MockStagingRepository::new();
        staging.expect_insert_rows().returning(|_| Ok(()));
        staging.expect_purge().times(1).returning(|_| Ok(()));

        let mut catalog = MockCatalogRepository::new();
        catalog.expect_list_brand_entities().returning(|_| Ok(vec![]));
        catalog.expect_list_taxonomy().returning(|| Ok(vec![]));

        let uc = usecase(
            jobs,
            staging,
            MockImportErrorRepository::new(),
            catalog,
            file("product_name,sku\nShirt,S-1\n"),
        );
        uc.run(job.id).await.unwrap();
    }
}
