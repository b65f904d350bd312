use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::error::UseCaseError;
use super::run_validation::RunValidationUseCase;
use super::validate_import::ValidateImportUseCase;
use crate::domain::entity::import_job::ImportJob;
use crate::domain::repository::ImportJobRepository;
use crate::infrastructure::job_notifier::JobNotifier;

/// StartImportInput はアップロード済みファイルのインポート開始要求。
#[derive(Debug, Clone, Deserialize)]
pub struct StartImportInput {
    pub file_id: String,
    pub filename: String,
}

/// StartImportUseCase はジョブを PENDING で作成し、検証ワーカーを起動する。
pub struct StartImportUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    precheck: Arc<ValidateImportUseCase>,
    validation: Arc<RunValidationUseCase>,
    notifier: Arc<JobNotifier>,
}

impl StartImportUseCase {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        precheck: Arc<ValidateImportUseCase>,
        validation: Arc<RunValidationUseCase>,
        notifier: Arc<JobNotifier>,
    ) -> Self {
        Self {
            jobs,
            precheck,
            validation,
            notifier,
        }
    }

    /// 事前チェックで検出できる問題は同期的に拒否する。
    pub async fn execute(
        &self,
        brand_id: Uuid,
        input: StartImportInput,
    ) -> Result<ImportJob, UseCaseError> {
        let precheck = self
            .precheck
            .execute(brand_id, &input.file_id, &input.filename)
            .await?;
        if !precheck.valid {
            return Err(UseCaseError::Validation {
                message: "file cannot be imported".to_string(),
                details: precheck.errors,
            });
        }

        let job = ImportJob::new(brand_id, input.file_id, input.filename);
        let job_id = job.id;
        self.jobs.create(&job).await?;
        self.notifier.status_changed(&job).await;

        info!(
            job_id = %job_id,
            brand_id = %brand_id,
            filename = %job.filename,
            "import job created, launching validation"
        );

        let validation = self.validation.clone();
        tokio::spawn(async move {
            if let Err(e) = validation.run(job_id).await {
                error!(job_id = %job_id, error = %e, "import validation failed");
            }
        });

        Ok(job)
    }
}
