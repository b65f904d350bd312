//! テスト用インメモリ構成。
//! 統合テスト（tests/）から利用する。

use std::sync::Arc;

use uuid::Uuid;

use crate::adapter::handler::AppState;
use crate::adapter::repository::catalog_in_memory::InMemoryCatalogRepository;
use crate::adapter::repository::file_store_in_memory::InMemoryFileStore;
use crate::adapter::repository::import_error_in_memory::InMemoryImportErrorRepository;
use crate::adapter::repository::import_job_in_memory::InMemoryImportJobRepository;
use crate::adapter::repository::product_catalog_in_memory::InMemoryProductCatalog;
use crate::adapter::repository::staging_in_memory::InMemoryStagingRepository;
use crate::domain::entity::catalog_entity::CatalogEntity;
use crate::domain::repository::{
    CatalogRepository, FileStore, ImportErrorRepository, ImportJobRepository,
    ProductCatalogWriter, StagingRepository,
};
use crate::domain::value_object::EntityType;
use crate::infrastructure::event_publisher::BroadcastImportEventPublisher;
use crate::infrastructure::job_lease::JobLeaseRegistry;
use crate::infrastructure::job_notifier::JobNotifier;
use crate::infrastructure::metrics::ImportMetrics;
use crate::usecase::{
    ApproveImportUseCase, CancelImportUseCase, CommitImportUseCase, CommitSettings,
    DefineValueUseCase, ExportFailedRowsUseCase, GetImportErrorsUseCase, GetImportStatusUseCase,
    GetStagingPreviewUseCase, GetUnmappedValuesUseCase, MapToExistingUseCase,
    RunValidationUseCase, StartImportUseCase, ValidateImportUseCase,
};

/// テスト用のファイルサイズ上限（1 MiB）。
pub const TEST_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// TestHarness はインメモリ構成の AppState と各ストアへのハンドル。
pub struct TestHarness {
    pub state: AppState,
    pub jobs: Arc<InMemoryImportJobRepository>,
    pub staging: Arc<InMemoryStagingRepository>,
    pub errors: Arc<InMemoryImportErrorRepository>,
    pub catalog: Arc<InMemoryCatalogRepository>,
    pub products: Arc<InMemoryProductCatalog>,
    pub files: Arc<InMemoryFileStore>,
    pub events: Arc<BroadcastImportEventPublisher>,
}

impl TestHarness {
    /// 小さいバッチでコミットするテスト構成。
    pub fn new() -> Self {
        Self::with_settings(CommitSettings {
            batch_size: 2,
            concurrency: 2,
            purge_staging_on_complete: false,
        })
    }

    pub fn with_settings(settings: CommitSettings) -> Self {
        let jobs = Arc::new(InMemoryImportJobRepository::new());
        let staging = Arc::new(InMemoryStagingRepository::new());
        let errors = Arc::new(InMemoryImportErrorRepository::new());
        let catalog = Arc::new(InMemoryCatalogRepository::new());
        let products = Arc::new(InMemoryProductCatalog::new());
        let files = Arc::new(InMemoryFileStore::new());
        let events = Arc::new(BroadcastImportEventPublisher::new(64));

        let state = build_app_state(
            jobs.clone(),
            staging.clone(),
            errors.clone(),
            catalog.clone(),
            products.clone(),
            files.clone(),
            events.clone(),
            settings,
        );
        Self {
            state,
            jobs,
            staging,
            errors,
            catalog,
            products,
            files,
            events,
        }
    }

    pub fn router(&self) -> axum::Router {
        crate::adapter::handler::router(self.state.clone())
    }

    /// ブランドのアップロード済みファイルを登録する。
    pub async fn upload(&self, brand_id: Uuid, file_id: &str, bytes: impl Into<Vec<u8>>) {
        self.files.put(brand_id, file_id, bytes.into()).await;
    }

    /// ブランド所有エンティティを登録する。
    pub async fn seed_entity(&self, brand_id: Uuid, entity_type: EntityType, name: &str) -> Uuid {
        self.catalog
            .seed(CatalogEntity::brand_owned(brand_id, entity_type, name))
            .await
    }

    /// 共有タクソノミーを登録する。
    pub async fn seed_taxonomy(&self, entity_type: EntityType, name: &str) -> Uuid {
        self.catalog
            .seed(CatalogEntity::taxonomy(entity_type, name))
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// ストア群から AppState を組み立てる。
#[allow(clippy::too_many_arguments)]
fn build_app_state(
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    errors: Arc<dyn ImportErrorRepository>,
    catalog: Arc<dyn CatalogRepository>,
    writer: Arc<dyn ProductCatalogWriter>,
    files: Arc<dyn FileStore>,
    events: Arc<BroadcastImportEventPublisher>,
    settings: CommitSettings,
) -> AppState {
    let metrics = Arc::new(ImportMetrics::new("catalog-import-test"));
    let notifier = Arc::new(JobNotifier::new(events, metrics.clone()));
    let leases = Arc::new(JobLeaseRegistry::new());

    let validate_import_uc = Arc::new(ValidateImportUseCase::new(
        files.clone(),
        TEST_MAX_FILE_SIZE,
    ));
    let run_validation_uc = Arc::new(RunValidationUseCase::new(
        jobs.clone(),
        staging.clone(),
        errors.clone(),
        catalog.clone(),
        files,
        notifier.clone(),
        leases.clone(),
        3,
    ));
    let commit_uc = Arc::new(CommitImportUseCase::new(
        jobs.clone(),
        staging.clone(),
        errors.clone(),
        writer,
        notifier.clone(),
        settings,
    ));

    AppState {
        start_import_uc: Arc::new(StartImportUseCase::new(
            jobs.clone(),
            validate_import_uc.clone(),
            run_validation_uc,
            notifier.clone(),
        )),
        validate_import_uc,
        get_import_status_uc: Arc::new(GetImportStatusUseCase::new(jobs.clone())),
        get_import_errors_uc: Arc::new(GetImportErrorsUseCase::new(jobs.clone(), errors.clone())),
        get_staging_preview_uc: Arc::new(GetStagingPreviewUseCase::new(
            jobs.clone(),
            staging.clone(),
        )),
        get_unmapped_values_uc: Arc::new(GetUnmappedValuesUseCase::new(
            jobs.clone(),
            staging.clone(),
        )),
        define_value_uc: Arc::new(DefineValueUseCase::new(
            jobs.clone(),
            staging.clone(),
            catalog.clone(),
        )),
        map_to_existing_uc: Arc::new(MapToExistingUseCase::new(
            jobs.clone(),
            staging.clone(),
            catalog,
        )),
        export_failed_rows_uc: Arc::new(ExportFailedRowsUseCase::new(jobs.clone(), errors)),
        approve_import_uc: Arc::new(ApproveImportUseCase::new(
            jobs.clone(),
            staging.clone(),
            leases.clone(),
            notifier.clone(),
            commit_uc,
        )),
        cancel_import_uc: Arc::new(CancelImportUseCase::new(jobs, staging, leases, notifier)),
        metrics,
        db_pool: None,
    }
}
