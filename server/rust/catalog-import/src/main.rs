use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use k1s0_catalog_import_server::adapter::handler::{self, AppState};
use k1s0_catalog_import_server::adapter::repository::catalog_in_memory::InMemoryCatalogRepository;
use k1s0_catalog_import_server::adapter::repository::catalog_postgres::CatalogPostgresRepository;
use k1s0_catalog_import_server::adapter::repository::import_error_in_memory::InMemoryImportErrorRepository;
use k1s0_catalog_import_server::adapter::repository::import_error_postgres::ImportErrorPostgresRepository;
use k1s0_catalog_import_server::adapter::repository::import_job_in_memory::InMemoryImportJobRepository;
use k1s0_catalog_import_server::adapter::repository::import_job_postgres::ImportJobPostgresRepository;
use k1s0_catalog_import_server::adapter::repository::product_catalog_in_memory::InMemoryProductCatalog;
use k1s0_catalog_import_server::adapter::repository::product_catalog_postgres::ProductCatalogPostgresWriter;
use k1s0_catalog_import_server::adapter::repository::staging_in_memory::InMemoryStagingRepository;
use k1s0_catalog_import_server::adapter::repository::staging_postgres::StagingPostgresRepository;
use k1s0_catalog_import_server::domain::repository::{
    CatalogRepository, FileStore, ImportErrorRepository, ImportJobRepository,
    ProductCatalogWriter, StagingRepository,
};
use k1s0_catalog_import_server::infrastructure::config::Config;
use k1s0_catalog_import_server::infrastructure::database;
use k1s0_catalog_import_server::infrastructure::event_publisher::BroadcastImportEventPublisher;
use k1s0_catalog_import_server::infrastructure::file_store::LocalFileStore;
use k1s0_catalog_import_server::infrastructure::job_lease::JobLeaseRegistry;
use k1s0_catalog_import_server::infrastructure::job_notifier::JobNotifier;
use k1s0_catalog_import_server::infrastructure::metrics::ImportMetrics;
use k1s0_catalog_import_server::infrastructure::stuck_job_watchdog::StuckJobWatchdog;
use k1s0_catalog_import_server::infrastructure::telemetry::init_telemetry;
use k1s0_catalog_import_server::usecase;

struct Stores {
    jobs: Arc<dyn ImportJobRepository>,
    staging: Arc<dyn StagingRepository>,
    errors: Arc<dyn ImportErrorRepository>,
    catalog: Arc<dyn CatalogRepository>,
    writer: Arc<dyn ProductCatalogWriter>,
}

impl Stores {
    fn postgres(pool: &sqlx::PgPool) -> Self {
        Self {
            jobs: Arc::new(ImportJobPostgresRepository::new(pool.clone())),
            staging: Arc::new(StagingPostgresRepository::new(pool.clone())),
            errors: Arc::new(ImportErrorPostgresRepository::new(pool.clone())),
            catalog: Arc::new(CatalogPostgresRepository::new(pool.clone())),
            writer: Arc::new(ProductCatalogPostgresWriter::new(pool.clone())),
        }
    }

    fn in_memory() -> Self {
        Self {
            jobs: Arc::new(InMemoryImportJobRepository::new()),
            staging: Arc::new(InMemoryStagingRepository::new()),
            errors: Arc::new(InMemoryImportErrorRepository::new()),
            catalog: Arc::new(InMemoryCatalogRepository::new()),
            writer: Arc::new(InMemoryProductCatalog::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    // Telemetry
    init_telemetry(&cfg.logging)?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting catalog import server"
    );

    // Database pool (optional)
    let db_pool = database::connect(cfg.database.as_ref()).await?;
    let stores = if let Some(ref pool) = db_pool {
        if cfg.database.as_ref().is_none_or(|d| d.run_migrations) {
            database::run_migrations(pool).await?;
        }
        Stores::postgres(pool)
    } else {
        Stores::in_memory()
    };

    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&cfg.storage.upload_dir));
    let metrics = Arc::new(ImportMetrics::new(&cfg.app.name));
    let events = Arc::new(BroadcastImportEventPublisher::new(cfg.import.event_buffer));
    let notifier = Arc::new(JobNotifier::new(events, metrics.clone()));
    let leases = Arc::new(JobLeaseRegistry::new());

    // Use cases
    let validate_import_uc = Arc::new(usecase::ValidateImportUseCase::new(
        files.clone(),
        cfg.storage.max_file_size_bytes(),
    ));
    let run_validation_uc = Arc::new(usecase::RunValidationUseCase::new(
        stores.jobs.clone(),
        stores.staging.clone(),
        stores.errors.clone(),
        stores.catalog.clone(),
        files,
        notifier.clone(),
        leases.clone(),
        cfg.import.validation_batch_size,
    ));
    let commit_uc = Arc::new(usecase::CommitImportUseCase::new(
        stores.jobs.clone(),
        stores.staging.clone(),
        stores.errors.clone(),
        stores.writer.clone(),
        notifier.clone(),
        usecase::CommitSettings {
            batch_size: cfg.import.commit_batch_size,
            concurrency: cfg.import.commit_concurrency,
            purge_staging_on_complete: cfg.import.purge_staging_on_complete,
        },
    ));
    let start_import_uc = Arc::new(usecase::StartImportUseCase::new(
        stores.jobs.clone(),
        validate_import_uc.clone(),
        run_validation_uc.clone(),
        notifier.clone(),
    ));
    let approve_import_uc = Arc::new(usecase::ApproveImportUseCase::new(
        stores.jobs.clone(),
        stores.staging.clone(),
        leases.clone(),
        notifier.clone(),
        commit_uc,
    ));
    let cancel_import_uc = Arc::new(usecase::CancelImportUseCase::new(
        stores.jobs.clone(),
        stores.staging.clone(),
        leases.clone(),
        notifier.clone(),
    ));

    // Startup recovery
    let recover_uc =
        usecase::RecoverImportsUseCase::new(stores.jobs.clone(), run_validation_uc.clone());
    let recovered = recover_uc.execute().await?;
    if recovered > 0 {
        info!(count = recovered, "import jobs recovered at startup");
    }

    // Stuck job watchdog
    let watchdog = Arc::new(StuckJobWatchdog::new(
        stores.jobs.clone(),
        stores.staging.clone(),
        stores.errors.clone(),
        leases,
        notifier,
        cfg.import.watchdog_interval(),
        cfg.import.stall_timeout(),
    ));
    let watchdog_handle = watchdog.start();

    // AppState (REST handler用)
    let state = AppState {
        validate_import_uc,
        start_import_uc,
        get_import_status_uc: Arc::new(usecase::GetImportStatusUseCase::new(stores.jobs.clone())),
        get_import_errors_uc: Arc::new(usecase::GetImportErrorsUseCase::new(
            stores.jobs.clone(),
            stores.errors.clone(),
        )),
        get_staging_preview_uc: Arc::new(usecase::GetStagingPreviewUseCase::new(
            stores.jobs.clone(),
            stores.staging.clone(),
        )),
        get_unmapped_values_uc: Arc::new(usecase::GetUnmappedValuesUseCase::new(
            stores.jobs.clone(),
            stores.staging.clone(),
        )),
        define_value_uc: Arc::new(usecase::DefineValueUseCase::new(
            stores.jobs.clone(),
            stores.staging.clone(),
            stores.catalog.clone(),
        )),
        map_to_existing_uc: Arc::new(usecase::MapToExistingUseCase::new(
            stores.jobs.clone(),
            stores.staging.clone(),
            stores.catalog.clone(),
        )),
        export_failed_rows_uc: Arc::new(usecase::ExportFailedRowsUseCase::new(
            stores.jobs.clone(),
            stores.errors.clone(),
        )),
        approve_import_uc,
        cancel_import_uc,
        metrics,
        db_pool,
    };

    // Router
    let app = handler::router(state);

    // REST server
    let host: std::net::IpAddr = cfg.server.host.parse()?;
    let rest_addr = SocketAddr::new(host, cfg.server.port);
    info!("REST server starting on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    watchdog.stop();
    if let Err(e) = watchdog_handle.await {
        tracing::error!(error = %e, "stuck job watchdog task failed");
    }

    Ok(())
}
