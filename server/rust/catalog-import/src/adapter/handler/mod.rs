pub mod error;
pub mod import_handler;
pub mod value_handler;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::adapter::middleware::http_metrics::track_http_metrics;
use crate::infrastructure::metrics::ImportMetrics;
use crate::usecase::{
    ApproveImportUseCase, CancelImportUseCase, DefineValueUseCase, ExportFailedRowsUseCase,
    GetImportErrorsUseCase, GetImportStatusUseCase, GetStagingPreviewUseCase,
    GetUnmappedValuesUseCase, MapToExistingUseCase, StartImportUseCase, ValidateImportUseCase,
};

/// AppState はアプリケーション全体の共有状態を表す。
#[derive(Clone)]
pub struct AppState {
    pub validate_import_uc: Arc<ValidateImportUseCase>,
    pub start_import_uc: Arc<StartImportUseCase>,
    pub get_import_status_uc: Arc<GetImportStatusUseCase>,
    pub get_import_errors_uc: Arc<GetImportErrorsUseCase>,
    pub get_staging_preview_uc: Arc<GetStagingPreviewUseCase>,
    pub get_unmapped_values_uc: Arc<GetUnmappedValuesUseCase>,
    pub define_value_uc: Arc<DefineValueUseCase>,
    pub map_to_existing_uc: Arc<MapToExistingUseCase>,
    pub export_failed_rows_uc: Arc<ExportFailedRowsUseCase>,
    pub approve_import_uc: Arc<ApproveImportUseCase>,
    pub cancel_import_uc: Arc<CancelImportUseCase>,
    pub metrics: Arc<ImportMetrics>,
    pub db_pool: Option<sqlx::PgPool>,
}

/// REST API ルーターを構築する。
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health / Readiness / Metrics
        .route("/healthz", get(import_handler::healthz))
        .route("/readyz", get(import_handler::readyz))
        .route("/metrics", get(import_handler::metrics))
        // Import jobs
        .route("/api/v1/imports/validate", post(import_handler::validate_import))
        .route("/api/v1/imports", post(import_handler::start_import))
        .route("/api/v1/imports/{job_id}", get(import_handler::get_import_status))
        .route("/api/v1/imports/{job_id}/errors", get(import_handler::get_import_errors))
        .route("/api/v1/imports/{job_id}/staging", get(import_handler::get_staging_preview))
        .route(
            "/api/v1/imports/{job_id}/failed-rows/export",
            get(import_handler::export_failed_rows),
        )
        .route("/api/v1/imports/{job_id}/approve", post(import_handler::approve_import))
        .route("/api/v1/imports/{job_id}/cancel", post(import_handler::cancel_import))
        // Unmapped value resolution
        .route(
            "/api/v1/imports/{job_id}/unmapped-values",
            get(value_handler::get_unmapped_values),
        )
        .route(
            "/api/v1/imports/{job_id}/values/define",
            post(value_handler::define_value),
        )
        .route(
            "/api/v1/imports/{job_id}/values/batch-define",
            post(value_handler::batch_define_values),
        )
        .route(
            "/api/v1/imports/{job_id}/values/map-to-existing",
            post(value_handler::map_to_existing),
        )
        .layer(from_fn_with_state(state.clone(), track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// ErrorResponse は統一エラーレスポンス。
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub details: Vec<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                request_id: uuid::Uuid::new_v4().to_string(),
                details: vec![],
            },
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.error.details = details;
        self
    }
}
