use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::adapter::middleware::tenant::BrandContext;
use crate::domain::entity::import_error::{ErrorPhase, ImportError};
use crate::domain::entity::import_job::{ImportJob, ImportJobStatus};
use crate::domain::entity::product_payload::ProductPayload;
use crate::domain::entity::raw_values::RawValues;
use crate::domain::entity::staging_row::{
    EntityReference, FieldError, ResolutionStatus, StagingRow,
};
use crate::domain::value_object::{Page, PageRequest};
use crate::usecase::{ExportFormat, ImportPrecheck, StartImportInput, UseCaseError};

// --- Request / Response DTOs ---

#[derive(Debug, Deserialize)]
pub struct ImportFileRequest {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    fn to_request(&self) -> Result<PageRequest, ApiError> {
        PageRequest::new(self.limit, self.offset)
            .map_err(|e| ApiError::from(UseCaseError::from(e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportJobResponse {
    pub job_id: String,
    pub brand_id: String,
    pub file_id: String,
    pub filename: String,
    pub status: ImportJobStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub created_rows: i64,
    pub updated_rows: i64,
    pub failed_rows: i64,
    pub error_summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ImportJob> for ImportJobResponse {
    fn from(job: ImportJob) -> Self {
        Self {
            job_id: job.id.to_string(),
            brand_id: job.brand_id.to_string(),
            file_id: job.file_id,
            filename: job.filename,
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            created_rows: job.created_rows,
            updated_rows: job.updated_rows,
            failed_rows: job.failed_rows,
            error_summary: job.error_summary,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportErrorResponse {
    pub row_index: i64,
    pub field: Option<String>,
    pub message: String,
    pub phase: ErrorPhase,
    pub raw_row_snapshot: RawValues,
    pub created_at: String,
}

impl From<ImportError> for ImportErrorResponse {
    fn from(e: ImportError) -> Self {
        Self {
            row_index: e.row_index,
            field: e.field,
            message: e.message,
            phase: e.phase,
            raw_row_snapshot: e.raw_row_snapshot,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StagingRowResponse {
    pub row_index: i64,
    pub raw_values: RawValues,
    pub normalized_payload: Option<ProductPayload>,
    pub validation_errors: Vec<FieldError>,
    pub references: Vec<EntityReference>,
    pub resolution_status: ResolutionStatus,
}

impl From<StagingRow> for StagingRowResponse {
    fn from(row: StagingRow) -> Self {
        Self {
            row_index: row.row_index,
            raw_values: row.raw_values,
            normalized_payload: row.normalized_payload,
            validation_errors: row.validation_errors,
            references: row.references,
            resolution_status: row.resolution_status,
        }
    }
}

// --- Handlers ---

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz(State(state): State<AppState>) -> Response {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "readiness check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response();
        }
    }
    "ok".into_response()
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.gather_metrics()
}

pub async fn validate_import(
    State(state): State<AppState>,
    brand: BrandContext,
    Json(req): Json<ImportFileRequest>,
) -> Result<Json<ImportPrecheck>, ApiError> {
    let precheck = state
        .validate_import_uc
        .execute(brand.brand_id(), &req.file_id, &req.filename)
        .await?;
    Ok(Json(precheck))
}

pub async fn start_import(
    State(state): State<AppState>,
    brand: BrandContext,
    Json(req): Json<ImportFileRequest>,
) -> Result<(StatusCode, Json<ImportJobResponse>), ApiError> {
    let job = state
        .start_import_uc
        .execute(
            brand.brand_id(),
            StartImportInput {
                file_id: req.file_id,
                filename: req.filename,
            },
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn get_import_status(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ImportJobResponse>, ApiError> {
    let job = state
        .get_import_status_uc
        .execute(brand.brand_id(), job_id)
        .await?;
    Ok(Json(job.into()))
}

pub async fn get_import_errors(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ImportErrorResponse>>, ApiError> {
    let page = query.to_request()?;
    let errors = state
        .get_import_errors_uc
        .execute(brand.brand_id(), job_id, page)
        .await?;
    Ok(Json(errors.map(ImportErrorResponse::from)))
}

pub async fn get_staging_preview(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<StagingRowResponse>>, ApiError> {
    let page = query.to_request()?;
    let rows = state
        .get_staging_preview_uc
        .execute(brand.brand_id(), job_id, page)
        .await?;
    Ok(Json(rows.map(StagingRowResponse::from)))
}

pub async fn export_failed_rows(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = query
        .format
        .as_deref()
        .map(ExportFormat::from_str_value)
        .transpose()?;
    let file = state
        .export_failed_rows_uc
        .execute(brand.brand_id(), job_id, format)
        .await?;
    let disposition = format!("attachment; filename=\"{}\"", file.filename.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

pub async fn approve_import(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ImportJobResponse>), ApiError> {
    let job = state
        .approve_import_uc
        .execute(brand.brand_id(), job_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn cancel_import(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ImportJobResponse>, ApiError> {
    let job = state
        .cancel_import_uc
        .execute(brand.brand_id(), job_id)
        .await?;
    Ok(Json(job.into()))
}
