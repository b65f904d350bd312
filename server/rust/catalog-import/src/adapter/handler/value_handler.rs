use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::adapter::middleware::tenant::BrandContext;
use crate::domain::entity::unmapped_value::UnmappedValue;
use crate::usecase::{BatchDefineResult, DefineValueInput, MapToExistingInput, ResolutionResult};

#[derive(Debug, Serialize)]
pub struct UnmappedValuesResponse {
    pub items: Vec<UnmappedValue>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct BatchDefineRequest {
    pub values: Vec<DefineValueInput>,
}

pub async fn get_unmapped_values(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<UnmappedValuesResponse>, ApiError> {
    let items = state
        .get_unmapped_values_uc
        .execute(brand.brand_id(), job_id)
        .await?;
    let total = items.len();
    Ok(Json(UnmappedValuesResponse { items, total }))
}

pub async fn define_value(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
    Json(req): Json<DefineValueInput>,
) -> Result<Json<ResolutionResult>, ApiError> {
    let result = state
        .define_value_uc
        .execute(brand.brand_id(), job_id, req)
        .await?;
    Ok(Json(result))
}

pub async fn batch_define_values(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
    Json(req): Json<BatchDefineRequest>,
) -> Result<Json<BatchDefineResult>, ApiError> {
    let result = state
        .define_value_uc
        .execute_batch(brand.brand_id(), job_id, req.values)
        .await?;
    Ok(Json(result))
}

pub async fn map_to_existing(
    State(state): State<AppState>,
    brand: BrandContext,
    Path(job_id): Path<Uuid>,
    Json(req): Json<MapToExistingInput>,
) -> Result<Json<ResolutionResult>, ApiError> {
    let result = state
        .map_to_existing_uc
        .execute(brand.brand_id(), job_id, req)
        .await?;
    Ok(Json(result))
}
