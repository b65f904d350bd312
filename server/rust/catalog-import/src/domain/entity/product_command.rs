use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::staging_row::{ResolutionStatus, StagingRow};
use crate::domain::value_object::CareCode;

/// ResolvedMaterial は解決済み素材 ID と構成比。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMaterial {
    pub material_id: Uuid,
    pub percentage: f64,
}

/// ProductAttributes はカタログへ書き込む商品属性（参照 ID 解決済み）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub upid: Option<String>,
    pub category_id: Option<Uuid>,
    pub season_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
    pub facility_country: Option<String>,
    pub operator_id: Option<Uuid>,
    pub showcase_brand_id: Option<Uuid>,
    pub certification_id: Option<Uuid>,
    pub materials: Vec<ResolvedMaterial>,
    pub eco_claim_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub care_codes: Vec<CareCode>,
    pub environment_score: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub primary_image_url: Option<String>,
}

/// VariantAttributes は SKU 単位のバリアント属性。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantAttributes {
    pub color_id: Option<Uuid>,
    pub color_hex: Option<String>,
    pub size_id: Option<Uuid>,
    pub image_url: Option<String>,
}

/// ProductCommand はコミット対象1行分の upsert 命令。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCommand {
    pub row_index: i64,
    pub product_key: String,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub attributes: ProductAttributes,
    pub variant: VariantAttributes,
}

impl ProductCommand {
    /// RESOLVED のステージング行から upsert 命令を組み立てる。
    pub fn from_staging_row(row: &StagingRow) -> Result<Self, String> {
        if row.resolution_status != ResolutionStatus::Resolved {
            return Err(format!(
                "row is {} and cannot be committed",
                row.resolution_status
            ));
        }
        let payload = row
            .normalized_payload
            .as_ref()
            .ok_or_else(|| "row has no normalized payload".to_string())?;
        let product_key = payload
            .product_key()
            .ok_or_else(|| "row has neither upid nor sku".to_string())?
            .to_string();

        let single = |column: &str| -> Option<Uuid> { row.resolved_ids_for(column).first().copied() };

        let mut materials = Vec::with_capacity(payload.materials.len());
        for share in &payload.materials {
            let material_id = row
                .resolved_id(&share.source_column, &share.name)
                .ok_or_else(|| format!("{} is not resolved", share.source_column))?;
            materials.push(ResolvedMaterial {
                material_id,
                percentage: share.percentage,
            });
        }

        Ok(Self {
            row_index: row.row_index,
            product_key,
            sku: payload.sku.clone(),
            name: payload.product_name.clone(),
            description: payload.description.clone(),
            attributes: ProductAttributes {
                upid: payload.upid.clone(),
                category_id: single("category_name"),
                season_id: single("season"),
                facility_id: single("facility_name"),
                facility_country: payload.facility_country.clone(),
                operator_id: single("operator_name"),
                showcase_brand_id: single("showcase_brand"),
                certification_id: single("certification"),
                materials,
                eco_claim_ids: row.resolved_ids_for("eco_claims"),
                tag_ids: row.resolved_ids_for("tags"),
                care_codes: payload.care_codes.clone(),
                environment_score: payload.environment_score,
                release_date: payload.release_date,
                primary_image_url: payload.primary_image_url.clone(),
            },
            variant: VariantAttributes {
                color_id: single("color_name"),
                color_hex: payload.color_hex.clone(),
                size_id: single("size_name"),
                image_url: payload.product_image_url.clone(),
            },
        })
    }

    /// バッチ間の独立性判定に使う書き込みキー。
    pub fn write_keys(&self) -> Vec<String> {
        let mut keys = vec![format!("product:{}", self.product_key)];
        if let Some(sku) = &self.sku {
            keys.push(format!("sku:{sku}"));
        }
        keys
    }
}
