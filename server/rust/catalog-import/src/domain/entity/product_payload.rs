use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::value_object::CareCode;

/// MaterialShare は素材カラム（material_N_name / material_N_percentage）の1組。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialShare {
    pub source_column: String,
    pub name: String,
    pub percentage: f64,
}

/// ProductPayload は検証済み行の正規化済み（型付き）値。
///
/// エンティティ参照の名前（色・サイズ等）は `EntityReference` 側に保持され、
/// ここには参照を伴わないスカラー値のみを持つ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub product_name: String,
    pub upid: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub primary_image_url: Option<String>,
    pub product_image_url: Option<String>,
    pub color_hex: Option<String>,
    #[serde(default)]
    pub care_codes: Vec<CareCode>,
    pub environment_score: Option<i32>,
    pub facility_country: Option<String>,
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub materials: Vec<MaterialShare>,
}

impl ProductPayload {
    /// 商品を一意に識別するキー。upid を優先し、無ければ sku を使う。
    pub fn product_key(&self) -> Option<&str> {
        self.upid.as_deref().or(self.sku.as_deref())
    }
}
