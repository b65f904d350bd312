use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::adapter::handler::error::ApiError;

/// テナント（ブランド）を伝えるヘッダ名。外部の認証レイヤーが付与する。
pub const BRAND_ID_HEADER: &str = "x-brand-id";

/// BrandContext はリクエストのテナントを表す extractor。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrandContext(pub Uuid);

impl BrandContext {
    pub fn brand_id(&self) -> Uuid {
        self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BrandContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(BRAND_ID_HEADER)
            .ok_or_else(|| ApiError::TenantRequired("missing X-Brand-Id header".to_string()))?;
        let brand_id = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| {
                ApiError::TenantRequired("X-Brand-Id header must be a UUID".to_string())
            })?;
        Ok(Self(brand_id))
    }
}
