use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::value_object::{formats, EntityType};

/// CatalogEntity はブランド固有エンティティ、または共有タクソノミーの1件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: Uuid,
    /// 共有タクソノミー（カテゴリ・季節・認証など）の場合は None。
    pub brand_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl CatalogEntity {
    pub fn brand_owned(brand_id: Uuid, entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            brand_id: Some(brand_id),
            entity_type,
            name: name.into(),
            attributes: serde_json::Value::Null,
        }
    }

    pub fn taxonomy(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            brand_id: None,
            entity_type,
            name: name.into(),
            attributes: serde_json::Value::Null,
        }
    }

    pub fn is_taxonomy(&self) -> bool {
        self.brand_id.is_none()
    }
}

fn hex_color(value: &str) -> Result<(), ValidationError> {
    if formats::is_hex_color(value) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

fn iso_country(value: &str) -> Result<(), ValidationError> {
    if formats::is_iso_country(value) {
        Ok(())
    } else {
        Err(ValidationError::new("iso_country"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MaterialData {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub recyclable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ColorData {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom(function = "hex_color"))]
    pub hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SizeData {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(range(min = 0))]
    pub sort_index: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EcoClaimData {
    #[validate(length(min = 1, max = 255))]
    pub claim: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FacilityData {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom(function = "iso_country"))]
    pub country_code: Option<String>,
    #[validate(length(max = 255))]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NamedData {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CertificationData {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 64))]
    pub code: Option<String>,
    #[validate(length(max = 255))]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: Uuid,
}

/// EntityData は新規エンティティ定義の型付きペイロード。`entity_type` をタグとする。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityData {
    Material(MaterialData),
    Color(ColorData),
    Size(SizeData),
    EcoClaim(EcoClaimData),
    Facility(FacilityData),
    Operator(NamedData),
    ShowcaseBrand(NamedData),
    Certification(CertificationData),
    Season(NamedData),
    Category(CategoryRef),
    Tag(NamedData),
}

impl EntityData {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Material(_) => EntityType::Material,
            Self::Color(_) => EntityType::Color,
            Self::Size(_) => EntityType::Size,
            Self::EcoClaim(_) => EntityType::EcoClaim,
            Self::Facility(_) => EntityType::Facility,
            Self::Operator(_) => EntityType::Operator,
            Self::ShowcaseBrand(_) => EntityType::ShowcaseBrand,
            Self::Certification(_) => EntityType::Certification,
            Self::Season(_) => EntityType::Season,
            Self::Category(_) => EntityType::Category,
            Self::Tag(_) => EntityType::Tag,
        }
    }

    /// 照合に使う表示名。カテゴリ参照は名前を持たない。
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Material(d) => Some(&d.name),
            Self::Color(d) => Some(&d.name),
            Self::Size(d) => Some(&d.name),
            Self::EcoClaim(d) => Some(&d.claim),
            Self::Facility(d) => Some(&d.name),
            Self::Operator(d) | Self::ShowcaseBrand(d) | Self::Season(d) | Self::Tag(d) => {
                Some(&d.name)
            }
            Self::Certification(d) => Some(&d.title),
            Self::Category(_) => None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::Material(d) => d.validate(),
            Self::Color(d) => d.validate(),
            Self::Size(d) => d.validate(),
            Self::EcoClaim(d) => d.validate(),
            Self::Facility(d) => d.validate(),
            Self::Operator(d) | Self::ShowcaseBrand(d) | Self::Season(d) | Self::Tag(d) => {
                d.validate()
            }
            Self::Certification(d) => d.validate(),
            Self::Category(_) => Ok(()),
        }
    }

    /// 名前以外の属性を JSON として取り出す（永続化用）。
    pub fn attributes(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
