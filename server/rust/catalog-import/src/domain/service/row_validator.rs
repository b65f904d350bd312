use std::collections::HashMap;

use crate::domain::entity::product_payload::{MaterialShare, ProductPayload};
use crate::domain::entity::raw_values::RawValues;
use crate::domain::entity::staging_row::FieldError;
use crate::domain::value_object::{formats, CareCode, EntityType};

const MAX_PRODUCT_NAME: usize = 100;
const MAX_IDENTIFIER: usize = 64;
const MAX_DESCRIPTION: usize = 2000;
const MAX_REFERENCE: usize = 255;
const MATERIAL_SLOTS: usize = 3;

/// 単一値のエンティティ参照カラム。
const SINGLE_REFERENCE_COLUMNS: [(&str, EntityType); 8] = [
    ("category_name", EntityType::Category),
    ("season", EntityType::Season),
    ("color_name", EntityType::Color),
    ("size_name", EntityType::Size),
    ("facility_name", EntityType::Facility),
    ("operator_name", EntityType::Operator),
    ("showcase_brand", EntityType::ShowcaseBrand),
    ("certification", EntityType::Certification),
];

/// カンマ区切りの複数値エンティティ参照カラム。
const LIST_REFERENCE_COLUMNS: [(&str, EntityType); 2] =
    [("eco_claims", EntityType::EcoClaim), ("tags", EntityType::Tag)];

/// 認識するカラム名の一覧。
pub const KNOWN_COLUMNS: &[&str] = &[
    "product_name",
    "upid",
    "sku",
    "description",
    "category_name",
    "season",
    "primary_image_url",
    "product_image_url",
    "color_name",
    "color_hex",
    "size_name",
    "material_1_name",
    "material_1_percentage",
    "material_2_name",
    "material_2_percentage",
    "material_3_name",
    "material_3_percentage",
    "care_codes",
    "eco_claims",
    "environment_score",
    "facility_name",
    "facility_country",
    "operator_name",
    "showcase_brand",
    "certification",
    "tags",
    "release_date",
];

/// HeaderCheck はヘッダ行の検査結果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCheck {
    pub missing: Vec<String>,
    pub unknown: Vec<String>,
}

impl HeaderCheck {
    pub fn is_acceptable(&self) -> bool {
        self.missing.is_empty()
    }
}

/// ヘッダ行を検査する。必須は product_name と upid/sku のいずれか。
pub fn check_headers<S: AsRef<str>>(headers: &[S]) -> HeaderCheck {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_ascii_lowercase())
        .collect();
    let has = |name: &str| normalized.iter().any(|h| h == name);

    let mut missing = Vec::new();
    if !has("product_name") {
        missing.push("product_name".to_string());
    }
    if !has("upid") && !has("sku") {
        missing.push("upid|sku".to_string());
    }
    let unknown = normalized
        .iter()
        .filter(|h| !h.is_empty() && !KNOWN_COLUMNS.contains(&h.as_str()))
        .cloned()
        .collect();
    HeaderCheck { missing, unknown }
}

/// RawReference は解決前のエンティティ参照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub entity_type: EntityType,
    pub source_column: String,
    pub raw_value: String,
}

/// RowOutcome は1行の検証結果。
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Valid {
        payload: ProductPayload,
        references: Vec<RawReference>,
    },
    Invalid(Vec<FieldError>),
}

/// RowValidator は商品行のフィールド検証を行う。
///
/// ファイル内での upid / sku の重複を検出するため、1ジョブにつき1インスタンスを使う。
#[derive(Debug, Default)]
pub struct RowValidator {
    first_seen: HashMap<String, i64>,
}

impl RowValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&mut self, row_index: i64, raw: &RawValues) -> RowOutcome {
        let mut errors = Vec::new();

        let product_name = raw.get("product_name").map(str::to_string);
        match &product_name {
            None => errors.push(FieldError::new("product_name", "is required")),
            Some(name) => check_length(&mut errors, "product_name", name, MAX_PRODUCT_NAME),
        }

        let upid = raw.get("upid").map(str::to_string);
        let sku = raw.get("sku").map(str::to_string);
        if upid.is_none() && sku.is_none() {
            errors.push(FieldError::new("upid", "either upid or sku is required"));
        }
        if let Some(upid) = &upid {
            check_length(&mut errors, "upid", upid, MAX_IDENTIFIER);
            self.check_duplicate(&mut errors, row_index, "upid", upid);
        }
        if let Some(sku) = &sku {
            check_length(&mut errors, "sku", sku, MAX_IDENTIFIER);
            self.check_duplicate(&mut errors, row_index, "sku", sku);
        }

        let description = raw.get("description").map(str::to_string);
        if let Some(description) = &description {
            check_length(&mut errors, "description", description, MAX_DESCRIPTION);
        }

        let primary_image_url = url_field(&mut errors, raw, "primary_image_url");
        let product_image_url = url_field(&mut errors, raw, "product_image_url");

        let color_hex = raw.get("color_hex").map(str::to_string);
        if let Some(hex) = &color_hex {
            if !formats::is_hex_color(hex) {
                errors.push(FieldError::new("color_hex", "must be a #RRGGBB hex color"));
            }
        }

        let materials = material_shares(&mut errors, raw);
        let care_codes = care_codes(&mut errors, raw);

        let environment_score = match raw.get("environment_score") {
            None => None,
            Some(value) => match value.parse::<i32>() {
                Ok(score) if (0..=100).contains(&score) => Some(score),
                _ => {
                    errors.push(FieldError::new(
                        "environment_score",
                        "must be an integer between 0 and 100",
                    ));
                    None
                }
            },
        };

        let facility_country = raw.get("facility_country").map(str::to_ascii_uppercase);
        if let Some(country) = &facility_country {
            if !formats::is_iso_country(country) {
                errors.push(FieldError::new(
                    "facility_country",
                    "must be an ISO 3166-1 alpha-2 country code",
                ));
            }
        }

        let release_date = match raw.get("release_date") {
            None => None,
            Some(value) => {
                let parsed = formats::parse_iso_date(value);
                if parsed.is_none() {
                    errors.push(FieldError::new("release_date", "must be a YYYY-MM-DD date"));
                }
                parsed
            }
        };

        let references = references(&mut errors, raw, &materials);

        if !errors.is_empty() {
            return RowOutcome::Invalid(errors);
        }
        let Some(product_name) = product_name else {
            return RowOutcome::Invalid(vec![FieldError::new("product_name", "is required")]);
        };

        RowOutcome::Valid {
            payload: ProductPayload {
                product_name,
                upid,
                sku,
                description,
                primary_image_url,
                product_image_url,
                color_hex,
                care_codes,
                environment_score,
                facility_country,
                release_date,
                materials,
            },
            references,
        }
    }

    fn check_duplicate(
        &mut self,
        errors: &mut Vec<FieldError>,
        row_index: i64,
        field: &str,
        value: &str,
    ) {
        let key = format!("{field}:{value}");
        match self.first_seen.get(&key) {
            Some(first) => errors.push(FieldError::new(
                field,
                format!("duplicate {field} '{value}' (first seen on row {first})"),
            )),
            None => {
                self.first_seen.insert(key, row_index);
            }
        }
    }
}

fn check_length(errors: &mut Vec<FieldError>, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}

fn url_field(errors: &mut Vec<FieldError>, raw: &RawValues, field: &str) -> Option<String> {
    let value = raw.get(field)?;
    if formats::is_http_url(value) {
        Some(value.to_string())
    } else {
        errors.push(FieldError::new(field, "must be an http(s) URL"));
        None
    }
}

fn material_shares(errors: &mut Vec<FieldError>, raw: &RawValues) -> Vec<MaterialShare> {
    let mut shares = Vec::new();
    for slot in 1..=MATERIAL_SLOTS {
        let name_column = format!("material_{slot}_name");
        let pct_column = format!("material_{slot}_percentage");
        match (raw.get(&name_column), raw.get(&pct_column)) {
            (None, None) => {}
            (Some(_), None) => errors.push(FieldError::new(
                pct_column.as_str(),
                "is required when the material name is set",
            )),
            (None, Some(_)) => errors.push(FieldError::new(
                name_column.as_str(),
                "is required when the material percentage is set",
            )),
            (Some(name), Some(pct)) => {
                let parsed = pct.trim_end_matches('%').trim().parse::<u8>();
                match parsed {
                    Ok(p) if (1..=100).contains(&p) => shares.push(MaterialShare {
                        source_column: name_column,
                        name: name.to_string(),
                        percentage: f64::from(p),
                    }),
                    _ => errors.push(FieldError::new(
                        pct_column.as_str(),
                        "must be an integer between 1 and 100",
                    )),
                }
            }
        }
    }
    if !shares.is_empty() && errors.iter().all(|e| !e.field.starts_with("material_")) {
        let total: f64 = shares.iter().map(|s| s.percentage).sum();
        if (total - 100.0).abs() > f64::EPSILON {
            errors.push(FieldError::new(
                "material_1_percentage",
                format!("material percentages must sum to 100 (got {total})"),
            ));
        }
    }
    shares
}

fn care_codes(errors: &mut Vec<FieldError>, raw: &RawValues) -> Vec<CareCode> {
    let mut codes = Vec::new();
    for token in split_list(raw.get("care_codes")) {
        match CareCode::parse(token) {
            Some(code) if !codes.contains(&code) => codes.push(code),
            Some(_) => {}
            None => errors.push(FieldError::new(
                "care_codes",
                format!("unknown care code '{token}'"),
            )),
        }
    }
    codes
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn references(
    errors: &mut Vec<FieldError>,
    raw: &RawValues,
    materials: &[MaterialShare],
) -> Vec<RawReference> {
    let mut refs: Vec<RawReference> = Vec::new();
    let mut push = |errors: &mut Vec<FieldError>, entity_type, column: &str, value: &str| {
        if value.chars().count() > MAX_REFERENCE {
            errors.push(FieldError::new(
                column,
                format!("must be at most {MAX_REFERENCE} characters"),
            ));
            return;
        }
        let duplicate = refs
            .iter()
            .any(|r| r.source_column == column && r.raw_value == value);
        if !duplicate {
            refs.push(RawReference {
                entity_type,
                source_column: column.to_string(),
                raw_value: value.to_string(),
            });
        }
    };

    for (column, entity_type) in SINGLE_REFERENCE_COLUMNS {
        if let Some(value) = raw.get(column) {
            push(errors, entity_type, column, value);
        }
    }
    for share in materials {
        push(errors, EntityType::Material, &share.source_column, &share.name);
    }
    for (column, entity_type) in LIST_REFERENCE_COLUMNS {
        for value in split_list(raw.get(column)) {
            push(errors, entity_type, column, value);
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawValues {
        RawValues::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    fn errors_of(outcome: RowOutcome) -> Vec<FieldError> {
        match outcome {
            RowOutcome::Invalid(errors) => errors,
            RowOutcome::Valid { .. } => panic!("expected invalid row"),
        }
    }

    #[test]
    fn test_check_headers_requires_name_and_key() {
        let check = check_headers(&["sku", "product_name", "Extra"]);
        assert!(check.is_acceptable());
        assert_eq!(check.unknown, vec!["extra".to_string()]);

        let check = check_headers(&["description"]);
        assert_eq!(
            check.missing,
            vec!["product_name".to_string(), "upid|sku".to_string()]
        );
    }

    #[test]
    fn test_valid_row_produces_payload_and_references() {
        let mut validator = RowValidator::new();
        let outcome = validator.validate(
            1,
            &row(&[
                ("product_name", "Wool Coat"),
                ("sku", "SKU-1"),
                ("color_name", "Crimson"),
                ("material_1_name", "Wool"),
                ("material_1_percentage", "70"),
                ("material_2_name", "Cashmere"),
                ("material_2_percentage", "30"),
                ("care_codes", "DRY_CLEAN, do_not_iron"),
                ("tags", "winter, outerwear, winter"),
                ("facility_country", "pt"),
                ("release_date", "2024-09-01"),
            ]),
        );
        let RowOutcome::Valid {
            payload,
            references,
        } = outcome
        else {
            panic!("expected valid row");
        };
        assert_eq!(payload.product_key(), Some("SKU-1"));
        assert_eq!(payload.materials.len(), 2);
        assert_eq!(payload.care_codes, vec![CareCode::DryClean, CareCode::DoNotIron]);
        assert_eq!(payload.facility_country.as_deref(), Some("PT"));
        let tags: Vec<_> = references
            .iter()
            .filter(|r| r.entity_type == EntityType::Tag)
            .map(|r| r.raw_value.as_str())
            .collect();
        assert_eq!(tags, vec!["winter", "outerwear"]);
        assert!(references
            .iter()
            .any(|r| r.entity_type == EntityType::Color && r.raw_value == "Crimson"));
        assert_eq!(
            references
                .iter()
                .filter(|r| r.entity_type == EntityType::Material)
                .count(),
            2
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let mut validator = RowValidator::new();
        let errors = errors_of(validator.validate(1, &row(&[("description", "x")])));
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["product_name", "upid"]);
    }

    #[test]
    fn test_length_limits() {
        let mut validator = RowValidator::new();
        let long_name = "n".repeat(101);
        let errors = errors_of(validator.validate(
            1,
            &row(&[("product_name", long_name.as_str()), ("sku", "A")]),
        ));
        assert_eq!(errors[0].field, "product_name");
    }

    #[test]
    fn test_format_checks() {
        let mut validator = RowValidator::new();
        let errors = errors_of(validator.validate(
            1,
            &row(&[
                ("product_name", "Shirt"),
                ("sku", "S-1"),
                ("color_hex", "red"),
                ("primary_image_url", "not-a-url"),
                ("facility_country", "XX"),
                ("environment_score", "101"),
                ("care_codes", "STEAM_CLEAN"),
                ("release_date", "01/02/2024"),
            ]),
        ));
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"color_hex"));
        assert!(fields.contains(&"primary_image_url"));
        assert!(fields.contains(&"facility_country"));
        assert!(fields.contains(&"environment_score"));
        assert!(fields.contains(&"care_codes"));
        assert!(fields.contains(&"release_date"));
    }

    #[test]
    fn test_material_percentages_must_sum_to_100() {
        let mut validator = RowValidator::new();
        let errors = errors_of(validator.validate(
            1,
            &row(&[
                ("product_name", "Shirt"),
                ("sku", "S-1"),
                ("material_1_name", "Cotton"),
                ("material_1_percentage", "60"),
                ("material_2_name", "Linen"),
                ("material_2_percentage", "30"),
            ]),
        ));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("sum to 100"));
    }

    #[test]
    fn test_material_name_without_percentage() {
        let mut validator = RowValidator::new();
        let errors = errors_of(validator.validate(
            1,
            &row(&[
                ("product_name", "Shirt"),
                ("sku", "S-1"),
                ("material_1_name", "Cotton"),
            ]),
        ));
        assert_eq!(errors[0].field, "material_1_percentage");
    }

    #[test]
    fn test_duplicate_sku_names_first_row() {
        let mut validator = RowValidator::new();
        let first = validator.validate(1, &row(&[("product_name", "A"), ("sku", "DUP")]));
        assert!(matches!(first, RowOutcome::Valid { .. }));
        let errors = errors_of(validator.validate(4, &row(&[("product_name", "B"), ("sku", "DUP")])));
        assert_eq!(errors[0].field, "sku");
        assert!(errors[0].message.contains("row 1"));
    }
}
