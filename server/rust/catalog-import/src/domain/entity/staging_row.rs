use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product_payload::ProductPayload;
use super::raw_values::RawValues;
use super::unmapped_value::UnmappedKey;
use crate::domain::value_object::EntityType;

/// ResolutionStatus はステージング行の解決状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStatus {
    Resolved,
    Unmapped,
    Blocked,
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Unmapped => write!(f, "UNMAPPED"),
            Self::Blocked => write!(f, "BLOCKED"),
        }
    }
}

impl ResolutionStatus {
    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        match s {
            "RESOLVED" => Ok(Self::Resolved),
            "UNMAPPED" => Ok(Self::Unmapped),
            "BLOCKED" => Ok(Self::Blocked),
            _ => anyhow::bail!("invalid resolution status: {}", s),
        }
    }
}

/// FieldError はフィールド単位の検証エラー。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// EntityReference は行内のエンティティ参照。entity_id が None なら未解決。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReference {
    pub entity_type: EntityType,
    pub source_column: String,
    pub raw_value: String,
    pub entity_id: Option<Uuid>,
}

impl EntityReference {
    pub fn key(&self) -> UnmappedKey {
        UnmappedKey::new(self.entity_type, &self.source_column, &self.raw_value)
    }

    pub fn matches(&self, key: &UnmappedKey) -> bool {
        self.entity_type == key.entity_type
            && self.source_column == key.source_column
            && self.raw_value == key.raw_value
    }

    pub fn is_resolved(&self) -> bool {
        self.entity_id.is_some()
    }
}

/// StagingRow はアップロードファイルの1データ行の検証済み表現。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRow {
    pub job_id: Uuid,
    pub row_index: i64,
    pub raw_values: RawValues,
    pub normalized_payload: Option<ProductPayload>,
    pub validation_errors: Vec<FieldError>,
    pub references: Vec<EntityReference>,
    pub resolution_status: ResolutionStatus,
}

impl StagingRow {
    /// 検証に失敗した行。常に BLOCKED となる。
    pub fn blocked(
        job_id: Uuid,
        row_index: i64,
        raw_values: RawValues,
        validation_errors: Vec<FieldError>,
    ) -> Self {
        Self {
            job_id,
            row_index,
            raw_values,
            normalized_payload: None,
            validation_errors,
            references: Vec::new(),
            resolution_status: ResolutionStatus::Blocked,
        }
    }

    /// 検証に通った行。参照の解決状況から状態を決定する。
    pub fn validated(
        job_id: Uuid,
        row_index: i64,
        raw_values: RawValues,
        payload: ProductPayload,
        references: Vec<EntityReference>,
    ) -> Self {
        let mut row = Self {
            job_id,
            row_index,
            raw_values,
            normalized_payload: Some(payload),
            validation_errors: Vec::new(),
            references,
            resolution_status: ResolutionStatus::Resolved,
        };
        row.recompute_status();
        row
    }

    /// BLOCKED > UNMAPPED > RESOLVED の優先順で状態を再計算する。
    pub fn recompute_status(&mut self) {
        self.resolution_status = if !self.validation_errors.is_empty() {
            ResolutionStatus::Blocked
        } else if self.references.iter().any(|r| !r.is_resolved()) {
            ResolutionStatus::Unmapped
        } else {
            ResolutionStatus::Resolved
        };
    }

    /// 未解決参照のうち key に一致するものへ entity_id を設定する。変更があれば true。
    pub fn apply_resolution(&mut self, key: &UnmappedKey, entity_id: Uuid) -> bool {
        let mut changed = false;
        for reference in &mut self.references {
            if !reference.is_resolved() && reference.matches(key) {
                reference.entity_id = Some(entity_id);
                changed = true;
            }
        }
        if changed {
            self.recompute_status();
        }
        changed
    }

    pub fn has_unresolved(&self, key: &UnmappedKey) -> bool {
        self.references
            .iter()
            .any(|r| !r.is_resolved() && r.matches(key))
    }

    /// source_column と raw_value に対応する解決済み ID を返す。
    pub fn resolved_id(&self, source_column: &str, raw_value: &str) -> Option<Uuid> {
        self.references
            .iter()
            .find(|r| r.source_column == source_column && r.raw_value == raw_value)
            .and_then(|r| r.entity_id)
    }

    /// source_column の参照のうち解決済みのものを列挙順に返す（複数値カラム用）。
    pub fn resolved_ids_for(&self, source_column: &str) -> Vec<Uuid> {
        self.references
            .iter()
            .filter(|r| r.source_column == source_column)
            .filter_map(|r| r.entity_id)
            .collect()
    }
}
