use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_object::EntityType;

/// UnmappedKey は未解決値を一意に識別する (entity_type, source_column, raw_value) の組。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnmappedKey {
    pub entity_type: EntityType,
    pub source_column: String,
    pub raw_value: String,
}

impl UnmappedKey {
    pub fn new(
        entity_type: EntityType,
        source_column: impl Into<String>,
        raw_value: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            source_column: source_column.into(),
            raw_value: raw_value.into(),
        }
    }
}

/// UnmappedValue はジョブ内で解決できなかったエンティティ参照の集約。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedValue {
    pub job_id: Uuid,
    pub entity_type: EntityType,
    pub source_column: String,
    pub raw_value: String,
    pub affected_row_count: i64,
}

impl UnmappedValue {
    pub fn new(job_id: Uuid, key: UnmappedKey, affected_row_count: i64) -> Self {
        Self {
            job_id,
            entity_type: key.entity_type,
            source_column: key.source_column,
            raw_value: key.raw_value,
            affected_row_count,
        }
    }

    pub fn key(&self) -> UnmappedKey {
        UnmappedKey::new(self.entity_type, &self.source_column, &self.raw_value)
    }
}
