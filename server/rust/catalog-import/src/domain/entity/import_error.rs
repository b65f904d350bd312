use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::raw_values::RawValues;

/// ErrorPhase はエラーがどの段階で発生したか。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorPhase {
    Validation,
    Commit,
}

impl std::fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Commit => write!(f, "COMMIT"),
        }
    }
}

impl ErrorPhase {
    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        match s {
            "VALIDATION" => Ok(Self::Validation),
            "COMMIT" => Ok(Self::Commit),
            _ => anyhow::bail!("invalid error phase: {}", s),
        }
    }
}

/// ImportError は行単位の失敗記録。ジョブがキャンセルされても保持される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportError {
    pub id: Uuid,
    pub job_id: Uuid,
    pub row_index: i64,
    pub field: Option<String>,
    pub message: String,
    pub phase: ErrorPhase,
    pub raw_row_snapshot: RawValues,
    pub created_at: DateTime<Utc>,
}

impl ImportError {
    pub fn validation(
        job_id: Uuid,
        row_index: i64,
        field: impl Into<String>,
        message: impl Into<String>,
        raw_row_snapshot: RawValues,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            row_index,
            field: Some(field.into()),
            message: message.into(),
            phase: ErrorPhase::Validation,
            raw_row_snapshot,
            created_at: Utc::now(),
        }
    }

    pub fn commit(
        job_id: Uuid,
        row_index: i64,
        message: impl Into<String>,
        raw_row_snapshot: RawValues,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            row_index,
            field: None,
            message: message.into(),
            phase: ErrorPhase::Commit,
            raw_row_snapshot,
            created_at: Utc::now(),
        }
    }

    /// エクスポート時の理由文字列。
    pub fn reason(&self) -> String {
        match &self.field {
            Some(field) => format!("{field}: {}", self.message),
            None => self.message.clone(),
        }
    }
}
