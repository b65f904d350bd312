use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_object::SpreadsheetFormat;

/// ImportJobStatus はインポートジョブのライフサイクル状態を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportJobStatus {
    Pending,
    Validating,
    Validated,
    Committing,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ImportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Validating => write!(f, "VALIDATING"),
            Self::Validated => write!(f, "VALIDATED"),
            Self::Committing => write!(f, "COMMITTING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl ImportJobStatus {
    /// キャンセル可能な（非終端の）状態。
    pub const ACTIVE: [ImportJobStatus; 4] = [
        Self::Pending,
        Self::Validating,
        Self::Validated,
        Self::Committing,
    ];

    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "VALIDATING" => Ok(Self::Validating),
            "VALIDATED" => Ok(Self::Validated),
            "COMMITTING" => Ok(Self::Committing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => anyhow::bail!("invalid import job status: {}", s),
        }
    }

    /// 終端状態かどうかを返す。
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// 許可された遷移かどうかを返す。終端状態からの遷移は存在しない。
    pub fn can_transition_to(self, next: Self) -> bool {
        use ImportJobStatus::{
            Cancelled, Committing, Completed, Failed, Pending, Validated, Validating,
        };
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Validated | Failed)
                | (Validated, Committing)
                | (Committing, Completed | Failed)
                | (Pending | Validating | Validated | Committing, Cancelled)
        )
    }
}

/// InvalidTransition は許可されていない状態遷移を表す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ImportJobStatus,
    pub to: ImportJobStatus,
}

/// JobProgress はジョブの進捗カウンタ。ハートビートを兼ねて永続化される。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub total_rows: i64,
    pub processed_rows: i64,
    pub created_rows: i64,
    pub updated_rows: i64,
    pub failed_rows: i64,
}

/// ImportJob は1回のファイル取り込みを表す。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub file_id: String,
    pub filename: String,
    pub status: ImportJobStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub created_rows: i64,
    pub updated_rows: i64,
    pub failed_rows: i64,
    pub error_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// PENDING 状態の新しいジョブを作成する。
    pub fn new(brand_id: Uuid, file_id: String, filename: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            brand_id,
            file_id,
            filename,
            status: ImportJobStatus::Pending,
            total_rows: 0,
            processed_rows: 0,
            created_rows: 0,
            updated_rows: 0,
            failed_rows: 0,
            error_summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn format(&self) -> Option<SpreadsheetFormat> {
        SpreadsheetFormat::from_filename(&self.filename)
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress {
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            created_rows: self.created_rows,
            updated_rows: self.updated_rows,
            failed_rows: self.failed_rows,
        }
    }

    pub fn apply_progress(&mut self, progress: &JobProgress) {
        self.total_rows = progress.total_rows;
        self.processed_rows = progress.processed_rows.min(progress.total_rows);
        self.created_rows = progress.created_rows;
        self.updated_rows = progress.updated_rows;
        self.failed_rows = progress.failed_rows;
        self.updated_at = Utc::now();
    }

    /// 状態を遷移させる。FAILED への遷移時のみ error_summary を記録する。
    pub fn transition_to(
        &mut self,
        next: ImportJobStatus,
        error_summary: Option<String>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if error_summary.is_some() {
            self.error_summary = error_summary;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> ImportJob {
        ImportJob::new(Uuid::new_v4(), "file-1".to_string(), "catalog.csv".to_string())
    }

    #[test]
    fn test_new_job() {
        let job = make_job();
        assert_eq!(job.status, ImportJobStatus::Pending);
        assert_eq!(job.total_rows, 0);
        assert_eq!(job.format(), Some(SpreadsheetFormat::Csv));
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = make_job();
        job.transition_to(ImportJobStatus::Validating, None).unwrap();
        job.transition_to(ImportJobStatus::Validated, None).unwrap();
        job.transition_to(ImportJobStatus::Committing, None).unwrap();
        job.transition_to(ImportJobStatus::Completed, None).unwrap();
        assert!(job.is_terminal());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [
            ImportJobStatus::Completed,
            ImportJobStatus::Failed,
            ImportJobStatus::Cancelled,
        ] {
            for next in [
                ImportJobStatus::Pending,
                ImportJobStatus::Validating,
                ImportJobStatus::Validated,
                ImportJobStatus::Committing,
                ImportJobStatus::Completed,
                ImportJobStatus::Failed,
                ImportJobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_validated_cannot_skip_to_completed() {
        let mut job = make_job();
        job.transition_to(ImportJobStatus::Validating, None).unwrap();
        job.transition_to(ImportJobStatus::Validated, None).unwrap();
        let err = job
            .transition_to(ImportJobStatus::Completed, None)
            .unwrap_err();
        assert_eq!(err.from, ImportJobStatus::Validated);
        assert_eq!(job.status, ImportJobStatus::Validated);
    }

    #[test]
    fn test_every_active_state_is_cancellable() {
        for status in ImportJobStatus::ACTIVE {
            assert!(status.can_transition_to(ImportJobStatus::Cancelled));
        }
    }

    #[test]
    fn test_fail_records_summary() {
        let mut job = make_job();
        job.transition_to(ImportJobStatus::Validating, None).unwrap();
        job.transition_to(ImportJobStatus::Failed, Some("missing required columns".into()))
            .unwrap();
        assert_eq!(job.error_summary.as_deref(), Some("missing required columns"));
    }

    #[test]
    fn test_progress_is_clamped_to_total() {
        let mut job = make_job();
        job.apply_progress(&JobProgress {
            total_rows: 10,
            processed_rows: 12,
            ..JobProgress::default()
        });
        assert_eq!(job.processed_rows, 10);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            ImportJobStatus::from_str_value("COMMITTING").unwrap(),
            ImportJobStatus::Committing
        );
        assert!(ImportJobStatus::from_str_value("RUNNING").is_err());
        assert_eq!(ImportJobStatus::Validated.to_string(), "VALIDATED");
    }
}
