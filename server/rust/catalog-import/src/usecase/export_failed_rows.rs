use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use super::error::UseCaseError;
use super::job_lookup::find_job;
use crate::domain::entity::import_error::ImportError;
use crate::domain::repository::{ImportErrorRepository, ImportJobRepository};
use crate::domain::value_object::SpreadsheetFormat;
use crate::infrastructure::spreadsheet::failed_row_writer::{
    write_csv, write_xlsx, FailedRow, FailedRowSheet,
};

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// ExportFormat は失敗行エクスポートの出力形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn from_str_value(s: &str) -> Result<Self, UseCaseError> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(UseCaseError::validation(format!(
                "unsupported export format: {s} (expected csv or xlsx)"
            ))),
        }
    }

    /// 元ファイルの形式に対応する出力形式。XLS は XLSX として出力する。
    fn for_upload(format: Option<SpreadsheetFormat>) -> Self {
        match format {
            Some(SpreadsheetFormat::Xls | SpreadsheetFormat::Xlsx) => Self::Xlsx,
            _ => Self::Csv,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Self::Csv => CSV_CONTENT_TYPE,
            Self::Xlsx => XLSX_CONTENT_TYPE,
        }
    }
}

/// ExportedFile はダウンロード用のファイル。
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub row_count: usize,
}

/// ExportFailedRowsUseCase は失敗行を元ファイルと同じカラム構成で書き出す。
pub struct ExportFailedRowsUseCase {
    jobs: Arc<dyn ImportJobRepository>,
    errors: Arc<dyn ImportErrorRepository>,
}

impl ExportFailedRowsUseCase {
    pub fn new(jobs: Arc<dyn ImportJobRepository>, errors: Arc<dyn ImportErrorRepository>) -> Self {
        Self { jobs, errors }
    }

    pub async fn execute(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
        format: Option<ExportFormat>,
    ) -> Result<ExportedFile, UseCaseError> {
        let job = find_job(self.jobs.as_ref(), brand_id, job_id).await?;
        let format = format.unwrap_or_else(|| ExportFormat::for_upload(job.format()));
        let errors = self.errors.list_all(job_id).await?;
        let sheet = build_sheet(errors);
        let row_count = sheet.rows.len();

        let bytes = tokio::task::spawn_blocking(move || match format {
            ExportFormat::Csv => write_csv(&sheet),
            ExportFormat::Xlsx => write_xlsx(&sheet),
        })
        .await
        .map_err(anyhow::Error::from)??;

        let stem = job
            .filename
            .rsplit_once('.')
            .map_or(job.filename.as_str(), |(stem, _)| stem);
        Ok(ExportedFile {
            filename: format!("{stem}-failed-rows.{}", format.extension()),
            content_type: format.content_type(),
            bytes,
            row_count,
        })
    }
}

/// 行ごとにエラーをまとめる。ヘッダは各行のスナップショットに現れた順。
fn build_sheet(errors: Vec<ImportError>) -> FailedRowSheet {
    let mut headers: Vec<String> = Vec::new();
    let mut rows: BTreeMap<i64, FailedRow> = BTreeMap::new();
    for error in errors {
        let reason = error.reason();
        let row = rows.entry(error.row_index).or_insert_with(|| {
            for column in error.raw_row_snapshot.columns() {
                if !headers.iter().any(|h| h == column) {
                    headers.push(column.to_string());
                }
            }
            FailedRow {
                row_index: error.row_index,
                values: error.raw_row_snapshot.clone(),
                reasons: Vec::new(),
            }
        });
        row.reasons.push(reason);
    }
    FailedRowSheet {
        headers,
        rows: rows.into_values().collect(),
    }
}
