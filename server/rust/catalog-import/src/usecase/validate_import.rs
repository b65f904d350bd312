use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::error::UseCaseError;
use crate::domain::repository::FileStore;
use crate::domain::value_object::SpreadsheetFormat;

/// ImportPrecheck はステージング開始前の事前チェック結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPrecheck {
    pub valid: bool,
    pub format: Option<SpreadsheetFormat>,
    pub size_bytes: Option<u64>,
    pub errors: Vec<String>,
}

/// ValidateImportUseCase はファイル形式とサイズを検査する。ジョブは作成しない。
pub struct ValidateImportUseCase {
    files: Arc<dyn FileStore>,
    max_file_size_bytes: u64,
}

impl ValidateImportUseCase {
    pub fn new(files: Arc<dyn FileStore>, max_file_size_bytes: u64) -> Self {
        Self {
            files,
            max_file_size_bytes,
        }
    }

    pub async fn execute(
        &self,
        brand_id: Uuid,
        file_id: &str,
        filename: &str,
    ) -> Result<ImportPrecheck, UseCaseError> {
        let mut errors = Vec::new();
        if file_id.trim().is_empty() {
            errors.push("file_id is required".to_string());
        }

        let format = SpreadsheetFormat::from_filename(filename);
        if format.is_none() {
            errors.push(format!(
                "unsupported file format: {filename} (expected .csv, .xls or .xlsx)"
            ));
        }

        let size_bytes = if file_id.trim().is_empty() {
            None
        } else {
            self.files.size(brand_id, file_id).await?
        };
        match size_bytes {
            None if !file_id.trim().is_empty() => {
                errors.push(format!("file not found: {file_id}"));
            }
            Some(0) => errors.push("file is empty".to_string()),
            Some(size) if size > self.max_file_size_bytes => errors.push(format!(
                "file is too large: {size} bytes (max {} bytes)",
                self.max_file_size_bytes
            )),
            _ => {}
        }

        Ok(ImportPrecheck {
            valid: errors.is_empty(),
            format,
            size_bytes,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::file_store::MockFileStore;

    fn usecase(size: Option<u64>) -> ValidateImportUseCase {
        let mut files = MockFileStore::new();
        files.expect_size().returning(move |_, _| Ok(size));
        ValidateImportUseCase::new(Arc::new(files), 1024)
    }

    #[tokio::test]
    async fn test_valid_file() {
        let check = usecase(Some(100))
            .execute(Uuid::new_v4(), "f-1", "catalog.XLSX")
            .await
            .unwrap();
        assert!(check.valid);
        assert_eq!(check.format, Some(SpreadsheetFormat::Xlsx));
        assert_eq!(check.size_bytes, Some(100));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let check = usecase(Some(100))
            .execute(Uuid::new_v4(), "f-1", "catalog.pdf")
            .await
            .unwrap();
        assert!(!check.valid);
        assert!(check.errors[0].contains("unsupported file format"));
    }

    #[tokio::test]
    async fn test_too_large_and_empty() {
        let large = usecase(Some(2048))
            .execute(Uuid::new_v4(), "f-1", "a.csv")
            .await
            .unwrap();
        assert!(large.errors[0].contains("too large"));

        let empty = usecase(Some(0))
            .execute(Uuid::new_v4(), "f-1", "a.csv")
            .await
            .unwrap();
        assert_eq!(empty.errors, vec!["file is empty"]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let check = usecase(None)
            .execute(Uuid::new_v4(), "f-404", "a.csv")
            .await
            .unwrap();
        assert_eq!(check.errors, vec!["file not found: f-404"]);
    }
}
