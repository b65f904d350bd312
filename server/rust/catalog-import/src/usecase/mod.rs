pub mod approve_import;
pub mod cancel_import;
pub mod commit_import;
pub mod define_value;
pub mod error;
pub mod export_failed_rows;
pub mod get_import_errors;
pub mod get_import_status;
pub mod get_staging_preview;
pub mod get_unmapped_values;
mod job_lookup;
pub mod map_to_existing;
pub mod recover_imports;
mod resolution_support;
pub mod run_validation;
pub mod start_import;
pub mod validate_import;

pub use approve_import::ApproveImportUseCase;
pub use cancel_import::CancelImportUseCase;
pub use commit_import::{CommitImportUseCase, CommitSettings};
pub use define_value::{BatchDefineResult, DefineValueInput, DefineValueUseCase};
pub use error::UseCaseError;
pub use export_failed_rows::{ExportFailedRowsUseCase, ExportFormat, ExportedFile};
pub use get_import_errors::GetImportErrorsUseCase;
pub use get_import_status::GetImportStatusUseCase;
pub use get_staging_preview::GetStagingPreviewUseCase;
pub use get_unmapped_values::GetUnmappedValuesUseCase;
pub use map_to_existing::{MapToExistingInput, MapToExistingUseCase};
pub use recover_imports::RecoverImportsUseCase;
pub use resolution_support::ResolutionResult;
pub use run_validation::RunValidationUseCase;
pub use start_import::{StartImportInput, StartImportUseCase};
pub use validate_import::{ImportPrecheck, ValidateImportUseCase};
