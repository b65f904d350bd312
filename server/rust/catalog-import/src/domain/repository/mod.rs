pub mod catalog_repository;
pub mod file_store;
pub mod import_error_repository;
pub mod import_job_repository;
pub mod product_catalog_writer;
pub mod staging_repository;

pub use catalog_repository::CatalogRepository;
pub use file_store::FileStore;
pub use import_error_repository::ImportErrorRepository;
pub use import_job_repository::ImportJobRepository;
pub use product_catalog_writer::{BatchWriteError, ProductCatalogWriter, RowWriteOutcome, WriteKind};
pub use staging_repository::{ResolutionCounts, StagingRepository};
