pub mod catalog_in_memory;
pub mod catalog_postgres;
pub mod file_store_in_memory;
pub mod import_error_in_memory;
pub mod import_error_postgres;
pub mod import_job_in_memory;
pub mod import_job_postgres;
pub mod product_catalog_in_memory;
pub mod product_catalog_postgres;
pub mod staging_in_memory;
pub mod staging_postgres;
