pub mod catalog_entity;
pub mod import_error;
pub mod import_job;
pub mod product_command;
pub mod product_payload;
pub mod raw_values;
pub mod staging_row;
pub mod unmapped_value;

pub use catalog_entity::{CatalogEntity, EntityData};
pub use import_error::{ErrorPhase, ImportError};
pub use import_job::{ImportJob, ImportJobStatus, InvalidTransition, JobProgress};
pub use product_command::ProductCommand;
pub use product_payload::{MaterialShare, ProductPayload};
pub use raw_values::RawValues;
pub use staging_row::{EntityReference, FieldError, ResolutionStatus, StagingRow};
pub use unmapped_value::{UnmappedKey, UnmappedValue};
