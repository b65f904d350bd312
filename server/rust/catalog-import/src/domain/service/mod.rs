pub mod batch_planner;
pub mod entity_resolver;
pub mod row_validator;

pub use entity_resolver::EntityResolver;
pub use row_validator::{check_headers, HeaderCheck, RawReference, RowOutcome, RowValidator};
