pub mod care_code;
pub mod entity_type;
pub mod formats;
pub mod page;
pub mod spreadsheet_format;

pub use care_code::CareCode;
pub use entity_type::EntityType;
pub use page::{Page, PageError, PageRequest};
pub use spreadsheet_format::SpreadsheetFormat;
