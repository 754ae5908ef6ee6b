pub mod catalog;
pub mod field;
pub mod field_map;
pub mod loaders;

pub use catalog::{DocumentContext, FieldCatalog, SharedCellRule};
pub use field::{Classification, ComparisonRecord, ComparisonStatus, ExtractionRecord, FieldSpec};
pub use field_map::FieldMap;
pub use loaders::load_catalog;
