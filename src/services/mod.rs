pub mod comparator;
pub mod extraction_service;
pub mod rule_engine;
pub mod synonym_resolver;
pub mod table_parser;
pub mod value_classifier;
pub mod warn_writer;

pub use comparator::compare;
pub use extraction_service::{ExtractionEngine, ExtractionService};
pub use rule_engine::{RuleDiscrepancy, RuleEngine};
pub use synonym_resolver::SynonymResolver;
pub use table_parser::{parse_table, ParseOutcome};
pub use value_classifier::ValueClassifier;
pub use warn_writer::WarnWriter;
