pub mod document_ctx;
pub mod pass_flow;

pub use document_ctx::DocumentCtx;
pub use pass_flow::{ExtractionOutcome, PassController, RunStatus};
