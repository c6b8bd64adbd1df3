pub mod extract;
pub mod record;
pub mod summarize;

pub use extract::ExtractStage;
pub use record::RecordStage;
pub use summarize::SummarizeStage;

/// Context key holding the [`crate::models::ReportCase`] for the run.
pub const CASE_KEY: &str = "case";
