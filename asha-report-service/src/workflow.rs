//! Pipeline assembly and the user-facing state names.

use pipeline_flow::{Pipeline, PipelineBuilder, PipelineRunner, RunStatus, Session, SessionStorage};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::ReportCase,
    ocr::TextExtractor,
    report::ReportHistory,
    stages::{CASE_KEY, ExtractStage, RecordStage, SummarizeStage},
    summarize::ReportSummarizer,
};

pub const PIPELINE_ID: &str = "report_analysis";

pub fn build_report_pipeline(
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn ReportSummarizer>,
    history: Arc<ReportHistory>,
) -> Pipeline {
    PipelineBuilder::new(PIPELINE_ID)
        .add_stage(Arc::new(ExtractStage::new(extractor)), "extraction_error")
        .add_stage(Arc::new(SummarizeStage::new(summarizer)), "summary_error")
        .add_stage(Arc::new(RecordStage::new(history)), "record_error")
        .build()
}

pub fn create_runner(
    pipeline: Pipeline,
    storage: Arc<dyn SessionStorage>,
) -> PipelineRunner {
    PipelineRunner::new(Arc::new(pipeline), storage)
}

/// New session holding a freshly captured case, parked before the first stage.
pub async fn create_report_session(case: ReportCase) -> Session {
    let session = Session::new_from_stage(Uuid::new_v4().to_string(), PIPELINE_ID, "extract");
    session.context.set(CASE_KEY, case).await;
    session
}

/// User-facing state name for a session:
/// idle, captured, extracting, summarizing, recording, extraction_error,
/// summary_error, completed.
pub async fn describe_state(session: &Session) -> String {
    match &session.status {
        RunStatus::Running { stage } => match stage.as_str() {
            "extract" => "extracting".to_string(),
            "summarize" => "summarizing".to_string(),
            "record" => "recording".to_string(),
            other => other.to_string(),
        },
        RunStatus::Failed { state, .. } => state.clone(),
        RunStatus::Completed => "completed".to_string(),
        RunStatus::AwaitingInput => {
            let case: Option<ReportCase> = session.context.get(CASE_KEY).await;
            if case.and_then(|c| c.image).is_some() {
                "captured".to_string()
            } else {
                "idle".to_string()
            }
        }
    }
}
