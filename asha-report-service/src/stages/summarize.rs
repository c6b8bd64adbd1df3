use async_trait::async_trait;
use pipeline_flow::{Context, FlowError, Result, Stage, StageResult};
use std::sync::Arc;
use tracing::info;

use super::CASE_KEY;
use crate::{models::ReportCase, summarize::ReportSummarizer};

/// Generates the structured summary from the extracted text. Invoked at most
/// once per successful extraction.
pub struct SummarizeStage {
    summarizer: Arc<dyn ReportSummarizer>,
}

impl SummarizeStage {
    pub fn new(summarizer: Arc<dyn ReportSummarizer>) -> Self {
        Self { summarizer }
    }
}

#[async_trait]
impl Stage for SummarizeStage {
    fn id(&self) -> &str {
        "summarize"
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let mut case: ReportCase = context.get_required(CASE_KEY).await?;
        let extraction = case
            .extraction
            .clone()
            .ok_or_else(|| FlowError::ContextValue("extraction result".to_string()))?;

        info!(case = %case.id, "summarizing extracted report text");

        let summary = self
            .summarizer
            .summarize(&extraction.text, &case.language)
            .await
            .map_err(|e| FlowError::StageFailed(e.to_string()))?;

        info!(
            case = %case.id,
            model = %summary.model,
            items = summary.action_items.len(),
            "summary ready"
        );

        case.summary = Some(summary);
        context.set(CASE_KEY, case).await;

        Ok(StageResult::advance("medical summary generated"))
    }
}
