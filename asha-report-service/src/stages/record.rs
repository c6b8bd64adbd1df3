use async_trait::async_trait;
use chrono::Utc;
use pipeline_flow::{Context, FlowError, Result, Stage, StageResult};
use std::sync::Arc;
use tracing::info;

use super::CASE_KEY;
use crate::{
    models::ReportCase,
    report::{ReportHistory, ReportRecord},
};

/// Assembles the final report record and appends it to the history. This is
/// the completion side effect the rest of the system observes.
pub struct RecordStage {
    history: Arc<ReportHistory>,
}

impl RecordStage {
    pub fn new(history: Arc<ReportHistory>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Stage for RecordStage {
    fn id(&self) -> &str {
        "record"
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let mut case: ReportCase = context.get_required(CASE_KEY).await?;

        let record = ReportRecord::from_case(&case)
            .ok_or_else(|| FlowError::ContextValue("extraction and summary".to_string()))?;

        let interpretation = record.summary.interpretation.clone();
        info!(case = %case.id, record = %record.id, "report recorded");
        self.history.push(record);

        case.completed_at = Some(Utc::now());
        context.set(CASE_KEY, case).await;

        Ok(StageResult::complete(
            Some(interpretation),
            "report recorded in history",
        ))
    }
}
