use async_trait::async_trait;
use pipeline_flow::{Context, FlowError, Result, Stage, StageResult};
use std::sync::Arc;
use tracing::info;

use super::CASE_KEY;
use crate::{models::ReportCase, ocr::TextExtractor};

/// Runs OCR on the captured image. Invoked at most once per capture: the
/// pipeline never loops back here, and a failed run stays parked until the
/// user retakes.
pub struct ExtractStage {
    extractor: Arc<dyn TextExtractor>,
}

impl ExtractStage {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn id(&self) -> &str {
        "extract"
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let mut case: ReportCase = context.get_required(CASE_KEY).await?;
        let image = case
            .image
            .clone()
            .ok_or_else(|| FlowError::ContextValue("captured image".to_string()))?;

        info!(case = %case.id, language = %case.language, "extracting text from report image");

        let extraction = self
            .extractor
            .extract_text(&image, &case.language, case.prefer_remote_ocr)
            .await
            .map_err(|e| FlowError::StageFailed(e.to_string()))?;

        info!(
            case = %case.id,
            chars = extraction.text.len(),
            engine = ?extraction.engine,
            "text extracted"
        );

        case.extraction = Some(extraction);
        context.set(CASE_KEY, case).await;

        Ok(StageResult::advance("text extracted from report image"))
    }
}
