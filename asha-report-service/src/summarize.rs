use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::{
    llm::{CompletionError, ModelChain},
    models::Summary,
    summary::{LabeledSectionParser, SummaryParser},
};

const SUMMARY_PREAMBLE: &str =
    "You are a medical AI assistant helping community health workers interpret medical reports.";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("no text provided for summarization")]
    EmptyText,

    #[error("AI analysis failed for all models: {0}")]
    AllModelsFailed(String),
}

#[async_trait]
pub trait ReportSummarizer: Send + Sync {
    async fn summarize(&self, text: &str, language: &str) -> Result<Summary, SummarizeError>;
}

/// Summarization adapter: ordered-model Gemini chain plus the labeled-section
/// parsing boundary.
pub struct GeminiSummarizer {
    chain: ModelChain,
    parser: Box<dyn SummaryParser>,
}

impl GeminiSummarizer {
    pub fn new(chain: ModelChain) -> Self {
        Self {
            chain,
            parser: Box::new(LabeledSectionParser),
        }
    }

    pub fn with_parser(chain: ModelChain, parser: Box<dyn SummaryParser>) -> Self {
        Self { chain, parser }
    }
}

#[async_trait]
impl ReportSummarizer for GeminiSummarizer {
    async fn summarize(&self, text: &str, language: &str) -> Result<Summary, SummarizeError> {
        if text.trim().is_empty() {
            return Err(SummarizeError::EmptyText);
        }

        let prompt = summary_prompt(language, text);
        let completion = self
            .chain
            .complete(SUMMARY_PREAMBLE, &prompt)
            .await
            .map_err(|CompletionError::AllModelsFailed(message)| {
                SummarizeError::AllModelsFailed(message)
            })?;

        let parsed = self.parser.parse(&completion.text, language);
        info!(
            model = %completion.model,
            items = parsed.action_items.len(),
            "summary generated"
        );

        Ok(Summary {
            interpretation: parsed.interpretation,
            action_items: parsed.action_items,
            model: completion.model,
        })
    }
}

/// Language-specific prompt template requesting the two labeled sections.
fn summary_prompt(language: &str, text: &str) -> String {
    match language {
        "hi" => format!(
            "इस दस्तावेज़ का विश्लेषण और सारांश प्रदान करें। एक व्यापक विश्लेषण शामिल करें:\n\n\
             1. मुख्य विषय और महत्वपूर्ण बिंदु\n\
             2. महत्वपूर्ण विवरण और अंतर्दृष्टि\n\
             3. दस्तावेज़ के उद्देश्य का सारांश\n\
             4. कोई उल्लेखनीय पैटर्न या अवलोकन\n\n\
             दस्तावेज़ पाठ:\n{text}\n\n\
             कृपया निम्नलिखित प्रारूप में उत्तर दें:\n\
             व्याख्या: [दस्तावेज़ की व्याख्या]\n\
             कार्य बिंदु: [कार्य के लिए सुझाव]"
        ),
        _ => format!(
            "Analyze and summarize this document. Provide a comprehensive analysis including:\n\n\
             1. Main topics and key points\n\
             2. Important details and insights\n\
             3. Summary of the document's purpose\n\
             4. Any notable patterns or observations\n\n\
             Document text:\n{text}\n\n\
             Please provide the response in the following format:\n\
             Interpretation: [interpretation of the document]\n\
             Action Items: [suggestions for action]"
        ),
    }
}
