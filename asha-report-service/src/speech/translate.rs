use tracing::info;

use super::SpeechError;
use crate::llm::{CompletionError, ModelChain};

const TRANSLATE_PREAMBLE: &str =
    "You are a precise translator for healthcare communication. Translate faithfully and output only the translation.";

/// Translation via the same ordered-model chain as summarization, but with a
/// single-purpose prompt and no label parsing: the whole trimmed response is
/// the translation.
pub struct Translator {
    chain: ModelChain,
}

impl Translator {
    pub fn new(chain: ModelChain) -> Self {
        Self { chain }
    }

    pub async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let prompt = translation_prompt(text, source_language, target_language);
        match self.chain.complete(TRANSLATE_PREAMBLE, &prompt).await {
            Ok(completion) => {
                info!(
                    model = %completion.model,
                    from = source_language,
                    to = target_language,
                    "translation completed"
                );
                Ok(completion.text.trim().to_string())
            }
            Err(CompletionError::AllModelsFailed(message)) => {
                Err(SpeechError::TranslationFailed(message))
            }
        }
    }
}

fn translation_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        "Translate the following text from {source_language} to {target_language}.\n\
         Only provide the translated text without any additional explanations or formatting.\n\n\
         Text to translate:\n{text}\n\n\
         Translated text:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelChain;

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_model_call() {
        let translator = Translator::new(ModelChain::new("test-key"));
        let result = translator.translate("  ", "en", "hi").await;
        assert!(matches!(result, Err(SpeechError::EmptyText)));
    }

    #[test]
    fn prompt_names_both_languages_and_embeds_the_text() {
        let prompt = translation_prompt("Take one tablet daily", "en", "hi");
        assert!(prompt.contains("from en to hi"));
        assert!(prompt.contains("Take one tablet daily"));
    }
}
