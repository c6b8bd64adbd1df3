//! Translation + text-to-speech adapter.
//!
//! `speak` validates, translates, then synthesizes — in that order. A blank
//! input fails before any remote call, and a translation failure means the
//! speech API is never contacted.

pub mod sarvam;
pub mod translate;

pub use sarvam::{AudioHandle, SarvamTts, SynthesizedAudio, VoiceOptions};
pub use translate::Translator;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::languages;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("no text provided")]
    EmptyText,

    #[error("Translation failed for all models: {0}")]
    TranslationFailed(String),

    #[error("text-to-speech conversion failed: {0}")]
    Synthesis(String),

    #[error("no audio data received from the speech service: {0}")]
    NoAudio(String),

    #[error("audio payload could not be decoded: {0}")]
    Decode(String),
}

/// Translated text plus its synthesized audio.
#[derive(Debug, Clone, Serialize)]
pub struct SpokenTranslation {
    pub original_text: String,
    pub translated_text: String,
    pub target_locale: String,
    /// Audio payload as received (base64 WAV).
    pub audio_base64: String,
    /// Correlation id assigned by the speech service.
    pub request_id: Option<String>,
}

pub struct SpeechAdapter {
    translator: Translator,
    tts: SarvamTts,
    /// Current playback buffer. Installing a new one releases the previous.
    playback: Mutex<Option<AudioHandle>>,
}

impl SpeechAdapter {
    pub fn new(translator: Translator, tts: SarvamTts) -> Self {
        Self {
            translator,
            tts,
            playback: Mutex::new(None),
        }
    }

    /// Translate `text` into the language of `target_locale`, then synthesize
    /// the translation.
    pub async fn speak(
        &self,
        text: &str,
        source_language: &str,
        target_locale: &str,
        options: &VoiceOptions,
    ) -> Result<SpokenTranslation, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let target_language = languages::base_language(target_locale);
        let translated = self
            .translator
            .translate(text, source_language, target_language)
            .await?;

        let audio = self.tts.synthesize(&translated, target_locale, options).await?;
        let handle = AudioHandle::decode(&audio.audio_base64)?;
        info!(
            bytes = handle.len(),
            request_id = ?audio.request_id,
            "synthesized translated summary"
        );

        // Supersede (and thereby release) the previous playback buffer.
        *self.playback.lock().await = Some(handle);

        Ok(SpokenTranslation {
            original_text: text.to_string(),
            translated_text: translated,
            target_locale: target_locale.to_string(),
            audio_base64: audio.audio_base64,
            request_id: audio.request_id,
        })
    }

    /// Translation step alone.
    pub async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, SpeechError> {
        self.translator
            .translate(text, source_language, target_language)
            .await
    }

    /// Synthesis step alone; still tracks the playback buffer.
    pub async fn synthesize(
        &self,
        text: &str,
        target_locale: &str,
        options: &VoiceOptions,
    ) -> Result<SynthesizedAudio, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }
        let audio = self.tts.synthesize(text, target_locale, options).await?;
        let handle = AudioHandle::decode(&audio.audio_base64)?;
        *self.playback.lock().await = Some(handle);
        Ok(audio)
    }

    pub async fn playback_len(&self) -> Option<usize> {
        self.playback.lock().await.as_ref().map(|h| h.len())
    }
}
