//! Sarvam text-to-speech client.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SpeechError;

/// Voice configuration sent with every synthesis request. Field names match
/// the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceOptions {
    pub speaker: String,
    pub pitch: f32,
    pub pace: f32,
    pub loudness: f32,
    pub speech_sample_rate: u32,
    pub enable_preprocessing: bool,
    pub model: String,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            speaker: "anushka".to_string(),
            pitch: 0.0,
            pace: 1.0,
            loudness: 1.0,
            speech_sample_rate: 22_050,
            enable_preprocessing: true,
            model: "bulbul:v2".to_string(),
        }
    }
}

/// One synthesized audio payload plus the service's correlation id.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio_base64: String,
    pub request_id: Option<String>,
}

/// Decoded audio held for the current playback. Dropping the handle releases
/// the buffer; the adapter installs a new handle per request so superseded
/// audio never accumulates.
pub struct AudioHandle {
    bytes: Vec<u8>,
}

impl AudioHandle {
    pub fn decode(audio_base64: &str) -> Result<Self, SpeechError> {
        let bytes = STANDARD
            .decode(audio_base64)
            .map_err(|e| SpeechError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Err(SpeechError::Decode("empty audio payload".to_string()));
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub struct SarvamTts {
    http: Client,
    api_key: String,
    base_url: String,
}

impl SarvamTts {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Synthesize `text` in the given locale. Fails with a descriptive error
    /// when the service returns no audio payloads.
    pub async fn synthesize(
        &self,
        text: &str,
        target_language_code: &str,
        options: &VoiceOptions,
    ) -> Result<SynthesizedAudio, SpeechError> {
        #[derive(Serialize)]
        struct Body<'a> {
            text: &'a str,
            target_language_code: &'a str,
            #[serde(flatten)]
            options: &'a VoiceOptions,
        }

        debug!(
            locale = target_language_code,
            speaker = %options.speaker,
            chars = text.len(),
            "requesting speech synthesis"
        );

        let response = self
            .http
            .post(&self.base_url)
            .header("api-subscription-key", &self.api_key)
            .json(&Body {
                text,
                target_language_code,
                options,
            })
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis(format!(
                "speech API returned {status}: {body}"
            )));
        }

        let body: TtsResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        let audio_base64 = body
            .audios
            .into_iter()
            .next()
            .ok_or_else(|| {
                SpeechError::NoAudio(format!(
                    "request {}",
                    body.request_id.as_deref().unwrap_or("unknown")
                ))
            })?;

        Ok(SynthesizedAudio {
            audio_base64,
            request_id: body.request_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    audios: Vec<String>,
}
