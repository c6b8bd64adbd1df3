use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upload cap, matching the service's request body limit.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("no image data provided")]
    Empty,

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("image exceeds the {MAX_IMAGE_BYTES} byte limit ({0} bytes)")]
    TooLarge(usize),

    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    Camera,
    Upload,
}

/// One photographed or uploaded report image. Owned by a single pipeline run;
/// a retake discards it, the next capture supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedImage {
    /// Base64 payload, data-URI prefix stripped.
    pub data: String,
    pub mime_type: String,
    pub origin: ImageOrigin,
    pub file_name: String,
}

impl CapturedImage {
    /// Build and validate a captured image from a raw payload. Accepts either
    /// a bare base64 string or a `data:` URI.
    pub fn from_payload(
        payload: &str,
        mime_type: Option<String>,
        origin: ImageOrigin,
        file_name: Option<String>,
    ) -> Result<Self, ImageError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ImageError::Empty);
        }

        let (uri_mime, data) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (header, body) = rest
                    .split_once("base64,")
                    .ok_or_else(|| ImageError::InvalidBase64("malformed data URI".to_string()))?;
                (Some(header.trim_end_matches(';').to_string()), body)
            }
            None => (None, payload),
        };

        let mime_type = mime_type
            .or(uri_mime)
            .unwrap_or_else(|| "image/jpeg".to_string());
        if !(mime_type.starts_with("image/") || mime_type == "application/pdf") {
            return Err(ImageError::UnsupportedType(mime_type));
        }

        let bytes = STANDARD
            .decode(data)
            .map_err(|e| ImageError::InvalidBase64(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge(bytes.len()));
        }

        let file_name =
            file_name.unwrap_or_else(|| format!("report.{}", extension_for(&mime_type)));

        Ok(Self {
            data: data.to_string(),
            mime_type,
            origin,
            file_name,
        })
    }

    pub fn from_bytes(
        bytes: &[u8],
        mime_type: String,
        origin: ImageOrigin,
        file_name: Option<String>,
    ) -> Result<Self, ImageError> {
        Self::from_payload(&STANDARD.encode(bytes), Some(mime_type), origin, file_name)
    }

    pub fn decode(&self) -> Result<Vec<u8>, ImageError> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| ImageError::InvalidBase64(e.to_string()))
    }

    /// File-type hint for the OCR service, taken from the file extension.
    pub fn file_type(&self) -> &str {
        self.file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("auto")
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

fn extension_for(mime_type: &str) -> &str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "jpg",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Remote,
    Local,
}

/// Text extracted from a report image. Non-blank on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub engine: EngineKind,
    pub language: String,
}

/// Structured interpretation of the extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub interpretation: String,
    /// Never empty: falls back to a localized two-item default when the model
    /// response yields no parseable items.
    pub action_items: Vec<String>,
    /// Model that produced the analysis.
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
}

/// Per-session artifact bundle: at most one image, one extraction and one
/// summary per pipeline run. A retake clears all three.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCase {
    pub id: String,
    pub language: String,
    pub prefer_remote_ocr: bool,
    pub image: Option<CapturedImage>,
    pub extraction: Option<ExtractionResult>,
    pub summary: Option<Summary>,
    pub patient: Option<PatientInfo>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReportCase {
    pub fn new(language: impl Into<String>, prefer_remote_ocr: bool, image: CapturedImage) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            language: language.into(),
            prefer_remote_ocr,
            image: Some(image),
            extraction: None,
            summary: None,
            patient: None,
            completed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub image: String,
    pub mime_type: Option<String>,
    pub origin: Option<ImageOrigin>,
    pub file_name: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub target_language_code: String,
    #[serde(default)]
    pub options: Option<crate::speech::VoiceOptions>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: String,
    pub status_message: Option<String>,
    pub language: Option<String>,
    pub has_image: bool,
    pub extraction: Option<ExtractionResult>,
    pub summary: Option<Summary>,
    pub patient: Option<PatientInfo>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Compatibility API payloads (camelCase wire shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default = "default_language_field")]
    pub language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default = "default_language_field")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsRequest {
    pub text: String,
    #[serde(default = "default_target_locale")]
    pub target_language_code: String,
    #[serde(default)]
    pub options: Option<crate::speech::VoiceOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateTtsRequest {
    pub text: String,
    #[serde(default = "default_language_field")]
    pub source_language: String,
    #[serde(default = "default_target_locale")]
    pub target_language_code: String,
    #[serde(default)]
    pub options: Option<crate::speech::VoiceOptions>,
}

fn default_language_field() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "hi".to_string()
}

fn default_target_locale() -> String {
    "hi-IN".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_strips_data_uri_prefix_and_keeps_mime() {
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"fake-png"));
        let image =
            CapturedImage::from_payload(&payload, None, ImageOrigin::Camera, None).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.decode().unwrap(), b"fake-png");
        assert_eq!(image.file_name, "report.png");
        assert_eq!(image.file_type(), "png");
    }

    #[test]
    fn capture_rejects_empty_and_non_image_payloads() {
        assert!(matches!(
            CapturedImage::from_payload("", None, ImageOrigin::Upload, None),
            Err(ImageError::Empty)
        ));

        let payload = STANDARD.encode(b"plain text");
        let result = CapturedImage::from_payload(
            &payload,
            Some("text/plain".to_string()),
            ImageOrigin::Upload,
            None,
        );
        assert!(matches!(result, Err(ImageError::UnsupportedType(_))));
    }

    #[test]
    fn capture_rejects_invalid_base64() {
        let result =
            CapturedImage::from_payload("not base64 at all!!!", None, ImageOrigin::Upload, None);
        assert!(matches!(result, Err(ImageError::InvalidBase64(_))));
    }

    #[test]
    fn data_uri_round_trips() {
        let image = CapturedImage::from_bytes(
            b"bytes",
            "image/jpeg".to_string(),
            ImageOrigin::Upload,
            Some("scan.jpg".to_string()),
        )
        .unwrap();
        assert!(image.data_uri().starts_with("data:image/jpeg;base64,"));
        assert_eq!(image.file_type(), "jpg");
    }
}
