use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Service configuration, injected once at startup.
///
/// The three upstream API keys are mandatory: a missing key is a fatal
/// configuration error, never silently replaced by a shared fallback key.
/// Adapters receive their configuration at construction and do not read the
/// environment themselves.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub environment: String,
    pub ocr_api_key: String,
    pub gemini_api_key: String,
    pub sarvam_api_key: String,
    pub ocr_api_url: String,
    pub sarvam_api_url: String,
    /// Try the remote OCR API before the local engine.
    pub prefer_remote_ocr: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = optional("PORT", "3001");
        let port = port
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidVar("PORT", e.to_string()))?;

        let prefer_remote_ocr = optional("PREFER_REMOTE_OCR", "true");
        let prefer_remote_ocr = prefer_remote_ocr
            .parse::<bool>()
            .map_err(|e| ConfigError::InvalidVar("PREFER_REMOTE_OCR", e.to_string()))?;

        Ok(Self {
            port,
            environment: optional("ENVIRONMENT", "development"),
            ocr_api_key: required("OCR_API_KEY")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            sarvam_api_key: required("SARVAM_API_KEY")?,
            ocr_api_url: optional("OCR_API_URL", "https://api.ocr.space/parse/image"),
            sarvam_api_url: optional("SARVAM_API_URL", "https://api.sarvam.ai/text-to-speech"),
            prefer_remote_ocr,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn optional(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
