//! OCR adapter: one `extract_text` entry point over two engines.
//!
//! The remote engine is tried first when the caller prefers it; any remote
//! failure falls back to the local engine exactly once. The remote error is
//! logged but not surfaced unless the local engine also fails. Nothing here
//! retries beyond that single fallback.

pub mod local;
pub mod remote;

pub use local::{LocalEngine, LocalOcr, default_engine_factory};
pub use remote::RemoteOcrClient;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{CapturedImage, EngineKind, ExtractionResult};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("OCR request failed: {0}")]
    Request(String),

    /// The OCR service answered but flagged the job as errored.
    #[error("OCR failed: {0}")]
    Upstream(String),

    #[error("no text could be extracted from the image")]
    NoResults,

    #[error("no text content found in the document")]
    BlankText,

    #[error("image payload is invalid: {0}")]
    InvalidImage(String),

    #[error("local OCR engine unavailable: {0}")]
    LocalUnavailable(String),

    #[error("local OCR failed: {0}")]
    LocalFailed(String),
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(
        &self,
        image: &CapturedImage,
        language: &str,
        prefer_remote: bool,
    ) -> Result<ExtractionResult, ExtractError>;
}

/// Remote OCR engine boundary, kept as a trait so the fallback ordering can be
/// exercised without a network.
#[async_trait]
pub trait RemoteEngine: Send + Sync {
    async fn parse_image(
        &self,
        image: &CapturedImage,
        language: &str,
    ) -> Result<String, ExtractError>;
}

pub struct OcrAdapter {
    remote: Arc<dyn RemoteEngine>,
    local: LocalOcr,
}

impl OcrAdapter {
    pub fn new(remote: Arc<dyn RemoteEngine>, local: LocalOcr) -> Self {
        Self { remote, local }
    }

    /// Tear down the cached local engine and its native resources.
    pub async fn release_local(&self) {
        self.local.release().await;
    }
}

#[async_trait]
impl TextExtractor for OcrAdapter {
    async fn extract_text(
        &self,
        image: &CapturedImage,
        language: &str,
        prefer_remote: bool,
    ) -> Result<ExtractionResult, ExtractError> {
        if prefer_remote {
            match self.remote.parse_image(image, language).await {
                Ok(text) => {
                    info!(chars = text.len(), "remote OCR succeeded");
                    return Ok(ExtractionResult {
                        text,
                        engine: EngineKind::Remote,
                        language: language.to_string(),
                    });
                }
                Err(err) => {
                    warn!(error = %err, "remote OCR failed, falling back to local engine");
                }
            }
        }

        let bytes = image
            .decode()
            .map_err(|e| ExtractError::InvalidImage(e.to_string()))?;
        let engine_code = crate::languages::engine_code(language);
        let text = self.local.recognize(bytes, engine_code).await?;
        if text.trim().is_empty() {
            return Err(ExtractError::BlankText);
        }

        info!(chars = text.len(), engine_code, "local OCR succeeded");
        Ok(ExtractionResult {
            text,
            engine: EngineKind::Local,
            language: language.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageOrigin;

    struct FailingRemote;

    #[async_trait]
    impl RemoteEngine for FailingRemote {
        async fn parse_image(
            &self,
            _image: &CapturedImage,
            _language: &str,
        ) -> Result<String, ExtractError> {
            Err(ExtractError::Upstream(
                "Unable to recognize the file type".to_string(),
            ))
        }
    }

    struct WorkingRemote;

    #[async_trait]
    impl RemoteEngine for WorkingRemote {
        async fn parse_image(
            &self,
            _image: &CapturedImage,
            _language: &str,
        ) -> Result<String, ExtractError> {
            Ok("BP: 140/90, Glucose: 110".to_string())
        }
    }

    struct FixedEngine {
        language: String,
        text: String,
    }

    impl LocalEngine for FixedEngine {
        fn language(&self) -> &str {
            &self.language
        }

        fn recognize(&mut self, _image: &[u8]) -> Result<String, ExtractError> {
            Ok(self.text.clone())
        }
    }

    fn fixed_local(text: &'static str) -> LocalOcr {
        LocalOcr::new(Arc::new(move |language: &str| {
            Ok(Box::new(FixedEngine {
                language: language.to_string(),
                text: text.to_string(),
            }) as Box<dyn LocalEngine>)
        }))
    }

    fn test_image() -> CapturedImage {
        CapturedImage::from_bytes(
            b"image-bytes",
            "image/jpeg".to_string(),
            ImageOrigin::Camera,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn remote_success_skips_the_local_engine() {
        let adapter = OcrAdapter::new(Arc::new(WorkingRemote), fixed_local("unused"));
        let result = adapter
            .extract_text(&test_image(), "en", true)
            .await
            .unwrap();
        assert_eq!(result.engine, EngineKind::Remote);
        assert_eq!(result.text, "BP: 140/90, Glucose: 110");
    }

    #[tokio::test]
    async fn remote_processing_error_falls_back_to_local_silently() {
        let adapter = OcrAdapter::new(Arc::new(FailingRemote), fixed_local("Hemoglobin 14.2 g/dL"));
        let result = adapter
            .extract_text(&test_image(), "en", true)
            .await
            .unwrap();
        // The remote error is not surfaced; the local result is.
        assert_eq!(result.engine, EngineKind::Local);
        assert_eq!(result.text, "Hemoglobin 14.2 g/dL");
    }

    #[tokio::test]
    async fn prefer_local_never_touches_the_remote_engine() {
        struct PanickingRemote;

        #[async_trait]
        impl RemoteEngine for PanickingRemote {
            async fn parse_image(
                &self,
                _image: &CapturedImage,
                _language: &str,
            ) -> Result<String, ExtractError> {
                panic!("remote engine must not be called");
            }
        }

        let adapter = OcrAdapter::new(Arc::new(PanickingRemote), fixed_local("local text"));
        let result = adapter
            .extract_text(&test_image(), "hi", false)
            .await
            .unwrap();
        assert_eq!(result.engine, EngineKind::Local);
    }

    #[tokio::test]
    async fn blank_local_text_is_a_typed_failure() {
        let adapter = OcrAdapter::new(Arc::new(FailingRemote), fixed_local("   \n  "));
        let result = adapter.extract_text(&test_image(), "en", true).await;
        assert!(matches!(result, Err(ExtractError::BlankText)));
    }

    #[tokio::test]
    async fn local_failure_after_remote_failure_surfaces_the_local_error() {
        let local = LocalOcr::new(Arc::new(|_language: &str| {
            Err(ExtractError::LocalUnavailable("no engine".to_string()))
        }));
        let adapter = OcrAdapter::new(Arc::new(FailingRemote), local);
        let result = adapter.extract_text(&test_image(), "en", true).await;
        assert!(matches!(result, Err(ExtractError::LocalUnavailable(_))));
    }
}
