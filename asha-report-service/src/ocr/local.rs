//! Local OCR engine lifecycle.
//!
//! The engine is an owned resource: lazily instantiated per language, cached,
//! re-initialized when the requested language changes, and explicitly released
//! when no longer needed so its native resources are freed deterministically.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::ExtractError;

/// A language-bound recognition engine. Implementations own native resources
/// that are freed on drop.
pub trait LocalEngine: Send {
    fn language(&self) -> &str;
    fn recognize(&mut self, image: &[u8]) -> Result<String, ExtractError>;
}

/// Builds an engine for a given OCR language code.
pub type EngineFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn LocalEngine>, ExtractError> + Send + Sync>;

/// Single-owner cache around the local engine. Access is serialized: only one
/// extraction runs at a time.
pub struct LocalOcr {
    factory: EngineFactory,
    engine: Mutex<Option<Box<dyn LocalEngine>>>,
}

impl LocalOcr {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            engine: Mutex::new(None),
        }
    }

    pub fn with_default_engine() -> Self {
        Self::new(default_engine_factory())
    }

    /// Recognize text in the image, acquiring (or re-acquiring) the engine for
    /// the requested language first.
    pub async fn recognize(&self, image: Vec<u8>, language: &str) -> Result<String, ExtractError> {
        let mut slot = self.engine.lock().await;

        let rebuild = slot
            .as_ref()
            .map(|engine| engine.language() != language)
            .unwrap_or(true);
        if rebuild {
            // Tear the old instance down before building the replacement so
            // its native resources are released first.
            if slot.take().is_some() {
                debug!(language, "replacing cached local engine");
            }
            *slot = Some((self.factory)(language)?);
        }

        let mut engine = slot
            .take()
            .ok_or_else(|| ExtractError::LocalUnavailable("engine missing after acquire".to_string()))?;

        // Recognition is CPU-bound; keep it off the async reactor.
        let (engine, result) = tokio::task::spawn_blocking(move || {
            let result = engine.recognize(&image);
            (engine, result)
        })
        .await
        .map_err(|e| ExtractError::LocalFailed(e.to_string()))?;

        *slot = Some(engine);
        result
    }

    /// Explicitly drop the cached engine and free its native resources.
    pub async fn release(&self) {
        if self.engine.lock().await.take().is_some() {
            debug!("local engine released");
        }
    }

    pub async fn cached_language(&self) -> Option<String> {
        self.engine
            .lock()
            .await
            .as_ref()
            .map(|engine| engine.language().to_string())
    }
}

pub fn default_engine_factory() -> EngineFactory {
    #[cfg(feature = "local-ocr")]
    return Arc::new(|language: &str| {
        let engine = TesseractEngine::new(language)?;
        Ok(Box::new(engine) as Box<dyn LocalEngine>)
    });

    #[cfg(not(feature = "local-ocr"))]
    Arc::new(|_language: &str| {
        Err(ExtractError::LocalUnavailable(
            "built without the local-ocr feature".to_string(),
        ))
    })
}

#[cfg(feature = "local-ocr")]
pub struct TesseractEngine {
    engine: leptess::LepTess,
    language: String,
}

#[cfg(feature = "local-ocr")]
impl TesseractEngine {
    pub fn new(language: &str) -> Result<Self, ExtractError> {
        let engine = leptess::LepTess::new(None, language)
            .map_err(|e| ExtractError::LocalUnavailable(e.to_string()))?;
        Ok(Self {
            engine,
            language: language.to_string(),
        })
    }
}

#[cfg(feature = "local-ocr")]
impl LocalEngine for TesseractEngine {
    fn language(&self) -> &str {
        &self.language
    }

    fn recognize(&mut self, image: &[u8]) -> Result<String, ExtractError> {
        self.engine
            .set_image_from_mem(image)
            .map_err(|e| ExtractError::LocalFailed(e.to_string()))?;
        self.engine
            .get_utf8_text()
            .map_err(|e| ExtractError::LocalFailed(e.to_string()))
    }
}
