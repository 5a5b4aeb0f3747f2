use std::path::Path;
use std::sync::{Arc, Mutex};

use cardscan_core::{EngineMode, Language, PageSegMode};
use image::RgbaImage;
use thiserror::Error;

/// Engine variable that keeps per-symbol alternatives around.
pub const VAR_SAVE_BLOB_CHOICES: &str = "save_blob_choices";

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine init failed for '{language}': {reason}")]
    InitFailed { language: String, reason: String },
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Image encode error: {0}")]
    ImageEncode(String),
}

/// One recognizer instance. Used for a single image and then discarded.
pub trait OcrEngine {
    /// `data_dir` is the parent of `tessdata/`.
    fn init(&mut self, data_dir: &Path, language: &Language, mode: EngineMode) -> Result<(), OcrError>;
    fn set_page_seg_mode(&mut self, mode: PageSegMode) -> Result<(), OcrError>;
    fn set_variable(&mut self, name: &str, value: &str) -> Result<(), OcrError>;
    fn set_image(&mut self, image: &RgbaImage) -> Result<(), OcrError>;
    fn utf8_text(&mut self) -> Result<String, OcrError>;
    /// Drop per-image state.
    fn clear(&mut self);
    /// Release everything the engine holds.
    fn end(&mut self);
}

/// Abstraction over an OCR backend. Hands out a fresh engine per image.
pub trait OcrBackend: Send + Sync {
    fn create(&self) -> Box<dyn OcrEngine>;
}

/// An initialized engine. Dropping the session clears and ends the engine,
/// whichever way the caller leaves.
pub struct EngineSession {
    engine: Box<dyn OcrEngine>,
}

impl EngineSession {
    pub fn open(
        backend: &dyn OcrBackend,
        data_dir: &Path,
        language: &Language,
        mode: EngineMode,
    ) -> Result<Self, OcrError> {
        let mut session = EngineSession { engine: backend.create() };
        session.engine.init(data_dir, language, mode)?;
        tracing::debug!(
            "OCR engine ready: data_dir={} lang={language} mode={mode:?}",
            data_dir.display()
        );
        Ok(session)
    }

    /// Run recognition on one preprocessed bitmap, consuming the session.
    pub fn recognize(mut self, image: &RgbaImage, page_seg_mode: PageSegMode) -> Result<String, OcrError> {
        self.engine.set_page_seg_mode(page_seg_mode)?;
        self.engine.set_image(image)?;
        self.engine.set_variable(VAR_SAVE_BLOB_CHOICES, "T")?;
        self.engine.utf8_text()
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.engine.clear();
        self.engine.end();
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string and records every engine call. Lets the translate
/// flow run without Tesseract installed.
#[derive(Clone, Default)]
pub struct MockRecognizer {
    pub text: String,
    pub fail_init: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    /// A backend whose engines refuse to initialize.
    pub fn failing_init() -> Self {
        Self { fail_init: true, ..Self::default() }
    }

    /// Every engine call made so far, across all engines this backend created.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl OcrBackend for MockRecognizer {
    fn create(&self) -> Box<dyn OcrEngine> {
        record(&self.calls, "create".to_string());
        Box::new(MockEngine {
            text: self.text.clone(),
            fail_init: self.fail_init,
            calls: Arc::clone(&self.calls),
        })
    }
}

fn record(calls: &Mutex<Vec<String>>, call: String) {
    if let Ok(mut calls) = calls.lock() {
        calls.push(call);
    }
}

struct MockEngine {
    text: String,
    fail_init: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl OcrEngine for MockEngine {
    fn init(&mut self, _data_dir: &Path, language: &Language, mode: EngineMode) -> Result<(), OcrError> {
        record(&self.calls, format!("init {language} {}", mode.as_i32()));
        if self.fail_init {
            return Err(OcrError::InitFailed {
                language: language.to_string(),
                reason: "mock init failure".into(),
            });
        }
        Ok(())
    }

    fn set_page_seg_mode(&mut self, mode: PageSegMode) -> Result<(), OcrError> {
        record(&self.calls, format!("psm {mode}"));
        Ok(())
    }

    fn set_variable(&mut self, name: &str, value: &str) -> Result<(), OcrError> {
        record(&self.calls, format!("var {name}={value}"));
        Ok(())
    }

    fn set_image(&mut self, image: &RgbaImage) -> Result<(), OcrError> {
        record(&self.calls, format!("image {}x{}", image.width(), image.height()));
        Ok(())
    }

    fn utf8_text(&mut self) -> Result<String, OcrError> {
        record(&self.calls, "text".to_string());
        Ok(self.text.clone())
    }

    fn clear(&mut self) {
        record(&self.calls, "clear".to_string());
    }

    fn end(&mut self) {
        record(&self.calls, "end".to_string());
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrEngine, OcrError};
    use cardscan_core::{EngineMode, Language, PageSegMode};
    use image::RgbaImage;
    use std::ffi::{CStr, CString};
    use std::path::Path;
    use tesseract_plumbing::TessBaseApi;

    const VAR_PAGESEG_MODE: &str = "tessedit_pageseg_mode";

    #[derive(Debug, Default, Clone, Copy)]
    pub struct TesseractBackend;

    impl OcrBackend for TesseractBackend {
        fn create(&self) -> Box<dyn OcrEngine> {
            Box::new(TesseractEngine { api: None })
        }
    }

    struct TesseractEngine {
        api: Option<TessBaseApi>,
    }

    impl TesseractEngine {
        fn api(&mut self) -> Result<&mut TessBaseApi, OcrError> {
            self.api.as_mut().ok_or_else(|| OcrError::Engine("engine not initialized".into()))
        }
    }

    fn c_string(value: &str) -> Result<CString, OcrError> {
        CString::new(value).map_err(|e| OcrError::Engine(e.to_string()))
    }

    impl OcrEngine for TesseractEngine {
        fn init(&mut self, data_dir: &Path, language: &Language, mode: EngineMode) -> Result<(), OcrError> {
            let init_failed = |reason: String| OcrError::InitFailed {
                language: language.to_string(),
                reason,
            };
            let data_dir = data_dir
                .to_str()
                .and_then(|d| CString::new(d).ok())
                .ok_or_else(|| init_failed("data dir is not a valid C string".into()))?;
            let lang = c_string(language.as_str()).map_err(|e| init_failed(e.to_string()))?;

            // The engine mode is only read at init time.
            let mut api = TessBaseApi::create();
            api.init_4(Some(data_dir.as_c_str()), Some(lang.as_c_str()), mode.as_i32() as _)
                .map_err(|e| init_failed(e.to_string()))?;
            self.api = Some(api);
            Ok(())
        }

        fn set_page_seg_mode(&mut self, mode: PageSegMode) -> Result<(), OcrError> {
            let name = c_string(VAR_PAGESEG_MODE)?;
            let value = c_string(&mode.as_i32().to_string())?;
            self.api()?
                .set_variable(&name, &value)
                .map_err(|e| OcrError::Engine(format!("page seg mode {mode}: {e}")))
        }

        fn set_variable(&mut self, name: &str, value: &str) -> Result<(), OcrError> {
            let c_name = c_string(name)?;
            let c_value = c_string(value)?;
            // Engines that dropped the variable reject it; recognition still works.
            if let Err(e) = self.api()?.set_variable(&c_name, &c_value) {
                tracing::warn!("Engine rejected variable {name}={value}: {e}");
            }
            Ok(())
        }

        fn set_image(&mut self, image: &RgbaImage) -> Result<(), OcrError> {
            let (width, height) = image.dimensions();
            let width = i32::try_from(width).map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            let height = i32::try_from(height).map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            self.api()?
                .set_image(image.as_raw(), width, height, 4, width * 4)
                .map_err(|e| OcrError::ImageEncode(e.to_string()))
        }

        fn utf8_text(&mut self) -> Result<String, OcrError> {
            let text = self.api()?.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;
            let text: &CStr = text.as_ref();
            Ok(text.to_string_lossy().into_owned())
        }

        fn clear(&mut self) {
            // Each engine sees a single image, so there is no per-image state to reset.
        }

        fn end(&mut self) {
            self.api = None;
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(backend: &MockRecognizer) -> Result<EngineSession, OcrError> {
        EngineSession::open(backend, Path::new("/data"), &Language::num(), EngineMode::CubeOnly)
    }

    #[test]
    fn mock_returns_preset_text() {
        let backend = MockRecognizer::new("622202 1234567890123");
        let text = open(&backend)
            .unwrap()
            .recognize(&RgbaImage::new(3, 2), PageSegMode::SingleLine)
            .unwrap();
        assert_eq!(text, "622202 1234567890123");
    }

    #[test]
    fn session_drives_engine_in_order_and_releases_it() {
        let backend = MockRecognizer::new("x");
        open(&backend)
            .unwrap()
            .recognize(&RgbaImage::new(3, 2), PageSegMode::SingleLine)
            .unwrap();
        assert_eq!(
            backend.calls(),
            vec![
                "create",
                "init num 1",
                "psm 7",
                "image 3x2",
                "var save_blob_choices=T",
                "text",
                "clear",
                "end",
            ]
        );
    }

    #[test]
    fn failed_init_still_ends_engine() {
        let backend = MockRecognizer::failing_init();
        let err = open(&backend).err().unwrap();
        assert!(matches!(err, OcrError::InitFailed { ref language, .. } if language == "num"));
        assert_eq!(backend.calls(), vec!["create", "init num 1", "clear", "end"]);
    }

    #[test]
    fn unused_session_is_released_on_drop() {
        let backend = MockRecognizer::new("x");
        drop(open(&backend).unwrap());
        assert_eq!(backend.calls().last().map(String::as_str), Some("end"));
    }

    #[test]
    fn each_session_gets_a_fresh_engine() {
        let backend = MockRecognizer::new("x");
        for _ in 0..2 {
            open(&backend).unwrap().recognize(&RgbaImage::new(1, 1), PageSegMode::Auto).unwrap();
        }
        let creates = backend.calls().iter().filter(|c| *c == "create").count();
        assert_eq!(creates, 2);
    }
}
