use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use cardscan_core::{ConfigError, ContentType, EngineMode, Language, OcrConfig, PageSegMode};
use thiserror::Error;

use crate::assets::{AssetError, AssetManager, DirBundle, TESSDATA_DIR};
use crate::filters::ResultFilter;
use crate::preprocess::{self, PreprocessError, Preprocessor};
use crate::recognizer::{EngineSession, OcrBackend, OcrError};
use crate::types::{ImageSource, Outcome, OutcomeSink};

/// Why a translate call failed. The `Display` text is the reason handed to
/// the caller's failure channel.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("cannot decode: {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: PreprocessError,
    },
    #[error("asset staging failed: {0}")]
    Assets(#[from] AssetError),
    #[error("engine init failed")]
    EngineInit(#[source] OcrError),
    #[error("bitmap is null")]
    NullBitmap,
    #[error("recognition failed: {0}")]
    Recognition(#[source] OcrError),
    #[error("ocr translate failed: {raw}")]
    NoMatch { raw: String },
}

/// Per-call settings. Nothing here is retained between calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslateOptions {
    pub content_type: ContentType,
    pub language: Language,
    pub page_seg_mode: PageSegMode,
    pub engine_mode: EngineMode,
    pub strict_pan_digits: bool,
}

impl From<&OcrConfig> for TranslateOptions {
    fn from(config: &OcrConfig) -> Self {
        Self {
            content_type: config.content_type,
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
            engine_mode: config.engine_mode,
            strict_pan_digits: config.strict_pan_digits,
        }
    }
}

static GLOBAL: OnceLock<Translator> = OnceLock::new();

/// Orchestrates: decode → stage models → open engine → preprocess → recognize → filter.
pub struct Translator {
    backend: Arc<dyn OcrBackend>,
    assets: AssetManager,
    preprocessor: Preprocessor,
}

impl Translator {
    pub fn new(backend: impl OcrBackend + 'static, assets: AssetManager) -> Self {
        Self { backend: Arc::new(backend), assets, preprocessor: Preprocessor::default() }
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Stage models from `bundle_dir` into the resolved download dir. Without a
    /// `bundle_dir`, the models are expected to be in `tessdata/` already.
    pub fn from_config(config: &OcrConfig, backend: impl OcrBackend + 'static) -> Result<Self, ConfigError> {
        let download_dir = config.resolve_download_dir()?;
        let bundle_dir = config
            .bundle_dir
            .clone()
            .unwrap_or_else(|| download_dir.join(TESSDATA_DIR));
        Ok(Self::new(backend, AssetManager::new(download_dir, DirBundle::new(bundle_dir))))
    }

    /// The process-wide translator, built by `init` on first use.
    pub fn global_or_init(init: impl FnOnce() -> Translator) -> &'static Translator {
        GLOBAL.get_or_init(init)
    }

    pub fn global() -> Option<&'static Translator> {
        GLOBAL.get()
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    /// Translate one image. `sink` sees at most one `Progress` followed by
    /// exactly one `Success` or `Failure`; the same result is returned.
    pub fn translate(
        &self,
        options: &TranslateOptions,
        source: ImageSource,
        sink: &mut dyn OutcomeSink,
    ) -> Result<String, TranslateError> {
        let result = self.run(options, source, sink);
        match &result {
            Ok(text) => {
                tracing::info!("OCR succeeded for {}", options.content_type);
                sink.emit(Outcome::Success(text.clone()));
            }
            Err(e) => {
                tracing::warn!("OCR failed for {}: {e}", options.content_type);
                sink.emit(Outcome::Failure(e.to_string()));
            }
        }
        result
    }

    fn run(
        &self,
        options: &TranslateOptions,
        source: ImageSource,
        sink: &mut dyn OutcomeSink,
    ) -> Result<String, TranslateError> {
        let bitmap = match source {
            ImageSource::Path(path) => match preprocess::load_bitmap(&path) {
                Ok(bitmap) => Some(bitmap),
                Err(source) => return Err(TranslateError::Decode { path, source }),
            },
            ImageSource::Bitmap(bitmap) => Some(bitmap),
            ImageSource::Missing => None,
        };

        self.assets.ensure(&options.language)?;

        let session = EngineSession::open(
            self.backend.as_ref(),
            self.assets.data_dir(),
            &options.language,
            options.engine_mode,
        )
        .map_err(TranslateError::EngineInit)?;

        let bitmap = bitmap.ok_or(TranslateError::NullBitmap)?;
        let preprocessed = self.preprocessor.preprocess(&bitmap, options.page_seg_mode);
        drop(bitmap);
        sink.emit(Outcome::Progress(preprocessed.clone()));

        let raw = session
            .recognize(&preprocessed, options.page_seg_mode)
            .map_err(TranslateError::Recognition)?;
        tracing::debug!("Raw OCR text: {raw:?}");

        ResultFilter::for_content(options.content_type)
            .strict_pan_digits(options.strict_pan_digits)
            .apply(&raw)
            .map_err(|_| TranslateError::NoMatch { raw })
    }
}
