pub mod assets;
pub mod filters;
pub mod hash;
pub mod ops;
pub mod preprocess;
pub mod recognizer;
pub mod translator;
pub mod types;

pub use assets::{AssetBundle, AssetError, AssetManager, DirBundle, MemoryBundle, StagedFile};
pub use filters::{FilterError, ResultFilter};
pub use ops::{BilateralParams, ImageOps, ImageprocOps, StructuringElement};
pub use preprocess::{crop_to_foreground, encode_png, load_bitmap, PreprocessError, Preprocessor};
pub use recognizer::{EngineSession, MockRecognizer, OcrBackend, OcrEngine, OcrError};
pub use translator::{TranslateError, TranslateOptions, Translator};
pub use types::{Callbacks, ImageSource, Outcome, OutcomeSink};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractBackend;
