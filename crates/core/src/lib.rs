pub mod config;
pub mod content;
pub mod language;
pub mod mode;

pub use config::{ConfigError, OcrConfig};
pub use content::ContentType;
pub use language::Language;
pub use mode::{EngineMode, PageSegMode};
