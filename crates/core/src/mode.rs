use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

/// Layout hint forwarded to the OCR engine. Values are the engine's own
/// integer codes, so the enum serializes as that integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PageSegMode {
    OsdOnly,
    AutoOsd,
    AutoOnly,
    Auto,
    SingleColumn,
    SingleBlockVertText,
    SingleBlock,
    SingleLine,
    SingleWord,
    CircleWord,
    SingleChar,
    #[default]
    SparseText,
    SparseTextOsd,
    RawLine,
}

impl PageSegMode {
    const ALL: [PageSegMode; 14] = [
        PageSegMode::OsdOnly,
        PageSegMode::AutoOsd,
        PageSegMode::AutoOnly,
        PageSegMode::Auto,
        PageSegMode::SingleColumn,
        PageSegMode::SingleBlockVertText,
        PageSegMode::SingleBlock,
        PageSegMode::SingleLine,
        PageSegMode::SingleWord,
        PageSegMode::CircleWord,
        PageSegMode::SingleChar,
        PageSegMode::SparseText,
        PageSegMode::SparseTextOsd,
        PageSegMode::RawLine,
    ];

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_single_line(self) -> bool {
        self == PageSegMode::SingleLine
    }
}

impl TryFrom<i32> for PageSegMode {
    type Error = ConfigError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ConfigError::InvalidPageSegMode(value))
    }
}

impl From<PageSegMode> for i32 {
    fn from(mode: PageSegMode) -> Self {
        mode.as_i32()
    }
}

impl fmt::Display for PageSegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Which recognizer variant the engine loads at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    TesseractOnly,
    #[default]
    CubeOnly,
    TesseractCubeCombined,
    Default,
}

impl EngineMode {
    pub fn as_i32(self) -> i32 {
        match self {
            EngineMode::TesseractOnly => 0,
            EngineMode::CubeOnly => 1,
            EngineMode::TesseractCubeCombined => 2,
            EngineMode::Default => 3,
        }
    }
}
