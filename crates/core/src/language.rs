use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::config::ConfigError;

pub const TRAINEDDATA_SUFFIX: &str = ".traineddata";

fn tag_pattern() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\+[A-Za-z][A-Za-z0-9_]*)*$").expect("invalid regex"))
}

/// A trained-model language tag such as `num`, `eng` or `chi_sim`, or several
/// joined with `+` (`eng+chi_sim`) to load more than one model.
///
/// Each component doubles as a file name under `tessdata/`, so only ASCII
/// letters, digits and underscores are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub const NUM: &'static str = "num";
    pub const ENG: &'static str = "eng";
    pub const CHI_SIM: &'static str = "chi_sim";
    pub const CHI_TRA: &'static str = "chi_tra";

    pub fn new(tag: impl Into<String>) -> Result<Self, ConfigError> {
        let tag = tag.into();
        if tag_pattern().is_match(&tag) {
            Ok(Language(tag))
        } else {
            Err(ConfigError::InvalidLanguage(tag))
        }
    }

    pub fn num() -> Self {
        Language(Self::NUM.to_string())
    }

    pub fn eng() -> Self {
        Language(Self::ENG.to_string())
    }

    pub fn chi_sim() -> Self {
        Language(Self::CHI_SIM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The individual model tags, in load order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('+')
    }

    /// CJK models ship a companion `<lang>_vert` model for vertical text.
    pub fn needs_vertical(&self) -> bool {
        self.components().any(is_cjk)
    }

    /// `<lang>.traineddata` for every component.
    pub fn traineddata_names(&self) -> Vec<String> {
        self.components().map(traineddata_name).collect()
    }

    /// Every model file the engine needs for this language.
    pub fn required_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for tag in self.components() {
            files.push(traineddata_name(tag));
            if is_cjk(tag) {
                files.push(traineddata_name(&format!("{tag}_vert")));
            }
        }
        files
    }
}

fn is_cjk(tag: &str) -> bool {
    tag == Language::CHI_SIM || tag == Language::CHI_TRA
}

fn traineddata_name(tag: &str) -> String {
    format!("{tag}{TRAINEDDATA_SUFFIX}")
}

impl Default for Language {
    fn default() -> Self {
        Language::eng()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::new(s)
    }
}

impl TryFrom<String> for Language {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::new(value)
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.0
    }
}
