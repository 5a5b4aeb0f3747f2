use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of document being read; selects the post-recognition filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    BankCard,
    IdCard,
    #[default]
    Generic,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::BankCard => write!(f, "bank_card"),
            ContentType::IdCard => write!(f, "id_card"),
            ContentType::Generic => write!(f, "generic"),
        }
    }
}

impl FromStr for ContentType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_card" => Ok(ContentType::BankCard),
            "id_card" => Ok(ContentType::IdCard),
            "generic" => Ok(ContentType::Generic),
            other => Err(format!("Unknown content type: '{other}'")),
        }
    }
}
