use cardscan_core::ContentType;
use thiserror::Error;

/// Length of the first PAN group as printed on the card's primary line.
pub const PAN_HEAD_LEN: usize = 6;
/// Length of the second PAN group.
pub const PAN_TAIL_LEN: usize = 13;
/// Bank-card lines must be strictly longer than this to be considered.
pub const PAN_LINE_MIN_EXCLUSIVE: usize = PAN_HEAD_LEN + PAN_TAIL_LEN;
/// National ID number length.
pub const ID_NUMBER_LEN: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Recognized text does not match the expected structure")]
    NoMatch,
}

/// Picks the payload out of raw recognizer text for one kind of document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultFilter {
    content_type: ContentType,
    strict_pan_digits: bool,
}

impl ResultFilter {
    pub fn for_content(content_type: ContentType) -> Self {
        Self { content_type, strict_pan_digits: false }
    }

    /// Only accept PAN groups made entirely of ASCII digits.
    pub fn strict_pan_digits(mut self, strict: bool) -> Self {
        self.strict_pan_digits = strict;
        self
    }

    pub fn apply(&self, raw: &str) -> Result<String, FilterError> {
        match self.content_type {
            ContentType::BankCard => bank_card(raw, self.strict_pan_digits),
            ContentType::IdCard => id_card(raw),
            ContentType::Generic => generic(raw),
        }
    }
}

/// Any non-empty text, returned verbatim.
pub fn generic(raw: &str) -> Result<String, FilterError> {
    if raw.is_empty() {
        Err(FilterError::NoMatch)
    } else {
        Ok(raw.to_string())
    }
}

/// A 19-character PAN printed as "6 chars SPACE 13 chars", returned without
/// the separator. With `strict_digits` off, token content is not checked.
pub fn bank_card(raw: &str, strict_digits: bool) -> Result<String, FilterError> {
    let line = candidate_line(raw, |len| len > PAN_LINE_MIN_EXCLUSIVE)?;
    tracing::debug!("Bank card candidate line: {line:?}");

    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < 2 {
        return Err(FilterError::NoMatch);
    }
    tokens
        .windows(2)
        .find(|pair| {
            pair[0].chars().count() == PAN_HEAD_LEN
                && pair[1].chars().count() == PAN_TAIL_LEN
                && (!strict_digits || pair.iter().all(|t| is_ascii_digits(t)))
        })
        .map(|pair| format!("{}{}", pair[0], pair[1]))
        .ok_or(FilterError::NoMatch)
}

/// The first space-separated token of exactly 18 characters.
pub fn id_card(raw: &str) -> Result<String, FilterError> {
    let line = candidate_line(raw, |len| len >= ID_NUMBER_LEN)?;
    tracing::debug!("ID card candidate line: {line:?}");

    line.split(' ')
        .find(|token| token.chars().count() == ID_NUMBER_LEN)
        .map(str::to_string)
        .ok_or(FilterError::NoMatch)
}

/// Multi-line text: the first `\n`-separated line whose length passes
/// `long_enough`, with `\r` removed. Single-line text: the text itself.
fn candidate_line(raw: &str, long_enough: impl Fn(usize) -> bool) -> Result<String, FilterError> {
    if !raw.contains('\n') {
        return Ok(raw.to_string());
    }
    raw.split('\n')
        .find(|line| long_enough(line.chars().count()))
        .map(|line| line.replace('\r', ""))
        .ok_or(FilterError::NoMatch)
}

fn is_ascii_digits(token: &str) -> bool {
    token.bytes().all(|b| b.is_ascii_digit())
}
