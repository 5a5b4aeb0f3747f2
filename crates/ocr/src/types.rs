use image::RgbaImage;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// What a translate call reads from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image file on the local filesystem, decoded on use.
    Path(PathBuf),
    /// An already-decoded 4-channel bitmap.
    Bitmap(RgbaImage),
    /// The caller had no image to give.
    Missing,
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(bitmap: RgbaImage) -> Self {
        ImageSource::Bitmap(bitmap)
    }
}

impl From<Option<RgbaImage>> for ImageSource {
    fn from(bitmap: Option<RgbaImage>) -> Self {
        bitmap.map_or(ImageSource::Missing, ImageSource::Bitmap)
    }
}

/// Progress and terminal events of one translate call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The preprocessed bitmap, emitted before recognition starts.
    Progress(RgbaImage),
    /// The extracted payload.
    Success(String),
    /// Human-readable failure reason.
    Failure(String),
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Progress(_))
    }
}

/// Receives the events of a translate call, inline on the caller's thread.
pub trait OutcomeSink {
    fn emit(&mut self, outcome: Outcome);
}

impl OutcomeSink for Vec<Outcome> {
    fn emit(&mut self, outcome: Outcome) {
        self.push(outcome);
    }
}

impl OutcomeSink for UnboundedSender<Outcome> {
    fn emit(&mut self, outcome: Outcome) {
        if self.send(outcome).is_err() {
            tracing::debug!("Outcome receiver dropped; event discarded");
        }
    }
}

type Handler<T> = Box<dyn FnMut(T)>;

/// Three separate handlers, one per event kind.
pub struct Callbacks {
    on_start: Handler<RgbaImage>,
    on_result: Handler<String>,
    on_fail: Handler<String>,
}

impl Callbacks {
    pub fn new(
        on_start: impl FnMut(RgbaImage) + 'static,
        on_result: impl FnMut(String) + 'static,
        on_fail: impl FnMut(String) + 'static,
    ) -> Self {
        Self {
            on_start: Box::new(on_start),
            on_result: Box::new(on_result),
            on_fail: Box::new(on_fail),
        }
    }
}

impl OutcomeSink for Callbacks {
    fn emit(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Progress(bitmap) => (self.on_start)(bitmap),
            Outcome::Success(text) => (self.on_result)(text),
            Outcome::Failure(reason) => (self.on_fail)(reason),
        }
    }
}
