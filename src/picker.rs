use futures::future::LocalBoxFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Photo,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Photo => "image/*",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaType::Photo => &["jpg", "jpeg", "png", "webp", "bmp", "gif", "heic"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerConfig {
    pub title: String,
    pub button_label: String,
    /// Only return locators, never inline image data.
    pub metadata_only: bool,
    pub media_type: MediaType,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            title: "Selecione uma foto".to_string(),
            button_label: "Buscar foto do álbum...".to_string(),
            metadata_only: true,
            media_type: MediaType::Photo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedAsset {
    pub uri: String,
}

impl PickedAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Cancelled,
    Error(String),
    /// Ordered selection; the app only shows the first entry.
    Picked(Vec<PickedAsset>),
}

/// OS chooser for photos already in the library.
pub trait LibraryPicker {
    fn pick(&self, config: PickerConfig) -> LocalBoxFuture<'_, PickOutcome>;
}
