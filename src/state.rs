use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Which physical camera sensor feeds the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

/// Flash behaviour requested from the camera. Only Android hardware honours
/// it; webcams have no flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashMode {
    Off,
    On,
    #[default]
    Auto,
}

/// A photo the app currently knows about: a locator plus, for fresh captures,
/// the encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImageRef {
    uri: String,
    bytes: Option<Vec<u8>>,
}

impl CapturedImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            bytes: None,
        }
    }

    pub fn with_bytes(uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            uri: uri.into(),
            bytes: Some(bytes),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(format!("{FILE_SCHEME}{}", path.display()))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Local file behind a `file://` uri.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.uri
            .strip_prefix(FILE_SCHEME)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }

    /// Last path segment of the uri, if it looks like a file name.
    pub fn file_name(&self) -> Option<&str> {
        self.uri
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && name.contains('.'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    CaptureFailed,
    PickFailed,
    SaveFailed,
    PermissionDenied,
    CameraUnavailable,
}

/// Non-blocking message shown over the preview until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn text(&self) -> String {
        let title = match self.kind {
            NoticeKind::CaptureFailed => "Falha ao tirar foto",
            NoticeKind::PickFailed => "Falha ao abrir o álbum",
            NoticeKind::SaveFailed => "Erro ao salvar",
            NoticeKind::PermissionDenied => "Sem permissão para salvar",
            NoticeKind::CameraUnavailable => "Câmera indisponível",
        };
        if self.message.is_empty() {
            title.to_string()
        } else {
            format!("{title}: {}", self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPhase {
    EmptyClosed,
    ShownOpen,
    HasImageClosed,
}

/// Everything the screen renders.
///
/// `modal_open` is only ever set together with `current_image`, so an open
/// modal always has a photo to show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub facing: CameraFacing,
    pub current_image: Option<CapturedImageRef>,
    pub modal_open: bool,
    pub camera_ready: bool,
    /// The camera permission rationale is on screen, waiting for an answer.
    pub camera_prompt: bool,
    pub notice: Option<Notice>,
}

impl ViewState {
    pub fn phase(&self) -> DisplayPhase {
        match (&self.current_image, self.modal_open) {
            (None, _) => DisplayPhase::EmptyClosed,
            (Some(_), true) => DisplayPhase::ShownOpen,
            (Some(_), false) => DisplayPhase::HasImageClosed,
        }
    }

    pub(crate) fn show(&mut self, image: CapturedImageRef) {
        self.current_image = Some(image);
        self.modal_open = true;
        self.notice = None;
    }

    pub(crate) fn close_modal(&mut self) {
        self.modal_open = false;
    }

    pub(crate) fn toggle_facing(&mut self) {
        self.facing = self.facing.toggled();
    }

    pub(crate) fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn current_uri(&self) -> Option<&str> {
        self.current_image.as_ref().map(CapturedImageRef::uri)
    }
}
