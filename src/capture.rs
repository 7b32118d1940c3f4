use std::{fmt, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::{error::CaptureError, state::CapturedImageRef};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// JPEG quality factor in (0, 1].
    pub quality: f32,
    /// Keep the encoded bytes on the returned reference.
    pub include_bytes: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: 0.5,
            include_bytes: true,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.quality > 0.0 && self.quality <= 1.0 {
            Ok(())
        } else {
            Err(CaptureError::InvalidQuality(self.quality))
        }
    }

    /// Quality on the 1..=100 scale JPEG encoders take.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Produces a still photo from a live camera.
pub trait CaptureService {
    fn capture(&self, config: CaptureConfig)
        -> LocalBoxFuture<'_, Result<CapturedImageRef, CaptureError>>;
}

/// Whether the camera can take photos right now. Capture controls are only
/// rendered while `Ready`.
#[derive(Clone, Default)]
pub enum CameraReadiness {
    #[default]
    NotReady,
    Ready(Rc<dyn CaptureService>),
}

impl CameraReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, CameraReadiness::Ready(_))
    }

    pub fn handle(&self) -> Option<Rc<dyn CaptureService>> {
        match self {
            CameraReadiness::NotReady => None,
            CameraReadiness::Ready(handle) => Some(Rc::clone(handle)),
        }
    }
}

impl fmt::Debug for CameraReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraReadiness::NotReady => f.write_str("NotReady"),
            CameraReadiness::Ready(_) => f.write_str("Ready"),
        }
    }
}
