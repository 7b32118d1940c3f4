use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera is not ready")]
    NotReady,
    #[error("capture quality {0} is outside (0, 1]")]
    InvalidQuality(f32),
    #[error("no preview frame available yet")]
    NoFrame,
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("failed to encode photo: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write photo: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture was interrupted")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("{0} has no readable image data")]
    NoData(String),
    #[error("failed to write photo: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Platform(String),
    #[error("save was interrupted")]
    Interrupted,
}

impl From<anyhow::Error> for SaveError {
    fn from(err: anyhow::Error) -> Self {
        SaveError::Platform(format!("{err:#}"))
    }
}
