use std::{
    path::PathBuf,
    sync::{mpsc::Sender, Arc, Mutex},
};

use anyhow::Result;
#[cfg(not(target_os = "android"))]
use log::debug;
use slint::{Rgba8Pixel, SharedPixelBuffer};

use crate::state::{CameraFacing, FlashMode};

#[cfg(target_os = "android")]
use self::camera2::AndroidCamera;

#[cfg(target_os = "android")]
mod camera2;

#[cfg(not(target_os = "android"))]
mod webcam;

pub mod frame;
pub mod still;

pub use self::still::StillCapture;
use self::frame::Frame;

/// Most recent upright preview frame, shared with capture.
pub type SharedFrame = Arc<Mutex<Option<Frame>>>;

pub type PreviewSender = Sender<SharedPixelBuffer<Rgba8Pixel>>;

pub struct Camera {
    #[cfg(target_os = "android")]
    camera: Box<AndroidCamera>,
    #[cfg(not(target_os = "android"))]
    camera: webcam::Webcam,
    latest: SharedFrame,
    cache_dir: PathBuf,
}

impl Camera {
    pub fn new(
        #[cfg(target_os = "android")] app: slint::android::AndroidApp,
        preview_sender: PreviewSender,
        cache_dir: PathBuf,
    ) -> Result<Self> {
        let latest: SharedFrame = Arc::default();
        Ok(Camera {
            #[cfg(target_os = "android")]
            camera: Box::new(AndroidCamera::new(app, preview_sender, latest.clone())),
            #[cfg(not(target_os = "android"))]
            camera: webcam::Webcam::new(preview_sender, latest.clone()),
            latest,
            cache_dir,
        })
    }

    pub fn start_preview(
        &mut self,
        facing: CameraFacing,
        flash: FlashMode,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.stop_preview()?;
        #[cfg(target_os = "android")]
        {
            self.camera.open(facing)?;
            self.camera.start_preview(flash, width, height)?;
        }
        #[cfg(not(target_os = "android"))]
        {
            debug!("webcams have no flash, ignoring {flash:?}");
            self.camera.start_preview(facing, width, height)?;
        }
        Ok(())
    }

    pub fn stop_preview(&mut self) -> Result<()> {
        #[cfg(target_os = "android")]
        self.camera.close();
        #[cfg(not(target_os = "android"))]
        self.camera.stop_preview();
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
        Ok(())
    }

    /// Capture handle for the preview that is currently running.
    pub fn still_capture(&self) -> StillCapture {
        StillCapture::new(self.latest.clone(), self.cache_dir.clone())
    }
}

/// Publishes a frame to capture and to the on-screen preview.
pub(crate) fn publish(frame: Frame, latest: &SharedFrame, preview: &PreviewSender) -> Result<()> {
    let buffer = SharedPixelBuffer::clone_from_slice(&frame.rgba, frame.width, frame.height);
    if let Ok(mut slot) = latest.lock() {
        *slot = Some(frame);
    }
    preview
        .send(buffer)
        .map_err(|err| anyhow::anyhow!("preview receiver gone: {err:?}"))
}
