use std::{
    fs,
    path::{Path, PathBuf},
    thread,
};

use futures::{channel::oneshot, future::LocalBoxFuture, FutureExt};
use log::debug;

use super::{frame::Frame, SharedFrame};
use crate::{
    capture::{CaptureConfig, CaptureService},
    error::CaptureError,
    state::CapturedImageRef,
};

/// Capture service bound to a running preview: the latest frame becomes the
/// photo, written to the cache directory as a JPEG.
#[derive(Clone)]
pub struct StillCapture {
    latest: SharedFrame,
    cache_dir: PathBuf,
}

impl StillCapture {
    pub fn new(latest: SharedFrame, cache_dir: PathBuf) -> Self {
        Self { latest, cache_dir }
    }

    /// Whether the running preview has delivered a frame yet. Buffers queued
    /// for the screen by an earlier preview do not count.
    pub fn has_frame(&self) -> bool {
        self.latest.lock().map(|latest| latest.is_some()).unwrap_or(false)
    }

    fn latest_frame(&self) -> Result<Frame, CaptureError> {
        let latest = self
            .latest
            .lock()
            .map_err(|err| CaptureError::CameraUnavailable(err.to_string()))?;
        (*latest).clone().ok_or(CaptureError::NoFrame)
    }
}

impl CaptureService for StillCapture {
    fn capture(&self, config: CaptureConfig) -> LocalBoxFuture<'_, Result<CapturedImageRef, CaptureError>> {
        let prepared = config.validate().and_then(|_| self.latest_frame());
        let cache_dir = self.cache_dir.clone();
        async move {
            let frame = prepared?;
            let (tx, rx) = oneshot::channel();
            thread::spawn(move || {
                let _ = tx.send(write_jpeg(&frame, &cache_dir, config));
            });
            rx.await.map_err(|_| CaptureError::Interrupted)?
        }
        .boxed_local()
    }
}

fn write_jpeg(frame: &Frame, cache_dir: &Path, config: CaptureConfig) -> Result<CapturedImageRef, CaptureError> {
    let jpeg = frame.encode_jpeg(config.jpeg_quality())?;
    fs::create_dir_all(cache_dir)?;
    let name = format!("IMG_{}.jpg", chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"));
    let path = cache_dir.join(name);
    fs::write(&path, &jpeg)?;
    debug!("{} bytes written to {}", jpeg.len(), path.display());
    let uri = CapturedImageRef::from_path(&path).uri().to_string();
    Ok(if config.include_bytes {
        CapturedImageRef::with_bytes(uri, jpeg)
    } else {
        CapturedImageRef::new(uri)
    })
}
