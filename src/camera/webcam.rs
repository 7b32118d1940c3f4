use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use kamera::Camera as KCamera;
use log::{debug, info, warn};

use super::{frame::Frame, publish, PreviewSender, SharedFrame};
use crate::state::CameraFacing;

/// Desktop webcam preview on a capture thread.
pub struct Webcam {
    running: Option<Arc<Mutex<bool>>>,
    task: Option<JoinHandle<Result<()>>>,
    preview_sender: PreviewSender,
    latest: SharedFrame,
}

impl Webcam {
    pub fn new(preview_sender: PreviewSender, latest: SharedFrame) -> Self {
        Self {
            running: None,
            task: None,
            preview_sender,
            latest,
        }
    }

    // Back is the first device, front the second when there is one.
    fn device_index(facing: CameraFacing) -> usize {
        match facing {
            CameraFacing::Back => 0,
            CameraFacing::Front => 1,
        }
    }

    pub fn start_preview(&mut self, facing: CameraFacing, _width: u32, _height: u32) -> Result<()> {
        self.stop_preview();
        let running = Arc::new(Mutex::new(true));
        self.running = Some(running.clone());
        let preview_sender = self.preview_sender.clone();
        let latest = self.latest.clone();
        let index = Self::device_index(facing);
        self.task = Some(std::thread::spawn(move || {
            let camera = match KCamera::new_device(index) {
                Some(camera) => camera,
                None if index != 0 => {
                    warn!("no camera at index {index}, falling back to the default camera");
                    KCamera::new_device(0).ok_or(anyhow!("no camera device detected"))?
                }
                None => return Err(anyhow!("no camera device detected")),
            };
            camera.start();
            info!("webcam {index} started for {facing:?}");
            let mut count = 0;
            let mut timer = Instant::now();
            loop {
                if let Ok(running) = running.lock() {
                    if !*running {
                        break;
                    }
                }

                let frame = match camera.wait_for_frame() {
                    Some(frame) => frame,
                    None => {
                        std::thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                };

                let (width, height) = frame.size_u32();
                let frame_data = frame.data();
                let frame = Frame::from_bgra(width, height, frame_data.data_u8())
                    .oriented(0, facing == CameraFacing::Front);
                if publish(frame, &latest, &preview_sender).is_err() {
                    break;
                }

                count += 1;
                if timer.elapsed() >= Duration::from_secs(1) {
                    debug!("preview fps: {count}");
                    count = 0;
                    timer = Instant::now();
                }
            }
            camera.stop();
            Ok(())
        }));
        Ok(())
    }

    pub fn stop_preview(&mut self) {
        if let Some(running) = self.running.take() {
            if let Ok(mut running) = running.lock() {
                *running = false;
            }
        }
        if let Some(task) = self.task.take() {
            match task.join() {
                Ok(Ok(())) => info!("preview stopped"),
                Ok(Err(err)) => warn!("preview ended with error: {err:#}"),
                Err(_) => warn!("preview thread panicked"),
            }
        }
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
