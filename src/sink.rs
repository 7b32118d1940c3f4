use std::{
    fs,
    path::{Path, PathBuf},
    thread,
};

use futures::{channel::oneshot, future::LocalBoxFuture, FutureExt};
use log::{error, info, warn};

use crate::{error::SaveError, permission::PermissionGate, state::CapturedImageRef};

/// Destination photo library.
pub trait PhotoSink {
    fn save(&self, image: CapturedImageRef, album: String) -> LocalBoxFuture<'_, Result<(), SaveError>>;
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved,
    PermissionDenied,
    Failed(SaveError),
}

/// Checks the write permission, then hands the photo to the sink. The outcome
/// is logged here; nothing is retried.
pub async fn persist(
    gate: &PermissionGate,
    sink: &dyn PhotoSink,
    image: CapturedImageRef,
    album: &str,
) -> SaveOutcome {
    if !gate.ensure_write_permission().await {
        warn!("no storage permission, {} not saved", image.uri());
        return SaveOutcome::PermissionDenied;
    }
    let uri = image.uri().to_string();
    match sink.save(image, album.to_string()).await {
        Ok(()) => {
            info!("saved {uri} to album {album:?}");
            SaveOutcome::Saved
        }
        Err(err) => {
            error!("failed to save {uri}: {err}");
            SaveOutcome::Failed(err)
        }
    }
}

/// Encoded image data: the inline payload if the capture kept one, otherwise
/// the file behind a `file://` uri.
pub fn image_bytes(image: &CapturedImageRef) -> Result<Vec<u8>, SaveError> {
    if let Some(bytes) = image.bytes() {
        return Ok(bytes.to_vec());
    }
    match image.local_path() {
        Some(path) => Ok(fs::read(path)?),
        None => Err(SaveError::NoData(image.uri().to_string())),
    }
}

/// File name the photo gets inside the album.
pub fn target_file_name(image: &CapturedImageRef) -> String {
    match image.file_name() {
        Some(name) => name.to_string(),
        None => format!("IMG_{}.jpg", chrono::Local::now().format("%Y%m%d_%H%M%S_%3f")),
    }
}

/// Photo library backed by a directory tree: one sub-directory per album.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(root: &Path, image: &CapturedImageRef, album: &str) -> Result<PathBuf, SaveError> {
        let bytes = image_bytes(image)?;
        let dir = root.join(album);
        fs::create_dir_all(&dir)?;
        let path = unique_path(&dir, &target_file_name(image));
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

impl PhotoSink for DirectorySink {
    fn save(&self, image: CapturedImageRef, album: String) -> LocalBoxFuture<'_, Result<(), SaveError>> {
        let root = self.root.clone();
        let (tx, rx) = oneshot::channel();
        thread::spawn(move || {
            let _ = tx.send(Self::write(&root, &image, &album));
        });
        async move {
            let path = rx.await.map_err(|_| SaveError::Interrupted)??;
            info!("wrote {}", path.display());
            Ok(())
        }
        .boxed_local()
    }
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (file_name, "jpg"),
    };
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
