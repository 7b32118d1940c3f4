use std::path::PathBuf;

use futures::{future::LocalBoxFuture, FutureExt};

use crate::{
    picker::{LibraryPicker, PickOutcome, PickedAsset, PickerConfig},
    sink::DirectorySink,
    state::CapturedImageRef,
};

const APP_DIR: &str = "camera_roll";

/// Native file dialog standing in for the gallery chooser.
pub struct FileDialogPicker;

impl LibraryPicker for FileDialogPicker {
    fn pick(&self, config: PickerConfig) -> LocalBoxFuture<'_, PickOutcome> {
        let dialog = rfd::AsyncFileDialog::new()
            .set_title(&config.title)
            .add_filter(&config.button_label, config.media_type.extensions());
        let dialog = match dirs::picture_dir() {
            Some(dir) => dialog.set_directory(dir),
            None => dialog,
        };
        async move {
            match dialog.pick_files().await {
                None => PickOutcome::Cancelled,
                Some(files) if files.is_empty() => {
                    PickOutcome::Error("no file selected".to_string())
                }
                Some(files) => PickOutcome::Picked(
                    files
                        .iter()
                        .map(|file| PickedAsset::new(CapturedImageRef::from_path(file.path()).uri()))
                        .collect(),
                ),
            }
        }
        .boxed_local()
    }
}

/// Albums live under the user's pictures directory.
pub fn photo_library() -> DirectorySink {
    let root = dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("Pictures"));
    DirectorySink::new(root)
}

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
