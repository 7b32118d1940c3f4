use crate::{
    capture::CaptureConfig, permission::PermissionRationale, picker::PickerConfig,
    state::FlashMode,
};

/// Album every captured photo is saved into.
pub const DEFAULT_ALBUM: &str = "photo";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub album: String,
    pub picker: PickerConfig,
    pub flash: FlashMode,
    /// Shown before the OS camera prompt.
    pub camera_permission: PermissionRationale,
    pub preview_width: u32,
    pub preview_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            album: DEFAULT_ALBUM.to_string(),
            picker: PickerConfig::default(),
            flash: FlashMode::default(),
            camera_permission: PermissionRationale::default(),
            preview_width: 1280,
            preview_height: 720,
        }
    }
}
