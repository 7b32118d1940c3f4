//! Single-screen camera: live preview, photo capture into the device photo
//! library, and a picker to view an existing photo.

pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod permission;
pub mod picker;
pub mod sink;
pub mod state;

mod app;
mod camera;
mod platform;

pub use app::run;

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: slint::android::AndroidApp) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("camera_roll"),
    );
    if let Err(err) = slint::android::init(app.clone()) {
        log::error!("slint init failed: {err}");
        return;
    }
    if let Err(err) = app::run(app) {
        log::error!("{err:#}");
    }
}
