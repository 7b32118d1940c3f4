use std::{cell::RefCell, rc::Rc, sync::mpsc::channel, time::Duration};

use anyhow::Result;
use futures::{
    future::LocalFutureObj,
    task::{LocalSpawn, SpawnError},
};
use log::{error, warn};
use slint::{ComponentHandle, Image, Rgba8Pixel, SharedPixelBuffer, Timer, TimerMode};

use crate::{
    camera::Camera,
    capture::CameraReadiness,
    config::AppConfig,
    controller::ViewStateController,
    permission::PermissionGate,
    picker::LibraryPicker,
    sink::PhotoSink,
    state::{CapturedImageRef, ViewState},
};

slint::slint! {
    import { Button } from "std-widgets.slint";

    export component MainWindow inherits Window {
        in property <image> camera-texture;
        in property <image> photo;
        in property <bool> controls-visible;
        in property <bool> modal-open;
        in property <string> notice;
        in property <bool> camera-prompt;
        in property <string> prompt-title;
        in property <string> prompt-message;
        in property <string> prompt-accept;
        in property <string> prompt-decline;
        callback take-photo();
        callback open-album();
        callback toggle-camera();
        callback close-modal();
        callback dismiss-notice();
        callback prompt-answered(bool);

        Rectangle {
            width: 100%;
            height: 100%;
            background: black;

            Image {
                width: parent.width;
                height: parent.height;
                source: root.camera-texture;
                image-fit: contain;
            }

            if root.controls-visible : HorizontalLayout {
                x: 0px;
                y: parent.height - self.height - 35px;
                width: parent.width;
                height: 60px;
                padding-left: 20px;
                padding-right: 20px;
                alignment: space-between;
                Button {
                    text: "Tirar foto";
                    clicked => { root.take-photo(); }
                }
                Button {
                    text: "Álbum";
                    clicked => { root.open-album(); }
                }
            }

            Button {
                x: parent.width - self.width - 25px;
                y: 60px;
                height: 40px;
                text: "Trocar";
                clicked => { root.toggle-camera(); }
            }

            if root.notice != "" : Rectangle {
                x: 20px;
                y: 10px;
                width: parent.width - 40px;
                height: 40px;
                border-radius: 5px;
                background: #fff;
                Text {
                    text: root.notice;
                    color: #b00020;
                    horizontal-alignment: center;
                    vertical-alignment: center;
                }
                TouchArea {
                    clicked => { root.dismiss-notice(); }
                }
            }

            if root.modal-open : Rectangle {
                background: white;
                TouchArea { }
                VerticalLayout {
                    padding: 20px;
                    spacing: 10px;
                    alignment: center;
                    Button {
                        text: "Fechar";
                        clicked => { root.close-modal(); }
                    }
                    Image {
                        source: root.photo;
                        width: 350px;
                        height: 350px;
                        image-fit: contain;
                    }
                }
            }

            if root.camera-prompt : Rectangle {
                background: #000000aa;
                TouchArea { }
                Rectangle {
                    width: parent.width - 60px;
                    height: 180px;
                    border-radius: 5px;
                    background: white;
                    VerticalLayout {
                        padding: 20px;
                        spacing: 10px;
                        Text {
                            text: root.prompt-title;
                            font-size: 18px;
                            font-weight: 700;
                        }
                        Text {
                            text: root.prompt-message;
                            wrap: word-wrap;
                        }
                        HorizontalLayout {
                            alignment: end;
                            spacing: 10px;
                            Button {
                                text: root.prompt-decline;
                                clicked => { root.prompt-answered(false); }
                            }
                            Button {
                                text: root.prompt-accept;
                                clicked => { root.prompt-answered(true); }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Runs detached tasks on the slint event loop.
struct EventLoopSpawner;

impl LocalSpawn for EventLoopSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        slint::spawn_local(future)
            .map(|_| ())
            .map_err(|_| SpawnError::shutdown())
    }
}

struct Services {
    picker: Rc<dyn LibraryPicker>,
    sink: Rc<dyn PhotoSink>,
    gate: PermissionGate,
    cache_dir: std::path::PathBuf,
}

#[cfg(target_os = "android")]
fn services(app: &slint::android::AndroidApp) -> Result<Services> {
    use crate::platform::android::{
        get_cache_dir, ActivityPicker, AndroidPermissions, MediaStoreSink,
    };
    Ok(Services {
        picker: Rc::new(ActivityPicker::new(app.clone())),
        sink: Rc::new(MediaStoreSink::new(app.clone())),
        gate: PermissionGate::runtime(Rc::new(AndroidPermissions::new(app.clone()))),
        cache_dir: get_cache_dir(app)?,
    })
}

#[cfg(not(target_os = "android"))]
fn services() -> Result<Services> {
    use crate::platform::desktop::{cache_dir, photo_library, FileDialogPicker};
    Ok(Services {
        picker: Rc::new(FileDialogPicker),
        sink: Rc::new(photo_library()),
        gate: PermissionGate::implicit(),
        cache_dir: cache_dir(),
    })
}

/// Decoded photo for the modal; captures carry their JPEG inline, picked
/// photos are loaded from disk.
fn photo_image(image: &CapturedImageRef) -> Option<Image> {
    if let Some(bytes) = image.bytes() {
        match image::load_from_memory(bytes) {
            Ok(decoded) => {
                let rgba = decoded.to_rgba8();
                let buffer = SharedPixelBuffer::<Rgba8Pixel>::clone_from_slice(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                );
                return Some(Image::from_rgba8(buffer));
            }
            Err(err) => warn!("could not decode {}: {err}", image.uri()),
        }
    }
    let path = image.local_path()?;
    Image::load_from_path(&path)
        .map_err(|_| warn!("could not load {}", path.display()))
        .ok()
}

fn render(window: &MainWindow, state: &ViewState, shown_uri: &RefCell<Option<String>>) {
    window.set_controls_visible(state.camera_ready);
    window.set_notice(state.notice.as_ref().map(|n| n.text()).unwrap_or_default().into());

    if let Some(image) = &state.current_image {
        let mut shown = shown_uri.borrow_mut();
        if shown.as_deref() != Some(image.uri()) {
            window.set_photo(photo_image(image).unwrap_or_default());
            *shown = Some(image.uri().to_string());
        }
    }
    window.set_modal_open(state.modal_open);
    window.set_camera_prompt(state.camera_prompt);
}

fn start_preview(camera: &RefCell<Camera>, controller: &ViewStateController, config: &AppConfig) {
    let facing = controller.facing();
    let started = camera.borrow_mut().start_preview(
        facing,
        config.flash,
        config.preview_width,
        config.preview_height,
    );
    if let Err(err) = started {
        error!("failed to start {facing:?} camera: {err:#}");
        controller.on_camera_failed(format!("{err:#}"));
    }
}

pub fn run(#[cfg(target_os = "android")] android_app: slint::android::AndroidApp) -> Result<()> {
    let config = AppConfig::default();
    let window = MainWindow::new()?;

    #[cfg(target_os = "android")]
    let services = services(&android_app)?;
    #[cfg(not(target_os = "android"))]
    let services = services()?;

    let (preview_sender, preview_receiver) = channel();
    let camera = Rc::new(RefCell::new(Camera::new(
        #[cfg(target_os = "android")]
        android_app,
        preview_sender,
        services.cache_dir.clone(),
    )?));

    let controller = Rc::new(ViewStateController::new(
        services.picker,
        services.sink,
        services.gate,
        Rc::new(EventLoopSpawner),
        config.clone(),
    ));

    let shown_uri = Rc::new(RefCell::new(None));
    {
        let window = window.as_weak();
        let shown_uri = shown_uri.clone();
        controller.subscribe(move |state| {
            if let Some(window) = window.upgrade() {
                render(&window, state, &shown_uri);
            }
        });
    }
    render(&window, &controller.snapshot(), &shown_uri);

    let rationale = &config.camera_permission;
    window.set_prompt_title(rationale.title.as_str().into());
    window.set_prompt_message(rationale.message.as_str().into());
    window.set_prompt_accept(rationale.button_positive.as_str().into());
    window.set_prompt_decline(rationale.button_negative.as_str().into());

    let start_camera: Rc<dyn Fn()> = {
        let camera = camera.clone();
        let controller = controller.clone();
        let config = config.clone();
        Rc::new(move || {
            let (camera, controller, config) = (camera.clone(), controller.clone(), config.clone());
            let task = async move {
                if controller.on_camera_start_requested().await {
                    start_preview(&camera, &controller, &config);
                }
            };
            if let Err(err) = slint::spawn_local(task) {
                error!("could not start the camera: {err}");
            }
        })
    };
    start_camera();

    // Preview frames. Buffers queued before a restart still reach the screen,
    // but only a frame from the running preview marks the camera ready.
    let timer = Timer::default();
    {
        let window = window.as_weak();
        let controller = controller.clone();
        let camera = camera.clone();
        timer.start(TimerMode::Repeated, Duration::from_millis(10), move || {
            let Some(buffer) = preview_receiver.try_iter().last() else {
                return;
            };
            if let Some(window) = window.upgrade() {
                window.set_camera_texture(Image::from_rgba8(buffer));
            }
            if !controller.controls_visible() {
                let handle = camera.borrow().still_capture();
                if handle.has_frame() {
                    controller.set_camera_readiness(CameraReadiness::Ready(Rc::new(handle)));
                }
            }
        });
    }

    window.on_take_photo({
        let controller = controller.clone();
        move || {
            let controller = controller.clone();
            let task = async move {
                if let Err(err) = controller.on_capture_requested().await {
                    warn!("no photo taken: {err}");
                }
            };
            if let Err(err) = slint::spawn_local(task) {
                error!("could not start capture: {err}");
            }
        }
    });

    window.on_open_album({
        let controller = controller.clone();
        move || {
            let controller = controller.clone();
            if let Err(err) = slint::spawn_local(async move { controller.on_album_requested().await }) {
                error!("could not open the album: {err}");
            }
        }
    });

    window.on_toggle_camera({
        let controller = controller.clone();
        let start_camera = start_camera.clone();
        move || {
            controller.toggle_facing();
            start_camera();
        }
    });

    window.on_prompt_answered({
        let controller = controller.clone();
        let camera = camera.clone();
        let config = config.clone();
        move |accepted| {
            let (camera, controller, config) = (camera.clone(), controller.clone(), config.clone());
            let task = async move {
                if controller.on_camera_rationale_answered(accepted).await {
                    start_preview(&camera, &controller, &config);
                }
            };
            if let Err(err) = slint::spawn_local(task) {
                error!("could not request the camera permission: {err}");
            }
        }
    });

    window.on_close_modal({
        let controller = controller.clone();
        move || controller.close_modal()
    });

    window.on_dismiss_notice({
        let controller = controller.clone();
        move || controller.dismiss_notice()
    });

    window.run()?;
    camera.borrow_mut().stop_preview()?;
    Ok(())
}
