//! The screen's state and the handlers behind its buttons.
//!
//! Every handler runs on the UI event loop. A handler never holds a borrow of
//! the state across an `.await` and only writes after its own suspension, so
//! interleaved handlers cannot observe half-applied updates.

use std::{cell::RefCell, rc::Rc};

use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{error, info, warn};

use crate::{
    capture::CameraReadiness,
    config::AppConfig,
    error::CaptureError,
    permission::{PermissionGate, CAMERA},
    picker::{LibraryPicker, PickOutcome},
    sink::{self, PhotoSink, SaveOutcome},
    state::{CameraFacing, CapturedImageRef, Notice, NoticeKind, ViewState},
};

type Listener = Box<dyn Fn(&ViewState)>;

#[derive(Default)]
struct Shared {
    state: RefCell<ViewState>,
    camera: RefCell<CameraReadiness>,
    listeners: RefCell<Vec<Listener>>,
}

impl Shared {
    fn update(&self, apply: impl FnOnce(&mut ViewState)) {
        apply(&mut *self.state.borrow_mut());
        let snapshot = self.state.borrow().clone();
        for listener in self.listeners.borrow().iter() {
            listener(&snapshot);
        }
    }
}

pub struct ViewStateController {
    shared: Rc<Shared>,
    picker: Rc<dyn LibraryPicker>,
    sink: Rc<dyn PhotoSink>,
    gate: PermissionGate,
    spawner: Rc<dyn LocalSpawn>,
    config: AppConfig,
}

impl ViewStateController {
    pub fn new(
        picker: Rc<dyn LibraryPicker>,
        sink: Rc<dyn PhotoSink>,
        gate: PermissionGate,
        spawner: Rc<dyn LocalSpawn>,
        config: AppConfig,
    ) -> Self {
        Self {
            shared: Rc::default(),
            picker,
            sink,
            gate,
            spawner,
            config,
        }
    }

    pub fn snapshot(&self) -> ViewState {
        self.shared.state.borrow().clone()
    }

    /// Called with a fresh snapshot after every state change, including the
    /// ones made by background saves.
    pub fn subscribe(&self, listener: impl Fn(&ViewState) + 'static) {
        self.shared.listeners.borrow_mut().push(Box::new(listener));
    }

    pub fn facing(&self) -> CameraFacing {
        self.shared.state.borrow().facing
    }

    /// The camera handle bound to the old sensor is dropped; the screen must
    /// restart the preview and report readiness again.
    pub fn toggle_facing(&self) -> CameraFacing {
        *self.shared.camera.borrow_mut() = CameraReadiness::NotReady;
        self.shared.update(|state| {
            state.toggle_facing();
            state.camera_ready = false;
        });
        let facing = self.facing();
        info!("camera facing: {facing:?}");
        facing
    }

    pub fn set_camera_readiness(&self, readiness: CameraReadiness) {
        let ready = readiness.is_ready();
        *self.shared.camera.borrow_mut() = readiness;
        if self.shared.state.borrow().camera_ready != ready {
            self.shared.update(|state| state.camera_ready = ready);
        }
    }

    /// Whether the preview may start. When the camera permission is missing
    /// the rationale goes on screen and the answer arrives through
    /// [`Self::on_camera_rationale_answered`].
    pub async fn on_camera_start_requested(&self) -> bool {
        if self.gate.is_granted(CAMERA).await {
            return true;
        }
        info!("camera permission missing, showing rationale");
        self.shared.update(|state| state.camera_prompt = true);
        false
    }

    /// Resolves the rationale prompt; true once the OS granted the camera.
    pub async fn on_camera_rationale_answered(&self, accepted: bool) -> bool {
        self.shared.update(|state| state.camera_prompt = false);
        let granted = accepted && self.gate.request(CAMERA).await;
        if !granted {
            warn!("camera permission refused (rationale accepted: {accepted})");
            let message = self.config.camera_permission.message.clone();
            self.shared.update(|state| {
                state.notify(Notice::new(NoticeKind::CameraUnavailable, message))
            });
        }
        granted
    }

    /// The preview could not be started for the current facing.
    pub fn on_camera_failed(&self, message: impl Into<String>) {
        let notice = Notice::new(NoticeKind::CameraUnavailable, message);
        self.shared.update(|state| state.notify(notice));
    }

    pub fn controls_visible(&self) -> bool {
        self.shared.camera.borrow().is_ready()
    }

    pub async fn on_capture_requested(&self) -> Result<CapturedImageRef, CaptureError> {
        let handle = self.shared.camera.borrow().handle();
        let Some(handle) = handle else {
            warn!("capture requested before the camera was ready");
            return Err(CaptureError::NotReady);
        };

        match handle.capture(self.config.capture).await {
            Ok(image) => {
                info!("photo taken: {}", image.uri());
                self.shared.update(|state| state.show(image.clone()));
                self.spawn_save(image.clone());
                Ok(image)
            }
            Err(err) => {
                error!("capture failed: {err}");
                let notice = Notice::new(NoticeKind::CaptureFailed, err.to_string());
                self.shared.update(|state| state.notify(notice));
                Err(err)
            }
        }
    }

    pub async fn on_album_requested(&self) {
        match self.picker.pick(self.config.picker.clone()).await {
            PickOutcome::Cancelled => info!("image picker cancelled"),
            PickOutcome::Error(message) => {
                error!("image picker error: {message}");
                self.shared
                    .update(|state| state.notify(Notice::new(NoticeKind::PickFailed, message)));
            }
            PickOutcome::Picked(assets) => match assets.into_iter().next() {
                Some(first) => {
                    info!("photo picked: {}", first.uri);
                    self.shared
                        .update(|state| state.show(CapturedImageRef::new(first.uri)));
                }
                None => {
                    warn!("image picker returned an empty selection");
                    self.shared.update(|state| {
                        state.notify(Notice::new(NoticeKind::PickFailed, "nenhuma foto selecionada"))
                    });
                }
            },
        }
    }

    pub fn close_modal(&self) {
        if self.shared.state.borrow().modal_open {
            self.shared.update(ViewState::close_modal);
        }
    }

    pub fn dismiss_notice(&self) {
        if self.shared.state.borrow().notice.is_some() {
            self.shared.update(|state| state.notice = None);
        }
    }

    /// Starts the save without waiting for it. Its completion is unordered
    /// with any later action, and several saves may be in flight at once.
    fn spawn_save(&self, image: CapturedImageRef) {
        let shared = Rc::clone(&self.shared);
        let sink = Rc::clone(&self.sink);
        let gate = self.gate.clone();
        let album = self.config.album.clone();
        let task = async move {
            let notice = match sink::persist(&gate, sink.as_ref(), image, &album).await {
                SaveOutcome::Saved => return,
                SaveOutcome::PermissionDenied => {
                    Notice::new(NoticeKind::PermissionDenied, "a foto não foi salva")
                }
                SaveOutcome::Failed(err) => Notice::new(NoticeKind::SaveFailed, err.to_string()),
            };
            shared.update(|state| state.notify(notice));
        };
        if let Err(err) = self.spawner.spawn_local(task) {
            error!("could not start save task: {err}");
        }
    }
}
