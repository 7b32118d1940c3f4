//! Controller behaviour against fake camera, picker, permission and library.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use camera_roll::{
    capture::{CameraReadiness, CaptureConfig, CaptureService},
    config::AppConfig,
    controller::ViewStateController,
    error::{CaptureError, SaveError},
    permission::{PermissionApi, PermissionGate},
    picker::{LibraryPicker, PickOutcome, PickedAsset, PickerConfig},
    sink::PhotoSink,
    state::{CameraFacing, CapturedImageRef, DisplayPhase, NoticeKind, ViewState},
};
use futures::{
    channel::oneshot,
    executor::LocalPool,
    future::{self, LocalBoxFuture},
    FutureExt,
};

#[derive(Default)]
struct FakeCamera {
    results: RefCell<VecDeque<Result<CapturedImageRef, CaptureError>>>,
    configs: RefCell<Vec<CaptureConfig>>,
}

impl FakeCamera {
    fn succeeding(uris: &[&str]) -> Rc<Self> {
        let camera = Self::default();
        for uri in uris {
            camera
                .results
                .borrow_mut()
                .push_back(Ok(CapturedImageRef::with_bytes(*uri, vec![0xff, 0xd8])));
        }
        Rc::new(camera)
    }

    fn failing() -> Rc<Self> {
        let camera = Self::default();
        camera
            .results
            .borrow_mut()
            .push_back(Err(CaptureError::CameraUnavailable("hardware busy".into())));
        Rc::new(camera)
    }
}

impl CaptureService for FakeCamera {
    fn capture(&self, config: CaptureConfig) -> LocalBoxFuture<'_, Result<CapturedImageRef, CaptureError>> {
        self.configs.borrow_mut().push(config);
        let result = self
            .results
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(CaptureError::NoFrame));
        future::ready(result).boxed_local()
    }
}

struct FakePicker {
    outcome: PickOutcome,
    configs: RefCell<Vec<PickerConfig>>,
}

impl FakePicker {
    fn returning(outcome: PickOutcome) -> Rc<Self> {
        Rc::new(Self {
            outcome,
            configs: RefCell::default(),
        })
    }
}

impl LibraryPicker for FakePicker {
    fn pick(&self, config: PickerConfig) -> LocalBoxFuture<'_, PickOutcome> {
        self.configs.borrow_mut().push(config);
        future::ready(self.outcome.clone()).boxed_local()
    }
}

/// Records every save. In `hold` mode a save only completes once released.
#[derive(Default)]
struct RecordingSink {
    saves: RefCell<Vec<(String, String)>>,
    completed: Cell<usize>,
    hold: bool,
    fail: bool,
    pending: RefCell<Vec<oneshot::Sender<()>>>,
}

impl RecordingSink {
    fn release_all(&self) {
        for release in self.pending.borrow_mut().drain(..) {
            let _ = release.send(());
        }
    }
}

impl PhotoSink for RecordingSink {
    fn save(&self, image: CapturedImageRef, album: String) -> LocalBoxFuture<'_, Result<(), SaveError>> {
        self.saves.borrow_mut().push((image.uri().to_string(), album));
        let released = if self.hold {
            let (tx, rx) = oneshot::channel();
            self.pending.borrow_mut().push(tx);
            Some(rx)
        } else {
            None
        };
        async move {
            if let Some(rx) = released {
                let _ = rx.await;
            }
            self.completed.set(self.completed.get() + 1);
            if self.fail {
                Err(SaveError::Platform("library unavailable".into()))
            } else {
                Ok(())
            }
        }
        .boxed_local()
    }
}

struct FixedPermission {
    granted: Cell<bool>,
    grant_on_request: bool,
    requests: Cell<u32>,
}

impl FixedPermission {
    fn new(granted: bool, grant_on_request: bool) -> Rc<Self> {
        Rc::new(Self {
            granted: Cell::new(granted),
            grant_on_request,
            requests: Cell::new(0),
        })
    }
}

impl PermissionApi for FixedPermission {
    fn check(&self, _: &'static str) -> LocalBoxFuture<'_, bool> {
        future::ready(self.granted.get()).boxed_local()
    }

    fn request(&self, _: &'static str) -> LocalBoxFuture<'_, bool> {
        self.requests.set(self.requests.get() + 1);
        self.granted.set(self.grant_on_request);
        future::ready(self.grant_on_request).boxed_local()
    }
}

struct Harness {
    pool: LocalPool,
    controller: Rc<ViewStateController>,
    sink: Rc<RecordingSink>,
}

impl Harness {
    fn new(picker: Rc<FakePicker>, sink: RecordingSink, gate: PermissionGate) -> Self {
        let pool = LocalPool::new();
        let sink = Rc::new(sink);
        let controller = Rc::new(ViewStateController::new(
            picker,
            sink.clone(),
            gate,
            Rc::new(pool.spawner()),
            AppConfig::default(),
        ));
        Self {
            pool,
            controller,
            sink,
        }
    }

    fn with_camera(camera: Rc<FakeCamera>) -> Self {
        let harness = Self::new(
            FakePicker::returning(PickOutcome::Cancelled),
            RecordingSink::default(),
            PermissionGate::implicit(),
        );
        harness.ready(camera);
        harness
    }

    fn with_picker(outcome: PickOutcome) -> Self {
        Self::new(
            FakePicker::returning(outcome),
            RecordingSink::default(),
            PermissionGate::implicit(),
        )
    }

    fn ready(&self, camera: Rc<FakeCamera>) {
        self.controller
            .set_camera_readiness(CameraReadiness::Ready(camera));
    }

    fn capture(&mut self) -> Result<CapturedImageRef, CaptureError> {
        let controller = self.controller.clone();
        self.pool
            .run_until(async move { controller.on_capture_requested().await })
    }

    fn pick(&mut self) {
        let controller = self.controller.clone();
        self.pool
            .run_until(async move { controller.on_album_requested().await });
    }

    fn state(&self) -> ViewState {
        self.controller.snapshot()
    }

    fn triple(&self) -> (CameraFacing, Option<String>, bool) {
        let state = self.state();
        (
            state.facing,
            state.current_uri().map(str::to_string),
            state.modal_open,
        )
    }
}

#[test]
fn toggling_twice_restores_facing() {
    let h = Harness::with_picker(PickOutcome::Cancelled);
    assert_eq!(h.controller.facing(), CameraFacing::Back);
    assert_eq!(h.controller.toggle_facing(), CameraFacing::Front);
    assert_eq!(h.controller.toggle_facing(), CameraFacing::Back);

    // Same round trip starting from the front camera.
    h.controller.toggle_facing();
    assert_eq!(h.controller.facing(), CameraFacing::Front);
    assert_eq!(h.controller.toggle_facing(), CameraFacing::Back);
    assert_eq!(h.controller.toggle_facing(), CameraFacing::Front);
}

#[test]
fn capture_then_save_into_photo_album() {
    let camera = FakeCamera::succeeding(&["img://1"]);
    let mut h = Harness::with_camera(camera.clone());
    assert_eq!(h.triple(), (CameraFacing::Back, None, false));

    let image = h.capture().unwrap();
    assert_eq!(image.uri(), "img://1");
    assert_eq!(
        h.triple(),
        (CameraFacing::Back, Some("img://1".to_string()), true)
    );

    h.pool.run_until_stalled();
    assert_eq!(
        *h.sink.saves.borrow(),
        vec![("img://1".to_string(), "photo".to_string())]
    );
    assert_eq!(h.sink.completed.get(), 1);

    let config = camera.configs.borrow()[0];
    assert_eq!(config.quality, 0.5);
    assert!(config.include_bytes);
}

#[test]
fn capture_replaces_image_from_any_phase() {
    let mut h = Harness::with_camera(FakeCamera::succeeding(&["img://1", "img://2", "img://3"]));

    h.capture().unwrap();
    assert_eq!(h.state().phase(), DisplayPhase::ShownOpen);

    // Shown and open: replaced in place.
    h.capture().unwrap();
    assert_eq!(h.state().current_uri(), Some("img://2"));
    assert!(h.state().modal_open);

    h.controller.close_modal();
    assert_eq!(h.state().phase(), DisplayPhase::HasImageClosed);
    h.capture().unwrap();
    assert_eq!(h.state().phase(), DisplayPhase::ShownOpen);
    assert_eq!(h.state().current_uri(), Some("img://3"));

    h.pool.run_until_stalled();
    assert_eq!(h.sink.saves.borrow().len(), 3);
}

#[test]
fn close_keeps_image_then_toggle() {
    let mut h = Harness::with_camera(FakeCamera::succeeding(&["img://1"]));
    h.capture().unwrap();
    assert_eq!(
        h.triple(),
        (CameraFacing::Back, Some("img://1".to_string()), true)
    );

    h.controller.close_modal();
    assert_eq!(
        h.triple(),
        (CameraFacing::Back, Some("img://1".to_string()), false)
    );

    h.controller.close_modal();
    assert_eq!(h.state().phase(), DisplayPhase::HasImageClosed);

    h.controller.toggle_facing();
    assert_eq!(
        h.triple(),
        (CameraFacing::Front, Some("img://1".to_string()), false)
    );
}

#[test]
fn cancelled_pick_changes_nothing() {
    let mut h = Harness::with_picker(PickOutcome::Cancelled);
    let before = h.state();
    h.pick();
    assert_eq!(h.state(), before);

    h.controller.toggle_facing();
    let before = h.triple();
    h.pick();
    assert_eq!(h.triple(), before);
}

#[test]
fn pick_shows_first_asset_without_saving() {
    let mut h = Harness::with_picker(PickOutcome::Picked(vec![
        PickedAsset::new("img://2"),
        PickedAsset::new("img://3"),
    ]));
    h.pick();
    h.pool.run_until_stalled();

    assert_eq!(h.state().current_uri(), Some("img://2"));
    assert!(h.state().modal_open);
    assert!(h.sink.saves.borrow().is_empty());
}

#[test]
fn pick_uses_album_strings() {
    let picker = FakePicker::returning(PickOutcome::Cancelled);
    let mut h = Harness::new(picker.clone(), RecordingSink::default(), PermissionGate::implicit());
    h.pick();

    let configs = picker.configs.borrow();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].title, "Selecione uma foto");
    assert_eq!(configs[0].button_label, "Buscar foto do álbum...");
    assert!(configs[0].metadata_only);
}

#[test]
fn pick_error_raises_notice_only() {
    let mut h = Harness::with_picker(PickOutcome::Error("gallery crashed".into()));
    h.pick();

    let state = h.state();
    assert_eq!(state.phase(), DisplayPhase::EmptyClosed);
    let notice = state.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::PickFailed);
    assert_eq!(notice.message, "gallery crashed");

    h.controller.dismiss_notice();
    assert!(h.state().notice.is_none());
}

#[test]
fn empty_pick_is_an_error() {
    let mut h = Harness::with_picker(PickOutcome::Picked(vec![]));
    h.pick();
    let state = h.state();
    assert!(!state.modal_open);
    assert_eq!(state.notice.map(|n| n.kind), Some(NoticeKind::PickFailed));
}

#[test]
fn capture_failure_keeps_state_and_notifies() {
    let mut h = Harness::with_camera(FakeCamera::failing());
    let before = h.triple();

    let err = h.capture().unwrap_err();
    assert!(matches!(err, CaptureError::CameraUnavailable(_)));
    assert_eq!(h.triple(), before);
    assert_eq!(
        h.state().notice.map(|n| n.kind),
        Some(NoticeKind::CaptureFailed)
    );

    h.pool.run_until_stalled();
    assert!(h.sink.saves.borrow().is_empty());
}

#[test]
fn capture_needs_a_ready_camera() {
    let mut h = Harness::with_picker(PickOutcome::Cancelled);
    assert!(!h.controller.controls_visible());
    assert!(!h.state().camera_ready);
    let before = h.state();

    assert!(matches!(h.capture(), Err(CaptureError::NotReady)));
    assert_eq!(h.state(), before);

    h.ready(FakeCamera::succeeding(&["img://1"]));
    assert!(h.controller.controls_visible());
    assert!(h.state().camera_ready);
}

#[test]
fn toggling_drops_the_camera_handle() {
    let mut h = Harness::with_camera(FakeCamera::succeeding(&["img://1"]));
    h.controller.toggle_facing();
    assert!(!h.controller.controls_visible());
    assert!(matches!(h.capture(), Err(CaptureError::NotReady)));
}

#[test]
fn capture_does_not_wait_for_the_save() {
    let mut h = Harness::new(
        FakePicker::returning(PickOutcome::Cancelled),
        RecordingSink {
            hold: true,
            ..Default::default()
        },
        PermissionGate::implicit(),
    );
    h.ready(FakeCamera::succeeding(&["img://1", "img://2"]));

    h.capture().unwrap();
    h.pool.run_until_stalled();
    assert!(h.state().modal_open);
    assert_eq!(h.sink.saves.borrow().len(), 1);
    assert_eq!(h.sink.completed.get(), 0);

    // The user keeps going while the first save is still in flight.
    h.controller.close_modal();
    h.controller.toggle_facing();
    h.ready(FakeCamera::succeeding(&["img://2"]));
    h.capture().unwrap();
    h.pool.run_until_stalled();
    assert_eq!(h.sink.saves.borrow().len(), 2);
    assert_eq!(h.sink.completed.get(), 0);
    assert_eq!(
        h.triple(),
        (CameraFacing::Front, Some("img://2".to_string()), true)
    );

    h.sink.release_all();
    h.pool.run_until_stalled();
    assert_eq!(h.sink.completed.get(), 2);
    assert!(h.state().notice.is_none());
}

#[test]
fn denied_permission_skips_the_library() {
    let permission = FixedPermission::new(false, false);
    let mut h = Harness::new(
        FakePicker::returning(PickOutcome::Cancelled),
        RecordingSink::default(),
        PermissionGate::runtime(permission.clone()),
    );
    h.ready(FakeCamera::succeeding(&["img://1"]));

    h.capture().unwrap();
    h.pool.run_until_stalled();

    assert!(h.sink.saves.borrow().is_empty());
    assert_eq!(permission.requests.get(), 1);
    let state = h.state();
    assert_eq!(state.current_uri(), Some("img://1"));
    assert!(state.modal_open);
    assert_eq!(
        state.notice.map(|n| n.kind),
        Some(NoticeKind::PermissionDenied)
    );
}

#[test]
fn granted_permission_never_prompts() {
    let permission = FixedPermission::new(true, true);
    let mut h = Harness::new(
        FakePicker::returning(PickOutcome::Cancelled),
        RecordingSink::default(),
        PermissionGate::runtime(permission.clone()),
    );
    h.ready(FakeCamera::succeeding(&["img://1"]));

    h.capture().unwrap();
    h.pool.run_until_stalled();

    assert_eq!(permission.requests.get(), 0);
    assert_eq!(h.sink.saves.borrow().len(), 1);
}

#[test]
fn failed_save_is_reported_not_retried() {
    let mut h = Harness::new(
        FakePicker::returning(PickOutcome::Cancelled),
        RecordingSink {
            fail: true,
            ..Default::default()
        },
        PermissionGate::implicit(),
    );
    h.ready(FakeCamera::succeeding(&["img://1"]));

    h.capture().unwrap();
    h.pool.run_until_stalled();

    assert_eq!(h.sink.saves.borrow().len(), 1);
    let state = h.state();
    assert!(state.modal_open);
    assert_eq!(state.notice.map(|n| n.kind), Some(NoticeKind::SaveFailed));
}

#[test]
fn listeners_see_background_updates() {
    let mut h = Harness::new(
        FakePicker::returning(PickOutcome::Cancelled),
        RecordingSink {
            fail: true,
            ..Default::default()
        },
        PermissionGate::implicit(),
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        h.controller
            .subscribe(move |state: &ViewState| seen.borrow_mut().push(state.clone()));
    }
    h.ready(FakeCamera::succeeding(&["img://1"]));
    h.capture().unwrap();
    h.pool.run_until_stalled();

    let seen = seen.borrow();
    let last = seen.last().unwrap();
    assert!(last.camera_ready);
    assert_eq!(last.current_uri(), Some("img://1"));
    assert_eq!(last.notice.as_ref().map(|n| n.kind), Some(NoticeKind::SaveFailed));
    assert!(seen.iter().any(|state| state.modal_open && state.notice.is_none()));
}

impl Harness {
    fn with_permission(permission: Rc<FixedPermission>) -> Self {
        Self::new(
            FakePicker::returning(PickOutcome::Cancelled),
            RecordingSink::default(),
            PermissionGate::runtime(permission),
        )
    }

    fn start_camera(&mut self) -> bool {
        let controller = self.controller.clone();
        self.pool
            .run_until(async move { controller.on_camera_start_requested().await })
    }

    fn answer_rationale(&mut self, accepted: bool) -> bool {
        let controller = self.controller.clone();
        self.pool
            .run_until(async move { controller.on_camera_rationale_answered(accepted).await })
    }
}

#[test]
fn granted_camera_starts_without_rationale() {
    let permission = FixedPermission::new(true, true);
    let mut h = Harness::with_permission(permission.clone());
    assert!(h.start_camera());
    assert!(!h.state().camera_prompt);
    assert_eq!(permission.requests.get(), 0);
}

#[test]
fn camera_starts_after_first_run_grant() {
    let permission = FixedPermission::new(false, true);
    let mut h = Harness::with_permission(permission.clone());

    assert!(!h.start_camera());
    assert!(h.state().camera_prompt);
    assert_eq!(permission.requests.get(), 0);

    assert!(h.answer_rationale(true));
    assert!(!h.state().camera_prompt);
    assert!(h.state().notice.is_none());
    assert_eq!(permission.requests.get(), 1);

    // Later restarts, e.g. after a toggle, go straight through.
    h.controller.toggle_facing();
    assert!(h.start_camera());
}

#[test]
fn declined_rationale_never_prompts_the_os() {
    let permission = FixedPermission::new(false, true);
    let mut h = Harness::with_permission(permission.clone());
    h.start_camera();

    assert!(!h.answer_rationale(false));
    assert_eq!(permission.requests.get(), 0);
    let state = h.state();
    assert!(!state.camera_prompt);
    assert!(!state.camera_ready);
    let notice = state.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::CameraUnavailable);
    assert_eq!(notice.message, "Precisamos usar a sua camera");
}

#[test]
fn refused_camera_grant_is_reported() {
    let permission = FixedPermission::new(false, false);
    let mut h = Harness::with_permission(permission.clone());
    h.start_camera();

    assert!(!h.answer_rationale(true));
    assert_eq!(permission.requests.get(), 1);
    assert!(!h.controller.controls_visible());
    assert_eq!(
        h.state().notice.map(|n| n.kind),
        Some(NoticeKind::CameraUnavailable)
    );
}

#[test]
fn camera_failure_keeps_controls_hidden() {
    let h = Harness::with_picker(PickOutcome::Cancelled);
    h.controller.on_camera_failed("no usable camera found");
    let state = h.state();
    assert!(!state.camera_ready);
    assert_eq!(
        state.notice.map(|n| n.text()),
        Some("Câmera indisponível: no usable camera found".to_string())
    );
}
