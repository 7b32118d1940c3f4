use std::rc::Rc;

use futures::future::LocalBoxFuture;
use log::{debug, info};

pub const WRITE_EXTERNAL_STORAGE: &str = "android.permission.WRITE_EXTERNAL_STORAGE";
pub const CAMERA: &str = "android.permission.CAMERA";

/// Explanation shown before the OS permission prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRationale {
    pub title: String,
    pub message: String,
    pub button_positive: String,
    pub button_negative: String,
}

impl Default for PermissionRationale {
    fn default() -> Self {
        Self {
            title: "Permissão para usar a camera".to_string(),
            message: "Precisamos usar a sua camera".to_string(),
            button_positive: "Ok".to_string(),
            button_negative: "Cancelar".to_string(),
        }
    }
}

/// Runtime permission primitives of the host OS.
pub trait PermissionApi {
    fn check(&self, permission: &'static str) -> LocalBoxFuture<'_, bool>;
    fn request(&self, permission: &'static str) -> LocalBoxFuture<'_, bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// Storage writes need a runtime grant (Android).
    Runtime,
    /// The platform never asks.
    Implicit,
}

impl PermissionPolicy {
    pub fn for_target() -> Self {
        if cfg!(target_os = "android") {
            PermissionPolicy::Runtime
        } else {
            PermissionPolicy::Implicit
        }
    }
}

/// Runtime permission checks for the camera and for saves. Nothing is
/// cached: a grant can be revoked between two uses.
#[derive(Clone)]
pub struct PermissionGate {
    policy: PermissionPolicy,
    api: Option<Rc<dyn PermissionApi>>,
}

impl PermissionGate {
    pub fn runtime(api: Rc<dyn PermissionApi>) -> Self {
        Self {
            policy: PermissionPolicy::Runtime,
            api: Some(api),
        }
    }

    pub fn implicit() -> Self {
        Self {
            policy: PermissionPolicy::Implicit,
            api: None,
        }
    }

    pub fn policy(&self) -> PermissionPolicy {
        self.policy
    }

    fn api(&self) -> Option<&Rc<dyn PermissionApi>> {
        match self.policy {
            PermissionPolicy::Runtime => self.api.as_ref(),
            PermissionPolicy::Implicit => None,
        }
    }

    /// Current grant, without prompting.
    pub async fn is_granted(&self, permission: &'static str) -> bool {
        match self.api() {
            Some(api) => api.check(permission).await,
            None => true,
        }
    }

    /// Prompts unconditionally and reports the user's answer.
    pub async fn request(&self, permission: &'static str) -> bool {
        let Some(api) = self.api() else {
            return true;
        };
        let granted = api.request(permission).await;
        info!("{permission} request granted: {granted}");
        granted
    }

    /// Prompts only when the permission is not granted yet.
    pub async fn ensure(&self, permission: &'static str) -> bool {
        if self.is_granted(permission).await {
            debug!("{permission} already granted");
            return true;
        }
        self.request(permission).await
    }

    pub async fn ensure_write_permission(&self) -> bool {
        self.ensure(WRITE_EXTERNAL_STORAGE).await
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use futures::FutureExt;
    use pollster::FutureExt as _;

    use super::*;

    struct FakeApi {
        granted: Cell<bool>,
        grant_on_request: bool,
        checks: Cell<u32>,
        requests: Cell<u32>,
        asked: RefCell<Vec<&'static str>>,
    }

    impl FakeApi {
        fn new(granted: bool, grant_on_request: bool) -> Rc<Self> {
            Rc::new(Self {
                granted: Cell::new(granted),
                grant_on_request,
                checks: Cell::new(0),
                requests: Cell::new(0),
                asked: RefCell::default(),
            })
        }
    }

    impl PermissionApi for FakeApi {
        fn check(&self, permission: &'static str) -> LocalBoxFuture<'_, bool> {
            self.asked.borrow_mut().push(permission);
            self.checks.set(self.checks.get() + 1);
            let granted = self.granted.get();
            async move { granted }.boxed_local()
        }

        fn request(&self, permission: &'static str) -> LocalBoxFuture<'_, bool> {
            self.asked.borrow_mut().push(permission);
            self.requests.set(self.requests.get() + 1);
            self.granted.set(self.grant_on_request);
            let granted = self.grant_on_request;
            async move { granted }.boxed_local()
        }
    }

    #[test]
    fn granted_check_never_prompts() {
        let api = FakeApi::new(true, false);
        let gate = PermissionGate::runtime(api.clone());
        assert!(gate.ensure_write_permission().block_on());
        assert_eq!(api.checks.get(), 1);
        assert_eq!(api.requests.get(), 0);
        assert_eq!(*api.asked.borrow(), vec![WRITE_EXTERNAL_STORAGE]);
    }

    #[test]
    fn missing_grant_prompts_once() {
        let api = FakeApi::new(false, true);
        let gate = PermissionGate::runtime(api.clone());
        assert!(gate.ensure_write_permission().block_on());
        assert_eq!(api.requests.get(), 1);
    }

    #[test]
    fn denied_prompt_is_false() {
        let api = FakeApi::new(false, false);
        let gate = PermissionGate::runtime(api.clone());
        assert!(!gate.ensure_write_permission().block_on());
        assert_eq!(api.checks.get(), 1);
        assert_eq!(api.requests.get(), 1);
    }

    #[test]
    fn rechecks_every_call() {
        let api = FakeApi::new(true, true);
        let gate = PermissionGate::runtime(api.clone());
        assert!(gate.ensure_write_permission().block_on());
        api.granted.set(false);
        assert!(gate.ensure_write_permission().block_on());
        assert_eq!(api.checks.get(), 2);
        assert_eq!(api.requests.get(), 1);
    }

    #[test]
    fn implicit_policy_always_granted() {
        let gate = PermissionGate::implicit();
        assert_eq!(gate.policy(), PermissionPolicy::Implicit);
        assert!(gate.ensure_write_permission().block_on());
    }

    #[test]
    fn camera_grant_is_checked_by_name() {
        let api = FakeApi::new(false, true);
        let gate = PermissionGate::runtime(api.clone());
        assert!(!gate.is_granted(CAMERA).block_on());
        assert!(gate.request(CAMERA).block_on());
        assert!(gate.is_granted(CAMERA).block_on());
        assert_eq!(*api.asked.borrow(), vec![CAMERA, CAMERA, CAMERA]);
    }

    #[test]
    fn implicit_policy_never_asks_for_the_camera() {
        let gate = PermissionGate::implicit();
        assert!(gate.is_granted(CAMERA).block_on());
        assert!(gate.request(CAMERA).block_on());
    }

    #[test]
    fn rationale_strings() {
        let rationale = PermissionRationale::default();
        assert_eq!(rationale.title, "Permissão para usar a camera");
        assert_eq!(rationale.message, "Precisamos usar a sua camera");
        assert_eq!(rationale.button_positive, "Ok");
        assert_eq!(rationale.button_negative, "Cancelar");
    }
}
