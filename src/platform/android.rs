//! JNI plumbing for the Android host: runtime permissions, the app cache
//! directory, the gallery picker and MediaStore inserts.
//!
//! Every call attaches the calling thread to the VM. Blocking work runs on a
//! helper thread and is handed back to the UI loop through a oneshot channel.

use std::{path::PathBuf, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use futures::{channel::oneshot, future::LocalBoxFuture, FutureExt};
use jni::{
    objects::{JClass, JObject, JString, JValueGen},
    sys::{jint, JNIInvokeInterface_, _jobject},
    JNIEnv, JavaVM,
};
use log::{info, warn};
use slint::android::AndroidApp;

use crate::{
    error::SaveError,
    permission::{PermissionApi, WRITE_EXTERNAL_STORAGE},
    picker::{LibraryPicker, PickOutcome, PickedAsset, PickerConfig},
    sink::{self, PhotoSink},
    state::CapturedImageRef,
};

/// Scoped storage: MediaStore inserts need no storage permission from here on.
const SCOPED_STORAGE_SDK: i32 = 29;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PERMISSION_POLLS: u32 = 300;
const PICKER_POLLS: u32 = 600;
const PERMISSION_REQUEST_CODE: i32 = 101;

fn java_vm(app: &AndroidApp) -> Result<JavaVM> {
    Ok(unsafe { JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)? })
}

fn activity<'a>(app: &AndroidApp) -> JObject<'a> {
    unsafe { JObject::from_raw(app.activity_as_ptr() as *mut _jobject) }
}

/// Turns a pending Java exception into an error instead of leaving it armed.
fn clear_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

fn run_blocking<T: Send + 'static>(work: impl FnOnce() -> T + Send + 'static) -> oneshot::Receiver<T> {
    let (tx, rx) = oneshot::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx
}

/// Runs `call` on an attached env. A Java exception left pending by a failed
/// call is cleared before the error is returned.
fn with_env<T>(app: &AndroidApp, call: impl FnOnce(&mut JNIEnv) -> Result<T>) -> Result<T> {
    let vm = java_vm(app)?;
    let mut env = vm.attach_current_thread()?;
    let result = call(&mut *env);
    if result.is_err() {
        clear_exception(&mut env);
    }
    result
}

pub fn sdk_version(app: &AndroidApp) -> Result<i32> {
    with_env(app, |env| {
        Ok(env
            .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
            .i()?)
    })
}

pub fn check_self_permission(app: &AndroidApp, permission: &str) -> Result<bool> {
    with_env(app, |env| {
        let granted_int = env
            .get_static_field("android/content/pm/PackageManager", "PERMISSION_GRANTED", "I")?
            .i()?;
        let permission_str = env.new_string(permission)?;
        let result = env
            .call_method(
                activity(app),
                "checkSelfPermission",
                "(Ljava/lang/String;)I",
                &[JValueGen::Object(&JObject::from(permission_str))],
            )?
            .i()?;
        Ok(result == granted_int)
    })
}

pub fn request_permissions(app: &AndroidApp, permissions: &[&str], request_code: i32) -> Result<()> {
    with_env(app, |env| {
        let java_permission_array =
            env.new_object_array(permissions.len() as jint, "java/lang/String", JObject::null())?;
        for (index, permission) in permissions.iter().enumerate() {
            let permission_str = env.new_string(*permission)?;
            env.set_object_array_element(&java_permission_array, index as jint, permission_str)?;
        }

        env.call_method(
            activity(app),
            "requestPermissions",
            "([Ljava/lang/String;I)V",
            &[
                JValueGen::Object(&JObject::from(java_permission_array)),
                request_code.into(),
            ],
        )?;
        Ok(())
    })
}

pub fn get_cache_dir(app: &AndroidApp) -> Result<PathBuf> {
    with_env(app, |env| {
        let file = env
            .call_method(activity(app), "getCacheDir", "()Ljava/io/File;", &[])?
            .l()?;
        let path = env
            .call_method(&file, "getAbsolutePath", "()Ljava/lang/String;", &[])?
            .l()?;
        let path: String = env.get_string(&JString::from(path))?.into();
        Ok(PathBuf::from(path))
    })
}

/// `checkSelfPermission` / `requestPermissions` on the running activity.
pub struct AndroidPermissions {
    app: AndroidApp,
}

impl AndroidPermissions {
    pub fn new(app: AndroidApp) -> Self {
        Self { app }
    }

    fn granted(app: &AndroidApp, permission: &str) -> bool {
        if permission == WRITE_EXTERNAL_STORAGE {
            match sdk_version(app) {
                Ok(sdk) if sdk >= SCOPED_STORAGE_SDK => return true,
                Ok(_) => {}
                Err(err) => warn!("could not read sdk version: {err:#}"),
            }
        }
        check_self_permission(app, permission).unwrap_or_else(|err| {
            warn!("checkSelfPermission({permission}) failed: {err:#}");
            false
        })
    }
}

impl PermissionApi for AndroidPermissions {
    fn check(&self, permission: &'static str) -> LocalBoxFuture<'_, bool> {
        let app = self.app.clone();
        let rx = run_blocking(move || Self::granted(&app, permission));
        async move { rx.await.unwrap_or(false) }.boxed_local()
    }

    /// The grant arrives through the activity's result callback, which the
    /// native side never sees, so the grant is polled instead.
    fn request(&self, permission: &'static str) -> LocalBoxFuture<'_, bool> {
        let app = self.app.clone();
        let rx = run_blocking(move || {
            if let Err(err) = request_permissions(&app, &[permission], PERMISSION_REQUEST_CODE) {
                warn!("requestPermissions({permission}) failed: {err:#}");
                return false;
            }
            for _ in 0..PERMISSION_POLLS {
                thread::sleep(POLL_INTERVAL);
                if Self::granted(&app, permission) {
                    return true;
                }
            }
            false
        });
        async move { rx.await.unwrap_or(false) }.boxed_local()
    }
}

/// Gallery chooser hosted by the activity.
///
/// The activity provides `launchImagePicker(String title, String buttonLabel,
/// String mimeType)` plus the static result accessors `clearPickerResult()`,
/// `isPickerCancelled()`, `getPickerError()` and `getPickedImageUris()` (uris
/// separated by newlines).
pub struct ActivityPicker {
    app: AndroidApp,
}

impl ActivityPicker {
    pub fn new(app: AndroidApp) -> Self {
        Self { app }
    }

    fn static_string(env: &mut JNIEnv, class: &JClass, method: &str) -> Result<Option<String>> {
        let value = env
            .call_static_method(class, method, "()Ljava/lang/String;", &[])?
            .l()?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(env.get_string(&JString::from(value))?.into()))
    }

    fn pick_blocking(app: &AndroidApp, config: &PickerConfig) -> Result<PickOutcome> {
        let vm = java_vm(app)?;
        let mut env = vm.attach_current_thread()?;
        let activity = activity(app);
        let class = env.get_object_class(&activity)?;

        env.call_static_method(&class, "clearPickerResult", "()V", &[])
            .context("clearPickerResult")?;
        let title = env.new_string(&config.title)?;
        let label = env.new_string(&config.button_label)?;
        let mime = env.new_string(config.media_type.mime())?;
        env.call_method(
            &activity,
            "launchImagePicker",
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)V",
            &[
                JValueGen::Object(&JObject::from(title)),
                JValueGen::Object(&JObject::from(label)),
                JValueGen::Object(&JObject::from(mime)),
            ],
        )
        .context("launchImagePicker")?;

        for _ in 0..PICKER_POLLS {
            thread::sleep(POLL_INTERVAL);

            if env
                .call_static_method(&class, "isPickerCancelled", "()Z", &[])?
                .z()?
            {
                return Ok(PickOutcome::Cancelled);
            }
            if let Some(err) = Self::static_string(&mut env, &class, "getPickerError")? {
                return Ok(PickOutcome::Error(err));
            }
            if let Some(uris) = Self::static_string(&mut env, &class, "getPickedImageUris")? {
                let assets: Vec<_> = uris
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(PickedAsset::new)
                    .collect();
                return Ok(PickOutcome::Picked(assets));
            }
        }
        Ok(PickOutcome::Error("image picker timed out".to_string()))
    }
}

impl LibraryPicker for ActivityPicker {
    fn pick(&self, config: PickerConfig) -> LocalBoxFuture<'_, PickOutcome> {
        let app = self.app.clone();
        let rx = run_blocking(move || {
            Self::pick_blocking(&app, &config).unwrap_or_else(|err| {
                if let Ok(vm) = java_vm(&app) {
                    if let Ok(mut env) = vm.attach_current_thread() {
                        clear_exception(&mut env);
                    }
                }
                PickOutcome::Error(format!("{err:#}"))
            })
        });
        async move {
            rx.await
                .unwrap_or_else(|_| PickOutcome::Error("image picker interrupted".to_string()))
        }
        .boxed_local()
    }
}

/// Inserts photos into `MediaStore.Images` under `Pictures/<album>`.
pub struct MediaStoreSink {
    app: AndroidApp,
}

impl MediaStoreSink {
    pub fn new(app: AndroidApp) -> Self {
        Self { app }
    }

    fn put(env: &mut JNIEnv, values: &JObject, key: &str, value: &str) -> Result<()> {
        let key = env.new_string(key)?;
        let value = env.new_string(value)?;
        env.call_method(
            values,
            "put",
            "(Ljava/lang/String;Ljava/lang/String;)V",
            &[
                JValueGen::Object(&JObject::from(key)),
                JValueGen::Object(&JObject::from(value)),
            ],
        )?;
        Ok(())
    }

    fn insert(app: &AndroidApp, image: &CapturedImageRef, album: &str) -> Result<String> {
        let bytes = sink::image_bytes(image).map_err(|err| anyhow!("{err}"))?;
        let name = sink::target_file_name(image);
        let sdk = sdk_version(app)?;

        let vm = java_vm(app)?;
        let mut env = vm.attach_current_thread()?;
        let resolver = env
            .call_method(activity(app), "getContentResolver", "()Landroid/content/ContentResolver;", &[])?
            .l()?;

        let values = env.new_object("android/content/ContentValues", "()V", &[])?;
        Self::put(&mut env, &values, "_display_name", &name)?;
        Self::put(&mut env, &values, "mime_type", "image/jpeg")?;
        if sdk >= SCOPED_STORAGE_SDK {
            Self::put(&mut env, &values, "relative_path", &format!("Pictures/{album}"))?;
        }

        let collection = env
            .get_static_field(
                "android/provider/MediaStore$Images$Media",
                "EXTERNAL_CONTENT_URI",
                "Landroid/net/Uri;",
            )?
            .l()?;
        let item = env
            .call_method(
                &resolver,
                "insert",
                "(Landroid/net/Uri;Landroid/content/ContentValues;)Landroid/net/Uri;",
                &[JValueGen::Object(&collection), JValueGen::Object(&values)],
            )?
            .l()?;
        if item.is_null() {
            return Err(anyhow!("MediaStore refused the insert"));
        }

        let stream = env
            .call_method(
                &resolver,
                "openOutputStream",
                "(Landroid/net/Uri;)Ljava/io/OutputStream;",
                &[JValueGen::Object(&item)],
            )?
            .l()?;
        let array = env.byte_array_from_slice(&bytes)?;
        env.call_method(&stream, "write", "([B)V", &[JValueGen::Object(&JObject::from(array))])?;
        env.call_method(&stream, "close", "()V", &[])?;

        let item_uri = env
            .call_method(&item, "toString", "()Ljava/lang/String;", &[])?
            .l()?;
        Ok(env.get_string(&JString::from(item_uri))?.into())
    }
}

impl PhotoSink for MediaStoreSink {
    fn save(&self, image: CapturedImageRef, album: String) -> LocalBoxFuture<'_, Result<(), SaveError>> {
        let app = self.app.clone();
        let rx = run_blocking(move || {
            Self::insert(&app, &image, &album).map_err(|err| {
                if let Ok(vm) = java_vm(&app) {
                    if let Ok(mut env) = vm.attach_current_thread() {
                        clear_exception(&mut env);
                    }
                }
                SaveError::from(err)
            })
        });
        async move {
            let uri = rx.await.map_err(|_| SaveError::Interrupted)??;
            info!("MediaStore item {uri}");
            Ok(())
        }
        .boxed_local()
    }
}
