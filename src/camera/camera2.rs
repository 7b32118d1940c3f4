use anyhow::{anyhow, Result};
use core::slice;
use log::{debug, error, info, warn};
use ndk_sys::{
    acamera_metadata_enum_acamera_control_ae_mode, acamera_metadata_enum_acamera_lens_facing,
    acamera_metadata_tag, camera_status_t,
    media_status_t, ACameraCaptureSession, ACameraCaptureSession_close,
    ACameraCaptureSession_setRepeatingRequest, ACameraCaptureSession_stateCallbacks, ACameraDevice,
    ACameraDevice_StateCallbacks, ACameraDevice_close, ACameraDevice_createCaptureRequest,
    ACameraDevice_createCaptureSession, ACameraDevice_getId, ACameraDevice_request_template,
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraCharacteristics,
    ACameraManager_getCameraIdList, ACameraManager_openCamera, ACameraMetadata,
    ACameraMetadata_const_entry, ACameraMetadata_free, ACameraMetadata_getConstEntry,
    ACameraOutputTarget, ACameraOutputTarget_create, ACameraOutputTarget_free, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free, ACaptureRequest_setEntry_u8, ACaptureSessionOutput,
    ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free, AImage, AImageReader,
    AImageReader_ImageListener, AImageReader_acquireLatestImage, AImageReader_delete,
    AImageReader_getWindow, AImageReader_new, AImageReader_setImageListener, AImage_delete,
    AImage_getHeight, AImage_getPlaneData, AImage_getPlanePixelStride, AImage_getPlaneRowStride,
    AImage_getWidth, ANativeWindow, AIMAGE_FORMATS,
};
use std::{
    ffi::{c_char, c_int, c_void, CStr},
    mem::zeroed,
    ptr::null_mut,
    time::Instant,
};

use super::{frame::Frame, publish, PreviewSender, SharedFrame};
use crate::{
    permission::CAMERA,
    platform::android,
    state::{CameraFacing, FlashMode},
};

#[link(name = "camera2ndk")]
extern "C" {}

#[link(name = "mediandk")]
extern "C" {}

/// Camera2 NDK preview. Must stay boxed once `start_preview` ran: the image
/// listener context points at it.
pub struct AndroidCamera {
    app: slint::android::AndroidApp,
    camera_device: *mut ACameraDevice,
    capture_request: *mut ACaptureRequest,
    camera_output_target: *mut ACameraOutputTarget,
    session_output: *mut ACaptureSessionOutput,
    capture_session_output_container: *mut ACaptureSessionOutputContainer,
    capture_session: *mut ACameraCaptureSession,
    image_reader: *mut AImageReader,
    camera_id: Option<String>,
    image_listener: AImageReader_ImageListener,
    capture_session_state_callbacks: ACameraCaptureSession_stateCallbacks,
    device_state_callbacks: ACameraDevice_StateCallbacks,
    timer: Instant,
    frame_count: i32,
    preview_sender: PreviewSender,
    latest: SharedFrame,
    facing: CameraFacing,
    sensor_orientation: i32,
}

impl AndroidCamera {
    pub fn new(app: slint::android::AndroidApp, preview_sender: PreviewSender, latest: SharedFrame) -> Self {
        Self {
            app,
            camera_device: null_mut(),
            capture_request: null_mut(),
            camera_output_target: null_mut(),
            session_output: null_mut(),
            capture_session_output_container: null_mut(),
            capture_session: null_mut(),
            image_reader: null_mut(),
            camera_id: None,
            image_listener: AImageReader_ImageListener {
                context: null_mut(),
                onImageAvailable: None,
            },
            capture_session_state_callbacks: unsafe { zeroed() },
            device_state_callbacks: unsafe { zeroed() },
            timer: Instant::now(),
            frame_count: 0,
            preview_sender,
            latest,
            facing: CameraFacing::Back,
            sensor_orientation: 0,
        }
    }

    /// Opens the first camera whose lens faces `facing`.
    pub fn open(&mut self, facing: CameraFacing) -> Result<()> {
        if !android::check_self_permission(&self.app, CAMERA)? {
            return Err(anyhow!("camera permission not granted"));
        }
        unsafe {
            let camera_manager = ACameraManager_create();
            let result = self.open_with(camera_manager, facing);
            ACameraManager_delete(camera_manager);
            result
        }
    }

    unsafe fn open_with(&mut self, camera_manager: *mut ACameraManager, facing: CameraFacing) -> Result<()> {
        let mut camera_id_list_raw = null_mut();
        let camera_status = ACameraManager_getCameraIdList(camera_manager, &mut camera_id_list_raw);
        if camera_status != camera_status_t::ACAMERA_OK || camera_id_list_raw.is_null() {
            return Err(anyhow!("failed to get camera id list (reason: {:?})", camera_status));
        }
        let camera_id_list = &*camera_id_list_raw;
        if camera_id_list.numCameras < 1 {
            ACameraManager_deleteCameraIdList(camera_id_list_raw);
            return Err(anyhow!("no camera device detected"));
        }
        let camera_ids = slice::from_raw_parts(camera_id_list.cameraIds, camera_id_list.numCameras as usize);

        let mut selected = None;
        for cid in camera_ids {
            let mut camera_metadata = null_mut();
            if ACameraManager_getCameraCharacteristics(camera_manager, *cid, &mut camera_metadata)
                != camera_status_t::ACAMERA_OK
            {
                continue;
            }
            let lens = AndroidCamera::lens_info(camera_metadata);
            ACameraMetadata_free(camera_metadata);
            debug!("camera {:?}: {:?}", get_cstr(*cid), lens);
            match lens {
                Some((lens_facing, orientation)) if lens_facing == facing => {
                    selected = Some((*cid, orientation));
                    break;
                }
                Some((_, orientation)) if selected.is_none() => selected = Some((*cid, orientation)),
                _ => {}
            }
        }

        let Some((selected_camera_id, sensor_orientation)) = selected else {
            ACameraManager_deleteCameraIdList(camera_id_list_raw);
            return Err(anyhow!("no usable camera found"));
        };
        let camera_id = get_cstr(selected_camera_id).unwrap_or("?").to_string();
        info!("opening camera {camera_id} for {facing:?}, sensor orientation {sensor_orientation}");

        unsafe extern "C" fn on_disconnected(_data: *mut c_void, device: *mut ACameraDevice) {
            info!("Camera(id: {:?}) is disconnected.", get_cstr(ACameraDevice_getId(device)));
        }

        unsafe extern "C" fn on_error(_data: *mut c_void, device: *mut ACameraDevice, error: c_int) {
            error!("Error(code: {}) on Camera(id: {:?}).", error, get_cstr(ACameraDevice_getId(device)));
        }

        self.device_state_callbacks.onDisconnected = Some(on_disconnected);
        self.device_state_callbacks.onError = Some(on_error);

        let camera_status = ACameraManager_openCamera(
            camera_manager,
            selected_camera_id,
            &mut self.device_state_callbacks,
            &mut self.camera_device,
        );
        ACameraManager_deleteCameraIdList(camera_id_list_raw);
        if camera_status != camera_status_t::ACAMERA_OK {
            return Err(anyhow!("failed to open camera {camera_id} (reason: {:?})", camera_status));
        }

        self.camera_id = Some(camera_id);
        self.facing = facing;
        self.sensor_orientation = sensor_orientation;
        Ok(())
    }

    /// Lens facing and sensor orientation; external lenses count as back.
    unsafe fn lens_info(camera_metadata: *mut ACameraMetadata) -> Option<(CameraFacing, i32)> {
        let mut lens_facing: ACameraMetadata_const_entry = zeroed();
        let mut sensor_orientation: ACameraMetadata_const_entry = zeroed();
        if ACameraMetadata_getConstEntry(
            camera_metadata,
            acamera_metadata_tag::ACAMERA_LENS_FACING.0,
            &mut lens_facing,
        ) != camera_status_t::ACAMERA_OK
            || lens_facing.count < 1
        {
            return None;
        }
        let orientation = if ACameraMetadata_getConstEntry(
            camera_metadata,
            acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION.0,
            &mut sensor_orientation,
        ) == camera_status_t::ACAMERA_OK
            && sensor_orientation.count > 0
        {
            *sensor_orientation.data.i32_
        } else {
            0
        };
        let facing = if *lens_facing.data.u8_ as u32
            == acamera_metadata_enum_acamera_lens_facing::ACAMERA_LENS_FACING_FRONT.0
        {
            CameraFacing::Front
        } else {
            CameraFacing::Back
        };
        Some((facing, orientation))
    }

    pub fn close(&mut self) {
        unsafe {
            if !self.capture_session.is_null() {
                ACameraCaptureSession_close(self.capture_session);
                self.capture_session = null_mut();
            }

            if !self.capture_request.is_null() {
                ACaptureRequest_free(self.capture_request);
                self.capture_request = null_mut();
            }

            if !self.camera_output_target.is_null() {
                ACameraOutputTarget_free(self.camera_output_target);
                self.camera_output_target = null_mut();
            }

            if !self.camera_device.is_null() {
                if ACameraDevice_close(self.camera_device) != camera_status_t::ACAMERA_OK {
                    error!("failed to close camera device");
                }
                self.camera_device = null_mut();
            }

            if !self.session_output.is_null() {
                ACaptureSessionOutput_free(self.session_output);
                self.session_output = null_mut();
            }

            if !self.capture_session_output_container.is_null() {
                ACaptureSessionOutputContainer_free(self.capture_session_output_container);
                self.capture_session_output_container = null_mut();
            }

            if !self.image_reader.is_null() {
                AImageReader_delete(self.image_reader);
                self.image_reader = null_mut();
            }
        }
        if self.camera_id.take().is_some() {
            info!("camera closed");
        }
    }

    pub fn start_preview(&mut self, flash: FlashMode, width: u32, height: u32) -> Result<()> {
        self.create_image_reader(width, height, AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888)?;
        unsafe {
            let camera_status = ACameraDevice_createCaptureRequest(
                self.camera_device,
                ACameraDevice_request_template::TEMPLATE_PREVIEW,
                &mut self.capture_request,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("failed to create preview request (id: {:?})", self.camera_id));
            }
            let ae_mode = ae_mode(flash);
            let camera_status = ACaptureRequest_setEntry_u8(
                self.capture_request,
                acamera_metadata_tag::ACAMERA_CONTROL_AE_MODE.0,
                1,
                &ae_mode,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                warn!("flash mode {flash:?} rejected (reason: {:?})", camera_status);
            }

            let mut native_window: *mut ANativeWindow = null_mut();
            if AImageReader_getWindow(self.image_reader, &mut native_window) != media_status_t::AMEDIA_OK {
                return Err(anyhow!("AImageReader_getWindow failed"));
            }

            ACameraOutputTarget_create(native_window, &mut self.camera_output_target);
            ACaptureRequest_addTarget(self.capture_request, self.camera_output_target);
            ACaptureSessionOutput_create(native_window, &mut self.session_output);

            let camera_status = ACaptureSessionOutputContainer_create(&mut self.capture_session_output_container);
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("failed to create session output container (reason: {:?})", camera_status));
            }

            unsafe extern "C" fn on_ready(_context: *mut c_void, session: *mut ACameraCaptureSession) {
                debug!("session ready {:?}", session);
            }

            unsafe extern "C" fn on_active(_context: *mut c_void, session: *mut ACameraCaptureSession) {
                debug!("session active {:?}", session);
            }

            unsafe extern "C" fn on_closed(_context: *mut c_void, session: *mut ACameraCaptureSession) {
                debug!("session closed {:?}", session);
            }

            self.capture_session_state_callbacks.onReady = Some(on_ready);
            self.capture_session_state_callbacks.onActive = Some(on_active);
            self.capture_session_state_callbacks.onClosed = Some(on_closed);

            ACaptureSessionOutputContainer_add(self.capture_session_output_container, self.session_output);

            let camera_status = ACameraDevice_createCaptureSession(
                self.camera_device,
                self.capture_session_output_container,
                &self.capture_session_state_callbacks,
                &mut self.capture_session,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("failed to create capture session (reason: {:?})", camera_status));
            }

            let camera_status = ACameraCaptureSession_setRepeatingRequest(
                self.capture_session,
                null_mut(),
                1,
                &mut self.capture_request,
                null_mut(),
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("failed to set repeating request (reason: {:?})", camera_status));
            }
        }
        Ok(())
    }

    fn on_image_available(&mut self) -> Result<()> {
        unsafe {
            let mut image = null_mut();
            let media_status = AImageReader_acquireLatestImage(self.image_reader, &mut image);
            if media_status != media_status_t::AMEDIA_OK {
                return Err(anyhow!("failed to acquire latest image: {:?}", media_status));
            }
            let frame = AndroidCamera::read_frame(image);
            AImage_delete(image);
            let frame = frame?.oriented(self.sensor_orientation, self.facing == CameraFacing::Front);
            publish(frame, &self.latest, &self.preview_sender)?;
        }

        self.frame_count += 1;
        if self.timer.elapsed().as_millis() > 1000 {
            debug!("preview fps: {}", self.frame_count);
            self.timer = Instant::now();
            self.frame_count = 0;
        }
        Ok(())
    }

    unsafe fn read_frame(image: *mut AImage) -> Result<Frame> {
        let (mut width, mut height) = (0, 0);
        AImage_getWidth(image, &mut width);
        AImage_getHeight(image, &mut height);

        let mut planes: [(&[u8], i32); 3] = [(&[], 0); 3];
        for (idx, plane) in planes.iter_mut().enumerate() {
            let mut data = null_mut();
            let mut len = 0;
            let mut row_stride = 0;
            if AImage_getPlaneData(image, idx as i32, &mut data, &mut len) != media_status_t::AMEDIA_OK
                || data.is_null()
            {
                return Err(anyhow!("plane {idx} unavailable"));
            }
            AImage_getPlaneRowStride(image, idx as i32, &mut row_stride);
            *plane = (slice::from_raw_parts(data, len as usize), row_stride);
        }
        let mut uv_pixel_stride = 0;
        AImage_getPlanePixelStride(image, 1, &mut uv_pixel_stride);

        let [(y, y_stride), (u, uv_stride), (v, _)] = planes;
        Ok(Frame::from_yuv420(
            width as u32,
            height as u32,
            y,
            y_stride as usize,
            u,
            v,
            uv_stride as usize,
            uv_pixel_stride as usize,
        ))
    }

    fn create_image_reader(&mut self, width: u32, height: u32, image_format: AIMAGE_FORMATS) -> Result<()> {
        unsafe {
            let res = AImageReader_new(
                width as i32,
                height as i32,
                image_format.0 as i32,
                2,
                &mut self.image_reader,
            );
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("failed to create image reader: {:?}", res));
            }

            unsafe extern "C" fn on_image_available(context: *mut c_void, _image_reader: *mut AImageReader) {
                let camera = &mut *(context as *mut AndroidCamera);
                if let Err(err) = camera.on_image_available() {
                    warn!("preview frame dropped: {err:#}");
                }
            }

            self.image_listener.context = (self as *mut AndroidCamera) as *mut c_void;
            self.image_listener.onImageAvailable = Some(on_image_available);

            let res = AImageReader_setImageListener(self.image_reader, &mut self.image_listener);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("failed to set image listener: {:?}", res));
            }
        }
        Ok(())
    }
}

impl Drop for AndroidCamera {
    fn drop(&mut self) {
        self.close();
    }
}

/// Auto-exposure mode carrying the flash setting.
fn ae_mode(flash: FlashMode) -> u8 {
    let mode = match flash {
        FlashMode::Off => acamera_metadata_enum_acamera_control_ae_mode::ACAMERA_CONTROL_AE_MODE_ON,
        FlashMode::On => {
            acamera_metadata_enum_acamera_control_ae_mode::ACAMERA_CONTROL_AE_MODE_ON_ALWAYS_FLASH
        }
        FlashMode::Auto => {
            acamera_metadata_enum_acamera_control_ae_mode::ACAMERA_CONTROL_AE_MODE_ON_AUTO_FLASH
        }
    };
    mode.0 as u8
}

unsafe fn get_cstr<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}
