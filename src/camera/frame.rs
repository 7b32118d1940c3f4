use image::{
    codecs::jpeg::JpegEncoder,
    imageops::{flip_horizontal, rotate180, rotate270, rotate90},
    DynamicImage, RgbaImage,
};

use crate::error::CaptureError;

/// One RGBA preview frame, already upright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Self {
        let mut rgba = Vec::with_capacity(bgra.len());
        for px in bgra.chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        Self { width, height, rgba }
    }

    /// Converts a YUV_420_888 image given as three planes. `uv_pixel_stride`
    /// is 2 for the interleaved (semi-planar) layout most sensors deliver.
    #[allow(clippy::too_many_arguments)]
    pub fn from_yuv420(
        width: u32,
        height: u32,
        y_plane: &[u8],
        y_row_stride: usize,
        u_plane: &[u8],
        v_plane: &[u8],
        uv_row_stride: usize,
        uv_pixel_stride: usize,
    ) -> Self {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height as usize {
            for col in 0..width as usize {
                let y = y_plane.get(row * y_row_stride + col).copied().unwrap_or(0);
                let uv_idx = (row / 2) * uv_row_stride + (col / 2) * uv_pixel_stride;
                let u = u_plane.get(uv_idx).copied().unwrap_or(128);
                let v = v_plane.get(uv_idx).copied().unwrap_or(128);
                rgba.extend_from_slice(&yuv_to_rgba(y, u, v));
            }
        }
        Self { width, height, rgba }
    }

    /// Rotates clockwise by the sensor orientation (a multiple of 90) and
    /// mirrors front-facing frames so the preview behaves like a mirror.
    pub fn oriented(self, degrees: i32, mirror: bool) -> Self {
        let Some(image) = RgbaImage::from_raw(self.width, self.height, self.rgba) else {
            return Self {
                width: 0,
                height: 0,
                rgba: vec![],
            };
        };
        let image = match degrees.rem_euclid(360) {
            90 => rotate90(&image),
            180 => rotate180(&image),
            270 => rotate270(&image),
            _ => image,
        };
        let image = if mirror { flip_horizontal(&image) } else { image };
        Self {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        }
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CaptureError> {
        let image = RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .ok_or(CaptureError::NoFrame)?;
        let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&rgb)?;
        Ok(jpeg)
    }
}

// Integer BT.601 conversion, 10 fractional bits.
fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = (y as i32 - 16).max(0) * 1192;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    let r = (y + 1634 * v).clamp(0, 262143);
    let g = (y - 833 * v - 400 * u).clamp(0, 262143);
    let b = (y + 2066 * u).clamp(0, 262143);
    [(r >> 10) as u8, (g >> 10) as u8, (b >> 10) as u8, 255]
}
