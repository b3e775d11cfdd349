// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion
//!
//! Camera hardware hands out planar YUV 4:2:0 buffers whose planes may carry
//! row padding and interleaved chroma (pixel stride 2). Everything downstream
//! of the session consumes packed BGRA, so all conversions land there, and
//! still captures that arrive as YUV are repacked to NV21 and JPEG-encoded.
//!
//! Buffers are validated against their declared layout before any pixel is
//! read: a plane shorter than its strides imply is a [`CameraError::Decoding`]
//! error, never a truncated image.

use crate::constants::JPEG_QUALITY;
use crate::errors::{CameraError, CameraResult};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

/// One plane of a planar image
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub data: Vec<u8>,
    /// Bytes between the starts of consecutive rows
    pub row_stride: usize,
    /// Bytes between consecutive samples in a row
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    #[inline]
    fn sample(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.row_stride + col * self.pixel_stride]
    }

    fn check(&self, name: &str, rows: usize, cols: usize) -> CameraResult<()> {
        if rows == 0 || cols == 0 {
            return Ok(());
        }
        if self.pixel_stride == 0 {
            return Err(CameraError::Decoding(format!("{name} plane has zero pixel stride")));
        }
        let required = (rows - 1) * self.row_stride + (cols - 1) * self.pixel_stride + 1;
        if self.data.len() < required {
            return Err(CameraError::Decoding(format!(
                "{name} plane holds {} bytes, layout needs {required} for {cols}x{rows}",
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// Planar YUV 4:2:0 image with independently strided planes
#[derive(Debug, Clone, PartialEq)]
pub struct Yuv420Image {
    pub width: u32,
    pub height: u32,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
}

impl Yuv420Image {
    /// Build an image from tightly packed I420 data (Y, then U, then V)
    pub fn from_i420(width: u32, height: u32, data: &[u8]) -> CameraResult<Self> {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let expected = w * h + 2 * cw * ch;
        if data.len() != expected {
            return Err(CameraError::Decoding(format!(
                "I420 buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        let (y, rest) = data.split_at(w * h);
        let (u, v) = rest.split_at(cw * ch);
        Ok(Self {
            width,
            height,
            y: Plane::new(y.to_vec(), w, 1),
            u: Plane::new(u.to_vec(), cw, 1),
            v: Plane::new(v.to_vec(), cw, 1),
        })
    }

    /// Verify dimensions and that every plane covers the bytes it addresses
    pub fn validate(&self) -> CameraResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::Decoding(format!(
                "invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        self.y.check("Y", h, w)?;
        self.u.check("U", ch, cw)?;
        self.v.check("V", ch, cw)?;
        Ok(())
    }
}

/// Convert planar YUV 4:2:0 to packed BGRA
///
/// Chroma for pixel (x, y) is read at (x/2, y/2) through each plane's own
/// strides. Channels are computed in floating point, truncated toward zero
/// and clamped to [0, 255]. Output is B, G, R, A with A = 255 and exactly
/// `width * height * 4` bytes.
pub fn yuv420_to_rgba(image: &Yuv420Image) -> CameraResult<Vec<u8>> {
    image.validate()?;
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = Vec::with_capacity(w * h * 4);

    for row in 0..h {
        for col in 0..w {
            let y = image.y.sample(row, col) as f32;
            let u = image.u.sample(row / 2, col / 2) as f32 - 128.0;
            let v = image.v.sample(row / 2, col / 2) as f32 - 128.0;

            let r = channel(y + 1.370705 * v);
            let g = channel(y - 0.337633 * u - 0.698001 * v);
            let b = channel(y + 1.732446 * u);

            out.extend_from_slice(&[b, g, r, 255]);
        }
    }

    Ok(out)
}

#[inline]
fn channel(value: f32) -> u8 {
    (value as i32).clamp(0, 255) as u8
}

/// Swap the red and blue channels of packed 4-byte pixels
///
/// Converts RGBA to BGRA and back.
pub fn rgba_to_bgra(bytes: &[u8]) -> CameraResult<Vec<u8>> {
    if bytes.len() % 4 != 0 {
        return Err(CameraError::Decoding(format!(
            "packed buffer length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut out = bytes.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    Ok(out)
}

/// Copy `rows` rows of `row_bytes` each out of a padded buffer
pub fn pack_rows(
    data: &[u8],
    row_bytes: usize,
    rows: usize,
    row_stride: usize,
) -> CameraResult<Vec<u8>> {
    if row_stride < row_bytes {
        return Err(CameraError::Decoding(format!(
            "row stride {row_stride} is shorter than a {row_bytes}-byte row"
        )));
    }
    if rows == 0 {
        return Ok(Vec::new());
    }
    let required = (rows - 1) * row_stride + row_bytes;
    if data.len() < required {
        return Err(CameraError::Decoding(format!(
            "buffer holds {} bytes, layout needs {required}",
            data.len()
        )));
    }
    if row_stride == row_bytes {
        return Ok(data[..required].to_vec());
    }
    let mut out = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let start = row * row_stride;
        out.extend_from_slice(&data[start..start + row_bytes]);
    }
    Ok(out)
}

/// Repack planar YUV 4:2:0 into NV21
///
/// Luma rows are packed to the image width, followed by interleaved V,U
/// pairs for every complete 2x2 block.
pub fn yuv420_to_nv21(image: &Yuv420Image) -> CameraResult<Vec<u8>> {
    image.validate()?;
    let (w, h) = (image.width as usize, image.height as usize);
    let (cw, ch) = (w / 2, h / 2);
    let mut out = Vec::with_capacity(w * h + 2 * cw * ch);

    for row in 0..h {
        let start = row * image.y.row_stride;
        if image.y.pixel_stride == 1 {
            out.extend_from_slice(&image.y.data[start..start + w]);
        } else {
            out.extend((0..w).map(|col| image.y.sample(row, col)));
        }
    }

    for row in 0..ch {
        for col in 0..cw {
            out.push(image.v.sample(row, col));
            out.push(image.u.sample(row, col));
        }
    }

    Ok(out)
}

/// Encode a planar YUV 4:2:0 image as JPEG at the fixed still quality
pub fn image_to_jpeg(image: &Yuv420Image) -> CameraResult<Vec<u8>> {
    let nv21 = yuv420_to_nv21(image)?;
    let rgb = nv21_to_rgb(&nv21, image.width as usize, image.height as usize);

    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
        encoder
            .encode(&rgb, image.width, image.height, ExtendedColorType::Rgb8)
            .map_err(|e| CameraError::CaptureFailed(format!("JPEG encoding failed: {e}")))?;
    }

    Ok(jpeg)
}

// Odd trailing rows and columns have no chroma pair in NV21 and reuse the
// nearest block; a single-row or single-column image is treated as grey.
fn nv21_to_rgb(nv21: &[u8], w: usize, h: usize) -> Vec<u8> {
    let (cw, ch) = (w / 2, h / 2);
    let chroma = &nv21[w * h..];
    let mut rgb = Vec::with_capacity(w * h * 3);

    for row in 0..h {
        for col in 0..w {
            let y = nv21[row * w + col] as f32;
            let (u, v) = if cw == 0 || ch == 0 {
                (0.0, 0.0)
            } else {
                let idx = ((row / 2).min(ch - 1) * cw + (col / 2).min(cw - 1)) * 2;
                (chroma[idx + 1] as f32 - 128.0, chroma[idx] as f32 - 128.0)
            };
            rgb.push(channel(y + 1.370705 * v));
            rgb.push(channel(y - 0.337633 * u - 0.698001 * v));
            rgb.push(channel(y + 1.732446 * u));
        }
    }

    rgb
}
