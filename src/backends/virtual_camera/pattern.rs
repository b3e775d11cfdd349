// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic YUV test pattern

use crate::media::conversions::{Plane, Yuv420Image};

// (U, V) pairs for eight vertical color bars
const BARS: [(u8, u8); 8] = [
    (128, 128),
    (16, 146),
    (166, 16),
    (54, 34),
    (202, 222),
    (90, 240),
    (240, 110),
    (128, 128),
];

/// Color bars with a luma ramp that scrolls one step per frame
///
/// The chroma planes are emitted semi-planar (pixel stride 2) with padded
/// rows, matching the layout most mobile camera stacks deliver.
pub fn color_bars(width: u32, height: u32, frame: u64) -> Yuv420Image {
    let (w, h) = (width.max(1) as usize, height.max(1) as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let shift = (frame % 256) as usize;

    let y_stride = w;
    let mut y = Vec::with_capacity(y_stride * h);
    for row in 0..h {
        for col in 0..w {
            y.push(((row + col + shift) % 220 + 16) as u8);
        }
    }

    // Interleaved U,V with one padding byte per row
    let c_stride = cw * 2 + 1;
    let mut uv = vec![0u8; c_stride * ch];
    for row in 0..ch {
        for col in 0..cw {
            let (u, v) = BARS[(col * BARS.len()) / cw];
            uv[row * c_stride + col * 2] = u;
            uv[row * c_stride + col * 2 + 1] = v;
        }
    }
    let v_plane = uv[1..].to_vec();

    Yuv420Image {
        width: w as u32,
        height: h as u32,
        y: Plane::new(y, y_stride, 1),
        u: Plane::new(uv, c_stride, 2),
        v: Plane::new(v_plane, c_stride, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_layout_is_valid() {
        for (w, h) in [(1, 1), (3, 5), (160, 120)] {
            assert!(color_bars(w, h, 7).validate().is_ok());
        }
    }

    #[test]
    fn test_pattern_scrolls() {
        assert_ne!(color_bars(8, 8, 0).y.data, color_bars(8, 8, 1).y.data);
    }
}
