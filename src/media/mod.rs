// SPDX-License-Identifier: GPL-3.0-only

//! Media processing
//!
//! - [`conversions`]: YUV/RGBA pixel conversion and JPEG encoding
//! - [`frames`]: Latest-wins delivery of analysis frames

pub mod conversions;
pub mod frames;
