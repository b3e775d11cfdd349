// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants

use crate::backends::camera::types::Resolution;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Capture resolution presets
///
/// Each preset maps to a target size the hardware tries to match; `Max`
/// leaves the size unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionPreset {
    /// 640x480
    Low,
    /// 1280x720
    Medium,
    /// 1920x1080 (default)
    #[default]
    High,
    /// 2560x1440
    VeryHigh,
    /// 3840x2160
    UltraHigh,
    /// Native sensor size
    Max,
}

impl ResolutionPreset {
    /// All presets, lowest first
    pub const ALL: [ResolutionPreset; 6] = [
        ResolutionPreset::Low,
        ResolutionPreset::Medium,
        ResolutionPreset::High,
        ResolutionPreset::VeryHigh,
        ResolutionPreset::UltraHigh,
        ResolutionPreset::Max,
    ];

    /// Target capture size, `None` for unconstrained
    pub fn target_size(&self) -> Option<Resolution> {
        match self {
            ResolutionPreset::Low => Some(Resolution::new(640, 480)),
            ResolutionPreset::Medium => Some(Resolution::new(1280, 720)),
            ResolutionPreset::High => Some(Resolution::new(1920, 1080)),
            ResolutionPreset::VeryHigh => Some(Resolution::new(2560, 1440)),
            ResolutionPreset::UltraHigh => Some(Resolution::new(3840, 2160)),
            ResolutionPreset::Max => None,
        }
    }

    /// Wire name as used in command arguments
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPreset::Low => "low",
            ResolutionPreset::Medium => "medium",
            ResolutionPreset::High => "high",
            ResolutionPreset::VeryHigh => "veryHigh",
            ResolutionPreset::UltraHigh => "ultraHigh",
            ResolutionPreset::Max => "max",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ResolutionPreset::Low => "SD",
            ResolutionPreset::Medium => "720p",
            ResolutionPreset::High => "HD",
            ResolutionPreset::VeryHigh => "2K",
            ResolutionPreset::UltraHigh => "4K",
            ResolutionPreset::Max => "Max",
        }
    }
}

impl FromStr for ResolutionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown resolution preset '{s}'"))
    }
}

impl std::fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JPEG quality for stills encoded from YUV
pub const JPEG_QUALITY: u8 = 95;

/// Format tag carried by every delivered frame
pub const FRAME_FORMAT_BGRA8888: &str = "bgra8888";

/// Lens classification thresholds (horizontal field of view, degrees)
pub mod lens {
    /// Wider than this is ultra-wide
    pub const ULTRA_WIDE_MIN_FOV: f64 = 75.0;

    /// Narrower than this is telephoto
    pub const TELEPHOTO_MAX_FOV: f64 = 40.0;
}

/// Defaults for device controls when nothing is bound
pub mod controls {
    /// EV per exposure compensation index step
    pub const DEFAULT_EXPOSURE_OFFSET_STEP: f64 = 0.1;

    pub const DEFAULT_WHITE_BALANCE_TEMPERATURE: f32 = 5000.0;

    pub const DEFAULT_WHITE_BALANCE_TINT: f32 = 0.0;

    pub const MIN_ZOOM: f64 = 1.0;

    /// Center of the preview, used when an exposure point is omitted
    pub const DEFAULT_EXPOSURE_POINT: f64 = 0.5;
}

/// Session thread and event plumbing
pub mod session {
    /// Name of the dedicated session thread
    pub const THREAD_NAME: &str = "camera-session";

    /// Buffered events per broadcast stream before slow receivers lag
    pub const DEFAULT_EVENT_CAPACITY: usize = 64;
}

/// Recording file naming
pub mod recording {
    pub const FILE_PREFIX: &str = "iris_camera";

    pub const FILE_EXTENSION: &str = "mp4";

    /// chrono format for the timestamp part of default file names
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
}

/// Synthetic backend pacing
pub mod virtual_camera {
    use std::time::Duration;

    /// Frame interval when no frame rate is bound
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// Size of delivered analysis frames
    pub const ANALYSIS_WIDTH: u32 = 160;
    pub const ANALYSIS_HEIGHT: u32 = 120;

    /// Size of synthetic stills
    pub const STILL_WIDTH: u32 = 320;
    pub const STILL_HEIGHT: u32 = 240;
}

/// Application information utilities
pub mod app_info {
    /// Version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
