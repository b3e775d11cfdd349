// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera backends

use crate::media::conversions::Yuv420Image;
use crate::media::frames::FrameSink;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Kind of media access guarded by authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "Camera"),
            MediaKind::Audio => write!(f, "Microphone"),
        }
    }
}

/// Authorization status reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Authorized,
    /// The user has not been asked yet
    NotDetermined,
    Denied,
}

/// Physical position of a camera unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LensPosition {
    Front,
    Back,
    External,
    Unspecified,
}

impl std::fmt::Display for LensPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensPosition::Front => write!(f, "front"),
            LensPosition::Back => write!(f, "back"),
            LensPosition::External => write!(f, "external"),
            LensPosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Device type as declared by the OS camera framework
///
/// Only some platforms declare one. When absent, the lens category is
/// derived from focal length and sensor width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredDeviceType {
    WideAngle,
    UltraWide,
    Telephoto,
    TrueDepth,
    Dual,
    DualWide,
    Triple,
    Continuity,
    /// Declared, but not one of the known types
    Other,
}

/// A camera unit as enumerated by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct CameraUnit {
    pub id: String,
    pub name: String,
    pub position: LensPosition,
    pub declared_type: Option<DeclaredDeviceType>,
    /// Available focal lengths in millimetres
    pub focal_lengths: Vec<f64>,
    /// Physical sensor width in millimetres
    pub sensor_width_mm: Option<f64>,
    pub supports_focus: bool,
}

impl CameraUnit {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: LensPosition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            declared_type: None,
            focal_lengths: Vec::new(),
            sensor_width_mm: None,
            supports_focus: false,
        }
    }

    pub fn with_optics(mut self, focal_lengths: &[f64], sensor_width_mm: f64) -> Self {
        self.focal_lengths = focal_lengths.to_vec();
        self.sensor_width_mm = Some(sensor_width_mm);
        self
    }

    pub fn with_declared_type(mut self, declared: DeclaredDeviceType) -> Self {
        self.declared_type = Some(declared);
        self
    }

    pub fn with_focus(mut self, supports_focus: bool) -> Self {
        self.supports_focus = supports_focus;
        self
    }

    /// Shortest focal length, used for field-of-view classification
    pub fn min_focal_length(&self) -> Option<f64> {
        self.focal_lengths
            .iter()
            .copied()
            .filter(|f| *f > 0.0)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Integral frame-rate range with `min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FpsRange {
    pub min: u32,
    pub max: u32,
}

impl std::fmt::Display for FpsRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}fps", self.min, self.max)
    }
}

/// Flash behaviour for a single still capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlashMode {
    #[default]
    Auto,
    On,
    Off,
}

impl FlashMode {
    /// Lenient parse: anything other than "on" or "off" means auto
    pub fn from_arg(value: Option<&str>) -> Self {
        match value {
            Some("on") => FlashMode::On,
            Some("off") => FlashMode::Off,
            _ => FlashMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusMode {
    #[default]
    Auto,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExposureMode {
    #[default]
    Auto,
    Locked,
}

macro_rules! impl_mode_strings {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $ty::Auto => "auto",
                    $ty::Locked => "locked",
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    "auto" => Ok($ty::Auto),
                    "locked" => Ok($ty::Locked),
                    other => Err(format!("unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }
    };
}

impl_mode_strings!(FocusMode);
impl_mode_strings!(ExposureMode);

/// White balance setting
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WhiteBalance {
    #[default]
    ContinuousAuto,
    Locked {
        temperature: f32,
        tint: f32,
    },
}

/// Point in normalized [0,1] preview coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// Build a point with both coordinates clamped to [0,1]
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }
}

/// Exposure compensation range of the bound unit, in index units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureCompensation {
    pub index: i32,
    pub min_index: i32,
    pub max_index: i32,
    /// EV per index step
    pub step: f64,
}

/// Controls supported by the bound unit
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilities {
    pub supports_point_focus: bool,
    pub supports_lens_position: bool,
    pub has_torch: bool,
    pub supports_custom_exposure: bool,
    pub exposure_duration_range_micros: (u64, u64),
    pub iso_range: (f32, f32),
    pub max_zoom: f64,
    pub exposure_compensation: Option<ExposureCompensation>,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            supports_point_focus: false,
            supports_lens_position: false,
            has_torch: false,
            supports_custom_exposure: false,
            exposure_duration_range_micros: (0, 0),
            iso_range: (0.0, 0.0),
            max_zoom: 1.0,
            exposure_compensation: None,
        }
    }
}

/// Transient manual exposure for a single capture
///
/// A `None` field keeps the unit's current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomExposure {
    pub duration_micros: Option<u64>,
    pub iso: Option<f32>,
}

/// Settings for one still capture
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StillSettings {
    pub flash: FlashMode,
}

/// A focus request as sent to the hardware
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusRequest {
    pub point: Option<NormalizedPoint>,
    pub lens_position: Option<f32>,
}

/// Still image produced by a capture
#[derive(Debug, Clone)]
pub enum StillImage {
    /// Already JPEG-encoded by the hardware
    Jpeg(Vec<u8>),
    /// Raw planar frame, encoded by the session
    Yuv420(Yuv420Image),
}

/// Frame delivered by the analysis output
#[derive(Debug, Clone)]
pub enum AnalysisImage {
    Yuv420(Yuv420Image),
    Rgba8888 {
        data: Vec<u8>,
        width: u32,
        height: u32,
        row_stride: usize,
    },
    Bgra8888 {
        data: Vec<u8>,
        width: u32,
        height: u32,
        row_stride: usize,
    },
}

/// Backpressure policy for the analysis output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Frames arriving while one is processed replace the pending one
    KeepOnlyLatest,
}

/// Analysis output configuration
#[derive(Clone)]
pub struct AnalysisOutput {
    pub backpressure: Backpressure,
    pub sink: FrameSink,
}

impl std::fmt::Debug for AnalysisOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOutput")
            .field("backpressure", &self.backpressure)
            .finish_non_exhaustive()
    }
}

/// Outputs attached together with the lens
#[derive(Debug, Clone)]
pub struct OutputSet {
    pub preview: bool,
    pub still: bool,
    pub analysis: Option<AnalysisOutput>,
}

/// Complete pipeline description attached as one unit
#[derive(Debug, Clone)]
pub struct BindPlan {
    pub lens_id: String,
    /// `None` lets the hardware pick its native size
    pub target_size: Option<Resolution>,
    pub frame_rate: Option<FpsRange>,
    pub outputs: OutputSet,
}

/// Video recording request
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRequest {
    pub path: PathBuf,
    pub audio: bool,
}

/// Asynchronous notification from the hardware
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    /// The capture pipeline started delivering
    Running,
    /// The pipeline was closed by the system
    Closed,
    Error { code: String, message: String },
    /// Device rotation in degrees
    OrientationChanged(i32),
}

/// Sender handed to a backend for hardware notifications
pub type HardwareEventSender = tokio::sync::mpsc::UnboundedSender<HardwareEvent>;

/// Pending result of a callback-style backend operation
pub type Completion<T> = futures::channel::oneshot::Receiver<BackendResult<T>>;

/// Result type alias using BackendError
pub type BackendResult<T> = Result<T, BackendError>;

/// Error reported by a camera backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("{0} access not authorized")]
    NotAuthorized(MediaKind),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Attach failed: {0}")]
    AttachFailed(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("No lens attached")]
    NotAttached,

    #[error("Recording already in progress")]
    RecordingInProgress,

    #[error("No recording in progress")]
    NoRecordingInProgress,

    #[error("IO error: {0}")]
    IoError(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
