// SPDX-License-Identifier: GPL-3.0-only

//! Method-name command surface
//!
//! Hosts that talk to the session through a message channel send a method
//! name and a JSON argument bag. [`dispatch`] decodes the arguments, runs the
//! matching [`CameraSession`] operation and encodes the result.
//!
//! Argument keys are camelCase. A `null` argument bag is treated as `{}`.

use crate::backends::camera::types::{ExposureMode, FlashMode, FocusMode};
use crate::constants::ResolutionPreset;
use crate::constants::controls::DEFAULT_EXPOSURE_POINT;
use crate::errors::{CameraError, CameraResult};
use crate::session::CameraSession;
use crate::session::binder::FrameRateRange;
use crate::session::capture::{FocusTarget, PhotoRequest};
use crate::session::catalog::LensCategory;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Every method name [`dispatch`] understands
pub const METHODS: &[&str] = &[
    "listAvailableLenses",
    "switchLens",
    "takePhoto",
    "startVideoRecording",
    "stopVideoRecording",
    "setFocus",
    "setZoom",
    "setTorch",
    "setResolutionPreset",
    "setFrameRateRange",
    "setFocusMode",
    "getFocusMode",
    "setExposureMode",
    "getExposureMode",
    "setExposurePoint",
    "setExposureOffset",
    "getExposureOffset",
    "getExposureOffsetStepSize",
    "getMinExposureOffset",
    "getMaxExposureOffset",
    "setWhiteBalance",
    "startImageStream",
    "stopImageStream",
    "initialize",
    "pauseSession",
    "resumeSession",
    "disposeSession",
    "getPlatformVersion",
];

/// Result of a dispatched method
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Null,
    Value(Value),
    /// Raw bytes (encoded photos)
    Bytes(Vec<u8>),
}

impl MethodResult {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            MethodResult::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<()> for MethodResult {
    fn from(_: ()) -> Self {
        MethodResult::Null
    }
}

// ===== Argument bags =====

fn default_true() -> bool {
    true
}

fn default_zoom() -> f64 {
    1.0
}

fn default_center() -> f64 {
    DEFAULT_EXPOSURE_POINT
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListLensesArgs {
    #[serde(default = "default_true")]
    include_front: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchLensArgs {
    category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakePhotoArgs {
    flash_mode: Option<String>,
    exposure_duration_micros: Option<u64>,
    iso: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRecordingArgs {
    file_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    enable_audio: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetFocusArgs {
    x: Option<f64>,
    y: Option<f64>,
    lens_position: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetZoomArgs {
    #[serde(default = "default_zoom")]
    zoom_factor: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SetTorchArgs {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct SetPresetArgs {
    preset: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetFrameRateArgs {
    min_fps: Option<f64>,
    max_fps: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ModeArgs {
    mode: String,
}

#[derive(Debug, Deserialize)]
struct ExposurePointArgs {
    #[serde(default = "default_center")]
    x: f64,
    #[serde(default = "default_center")]
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExposureOffsetArgs {
    offset: f64,
}

#[derive(Debug, Deserialize)]
struct WhiteBalanceArgs {
    temperature: Option<f32>,
    tint: Option<f32>,
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> CameraResult<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(CameraError::from)
}

fn parse_str<T: FromStr<Err = String>>(value: &str) -> CameraResult<T> {
    value.parse().map_err(CameraError::InvalidArguments)
}

fn to_value<T: serde::Serialize>(value: T) -> CameraResult<MethodResult> {
    serde_json::to_value(value)
        .map(MethodResult::Value)
        .map_err(CameraError::from)
}

/// Run `method` against `session`
pub async fn dispatch(
    session: &CameraSession,
    method: &str,
    arguments: &Value,
) -> CameraResult<MethodResult> {
    debug!(method, "Dispatching");
    match method {
        "listAvailableLenses" => {
            let args: ListLensesArgs = parse_args(arguments)?;
            to_value(session.list_lenses(args.include_front).await?)
        }
        "switchLens" => {
            let args: SwitchLensArgs = parse_args(arguments)?;
            let category: LensCategory = parse_str(&args.category)?;
            to_value(session.switch_lens(category).await?)
        }
        "takePhoto" => {
            let args: TakePhotoArgs = parse_args(arguments)?;
            let request = PhotoRequest {
                flash: FlashMode::from_arg(args.flash_mode.as_deref()),
                exposure_duration_micros: args.exposure_duration_micros,
                iso: args.iso,
            };
            session.take_photo(request).await.map(MethodResult::Bytes)
        }
        "startVideoRecording" => {
            let args: StartRecordingArgs = parse_args(arguments)?;
            let path = session
                .start_video_recording(args.file_path, args.enable_audio)
                .await?;
            to_value(path.to_string_lossy())
        }
        "stopVideoRecording" => {
            let path = session.stop_video_recording().await?;
            to_value(path.to_string_lossy())
        }
        "setFocus" => {
            let args: SetFocusArgs = parse_args(arguments)?;
            let point = match (args.x, args.y) {
                (Some(x), Some(y)) => Some((x, y)),
                (None, None) => None,
                _ => {
                    return Err(CameraError::InvalidArguments(
                        "setFocus needs both x and y".into(),
                    ));
                }
            };
            let target = FocusTarget {
                point,
                lens_position: args.lens_position,
            };
            session.set_focus(target).await.map(MethodResult::from)
        }
        "setZoom" => {
            let args: SetZoomArgs = parse_args(arguments)?;
            session.set_zoom(args.zoom_factor).await.map(MethodResult::from)
        }
        "setTorch" => {
            let args: SetTorchArgs = parse_args(arguments)?;
            session.set_torch(args.enabled).await.map(MethodResult::from)
        }
        "setResolutionPreset" => {
            let args: SetPresetArgs = parse_args(arguments)?;
            let preset = match args.preset.as_deref() {
                Some(name) => parse_str(name)?,
                None => ResolutionPreset::default(),
            };
            session
                .set_resolution_preset(preset)
                .await
                .map(MethodResult::from)
        }
        "setFrameRateRange" => {
            let args: SetFrameRateArgs = parse_args(arguments)?;
            let range = FrameRateRange::new(args.min_fps, args.max_fps);
            session
                .set_frame_rate_range(range)
                .await
                .map(MethodResult::from)
        }
        "setFocusMode" => {
            let args: ModeArgs = parse_args(arguments)?;
            let mode: FocusMode = parse_str(&args.mode)?;
            session.set_focus_mode(mode).await.map(MethodResult::from)
        }
        "getFocusMode" => to_value(session.focus_mode().await?.as_str()),
        "setExposureMode" => {
            let args: ModeArgs = parse_args(arguments)?;
            let mode: ExposureMode = parse_str(&args.mode)?;
            session.set_exposure_mode(mode).await.map(MethodResult::from)
        }
        "getExposureMode" => to_value(session.exposure_mode().await?.as_str()),
        "setExposurePoint" => {
            let args: ExposurePointArgs = parse_args(arguments)?;
            session
                .set_exposure_point(args.x, args.y)
                .await
                .map(MethodResult::from)
        }
        "setExposureOffset" => {
            let args: ExposureOffsetArgs = parse_args(arguments)?;
            to_value(session.set_exposure_offset(args.offset).await?)
        }
        "getExposureOffset" => to_value(session.exposure_offset().await?),
        "getExposureOffsetStepSize" => to_value(session.exposure_offset_step().await?),
        "getMinExposureOffset" => to_value(session.min_exposure_offset().await?),
        "getMaxExposureOffset" => to_value(session.max_exposure_offset().await?),
        "setWhiteBalance" => {
            let args: WhiteBalanceArgs = parse_args(arguments)?;
            session
                .set_white_balance(args.temperature, args.tint)
                .await
                .map(MethodResult::from)
        }
        "startImageStream" => session.start_image_stream().await.map(MethodResult::from),
        "stopImageStream" => session.stop_image_stream().await.map(MethodResult::from),
        "initialize" => session.initialize().await.map(MethodResult::from),
        "pauseSession" => session.pause().await.map(MethodResult::from),
        "resumeSession" => session.resume().await.map(MethodResult::from),
        "disposeSession" => session.dispose().await.map(MethodResult::from),
        "getPlatformVersion" => to_value(session.platform_version().await?),
        other => Err(CameraError::NotImplemented(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_arguments_use_defaults() {
        let args: ListLensesArgs = parse_args(&Value::Null).unwrap();
        assert!(args.include_front);

        let args: SetZoomArgs = parse_args(&json!({})).unwrap();
        assert_eq!(args.zoom_factor, 1.0);

        let args: ExposurePointArgs = parse_args(&json!({ "x": 0.25 })).unwrap();
        assert_eq!((args.x, args.y), (0.25, 0.5));
    }

    #[test]
    fn test_wrong_types_are_invalid_arguments() {
        let err = parse_args::<SetTorchArgs>(&json!({ "enabled": "yes" })).unwrap_err();
        assert_eq!(err.code(), "invalid_arguments");

        let err = parse_args::<SwitchLensArgs>(&json!({})).unwrap_err();
        assert_eq!(err.code(), "invalid_arguments");
    }

    #[test]
    fn test_unknown_enum_strings() {
        assert!(parse_str::<LensCategory>("fisheye").is_err());
        assert!(parse_str::<ResolutionPreset>("huge").is_err());
        assert_eq!(parse_str::<FocusMode>("locked").unwrap(), FocusMode::Locked);
    }

    #[test]
    fn test_method_list_has_no_duplicates() {
        let mut names = METHODS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), METHODS.len());
    }
}
