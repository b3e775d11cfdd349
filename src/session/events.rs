// SPDX-License-Identifier: GPL-3.0-only

//! Push streams published by a session
//!
//! Four independent streams leave the session: image frames (latest-wins
//! `watch`, see [`crate::media::frames`]) and lifecycle, orientation and
//! focus/exposure events (`broadcast`). Sending never blocks the session
//! thread; events emitted while nobody listens are discarded, and a
//! receiver that falls more than the channel capacity behind observes a
//! lag error from tokio.

use crate::errors::CameraError;
use crate::media::frames::{FrameSink, FrameStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Published lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Initialized,
    Running,
    Paused,
    Disposed,
    /// Informational only; the session keeps its previous state
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LifecycleEvent {
    pub fn state(state: LifecycleState) -> Self {
        Self {
            state,
            error_code: None,
            error_message: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: LifecycleState::Error,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusExposureState {
    Focusing,
    FocusLocked,
    FocusFailed,
    ExposureSearching,
    ExposureLocked,
    ExposureFailed,
    CombinedLocked,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusExposureEvent {
    pub state: FocusExposureState,
}

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceOrientation {
    PortraitUp,
    PortraitDown,
    LandscapeLeft,
    LandscapeRight,
    Unknown,
}

impl DeviceOrientation {
    /// Classify a rotation angle reported by the orientation sensor
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees {
            45..=134 => DeviceOrientation::LandscapeRight,
            135..=224 => DeviceOrientation::PortraitDown,
            225..=314 => DeviceOrientation::LandscapeLeft,
            315..=360 | 0..=44 => DeviceOrientation::PortraitUp,
            _ => DeviceOrientation::Unknown,
        }
    }
}

/// Orientation of the recorded video relative to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    Unknown,
}

impl From<DeviceOrientation> for VideoOrientation {
    // Landscape is mirrored between device and capture-connection conventions
    fn from(device: DeviceOrientation) -> Self {
        match device {
            DeviceOrientation::PortraitUp => VideoOrientation::Portrait,
            DeviceOrientation::PortraitDown => VideoOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeLeft => VideoOrientation::LandscapeRight,
            DeviceOrientation::LandscapeRight => VideoOrientation::LandscapeLeft,
            DeviceOrientation::Unknown => VideoOrientation::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrientationEvent {
    pub device_orientation: DeviceOrientation,
    pub video_orientation: VideoOrientation,
}

impl OrientationEvent {
    pub fn from_degrees(degrees: i32) -> Self {
        let device_orientation = DeviceOrientation::from_degrees(degrees);
        Self {
            device_orientation,
            video_orientation: device_orientation.into(),
        }
    }
}

/// Fan-out point for everything a session publishes
#[derive(Clone)]
pub struct EventHub {
    lifecycle: broadcast::Sender<LifecycleEvent>,
    orientation: broadcast::Sender<OrientationEvent>,
    focus_exposure: broadcast::Sender<FocusExposureEvent>,
    frames: FrameSink,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (lifecycle, _) = broadcast::channel(capacity);
        let (orientation, _) = broadcast::channel(capacity);
        let (focus_exposure, _) = broadcast::channel(capacity);
        Self {
            lifecycle,
            orientation,
            focus_exposure,
            frames: FrameSink::new(),
        }
    }

    pub fn frames(&self) -> &FrameSink {
        &self.frames
    }

    pub fn subscribe_frames(&self) -> FrameStream {
        self.frames.subscribe()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    pub fn subscribe_orientation(&self) -> broadcast::Receiver<OrientationEvent> {
        self.orientation.subscribe()
    }

    pub fn subscribe_focus_exposure(&self) -> broadcast::Receiver<FocusExposureEvent> {
        self.focus_exposure.subscribe()
    }

    pub fn emit_state(&self, state: LifecycleState) {
        debug!(?state, "Lifecycle event");
        let _ = self.lifecycle.send(LifecycleEvent::state(state));
    }

    /// Broadcast an error without touching session state
    pub fn emit_error(&self, error: &CameraError) {
        debug!(code = error.code(), error = %error, "Lifecycle error event");
        let _ = self
            .lifecycle
            .send(LifecycleEvent::error(error.code(), error.to_string()));
    }

    /// Broadcast a platform-reported error
    pub fn emit_hardware_error(&self, code: &str, message: &str) {
        let _ = self.lifecycle.send(LifecycleEvent::error(code, message));
    }

    pub fn emit_orientation(&self, event: OrientationEvent) {
        let _ = self.orientation.send(event);
    }

    pub fn emit_focus_exposure(&self, state: FocusExposureState) {
        let _ = self.focus_exposure.send(FocusExposureEvent { state });
    }
}
