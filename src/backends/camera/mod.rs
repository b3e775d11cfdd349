// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! Each OS camera framework is wrapped by one implementation of
//! [`CameraBackend`]. The session thread is the only caller, so backends
//! need `Send` but not `Sync`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CameraSession      │  ← request handle, any thread
//! └──────────┬──────────┘
//!            │ mpsc
//!            ▼
//! ┌─────────────────────┐
//! │  session worker     │  ← "camera-session" thread
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!   CameraX / AVFoundation / Virtual
//! ```
//!
//! Operations that complete through a platform callback return a
//! [`Completion`]; the session awaits it off-thread and posts the outcome
//! back to its own queue.

pub mod frame_loop;
pub mod types;

pub use types::*;

use std::path::PathBuf;

/// Identifies a backend implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraBackendType {
    CameraX,
    AvFoundation,
    Virtual,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::CameraX => write!(f, "CameraX"),
            CameraBackendType::AvFoundation => write!(f, "AVFoundation"),
            CameraBackendType::Virtual => write!(f, "Virtual"),
        }
    }
}

/// Hardware capability interface implemented per platform
pub trait CameraBackend: Send {
    // ===== Enumeration =====

    /// Enumerate camera units currently present
    ///
    /// Called on every catalog query; implementations must not cache across
    /// hardware changes.
    fn enumerate_units(&self) -> BackendResult<Vec<CameraUnit>>;

    // ===== Lifecycle =====

    /// Register the sender used for asynchronous hardware notifications
    fn connect_events(&mut self, sender: HardwareEventSender);

    /// Attach a lens together with its outputs as one unit
    ///
    /// On error nothing is left attached.
    fn attach(&mut self, plan: &BindPlan) -> BackendResult<()>;

    /// Detach every input and output
    fn detach_all(&mut self) -> BackendResult<()>;

    /// Id of the currently attached lens
    fn attached_lens(&self) -> Option<String>;

    fn start_running(&mut self) -> BackendResult<()>;

    fn stop_running(&mut self) -> BackendResult<()>;

    fn is_running(&self) -> bool;

    /// Capabilities of the attached unit, `None` when nothing is attached
    fn capabilities(&self) -> Option<DeviceCapabilities>;

    // ===== Controls =====

    fn set_focus_mode(&mut self, mode: FocusMode) -> BackendResult<()>;

    fn set_exposure_mode(&mut self, mode: ExposureMode) -> BackendResult<()>;

    /// Start a focus operation; the completion reports whether focus locked
    fn focus(&mut self, request: FocusRequest) -> BackendResult<Completion<bool>>;

    fn set_exposure_point(&mut self, point: NormalizedPoint) -> BackendResult<()>;

    fn set_exposure_compensation_index(&mut self, index: i32) -> BackendResult<()>;

    fn set_zoom_ratio(&mut self, ratio: f64) -> BackendResult<()>;

    fn set_torch(&mut self, enabled: bool) -> BackendResult<()>;

    fn set_white_balance(&mut self, white_balance: WhiteBalance) -> BackendResult<()>;

    /// Lock a manual exposure (values already clamped to the device range)
    fn lock_custom_exposure(&mut self, exposure: CustomExposure) -> BackendResult<()>;

    /// Return to continuous automatic exposure
    fn restore_auto_exposure(&mut self) -> BackendResult<()>;

    // ===== Capture =====

    fn capture_still(&mut self, settings: StillSettings) -> BackendResult<Completion<StillImage>>;

    fn start_recording(&mut self, request: &RecordingRequest) -> BackendResult<()>;

    /// Stop recording; the completion resolves once the file is finalized
    fn stop_recording(&mut self) -> BackendResult<Completion<PathBuf>>;

    // ===== Metadata =====

    fn backend_type(&self) -> CameraBackendType;

    /// Human-readable platform version, e.g. "Android 14"
    fn platform_version(&self) -> String;
}

/// Camera and microphone authorization provider
///
/// Prompts are platform UI and live outside this crate; the session only
/// queries status and awaits the outcome of a request.
pub trait Authorization: Send + Sync {
    fn status(&self, media: MediaKind) -> AuthorizationStatus;

    /// Ask the user for access; resolves to whether access was granted
    fn request_access(&self, media: MediaKind) -> futures::channel::oneshot::Receiver<bool>;
}
