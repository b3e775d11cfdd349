// SPDX-License-Identifier: GPL-3.0-only

//! Error types surfaced by camera sessions
//!
//! Every request made through [`crate::session::CameraSession`] resolves to a
//! [`CameraResult`]. Each variant carries a stable machine-readable code (see
//! [`CameraError::code`]) so the application layer can branch on failures
//! without parsing messages.

use crate::backends::camera::types::{BackendError, MediaKind};
use thiserror::Error;

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;

/// Typed failure returned on the originating request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CameraError {
    /// Malformed request payload
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Camera or microphone access has not been granted
    #[error("{0} access has not been granted")]
    PermissionDenied(MediaKind),

    /// No unit matches the requested lens category
    #[error("No camera lens found for category {0}")]
    LensNotFound(String),

    /// The operation needs a bound lens and none is bound
    #[error("No active camera session is available")]
    NotConfigured,

    /// The session is disposed or its worker is gone
    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    /// Hardware rejected attach or detach
    #[error("Configuration failed: {0}")]
    ConfigurationFailed(String),

    /// Photo or video capture error, or an empty result
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NoActiveRecording,

    /// Capability absent on this hardware
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Enumeration or hardware access error
    #[error("Camera access failed: {0}")]
    AccessFailed(String),

    /// Pixel buffer does not match its declared layout
    #[error("Decoding failed: {0}")]
    Decoding(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown command name
    #[error("Method not implemented: {0}")]
    NotImplemented(String),
}

impl CameraError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            CameraError::InvalidArguments(_) => "invalid_arguments",
            CameraError::PermissionDenied(MediaKind::Video) => "camera_permission_denied",
            CameraError::PermissionDenied(MediaKind::Audio) => "audio_permission_denied",
            CameraError::LensNotFound(_) => "lens_not_found",
            CameraError::NotConfigured => "session_not_configured",
            CameraError::SessionNotReady(_) => "session_not_ready",
            CameraError::ConfigurationFailed(_) => "configuration_failed",
            CameraError::CaptureFailed(_) => "photo_capture_failed",
            CameraError::AlreadyRecording => "already_recording",
            CameraError::NoActiveRecording => "no_active_recording",
            CameraError::NotSupported(_) => "not_supported",
            CameraError::AccessFailed(_) => "access_failed",
            CameraError::Decoding(_) => "decoding_failed",
            CameraError::Config(_) => "config_error",
            CameraError::NotImplemented(_) => "not_implemented",
        }
    }
}

// Context-free mapping; call sites with more context (attach, capture)
// map explicitly instead.
impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotAuthorized(kind) => CameraError::PermissionDenied(kind),
            BackendError::AccessDenied(msg) | BackendError::NotAvailable(msg) => {
                CameraError::AccessFailed(msg)
            }
            BackendError::DeviceNotFound(msg) => CameraError::LensNotFound(msg),
            BackendError::AttachFailed(msg) => CameraError::ConfigurationFailed(msg),
            BackendError::NotSupported(msg) => CameraError::NotSupported(msg),
            BackendError::CaptureFailed(msg) => CameraError::CaptureFailed(msg),
            BackendError::NotAttached => CameraError::NotConfigured,
            BackendError::RecordingInProgress => CameraError::AlreadyRecording,
            BackendError::NoRecordingInProgress => CameraError::NoActiveRecording,
            BackendError::IoError(msg) => CameraError::AccessFailed(msg),
            BackendError::Other(msg) => CameraError::ConfigurationFailed(msg),
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::AccessFailed(err.to_string())
    }
}

impl From<serde_json::Error> for CameraError {
    fn from(err: serde_json::Error) -> Self {
        CameraError::InvalidArguments(err.to_string())
    }
}
