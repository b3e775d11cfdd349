// SPDX-License-Identifier: GPL-3.0-only

//! Camera session
//!
//! ```text
//!  CameraSession (Clone, any thread)
//!       │  authorization checks
//!       │  Command + oneshot reply
//!       ▼
//!  ┌──────────────────── camera-session thread ────────────────────┐
//!  │ SessionWorker                                                 │
//!  │   ├─ LifecycleStateMachine   initialize / pause / dispose     │
//!  │   ├─ SessionBinder           lens + outputs, all-or-nothing   │
//!  │   ├─ CaptureController       stills, recording, focus         │
//!  │   └─ Box<dyn CameraBackend>  hardware                         │
//!  └───────────────────────────────────────────────────────────────┘
//!       │ EventHub
//!       ▼
//!  lifecycle / orientation / focus-exposure (broadcast), frames (watch)
//! ```
//!
//! Every hardware mutation happens on the session thread in request order.
//! The handle never touches session state directly.

pub mod binder;
pub mod capture;
pub mod catalog;
pub mod events;
pub mod lifecycle;
mod worker;

use crate::backends::camera::types::{AuthorizationStatus, ExposureMode, FocusMode, MediaKind};
use crate::backends::camera::{Authorization, CameraBackend};
use crate::config::Config;
use crate::constants::ResolutionPreset;
use crate::constants::session::THREAD_NAME;
use crate::errors::{CameraError, CameraResult};
use crate::media::frames::FrameStream;
use binder::{FrameRateRange, SessionConfig};
use capture::{FocusTarget, PhotoRequest};
use catalog::{LensCategory, LensDescriptor};
use events::{EventHub, FocusExposureEvent, LifecycleEvent, OrientationEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};
use worker::{Command, Reply, SessionWorker};

/// Handle to a running camera session
///
/// Cheap to clone; all clones drive the same session thread.
#[derive(Clone)]
pub struct CameraSession {
    commands: mpsc::UnboundedSender<Command>,
    authorization: Arc<dyn Authorization>,
    events: EventHub,
}

impl CameraSession {
    /// Start the session thread for `backend`
    ///
    /// Nothing is bound until [`initialize`](Self::initialize) or
    /// [`switch_lens`](Self::switch_lens) is called.
    pub fn spawn(
        mut backend: Box<dyn CameraBackend>,
        authorization: Arc<dyn Authorization>,
        config: &Config,
    ) -> CameraResult<Self> {
        let events = EventHub::new(config.event_capacity);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (hardware_tx, hardware_rx) = mpsc::unbounded_channel();
        backend.connect_events(hardware_tx);

        let worker = SessionWorker::new(
            backend,
            SessionConfig::from(config),
            config.recording_dir.clone(),
            events.clone(),
            commands_rx,
            hardware_rx,
        );

        std::thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to build session runtime");
                        return;
                    }
                };
                runtime.block_on(worker.run());
            })
            .map_err(|e| CameraError::SessionNotReady(format!("session thread: {e}")))?;

        info!("Camera session spawned");
        Ok(Self {
            commands: commands_tx,
            authorization,
            events,
        })
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> CameraResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| CameraError::SessionNotReady("session thread has stopped".into()))?;
        rx.await
            .map_err(|_| CameraError::SessionNotReady("session dropped the request".into()))?
    }

    /// Check, and if needed request, access to `media`
    async fn ensure_authorized(&self, media: MediaKind) -> CameraResult<()> {
        let granted = match self.authorization.status(media) {
            AuthorizationStatus::Authorized => true,
            AuthorizationStatus::Denied => false,
            AuthorizationStatus::NotDetermined => {
                debug!(%media, "Requesting authorization");
                self.authorization
                    .request_access(media)
                    .await
                    .unwrap_or(false)
            }
        };
        if granted {
            Ok(())
        } else {
            Err(CameraError::PermissionDenied(media))
        }
    }

    // ===== Events =====

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn subscribe_frames(&self) -> FrameStream {
        self.events.subscribe_frames()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe_lifecycle()
    }

    pub fn subscribe_orientation(&self) -> broadcast::Receiver<OrientationEvent> {
        self.events.subscribe_orientation()
    }

    pub fn subscribe_focus_exposure(&self) -> broadcast::Receiver<FocusExposureEvent> {
        self.events.subscribe_focus_exposure()
    }

    // ===== Lenses =====

    pub async fn list_lenses(&self, include_front: bool) -> CameraResult<Vec<LensDescriptor>> {
        self.request(|reply| Command::ListLenses {
            include_front,
            reply,
        })
        .await
    }

    pub async fn switch_lens(&self, category: LensCategory) -> CameraResult<LensDescriptor> {
        self.ensure_authorized(MediaKind::Video).await?;
        self.request(|reply| Command::SwitchLens { category, reply })
            .await
    }

    // ===== Capture =====

    /// Capture a still, returned as JPEG bytes
    pub async fn take_photo(&self, request: PhotoRequest) -> CameraResult<Vec<u8>> {
        self.ensure_authorized(MediaKind::Video).await?;
        self.request(|reply| Command::TakePhoto { request, reply })
            .await
    }

    pub async fn start_video_recording(
        &self,
        path: Option<PathBuf>,
        enable_audio: bool,
    ) -> CameraResult<PathBuf> {
        self.ensure_authorized(MediaKind::Video).await?;
        if enable_audio {
            self.ensure_authorized(MediaKind::Audio).await?;
        }
        self.request(|reply| Command::StartRecording {
            path,
            audio: enable_audio,
            reply,
        })
        .await
    }

    /// Stop recording; resolves once the file is finalized
    pub async fn stop_video_recording(&self) -> CameraResult<PathBuf> {
        self.request(|reply| Command::StopRecording { reply }).await
    }

    // ===== Controls =====

    pub async fn set_focus(&self, target: FocusTarget) -> CameraResult<()> {
        self.request(|reply| Command::SetFocus { target, reply })
            .await
    }

    pub async fn set_zoom(&self, factor: f64) -> CameraResult<()> {
        self.request(|reply| Command::SetZoom { factor, reply })
            .await
    }

    pub async fn set_torch(&self, enabled: bool) -> CameraResult<()> {
        self.request(|reply| Command::SetTorch { enabled, reply })
            .await
    }

    pub async fn set_resolution_preset(&self, preset: ResolutionPreset) -> CameraResult<()> {
        self.request(|reply| Command::SetResolutionPreset { preset, reply })
            .await
    }

    pub async fn set_frame_rate_range(&self, range: FrameRateRange) -> CameraResult<()> {
        self.request(|reply| Command::SetFrameRateRange { range, reply })
            .await
    }

    pub async fn set_focus_mode(&self, mode: FocusMode) -> CameraResult<()> {
        self.request(|reply| Command::SetFocusMode { mode, reply })
            .await
    }

    pub async fn focus_mode(&self) -> CameraResult<FocusMode> {
        self.request(|reply| Command::GetFocusMode { reply }).await
    }

    pub async fn set_exposure_mode(&self, mode: ExposureMode) -> CameraResult<()> {
        self.request(|reply| Command::SetExposureMode { mode, reply })
            .await
    }

    pub async fn exposure_mode(&self) -> CameraResult<ExposureMode> {
        self.request(|reply| Command::GetExposureMode { reply }).await
    }

    pub async fn set_exposure_point(&self, x: f64, y: f64) -> CameraResult<()> {
        self.request(|reply| Command::SetExposurePoint { x, y, reply })
            .await
    }

    /// Set exposure compensation in EV; returns the value actually applied
    pub async fn set_exposure_offset(&self, offset: f64) -> CameraResult<f64> {
        self.request(|reply| Command::SetExposureOffset { offset, reply })
            .await
    }

    pub async fn exposure_offset(&self) -> CameraResult<f64> {
        self.request(|reply| Command::GetExposureOffset { reply })
            .await
    }

    pub async fn exposure_offset_step(&self) -> CameraResult<f64> {
        self.request(|reply| Command::GetExposureOffsetStep { reply })
            .await
    }

    pub async fn min_exposure_offset(&self) -> CameraResult<f64> {
        self.request(|reply| Command::GetMinExposureOffset { reply })
            .await
    }

    pub async fn max_exposure_offset(&self) -> CameraResult<f64> {
        self.request(|reply| Command::GetMaxExposureOffset { reply })
            .await
    }

    pub async fn set_white_balance(
        &self,
        temperature: Option<f32>,
        tint: Option<f32>,
    ) -> CameraResult<()> {
        self.request(|reply| Command::SetWhiteBalance {
            temperature,
            tint,
            reply,
        })
        .await
    }

    // ===== Streaming =====

    pub async fn start_image_stream(&self) -> CameraResult<()> {
        self.request(|reply| Command::StartImageStream { reply })
            .await
    }

    pub async fn stop_image_stream(&self) -> CameraResult<()> {
        self.request(|reply| Command::StopImageStream { reply })
            .await
    }

    // ===== Lifecycle =====

    pub async fn initialize(&self) -> CameraResult<()> {
        self.ensure_authorized(MediaKind::Video).await?;
        self.request(|reply| Command::Initialize { reply }).await
    }

    pub async fn pause(&self) -> CameraResult<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> CameraResult<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Release the hardware and stop the session thread
    pub async fn dispose(&self) -> CameraResult<()> {
        self.request(|reply| Command::Dispose { reply }).await
    }

    pub async fn platform_version(&self) -> CameraResult<String> {
        self.request(|reply| Command::PlatformVersion { reply })
            .await
    }
}
