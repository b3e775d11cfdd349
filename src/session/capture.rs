// SPDX-License-Identifier: GPL-3.0-only

//! Photo, video and focus orchestration
//!
//! Each operation is split in two halves. The `begin_*` half runs on the
//! session thread, validates state and starts the hardware operation,
//! returning its [`Completion`]. The session awaits the completion off-thread
//! and hands the outcome to the matching `finish_*` half, again on the
//! session thread, so controller state is only ever touched there.

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{
    BackendError, BackendResult, Completion, CustomExposure, DeviceCapabilities, FlashMode,
    FocusRequest, NormalizedPoint, RecordingRequest, StillImage, StillSettings,
};
use crate::constants::recording::{FILE_EXTENSION, FILE_PREFIX, TIMESTAMP_FORMAT};
use crate::errors::{CameraError, CameraResult};
use crate::session::events::{EventHub, FocusExposureState};
use futures::channel::oneshot::Canceled;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parameters of a single still capture
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhotoRequest {
    pub flash: FlashMode,
    pub exposure_duration_micros: Option<u64>,
    pub iso: Option<f32>,
}

impl PhotoRequest {
    fn has_exposure_override(&self) -> bool {
        self.exposure_duration_micros.is_some() || self.iso.is_some()
    }
}

/// A capture in flight
pub struct PendingPhoto {
    pub completion: Completion<StillImage>,
    /// Automatic exposure must be restored when this capture ends
    pub restore_exposure: bool,
}

/// Focus request as given by the caller, before clamping
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FocusTarget {
    pub point: Option<(f64, f64)>,
    pub lens_position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum RecordingState {
    Idle,
    Recording { path: PathBuf },
    /// Stop requested, waiting for the writer to finalize the file
    Finalizing { path: PathBuf },
}

pub struct CaptureController {
    events: EventHub,
    recording_dir: Option<PathBuf>,
    recording: RecordingState,
    photo_pending: bool,
    /// The pending capture locked a custom exposure
    override_pending: bool,
}

impl CaptureController {
    pub fn new(events: EventHub, recording_dir: Option<PathBuf>) -> Self {
        Self {
            events,
            recording_dir,
            recording: RecordingState::Idle,
            photo_pending: false,
            override_pending: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        !matches!(self.recording, RecordingState::Idle)
    }

    pub fn photo_pending(&self) -> bool {
        self.photo_pending
    }

    // ===== Photo =====

    pub fn begin_photo(
        &mut self,
        backend: &mut dyn CameraBackend,
        bound: bool,
        request: PhotoRequest,
    ) -> CameraResult<PendingPhoto> {
        if !bound {
            return Err(CameraError::NotConfigured);
        }
        if self.photo_pending {
            return Err(CameraError::CaptureFailed("capture already in progress".into()));
        }

        let restore_exposure = request.has_exposure_override()
            && match backend.capabilities() {
                Some(caps) => apply_exposure_override(backend, &caps, &request),
                None => false,
            };

        let settings = StillSettings {
            flash: request.flash,
        };
        match backend.capture_still(settings) {
            Ok(completion) => {
                debug!(flash = ?request.flash, restore_exposure, "Still capture started");
                self.photo_pending = true;
                self.override_pending = restore_exposure;
                Ok(PendingPhoto {
                    completion,
                    restore_exposure,
                })
            }
            Err(e) => {
                if restore_exposure {
                    restore_auto_exposure(backend);
                }
                Err(CameraError::CaptureFailed(e.to_string()))
            }
        }
    }

    /// Settle a capture: restore exposure once, then validate the image
    pub fn finish_photo(
        &mut self,
        backend: &mut dyn CameraBackend,
        outcome: Result<BackendResult<StillImage>, Canceled>,
        restore_exposure: bool,
    ) -> CameraResult<StillImage> {
        self.photo_pending = false;
        self.override_pending = false;
        if restore_exposure {
            restore_auto_exposure(backend);
        }

        match outcome {
            Ok(Ok(StillImage::Jpeg(bytes))) if bytes.is_empty() => Err(CameraError::CaptureFailed(
                "No image data was produced".into(),
            )),
            Ok(Ok(image)) => Ok(image),
            Ok(Err(e)) => Err(CameraError::CaptureFailed(e.to_string())),
            Err(Canceled) => Err(CameraError::CaptureFailed(
                "capture was abandoned by the camera".into(),
            )),
        }
    }

    // ===== Video =====

    pub fn start_recording(
        &mut self,
        backend: &mut dyn CameraBackend,
        bound: bool,
        path: Option<PathBuf>,
        audio: bool,
    ) -> CameraResult<PathBuf> {
        if self.is_recording() {
            return Err(CameraError::AlreadyRecording);
        }
        if !bound {
            return Err(CameraError::NotConfigured);
        }

        let path = path.unwrap_or_else(|| default_recording_path(self.recording_dir.as_deref()));
        let request = RecordingRequest {
            path: path.clone(),
            audio,
        };
        backend.start_recording(&request).map_err(|e| match e {
            BackendError::RecordingInProgress => CameraError::AlreadyRecording,
            other => CameraError::CaptureFailed(other.to_string()),
        })?;

        info!(path = %path.display(), audio, "Recording started");
        self.recording = RecordingState::Recording { path: path.clone() };
        Ok(path)
    }

    pub fn begin_stop_recording(
        &mut self,
        backend: &mut dyn CameraBackend,
    ) -> CameraResult<Completion<PathBuf>> {
        let path = match &self.recording {
            RecordingState::Recording { path } => path.clone(),
            RecordingState::Idle | RecordingState::Finalizing { .. } => {
                return Err(CameraError::NoActiveRecording);
            }
        };

        let completion = match backend.stop_recording() {
            Ok(completion) => completion,
            Err(BackendError::NoRecordingInProgress) => {
                warn!(path = %path.display(), "Backend has no recording, clearing state");
                self.recording = RecordingState::Idle;
                return Err(CameraError::NoActiveRecording);
            }
            Err(e) => return Err(CameraError::CaptureFailed(e.to_string())),
        };
        debug!(path = %path.display(), "Waiting for recording to finalize");
        self.recording = RecordingState::Finalizing { path };
        Ok(completion)
    }

    pub fn finish_stop_recording(
        &mut self,
        outcome: Result<BackendResult<PathBuf>, Canceled>,
    ) -> CameraResult<PathBuf> {
        let requested = match std::mem::replace(&mut self.recording, RecordingState::Idle) {
            RecordingState::Finalizing { path } | RecordingState::Recording { path } => Some(path),
            RecordingState::Idle => None,
        };

        match outcome {
            Ok(Ok(path)) => {
                info!(path = %path.display(), "Recording finalized");
                Ok(path)
            }
            Ok(Err(e)) => Err(CameraError::CaptureFailed(e.to_string())),
            Err(Canceled) => Err(CameraError::CaptureFailed(format!(
                "recording {} was not finalized",
                requested
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ))),
        }
    }

    /// The inputs were detached; an active recording went with them
    ///
    /// A recording that is already finalizing keeps its pending completion.
    pub fn inputs_detached(&mut self) {
        if let RecordingState::Recording { path } = &self.recording {
            warn!(path = %path.display(), "Recording interrupted by rebind");
            self.events.emit_error(&CameraError::CaptureFailed(format!(
                "recording {} was interrupted by a pipeline change",
                path.display()
            )));
            self.recording = RecordingState::Idle;
        }
    }

    /// Drop any recording or capture without waiting for it
    pub fn abandon(&mut self, backend: &mut dyn CameraBackend) {
        if let RecordingState::Recording { path } = &self.recording {
            warn!(path = %path.display(), "Abandoning active recording");
            if let Err(e) = backend.stop_recording() {
                warn!(error = %e, "Stopping abandoned recording failed");
            }
        }
        if self.photo_pending && self.override_pending {
            debug!("Abandoning capture with a custom exposure");
            restore_auto_exposure(backend);
        }
        self.recording = RecordingState::Idle;
        self.photo_pending = false;
        self.override_pending = false;
    }

    // ===== Focus =====

    /// Start a focus operation; `None` when there was nothing to do
    pub fn begin_focus(
        &mut self,
        backend: &mut dyn CameraBackend,
        target: FocusTarget,
    ) -> CameraResult<Option<Completion<bool>>> {
        if target.point.is_none() && target.lens_position.is_none() {
            return Ok(None);
        }
        let caps = backend.capabilities().ok_or(CameraError::NotConfigured)?;

        let point = target
            .point
            .filter(|_| caps.supports_point_focus)
            .map(|(x, y)| NormalizedPoint::clamped(x, y));
        let lens_position = target
            .lens_position
            .filter(|_| caps.supports_lens_position)
            .map(|p| p.clamp(0.0, 1.0) as f32);

        if point.is_none() && lens_position.is_none() {
            return Err(CameraError::NotSupported(
                "focus point and lens position are not supported by this lens".into(),
            ));
        }

        let completion = backend
            .focus(FocusRequest {
                point,
                lens_position,
            })
            .map_err(CameraError::from)?;
        self.events.emit_focus_exposure(FocusExposureState::Focusing);
        Ok(Some(completion))
    }

    pub fn finish_focus(&mut self, outcome: Result<BackendResult<bool>, Canceled>) {
        let state = match outcome {
            Ok(Ok(true)) => FocusExposureState::FocusLocked,
            Ok(Ok(false)) => FocusExposureState::FocusFailed,
            Ok(Err(e)) => {
                warn!(error = %e, "Focus operation failed");
                FocusExposureState::FocusFailed
            }
            Err(Canceled) => FocusExposureState::FocusFailed,
        };
        self.events.emit_focus_exposure(state);
    }
}

// Returns whether an override was locked and must be undone later.
fn apply_exposure_override(
    backend: &mut dyn CameraBackend,
    caps: &DeviceCapabilities,
    request: &PhotoRequest,
) -> bool {
    if !caps.supports_custom_exposure {
        warn!("Lens does not support custom exposure, capturing with automatic exposure");
        return false;
    }

    let (min_us, max_us) = caps.exposure_duration_range_micros;
    let (min_iso, max_iso) = caps.iso_range;
    let exposure = CustomExposure {
        duration_micros: request
            .exposure_duration_micros
            .map(|d| d.clamp(min_us, max_us.max(min_us))),
        iso: request.iso.map(|iso| iso.clamp(min_iso, max_iso.max(min_iso))),
    };

    match backend.lock_custom_exposure(exposure) {
        Ok(()) => {
            debug!(?exposure, "Custom exposure locked for capture");
            true
        }
        Err(e) => {
            warn!(error = %e, "Could not lock custom exposure");
            false
        }
    }
}

fn restore_auto_exposure(backend: &mut dyn CameraBackend) {
    if let Err(e) = backend.restore_auto_exposure() {
        warn!(error = %e, "Restoring automatic exposure failed");
    }
}

/// `<dir>/iris_camera_<timestamp>_<uuid>.mp4`, in the temp dir by default
pub fn default_recording_path(dir: Option<&Path>) -> PathBuf {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
    let id = uuid::Uuid::new_v4().simple();
    dir.join(format!("{FILE_PREFIX}_{timestamp}_{id}.{FILE_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{BindPlan, OutputSet, Resolution};
    use crate::backends::virtual_camera::{BackendOp, VirtualBackend};
    use futures::executor::block_on;

    fn attached_backend() -> VirtualBackend {
        let mut backend = VirtualBackend::with_default_units();
        backend
            .attach(&BindPlan {
                lens_id: "0".into(),
                target_size: Some(Resolution::new(640, 480)),
                frame_rate: None,
                outputs: OutputSet {
                    preview: true,
                    still: true,
                    analysis: None,
                },
            })
            .unwrap();
        backend
    }

    fn controller() -> CaptureController {
        CaptureController::new(EventHub::new(8), None)
    }

    #[test]
    fn test_photo_requires_binding() {
        let mut backend = VirtualBackend::with_default_units();
        let mut capture = controller();
        assert!(matches!(
            capture.begin_photo(&mut backend, false, PhotoRequest::default()),
            Err(CameraError::NotConfigured)
        ));
    }

    #[test]
    fn test_override_is_clamped_and_restored_once() {
        let mut backend = attached_backend();
        let probe = backend.probe();
        let mut capture = controller();

        let request = PhotoRequest {
            flash: FlashMode::Off,
            exposure_duration_micros: Some(10_000_000),
            iso: Some(1.0),
        };
        let pending = capture.begin_photo(&mut backend, true, request).unwrap();
        assert!(pending.restore_exposure);
        assert!(capture.photo_pending());

        let locked = probe.ops().into_iter().find_map(|op| match op {
            BackendOp::LockCustomExposure(e) => Some(e),
            _ => None,
        });
        let caps = backend.capabilities().unwrap();
        assert_eq!(
            locked,
            Some(CustomExposure {
                duration_micros: Some(caps.exposure_duration_range_micros.1),
                iso: Some(caps.iso_range.0),
            })
        );

        let outcome = block_on(pending.completion);
        let image = capture.finish_photo(&mut backend, outcome, true).unwrap();
        assert!(matches!(image, StillImage::Yuv420(_)));
        assert_eq!(probe.restore_calls(), 1);
        assert!(!capture.photo_pending());
    }

    #[test]
    fn test_failed_capture_still_restores_once() {
        let mut backend = attached_backend();
        let probe = backend.probe();
        let mut capture = controller();
        probe.fail_next_capture("sensor timeout");

        let request = PhotoRequest {
            iso: Some(400.0),
            ..Default::default()
        };
        let pending = capture.begin_photo(&mut backend, true, request).unwrap();
        let outcome = block_on(pending.completion);
        let err = capture
            .finish_photo(&mut backend, outcome, pending.restore_exposure)
            .unwrap_err();
        assert!(matches!(err, CameraError::CaptureFailed(_)));
        assert_eq!(probe.restore_calls(), 1);
    }

    #[test]
    fn test_second_photo_rejected_while_pending() {
        let mut backend = attached_backend();
        let mut capture = controller();
        let _pending = capture
            .begin_photo(&mut backend, true, PhotoRequest::default())
            .unwrap();
        let err = capture
            .begin_photo(&mut backend, true, PhotoRequest::default())
            .err()
            .unwrap();
        assert_eq!(err, CameraError::CaptureFailed("capture already in progress".into()));
    }

    #[test]
    fn test_empty_jpeg_is_a_failure() {
        let mut backend = attached_backend();
        let mut capture = controller();
        let err = capture
            .finish_photo(&mut backend, Ok(Ok(StillImage::Jpeg(Vec::new()))), false)
            .unwrap_err();
        assert!(matches!(err, CameraError::CaptureFailed(_)));
    }

    #[test]
    fn test_stop_without_recording_has_no_side_effects() {
        let mut backend = attached_backend();
        let probe = backend.probe();
        let before = probe.ops().len();
        let mut capture = controller();

        assert!(matches!(
            capture.begin_stop_recording(&mut backend),
            Err(CameraError::NoActiveRecording)
        ));
        assert_eq!(probe.ops().len(), before);
        assert!(!capture.is_recording());
    }

    #[test]
    fn test_recording_round_trip() {
        let mut backend = attached_backend();
        let mut capture = controller();
        let dir = std::env::temp_dir();
        let path = capture
            .start_recording(&mut backend, true, None, false)
            .unwrap();
        assert!(path.starts_with(&dir));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("iris_camera_"));
        assert_eq!(
            capture.start_recording(&mut backend, true, None, false),
            Err(CameraError::AlreadyRecording)
        );

        let completion = capture.begin_stop_recording(&mut backend).unwrap();
        // Finalizing still counts as recording
        assert!(matches!(
            capture.begin_stop_recording(&mut backend),
            Err(CameraError::NoActiveRecording)
        ));
        assert_eq!(
            capture.start_recording(&mut backend, true, None, false),
            Err(CameraError::AlreadyRecording)
        );

        let finalized = capture.finish_stop_recording(block_on(completion)).unwrap();
        assert_eq!(finalized, path);
        assert!(!capture.is_recording());
    }

    #[test]
    fn test_stop_after_backend_lost_recording() {
        let mut backend = attached_backend();
        let mut capture = controller();
        capture.start_recording(&mut backend, true, None, false).unwrap();

        // Backend dropped the recording behind the controller's back
        backend.detach_all().unwrap();
        assert_eq!(
            capture.begin_stop_recording(&mut backend).err(),
            Some(CameraError::NoActiveRecording)
        );
        assert!(!capture.is_recording());

        let mut backend = attached_backend();
        assert!(capture.start_recording(&mut backend, true, None, false).is_ok());
    }

    #[test]
    fn test_detach_ends_recording() {
        let mut backend = attached_backend();
        let events = EventHub::new(8);
        let mut rx = events.subscribe_lifecycle();
        let mut capture = CaptureController::new(events, None);

        capture.inputs_detached();
        assert!(rx.try_recv().is_err());

        capture.start_recording(&mut backend, true, None, false).unwrap();
        capture.inputs_detached();
        assert!(!capture.is_recording());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_abandon_restores_pending_override() {
        let mut backend = attached_backend();
        let probe = backend.probe();
        let mut capture = controller();

        let request = PhotoRequest {
            exposure_duration_micros: Some(20_000),
            ..Default::default()
        };
        let _pending = capture.begin_photo(&mut backend, true, request).unwrap();
        capture.abandon(&mut backend);
        assert_eq!(probe.restore_calls(), 1);
        assert!(!capture.photo_pending());

        // Nothing left to restore
        capture.abandon(&mut backend);
        assert_eq!(probe.restore_calls(), 1);
    }

    #[test]
    fn test_abandon_without_override_leaves_exposure() {
        let mut backend = attached_backend();
        let probe = backend.probe();
        let mut capture = controller();
        let _pending = capture
            .begin_photo(&mut backend, true, PhotoRequest::default())
            .unwrap();
        capture.abandon(&mut backend);
        assert_eq!(probe.restore_calls(), 0);
    }

    #[test]
    fn test_focus_noop_and_events() {
        let mut backend = attached_backend();
        let events = EventHub::new(8);
        let mut rx = events.subscribe_focus_exposure();
        let mut capture = CaptureController::new(events, None);

        assert!(capture
            .begin_focus(&mut backend, FocusTarget::default())
            .unwrap()
            .is_none());

        let completion = capture
            .begin_focus(
                &mut backend,
                FocusTarget {
                    point: Some((1.5, -0.2)),
                    lens_position: None,
                },
            )
            .unwrap()
            .unwrap();
        capture.finish_focus(block_on(completion));

        assert_eq!(rx.try_recv().unwrap().state, FocusExposureState::Focusing);
        assert_eq!(rx.try_recv().unwrap().state, FocusExposureState::FocusLocked);
    }

    #[test]
    fn test_default_recording_path_uses_dir() {
        let path = default_recording_path(Some(Path::new("/tmp/recordings")));
        assert!(path.starts_with("/tmp/recordings"));
        assert_eq!(path.extension().unwrap(), "mp4");
    }
}
