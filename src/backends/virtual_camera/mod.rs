// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! [`VirtualBackend`] implements [`CameraBackend`] without hardware: it
//! enumerates a configurable set of units, produces color-bar stills, drives
//! the analysis output from a paced [`FrameLoop`] and "records" by resolving
//! the requested path after a configurable finalization delay.
//!
//! Every hardware-facing call is appended to an operation log. A
//! [`VirtualProbe`], obtained before the backend is handed to a session,
//! reads that log and scripts failures and platform notifications.
//!
//! ```text
//!   CameraSession ──▶ session thread ──▶ VirtualBackend ──┐
//!                                             │           │ Arc<Mutex<VirtualState>>
//!   test / CLI    ◀───────────────────── VirtualProbe ◀───┘
//! ```

mod authorization;
mod pattern;

pub use authorization::VirtualAuthorization;
pub use pattern::color_bars;

use crate::backends::camera::frame_loop::{FrameLoop, LoopAction};
use crate::backends::camera::types::*;
use crate::backends::camera::{CameraBackend, CameraBackendType};
use crate::constants::virtual_camera::{
    ANALYSIS_HEIGHT, ANALYSIS_WIDTH, DEFAULT_FRAME_INTERVAL, STILL_HEIGHT, STILL_WIDTH,
};
use crate::media::frames::FrameSink;
use futures::channel::oneshot;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A hardware-facing call, as recorded by the virtual backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOp {
    DetachAll,
    Attach {
        lens_id: String,
        target_size: Option<Resolution>,
        frame_rate: Option<FpsRange>,
        analysis: bool,
    },
    StartRunning,
    StopRunning,
    SetFocusMode(FocusMode),
    SetExposureMode(ExposureMode),
    Focus(FocusRequest),
    SetExposurePoint(NormalizedPoint),
    SetExposureCompensation(i32),
    SetZoom(f64),
    SetTorch(bool),
    SetWhiteBalance(WhiteBalance),
    LockCustomExposure(CustomExposure),
    RestoreAutoExposure,
    CaptureStill(StillSettings),
    StartRecording(RecordingRequest),
    StopRecording,
}

#[derive(Debug, Clone)]
struct Attached {
    lens_id: String,
    frame_rate: Option<FpsRange>,
}

struct VirtualState {
    units: Vec<CameraUnit>,
    capabilities: HashMap<String, DeviceCapabilities>,
    enumeration_error: Option<String>,
    attached: Option<Attached>,
    running: bool,
    inputs: usize,
    max_inputs: usize,
    ops: Vec<BackendOp>,
    fail_next_attach: Option<String>,
    fail_next_detach: Option<String>,
    fail_next_start: Option<String>,
    fail_next_capture: Option<String>,
    capture_delay: Duration,
    finalize_delay: Duration,
    focus_result: bool,
    restore_calls: usize,
    compensation_index: i32,
    recording: Option<RecordingRequest>,
    events: Option<HardwareEventSender>,
}

impl VirtualState {
    fn notify(&self, event: HardwareEvent) {
        match &self.events {
            Some(sender) => {
                if sender.send(event).is_err() {
                    debug!("Hardware event dropped, session gone");
                }
            }
            None => debug!(?event, "Hardware event dropped, no session connected"),
        }
    }
}

fn lock(state: &Mutex<VirtualState>) -> MutexGuard<'_, VirtualState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capabilities a virtual unit reports
pub fn default_capabilities(unit: &CameraUnit) -> DeviceCapabilities {
    DeviceCapabilities {
        supports_point_focus: unit.supports_focus,
        supports_lens_position: unit.supports_focus,
        has_torch: unit.position == LensPosition::Back,
        supports_custom_exposure: true,
        exposure_duration_range_micros: (100, 500_000),
        iso_range: (50.0, 3200.0),
        max_zoom: if unit.position == LensPosition::Front { 2.0 } else { 8.0 },
        exposure_compensation: Some(ExposureCompensation {
            index: 0,
            min_index: -20,
            max_index: 20,
            step: 0.1,
        }),
    }
}

/// A phone-like set of units: back wide, front, back ultra-wide, back telephoto
pub fn default_units() -> Vec<CameraUnit> {
    vec![
        CameraUnit::new("0", "Back Camera", LensPosition::Back)
            .with_optics(&[4.25], 5.6)
            .with_focus(true),
        CameraUnit::new("1", "Front Camera", LensPosition::Front).with_optics(&[2.7], 3.6),
        CameraUnit::new("2", "Back Ultra Wide Camera", LensPosition::Back)
            .with_optics(&[1.8], 5.6)
            .with_focus(true),
        CameraUnit::new("3", "Back Telephoto Camera", LensPosition::Back)
            .with_optics(&[9.0], 5.6)
            .with_focus(true),
    ]
}

fn complete_after<T: Send + 'static>(delay: Duration, result: BackendResult<T>) -> Completion<T> {
    let (tx, rx) = oneshot::channel();
    if delay.is_zero() {
        let _ = tx.send(result);
    } else {
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = tx.send(result);
        });
    }
    rx
}

pub struct VirtualBackend {
    state: Arc<Mutex<VirtualState>>,
    analysis_loop: Option<FrameLoop>,
}

impl VirtualBackend {
    pub fn new(units: Vec<CameraUnit>) -> Self {
        let capabilities = units
            .iter()
            .map(|u| (u.id.clone(), default_capabilities(u)))
            .collect();
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                units,
                capabilities,
                enumeration_error: None,
                attached: None,
                running: false,
                inputs: 0,
                max_inputs: 0,
                ops: Vec::new(),
                fail_next_attach: None,
                fail_next_detach: None,
                fail_next_start: None,
                fail_next_capture: None,
                capture_delay: Duration::ZERO,
                finalize_delay: Duration::ZERO,
                focus_result: true,
                restore_calls: 0,
                compensation_index: 0,
                recording: None,
                events: None,
            })),
            analysis_loop: None,
        }
    }

    pub fn with_default_units() -> Self {
        Self::new(default_units())
    }

    /// Inspection and scripting handle sharing this backend's state
    pub fn probe(&self) -> VirtualProbe {
        VirtualProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&self, op: BackendOp) {
        lock(&self.state).ops.push(op);
    }

    fn require_attached(&self) -> BackendResult<Attached> {
        lock(&self.state).attached.clone().ok_or(BackendError::NotAttached)
    }

    fn start_analysis(
        &mut self,
        sink: FrameSink,
        frame_rate: Option<FpsRange>,
    ) -> BackendResult<()> {
        let interval = frame_rate
            .filter(|r| r.max > 0)
            .map(|r| Duration::from_secs(1) / r.max)
            .unwrap_or(DEFAULT_FRAME_INTERVAL);
        let state = Arc::clone(&self.state);
        let mut frame: u64 = 0;

        let frame_loop = FrameLoop::spawn("virtual-analysis", interval, move || {
            if !lock(&state).running {
                return LoopAction::Continue;
            }
            frame += 1;
            sink.deliver(AnalysisImage::Yuv420(color_bars(
                ANALYSIS_WIDTH,
                ANALYSIS_HEIGHT,
                frame,
            )));
            LoopAction::Continue
        })?;
        self.analysis_loop = Some(frame_loop);
        Ok(())
    }

    fn stop_analysis(&mut self) {
        if let Some(mut frame_loop) = self.analysis_loop.take() {
            frame_loop.stop();
        }
    }
}

impl CameraBackend for VirtualBackend {
    fn enumerate_units(&self) -> BackendResult<Vec<CameraUnit>> {
        let state = lock(&self.state);
        if let Some(reason) = &state.enumeration_error {
            return Err(BackendError::AccessDenied(reason.clone()));
        }
        Ok(state.units.clone())
    }

    fn connect_events(&mut self, sender: HardwareEventSender) {
        lock(&self.state).events = Some(sender);
    }

    fn attach(&mut self, plan: &BindPlan) -> BackendResult<()> {
        {
            let mut state = lock(&self.state);
            state.ops.push(BackendOp::Attach {
                lens_id: plan.lens_id.clone(),
                target_size: plan.target_size,
                frame_rate: plan.frame_rate,
                analysis: plan.outputs.analysis.is_some(),
            });
            if let Some(reason) = state.fail_next_attach.take() {
                return Err(BackendError::AttachFailed(reason));
            }
            if !state.units.iter().any(|u| u.id == plan.lens_id) {
                return Err(BackendError::DeviceNotFound(plan.lens_id.clone()));
            }
            state.inputs += 1;
            state.max_inputs = state.max_inputs.max(state.inputs);
            state.attached = Some(Attached {
                lens_id: plan.lens_id.clone(),
                frame_rate: plan.frame_rate,
            });
        }

        if let Some(analysis) = &plan.outputs.analysis {
            if let Err(e) = self.start_analysis(analysis.sink.clone(), plan.frame_rate) {
                let mut state = lock(&self.state);
                state.inputs = state.inputs.saturating_sub(1);
                state.attached = None;
                return Err(e);
            }
        }

        info!(
            lens = %plan.lens_id,
            size = ?plan.target_size,
            fps = ?plan.frame_rate,
            analysis = plan.outputs.analysis.is_some(),
            "Virtual pipeline attached"
        );
        Ok(())
    }

    fn detach_all(&mut self) -> BackendResult<()> {
        {
            let mut state = lock(&self.state);
            state.ops.push(BackendOp::DetachAll);
            if let Some(reason) = state.fail_next_detach.take() {
                return Err(BackendError::Other(reason));
            }
        }
        self.stop_analysis();
        let mut state = lock(&self.state);
        state.inputs = 0;
        state.attached = None;
        if state.recording.take().is_some() {
            warn!("Detached while recording, recording dropped");
        }
        Ok(())
    }

    fn attached_lens(&self) -> Option<String> {
        lock(&self.state).attached.as_ref().map(|a| a.lens_id.clone())
    }

    fn start_running(&mut self) -> BackendResult<()> {
        let mut state = lock(&self.state);
        if state.attached.is_none() {
            return Err(BackendError::NotAttached);
        }
        state.ops.push(BackendOp::StartRunning);
        if let Some(reason) = state.fail_next_start.take() {
            return Err(BackendError::Other(reason));
        }
        state.running = true;
        Ok(())
    }

    fn stop_running(&mut self) -> BackendResult<()> {
        let mut state = lock(&self.state);
        state.ops.push(BackendOp::StopRunning);
        state.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    fn capabilities(&self) -> Option<DeviceCapabilities> {
        let state = lock(&self.state);
        let attached = state.attached.as_ref()?;
        let mut caps = state.capabilities.get(&attached.lens_id)?.clone();
        if let Some(comp) = caps.exposure_compensation.as_mut() {
            comp.index = state.compensation_index;
        }
        Some(caps)
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> BackendResult<()> {
        self.require_attached()?;
        self.record(BackendOp::SetFocusMode(mode));
        Ok(())
    }

    fn set_exposure_mode(&mut self, mode: ExposureMode) -> BackendResult<()> {
        self.require_attached()?;
        self.record(BackendOp::SetExposureMode(mode));
        Ok(())
    }

    fn focus(&mut self, request: FocusRequest) -> BackendResult<Completion<bool>> {
        self.require_attached()?;
        let mut state = lock(&self.state);
        state.ops.push(BackendOp::Focus(request));
        Ok(complete_after(state.capture_delay, Ok(state.focus_result)))
    }

    fn set_exposure_point(&mut self, point: NormalizedPoint) -> BackendResult<()> {
        self.require_attached()?;
        self.record(BackendOp::SetExposurePoint(point));
        Ok(())
    }

    fn set_exposure_compensation_index(&mut self, index: i32) -> BackendResult<()> {
        self.require_attached()?;
        let mut state = lock(&self.state);
        state.ops.push(BackendOp::SetExposureCompensation(index));
        state.compensation_index = index;
        Ok(())
    }

    fn set_zoom_ratio(&mut self, ratio: f64) -> BackendResult<()> {
        self.require_attached()?;
        self.record(BackendOp::SetZoom(ratio));
        Ok(())
    }

    fn set_torch(&mut self, enabled: bool) -> BackendResult<()> {
        let caps = self.capabilities().ok_or(BackendError::NotAttached)?;
        if !caps.has_torch {
            return Err(BackendError::NotSupported("torch".into()));
        }
        self.record(BackendOp::SetTorch(enabled));
        Ok(())
    }

    fn set_white_balance(&mut self, white_balance: WhiteBalance) -> BackendResult<()> {
        self.require_attached()?;
        self.record(BackendOp::SetWhiteBalance(white_balance));
        Ok(())
    }

    fn lock_custom_exposure(&mut self, exposure: CustomExposure) -> BackendResult<()> {
        self.require_attached()?;
        self.record(BackendOp::LockCustomExposure(exposure));
        Ok(())
    }

    fn restore_auto_exposure(&mut self) -> BackendResult<()> {
        let mut state = lock(&self.state);
        state.ops.push(BackendOp::RestoreAutoExposure);
        state.restore_calls += 1;
        Ok(())
    }

    fn capture_still(&mut self, settings: StillSettings) -> BackendResult<Completion<StillImage>> {
        self.require_attached()?;
        let mut state = lock(&self.state);
        state.ops.push(BackendOp::CaptureStill(settings));
        let result = match state.fail_next_capture.take() {
            Some(reason) => Err(BackendError::CaptureFailed(reason)),
            None => Ok(StillImage::Yuv420(color_bars(
                STILL_WIDTH,
                STILL_HEIGHT,
                state.ops.len() as u64,
            ))),
        };
        Ok(complete_after(state.capture_delay, result))
    }

    fn start_recording(&mut self, request: &RecordingRequest) -> BackendResult<()> {
        self.require_attached()?;
        let mut state = lock(&self.state);
        if state.recording.is_some() {
            return Err(BackendError::RecordingInProgress);
        }
        state.ops.push(BackendOp::StartRecording(request.clone()));
        state.recording = Some(request.clone());
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<Completion<PathBuf>> {
        let mut state = lock(&self.state);
        let request = state
            .recording
            .take()
            .ok_or(BackendError::NoRecordingInProgress)?;
        state.ops.push(BackendOp::StopRecording);
        Ok(complete_after(state.finalize_delay, Ok(request.path)))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn platform_version(&self) -> String {
        format!("Virtual {}", env!("CARGO_PKG_VERSION"))
    }
}

impl Drop for VirtualBackend {
    fn drop(&mut self) {
        self.stop_analysis();
    }
}

/// Shared view into a [`VirtualBackend`]
#[derive(Clone)]
pub struct VirtualProbe {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualProbe {
    /// Hardware calls made so far, oldest first
    pub fn ops(&self) -> Vec<BackendOp> {
        lock(&self.state).ops.clone()
    }

    pub fn clear_ops(&self) {
        lock(&self.state).ops.clear();
    }

    pub fn attached_lens(&self) -> Option<String> {
        lock(&self.state).attached.as_ref().map(|a| a.lens_id.clone())
    }

    pub fn attached_frame_rate(&self) -> Option<FpsRange> {
        lock(&self.state).attached.as_ref().and_then(|a| a.frame_rate)
    }

    /// Highest number of lenses that were ever attached at once
    pub fn max_simultaneous_inputs(&self) -> usize {
        lock(&self.state).max_inputs
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.state).recording.is_some()
    }

    pub fn restore_calls(&self) -> usize {
        lock(&self.state).restore_calls
    }

    pub fn set_units(&self, units: Vec<CameraUnit>) {
        let mut state = lock(&self.state);
        state.capabilities = units
            .iter()
            .map(|u| (u.id.clone(), default_capabilities(u)))
            .collect();
        state.units = units;
    }

    pub fn set_capabilities(&self, lens_id: &str, capabilities: DeviceCapabilities) {
        lock(&self.state)
            .capabilities
            .insert(lens_id.to_string(), capabilities);
    }

    pub fn deny_enumeration(&self, reason: &str) {
        lock(&self.state).enumeration_error = Some(reason.to_string());
    }

    pub fn fail_next_attach(&self, reason: &str) {
        lock(&self.state).fail_next_attach = Some(reason.to_string());
    }

    /// The next `detach_all` fails and leaves the current input attached
    pub fn fail_next_detach(&self, reason: &str) {
        lock(&self.state).fail_next_detach = Some(reason.to_string());
    }

    pub fn fail_next_start(&self, reason: &str) {
        lock(&self.state).fail_next_start = Some(reason.to_string());
    }

    pub fn fail_next_capture(&self, reason: &str) {
        lock(&self.state).fail_next_capture = Some(reason.to_string());
    }

    /// Delay before capture and focus completions resolve
    pub fn set_capture_delay(&self, delay: Duration) {
        lock(&self.state).capture_delay = delay;
    }

    /// Delay before a stopped recording reports its file
    pub fn set_finalize_delay(&self, delay: Duration) {
        lock(&self.state).finalize_delay = delay;
    }

    pub fn set_focus_result(&self, locked: bool) {
        lock(&self.state).focus_result = locked;
    }

    /// The system closed the camera
    pub fn simulate_closed(&self) {
        let mut state = lock(&self.state);
        state.running = false;
        state.notify(HardwareEvent::Closed);
    }

    /// The system handed the camera back
    pub fn simulate_reopened(&self) {
        let mut state = lock(&self.state);
        state.running = true;
        state.notify(HardwareEvent::Running);
    }

    pub fn simulate_error(&self, code: &str, message: &str) {
        lock(&self.state).notify(HardwareEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    pub fn simulate_orientation(&self, degrees: i32) {
        lock(&self.state).notify(HardwareEvent::OrientationChanged(degrees));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn plan(lens_id: &str, sink: Option<FrameSink>) -> BindPlan {
        BindPlan {
            lens_id: lens_id.to_string(),
            target_size: None,
            frame_rate: Some(FpsRange { min: 60, max: 60 }),
            outputs: OutputSet {
                preview: true,
                still: true,
                analysis: sink.map(|sink| AnalysisOutput {
                    backpressure: Backpressure::KeepOnlyLatest,
                    sink,
                }),
            },
        }
    }

    #[test]
    fn test_unknown_lens_is_rejected() {
        let mut backend = VirtualBackend::with_default_units();
        assert_eq!(
            backend.attach(&plan("9", None)),
            Err(BackendError::DeviceNotFound("9".into()))
        );
        assert!(backend.attached_lens().is_none());
    }

    #[test]
    fn test_inputs_are_counted() {
        let mut backend = VirtualBackend::with_default_units();
        let probe = backend.probe();
        backend.attach(&plan("0", None)).unwrap();
        backend.attach(&plan("2", None)).unwrap();
        assert_eq!(probe.max_simultaneous_inputs(), 2);
    }

    #[test]
    fn test_capture_requires_attach() {
        let mut backend = VirtualBackend::with_default_units();
        assert!(matches!(
            backend.capture_still(StillSettings::default()),
            Err(BackendError::NotAttached)
        ));
    }

    #[test]
    fn test_still_is_color_bars() {
        let mut backend = VirtualBackend::with_default_units();
        backend.attach(&plan("0", None)).unwrap();
        let still = block_on(backend.capture_still(StillSettings::default()).unwrap())
            .unwrap()
            .unwrap();
        match still {
            StillImage::Yuv420(image) => {
                assert_eq!((image.width, image.height), (STILL_WIDTH, STILL_HEIGHT));
            }
            StillImage::Jpeg(_) => panic!("expected a YUV still"),
        }
    }

    #[test]
    fn test_torch_only_on_back_units() {
        let mut backend = VirtualBackend::with_default_units();
        backend.attach(&plan("1", None)).unwrap();
        assert!(matches!(backend.set_torch(true), Err(BackendError::NotSupported(_))));
    }

    #[tokio::test]
    async fn test_analysis_frames_flow_while_running() {
        let mut backend = VirtualBackend::with_default_units();
        let sink = FrameSink::new();
        sink.set_enabled(true);
        let mut frames = sink.subscribe();

        backend.attach(&plan("0", Some(sink.clone()))).unwrap();
        backend.start_running().unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .expect("frame within timeout")
            .expect("sink alive");
        assert_eq!((frame.width, frame.height), (ANALYSIS_WIDTH, ANALYSIS_HEIGHT));
        assert_eq!(frame.format, "bgra8888");

        backend.detach_all().unwrap();
        assert!(backend.analysis_loop.is_none());
    }

    #[test]
    fn test_enumeration_denied() {
        let backend = VirtualBackend::with_default_units();
        backend.probe().deny_enumeration("restricted profile");
        assert!(matches!(
            backend.enumerate_units(),
            Err(BackendError::AccessDenied(_))
        ));
    }
}
