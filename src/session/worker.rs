// SPDX-License-Identifier: GPL-3.0-only

//! The session thread
//!
//! [`SessionWorker`] owns the backend and every piece of mutable session
//! state. It runs on its own OS thread inside a current-thread tokio
//! runtime and processes [`Command`]s strictly in arrival order; each
//! command finishes its hardware work before the next one starts.
//!
//! Hardware completions (stills, recording finalization, focus) are awaited
//! by spawned tasks that post a [`Completed`] message back, so their
//! outcome is applied on this thread as well. The thread exits after
//! `Dispose`; requests sent later find the channel closed.

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{
    BackendResult, Completion, ExposureCompensation, ExposureMode, FocusMode, HardwareEvent,
    NormalizedPoint, StillImage, WhiteBalance,
};
use crate::constants::ResolutionPreset;
use crate::constants::controls::{
    DEFAULT_EXPOSURE_OFFSET_STEP, DEFAULT_WHITE_BALANCE_TEMPERATURE, DEFAULT_WHITE_BALANCE_TINT,
    MIN_ZOOM,
};
use crate::errors::{CameraError, CameraResult};
use crate::media::conversions::image_to_jpeg;
use crate::session::binder::{FrameRateRange, SessionBinder, SessionConfig};
use crate::session::capture::{CaptureController, FocusTarget, PhotoRequest};
use crate::session::catalog::{LensCatalog, LensCategory, LensDescriptor};
use crate::session::events::{EventHub, FocusExposureState};
use crate::session::lifecycle::LifecycleStateMachine;
use futures::channel::oneshot::Canceled;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub(crate) type Reply<T> = oneshot::Sender<CameraResult<T>>;

/// Requests accepted by the session thread
pub(crate) enum Command {
    ListLenses {
        include_front: bool,
        reply: Reply<Vec<LensDescriptor>>,
    },
    SwitchLens {
        category: LensCategory,
        reply: Reply<LensDescriptor>,
    },
    TakePhoto {
        request: PhotoRequest,
        reply: Reply<Vec<u8>>,
    },
    StartRecording {
        path: Option<PathBuf>,
        audio: bool,
        reply: Reply<PathBuf>,
    },
    StopRecording { reply: Reply<PathBuf> },
    SetFocus {
        target: FocusTarget,
        reply: Reply<()>,
    },
    SetZoom { factor: f64, reply: Reply<()> },
    SetTorch { enabled: bool, reply: Reply<()> },
    SetResolutionPreset {
        preset: ResolutionPreset,
        reply: Reply<()>,
    },
    SetFrameRateRange {
        range: FrameRateRange,
        reply: Reply<()>,
    },
    SetFocusMode { mode: FocusMode, reply: Reply<()> },
    GetFocusMode { reply: Reply<FocusMode> },
    SetExposureMode {
        mode: ExposureMode,
        reply: Reply<()>,
    },
    GetExposureMode { reply: Reply<ExposureMode> },
    SetExposurePoint { x: f64, y: f64, reply: Reply<()> },
    SetExposureOffset { offset: f64, reply: Reply<f64> },
    GetExposureOffset { reply: Reply<f64> },
    GetExposureOffsetStep { reply: Reply<f64> },
    GetMinExposureOffset { reply: Reply<f64> },
    GetMaxExposureOffset { reply: Reply<f64> },
    SetWhiteBalance {
        temperature: Option<f32>,
        tint: Option<f32>,
        reply: Reply<()>,
    },
    StartImageStream { reply: Reply<()> },
    StopImageStream { reply: Reply<()> },
    Initialize { reply: Reply<()> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    Dispose { reply: Reply<()> },
    PlatformVersion { reply: Reply<String> },
}

/// Outcome of a hardware completion, posted back to the session thread
enum Completed {
    Photo {
        outcome: Result<BackendResult<StillImage>, Canceled>,
        restore_exposure: bool,
        reply: Reply<Vec<u8>>,
    },
    RecordingFinalized {
        outcome: Result<BackendResult<PathBuf>, Canceled>,
        reply: Reply<PathBuf>,
    },
    Focus {
        outcome: Result<BackendResult<bool>, Canceled>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub(crate) struct SessionWorker {
    backend: Box<dyn CameraBackend>,
    binder: SessionBinder,
    capture: CaptureController,
    lifecycle: LifecycleStateMachine,
    events: EventHub,
    commands: mpsc::UnboundedReceiver<Command>,
    hardware: mpsc::UnboundedReceiver<HardwareEvent>,
    completed_tx: mpsc::UnboundedSender<Completed>,
    completed_rx: mpsc::UnboundedReceiver<Completed>,
}

impl SessionWorker {
    pub(crate) fn new(
        backend: Box<dyn CameraBackend>,
        defaults: SessionConfig,
        recording_dir: Option<PathBuf>,
        events: EventHub,
        commands: mpsc::UnboundedReceiver<Command>,
        hardware: mpsc::UnboundedReceiver<HardwareEvent>,
    ) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            binder: SessionBinder::new(defaults, events.frames().clone()),
            capture: CaptureController::new(events.clone(), recording_dir),
            lifecycle: LifecycleStateMachine::new(events.clone()),
            events,
            commands,
            hardware,
            completed_tx,
            completed_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(backend = %self.backend.backend_type(), "Session thread started");
        loop {
            tokio::select! {
                biased;
                Some(done) = self.completed_rx.recv() => self.handle_completed(done),
                Some(event) = self.hardware.recv() => {
                    self.lifecycle.on_hardware_event(self.backend.as_mut(), event);
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All session handles dropped");
                        self.lifecycle.dispose(self.backend.as_mut(), &mut self.binder);
                        break;
                    };
                    if self.handle(command) == Flow::Exit {
                        break;
                    }
                }
            }
        }
        info!("Session thread exiting");
    }

    fn require_bound(&self) -> CameraResult<()> {
        if self.binder.is_bound() {
            Ok(())
        } else {
            Err(CameraError::NotConfigured)
        }
    }

    fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::ListLenses { include_front, reply } => {
                let _ = reply.send(self.list_lenses(include_front));
            }
            Command::SwitchLens { category, reply } => {
                let result = self.switch_lens(category);
                self.reply_broadcasting(reply, result);
            }
            Command::TakePhoto { request, reply } => self.take_photo(request, reply),
            Command::StartRecording { path, audio, reply } => {
                let bound = self.binder.is_bound();
                let result = self
                    .capture
                    .start_recording(self.backend.as_mut(), bound, path, audio);
                let _ = reply.send(result);
            }
            Command::StopRecording { reply } => {
                match self.capture.begin_stop_recording(self.backend.as_mut()) {
                    Ok(completion) => {
                        self.await_completion(completion, move |outcome| {
                            Completed::RecordingFinalized { outcome, reply }
                        });
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Command::SetFocus { target, reply } => {
                let result = self
                    .capture
                    .begin_focus(self.backend.as_mut(), target)
                    .map(|completion| {
                        if let Some(completion) = completion {
                            self.await_completion(completion, |outcome| {
                                Completed::Focus { outcome }
                            });
                        }
                    });
                let _ = reply.send(result);
            }
            Command::SetZoom { factor, reply } => {
                let _ = reply.send(self.set_zoom(factor));
            }
            Command::SetTorch { enabled, reply } => {
                let result = self.require_bound().and_then(|_| {
                    self.backend.set_torch(enabled).map_err(CameraError::from)
                });
                let _ = reply.send(result);
            }
            Command::SetResolutionPreset { preset, reply } => {
                let result = self.reconfigure(|c| c.preset = preset);
                self.reply_broadcasting(reply, result);
            }
            Command::SetFrameRateRange { range, reply } => {
                let result = self.reconfigure(|c| c.frame_rate = range);
                self.reply_broadcasting(reply, result);
            }
            Command::SetFocusMode { mode, reply } => {
                let _ = reply.send(self.set_focus_mode(mode));
            }
            Command::GetFocusMode { reply } => {
                let _ = reply.send(Ok(self.binder.config().focus_mode));
            }
            Command::SetExposureMode { mode, reply } => {
                let _ = reply.send(self.set_exposure_mode(mode));
            }
            Command::GetExposureMode { reply } => {
                let _ = reply.send(Ok(self.binder.config().exposure_mode));
            }
            Command::SetExposurePoint { x, y, reply } => {
                let result = self.require_bound().and_then(|_| {
                    self.backend
                        .set_exposure_point(NormalizedPoint::clamped(x, y))
                        .map_err(CameraError::from)
                });
                let _ = reply.send(result);
            }
            Command::SetExposureOffset { offset, reply } => {
                let _ = reply.send(self.set_exposure_offset(offset));
            }
            Command::GetExposureOffset { reply } => {
                let value = self.exposure_offset_value(|c| c.index);
                let _ = reply.send(Ok(value));
            }
            Command::GetExposureOffsetStep { reply } => {
                let _ = reply.send(Ok(self.exposure_offset_step()));
            }
            Command::GetMinExposureOffset { reply } => {
                let value = self.exposure_offset_value(|c| c.min_index);
                let _ = reply.send(Ok(value));
            }
            Command::GetMaxExposureOffset { reply } => {
                let value = self.exposure_offset_value(|c| c.max_index);
                let _ = reply.send(Ok(value));
            }
            Command::SetWhiteBalance { temperature, tint, reply } => {
                let _ = reply.send(self.set_white_balance(temperature, tint));
            }
            Command::StartImageStream { reply } => {
                let result = self.set_streaming(true);
                self.reply_broadcasting(reply, result);
            }
            Command::StopImageStream { reply } => {
                let result = self.set_streaming(false);
                self.reply_broadcasting(reply, result);
            }
            Command::Initialize { reply } => {
                let result = self.rebinding(|w| {
                    w.lifecycle.initialize(w.backend.as_mut(), &mut w.binder)
                });
                self.reply_broadcasting(reply, result);
            }
            Command::Pause { reply } => {
                let result = self.lifecycle.pause(self.backend.as_mut());
                self.reply_broadcasting(reply, result);
            }
            Command::Resume { reply } => {
                let result = self.lifecycle.resume(self.backend.as_mut());
                self.reply_broadcasting(reply, result);
            }
            Command::Dispose { reply } => {
                self.capture.abandon(self.backend.as_mut());
                self.lifecycle.dispose(self.backend.as_mut(), &mut self.binder);
                let _ = reply.send(Ok(()));
                return Flow::Exit;
            }
            Command::PlatformVersion { reply } => {
                let _ = reply.send(Ok(self.backend.platform_version()));
            }
        }
        Flow::Continue
    }

    /// Reply, and also broadcast a failure on the lifecycle stream
    fn reply_broadcasting<T>(&self, reply: Reply<T>, result: CameraResult<T>) {
        if let Err(e) = &result {
            warn!(code = e.code(), error = %e, "Session command failed");
            self.events.emit_error(e);
        }
        let _ = reply.send(result);
    }

    fn await_completion<T, F>(&self, completion: Completion<T>, wrap: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<BackendResult<T>, Canceled>) -> Completed + Send + 'static,
    {
        let completed_tx = self.completed_tx.clone();
        tokio::spawn(async move {
            let outcome = completion.await;
            let _ = completed_tx.send(wrap(outcome));
        });
    }

    fn handle_completed(&mut self, done: Completed) {
        match done {
            Completed::Photo {
                outcome,
                restore_exposure,
                reply,
            } => {
                let result = self
                    .capture
                    .finish_photo(self.backend.as_mut(), outcome, restore_exposure);
                match result {
                    Ok(StillImage::Jpeg(bytes)) => {
                        let _ = reply.send(Ok(bytes));
                    }
                    Ok(StillImage::Yuv420(image)) => {
                        // Encoding is CPU-bound; keep the session thread free
                        tokio::spawn(async move {
                            let encoded =
                                tokio::task::spawn_blocking(move || image_to_jpeg(&image))
                                    .await
                                    .unwrap_or_else(|e| {
                                        Err(CameraError::CaptureFailed(format!(
                                            "encoder task failed: {e}"
                                        )))
                                    });
                            let _ = reply.send(encoded);
                        });
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Completed::RecordingFinalized { outcome, reply } => {
                let _ = reply.send(self.capture.finish_stop_recording(outcome));
            }
            Completed::Focus { outcome } => self.capture.finish_focus(outcome),
        }
    }

    fn take_photo(&mut self, request: PhotoRequest, reply: Reply<Vec<u8>>) {
        let bound = self.binder.is_bound();
        match self
            .capture
            .begin_photo(self.backend.as_mut(), bound, request)
        {
            Ok(pending) => {
                let restore_exposure = pending.restore_exposure;
                self.await_completion(pending.completion, move |outcome| Completed::Photo {
                    outcome,
                    restore_exposure,
                    reply,
                });
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    fn list_lenses(&mut self, include_front: bool) -> CameraResult<Vec<LensDescriptor>> {
        let catalog = LensCatalog::enumerate(self.backend.as_ref())?;
        // The default becomes the selection, front lenses included
        if self.binder.config().lens_id.is_none() {
            if let Some(lens) = catalog.default_lens() {
                let id = lens.id.clone();
                debug!(lens = %id, "Default lens selected");
                self.rebinding(|w| {
                    w.binder
                        .reconfigure(w.backend.as_mut(), |c| c.lens_id = Some(id))
                })?;
            }
        }
        Ok(catalog.visible(include_front))
    }

    fn switch_lens(&mut self, category: LensCategory) -> CameraResult<LensDescriptor> {
        let catalog = LensCatalog::enumerate(self.backend.as_ref())?;
        let lens = catalog.find_by_category(category)?.clone();

        if self.binder.bound().is_some_and(|b| b.lens_id == lens.id) {
            debug!(lens = %lens.id, "Lens already bound");
            return Ok(lens);
        }

        self.rebinding(|w| w.binder.bind_lens(w.backend.as_mut(), &lens.id))?;
        self.lifecycle.after_rebind(self.backend.as_mut())?;
        info!(lens = %lens.id, category = %category, "Switched lens");
        Ok(lens)
    }

    fn reconfigure(&mut self, update: impl FnOnce(&mut SessionConfig)) -> CameraResult<()> {
        let rebound = self.rebinding(|w| w.binder.reconfigure(w.backend.as_mut(), update))?;
        if rebound.is_some() {
            self.lifecycle.after_rebind(self.backend.as_mut())?;
        }
        Ok(())
    }

    /// Run a binder operation, ending the recording if it detached the inputs
    fn rebinding<T>(&mut self, op: impl FnOnce(&mut Self) -> CameraResult<T>) -> CameraResult<T> {
        let detaches = self.binder.detach_count();
        let result = op(self);
        if self.binder.detach_count() != detaches {
            self.capture.inputs_detached();
        }
        result
    }

    fn set_streaming(&mut self, streaming: bool) -> CameraResult<()> {
        if self.binder.config().streaming == streaming {
            return Ok(());
        }
        debug!(streaming, "Image stream toggled");
        self.reconfigure(|c| c.streaming = streaming)
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> CameraResult<()> {
        if self.binder.is_bound() {
            self.backend.set_focus_mode(mode).map_err(CameraError::from)?;
        }
        self.binder.set_focus_mode(mode);
        Ok(())
    }

    fn set_exposure_mode(&mut self, mode: ExposureMode) -> CameraResult<()> {
        if self.binder.is_bound() {
            self.backend
                .set_exposure_mode(mode)
                .map_err(CameraError::from)?;
            self.events.emit_focus_exposure(match mode {
                ExposureMode::Locked => FocusExposureState::ExposureLocked,
                ExposureMode::Auto => FocusExposureState::ExposureSearching,
            });
        }
        self.binder.set_exposure_mode(mode);
        Ok(())
    }

    fn set_zoom(&mut self, factor: f64) -> CameraResult<()> {
        self.require_bound()?;
        if !factor.is_finite() {
            return Err(CameraError::InvalidArguments(format!("zoom factor {factor}")));
        }
        let max_zoom = self
            .backend
            .capabilities()
            .map(|c| c.max_zoom)
            .unwrap_or(MIN_ZOOM)
            .max(MIN_ZOOM);
        let ratio = factor.clamp(MIN_ZOOM, max_zoom);
        self.backend
            .set_zoom_ratio(ratio)
            .map_err(CameraError::from)
    }

    fn exposure_offset_step(&self) -> f64 {
        self.backend
            .capabilities()
            .and_then(|c| c.exposure_compensation)
            .map(|c| c.step)
            .filter(|step| *step > 0.0)
            .unwrap_or(DEFAULT_EXPOSURE_OFFSET_STEP)
    }

    fn exposure_offset_value(&self, pick: impl Fn(&ExposureCompensation) -> i32) -> f64 {
        let step = self.exposure_offset_step();
        self.backend
            .capabilities()
            .and_then(|c| c.exposure_compensation)
            .map(|c| pick(&c) as f64 * step)
            .unwrap_or(0.0)
    }

    fn set_exposure_offset(&mut self, offset: f64) -> CameraResult<f64> {
        self.require_bound()?;
        if !offset.is_finite() {
            return Err(CameraError::InvalidArguments(format!("exposure offset {offset}")));
        }
        let compensation = self
            .backend
            .capabilities()
            .and_then(|c| c.exposure_compensation)
            .ok_or_else(|| CameraError::NotSupported("exposure compensation".into()))?;
        let step = self.exposure_offset_step();
        let index = ((offset / step).round() as i32)
            .clamp(compensation.min_index, compensation.max_index);
        self.backend
            .set_exposure_compensation_index(index)
            .map_err(CameraError::from)?;
        Ok(index as f64 * step)
    }

    fn set_white_balance(
        &mut self,
        temperature: Option<f32>,
        tint: Option<f32>,
    ) -> CameraResult<()> {
        self.require_bound()?;
        let white_balance = match (temperature, tint) {
            (None, None) => WhiteBalance::ContinuousAuto,
            (temperature, tint) => WhiteBalance::Locked {
                temperature: temperature.unwrap_or(DEFAULT_WHITE_BALANCE_TEMPERATURE),
                tint: tint.unwrap_or(DEFAULT_WHITE_BALANCE_TINT),
            },
        };
        self.backend
            .set_white_balance(white_balance)
            .map_err(CameraError::from)
    }
}
