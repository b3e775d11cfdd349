// SPDX-License-Identifier: GPL-3.0-only

//! Session lifecycle
//!
//! ```text
//! uninitialized ──initialize──▶ initialized ──▶ running ⇄ paused
//!                                                  │         │
//!                                                  └─dispose─┴──▶ disposed
//! ```
//!
//! Every transition is broadcast. Errors are broadcast too, but never change
//! the stored phase. A hardware "closed" notification pauses a running
//! session; the matching "running" notification only resumes it when the
//! pause came from the hardware rather than from the application.
//!
//! A session stays `initialized` when its first start fails, and both
//! `initialize` and `resume` retry the start from there.

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::HardwareEvent;
use crate::errors::{CameraError, CameraResult};
use crate::session::binder::SessionBinder;
use crate::session::events::{EventHub, LifecycleState, OrientationEvent};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    Disposed,
}

pub struct LifecycleStateMachine {
    phase: Phase,
    paused_by_user: bool,
    events: EventHub,
}

impl LifecycleStateMachine {
    pub fn new(events: EventHub) -> Self {
        Self {
            phase: Phase::Uninitialized,
            paused_by_user: false,
            events,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ensure_live(&self) -> CameraResult<()> {
        if self.phase == Phase::Disposed {
            return Err(disposed());
        }
        Ok(())
    }

    fn transition(&mut self, phase: Phase, state: LifecycleState) {
        debug!(from = ?self.phase, to = ?phase, "Lifecycle transition");
        self.phase = phase;
        self.events.emit_state(state);
    }

    /// Bind and start the session; a no-op once running or paused
    pub fn initialize(
        &mut self,
        backend: &mut dyn CameraBackend,
        binder: &mut SessionBinder,
    ) -> CameraResult<()> {
        match self.phase {
            Phase::Disposed => return Err(disposed()),
            Phase::Running | Phase::Paused => {
                debug!("Session already initialized");
                return Ok(());
            }
            Phase::Uninitialized => {
                binder.bind(backend)?;
                self.transition(Phase::Initialized, LifecycleState::Initialized);
            }
            Phase::Initialized => {
                debug!("Retrying session start");
                if !binder.is_bound() {
                    binder.bind(backend)?;
                }
            }
        }

        self.start(backend)?;
        info!("Camera session initialized");
        Ok(())
    }

    /// Stop delivering frames, keeping the binding
    ///
    /// Pausing a session the hardware already paused keeps it paused when
    /// the hardware comes back.
    pub fn pause(&mut self, backend: &mut dyn CameraBackend) -> CameraResult<()> {
        self.ensure_live()?;
        match self.phase {
            Phase::Running => {
                backend
                    .stop_running()
                    .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
                self.paused_by_user = true;
                self.transition(Phase::Paused, LifecycleState::Paused);
            }
            Phase::Paused if !self.paused_by_user => {
                debug!("Taking over hardware pause");
                if let Err(e) = backend.stop_running() {
                    warn!(error = %e, "Stopping hardware-paused session failed");
                }
                self.paused_by_user = true;
            }
            _ => debug!(phase = ?self.phase, "Pause ignored"),
        }
        Ok(())
    }

    /// Restart a paused session, or retry a start that failed
    pub fn resume(&mut self, backend: &mut dyn CameraBackend) -> CameraResult<()> {
        self.ensure_live()?;
        if !matches!(self.phase, Phase::Paused | Phase::Initialized) {
            debug!(phase = ?self.phase, "Resume ignored");
            return Ok(());
        }
        self.start(backend)
    }

    fn start(&mut self, backend: &mut dyn CameraBackend) -> CameraResult<()> {
        backend
            .start_running()
            .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
        self.paused_by_user = false;
        self.transition(Phase::Running, LifecycleState::Running);
        Ok(())
    }

    /// Keep the phase consistent after a rebind outside `initialize`
    ///
    /// An initialized session that is not paused must be running on the new
    /// binding.
    pub fn after_rebind(&mut self, backend: &mut dyn CameraBackend) -> CameraResult<()> {
        if !matches!(self.phase, Phase::Initialized | Phase::Running) || backend.is_running() {
            return Ok(());
        }
        self.start(backend)
    }

    /// Release everything; terminal
    pub fn dispose(&mut self, backend: &mut dyn CameraBackend, binder: &mut SessionBinder) {
        if self.phase == Phase::Disposed {
            return;
        }
        if backend.is_running() {
            if let Err(e) = backend.stop_running() {
                warn!(error = %e, "Stopping session during dispose failed");
            }
        }
        if let Err(e) = binder.unbind(backend) {
            warn!(error = %e, "Unbinding during dispose failed");
        }
        binder.reset();
        self.paused_by_user = false;
        self.transition(Phase::Disposed, LifecycleState::Disposed);
        info!("Camera session disposed");
    }

    /// Reconcile with a notification from the hardware
    pub fn on_hardware_event(&mut self, backend: &mut dyn CameraBackend, event: HardwareEvent) {
        match event {
            HardwareEvent::Closed => {
                if self.phase == Phase::Running {
                    info!("Camera closed by the system, pausing");
                    self.paused_by_user = false;
                    self.transition(Phase::Paused, LifecycleState::Paused);
                }
            }
            HardwareEvent::Running => match self.phase {
                Phase::Paused if self.paused_by_user => {
                    debug!("Camera available again, staying paused");
                    if let Err(e) = backend.stop_running() {
                        warn!(error = %e, "Keeping session paused failed");
                    }
                }
                Phase::Paused => {
                    info!("Camera available again, resuming");
                    self.transition(Phase::Running, LifecycleState::Running);
                }
                _ => {}
            },
            HardwareEvent::Error { code, message } => {
                warn!(%code, %message, "Camera reported an error");
                self.events.emit_hardware_error(&code, &message);
            }
            HardwareEvent::OrientationChanged(degrees) => {
                self.events
                    .emit_orientation(OrientationEvent::from_degrees(degrees));
            }
        }
    }
}

fn disposed() -> CameraError {
    CameraError::SessionNotReady("session has been disposed".into())
}
