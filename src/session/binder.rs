// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline binding
//!
//! [`SessionBinder`] owns the [`SessionConfig`] and turns it into a
//! [`BindPlan`]: one lens with preview, still and (while streaming) analysis
//! outputs, attached as a single unit. A rebind first detaches everything,
//! so at most one lens is ever attached. Rebinding is all-or-nothing: the
//! config is committed only once the new plan is attached, and a failed
//! attach puts the previous plan back. A failed detach aborts the rebind
//! before anything new is attached.

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{
    AnalysisOutput, Backpressure, BindPlan, ExposureMode, FocusMode, FpsRange, OutputSet,
    Resolution,
};
use crate::config::Config;
use crate::constants::ResolutionPreset;
use crate::errors::{CameraError, CameraResult};
use crate::media::frames::FrameSink;
use crate::session::catalog::LensCatalog;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Requested frame-rate bounds, either of which may be absent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameRateRange {
    pub min_fps: Option<f64>,
    pub max_fps: Option<f64>,
}

impl FrameRateRange {
    pub fn new(min_fps: Option<f64>, max_fps: Option<f64>) -> Self {
        Self { min_fps, max_fps }
    }

    /// Integral range with `min <= max`, `None` when unconstrained
    ///
    /// A single bound is mirrored to both ends.
    pub fn normalized(&self) -> Option<FpsRange> {
        let (lo, hi) = match (self.min_fps, self.max_fps) {
            (None, None) => return None,
            (Some(min), None) => (min, min),
            (None, Some(max)) => (max, max),
            (Some(min), Some(max)) => (min, max),
        };
        let lo = lo.round().max(0.0) as u32;
        let hi = hi.round().max(0.0) as u32;
        Some(FpsRange {
            min: lo.min(hi),
            max: lo.max(hi),
        })
    }
}

/// Everything that determines the next bind
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// `None` until a lens is chosen; the catalog default is used then
    pub lens_id: Option<String>,
    pub preset: ResolutionPreset,
    pub frame_rate: FrameRateRange,
    pub streaming: bool,
    pub focus_mode: FocusMode,
    pub exposure_mode: ExposureMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            lens_id: None,
            preset: config.resolution_preset,
            frame_rate: config.frame_rate,
            streaming: false,
            focus_mode: config.focus_mode,
            exposure_mode: config.exposure_mode,
        }
    }
}

/// Summary of the currently attached pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSession {
    pub lens_id: String,
    pub target_size: Option<Resolution>,
    pub frame_rate: Option<FpsRange>,
    pub streaming: bool,
}

impl From<&BindPlan> for BoundSession {
    fn from(plan: &BindPlan) -> Self {
        Self {
            lens_id: plan.lens_id.clone(),
            target_size: plan.target_size,
            frame_rate: plan.frame_rate,
            streaming: plan.outputs.analysis.is_some(),
        }
    }
}

pub struct SessionBinder {
    config: SessionConfig,
    defaults: SessionConfig,
    active: Option<BindPlan>,
    frames: FrameSink,
    detach_count: u64,
}

impl SessionBinder {
    pub fn new(defaults: SessionConfig, frames: FrameSink) -> Self {
        Self {
            config: defaults.clone(),
            defaults,
            active: None,
            frames,
            detach_count: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_bound(&self) -> bool {
        self.active.is_some()
    }

    pub fn bound(&self) -> Option<BoundSession> {
        self.active.as_ref().map(BoundSession::from)
    }

    /// Number of successful detaches; anything tied to the old inputs
    /// (a running recording) ended whenever this moves
    pub fn detach_count(&self) -> u64 {
        self.detach_count
    }

    /// Update settings that are applied to hardware directly, not by rebinding
    pub fn set_focus_mode(&mut self, mode: FocusMode) {
        self.config.focus_mode = mode;
    }

    pub fn set_exposure_mode(&mut self, mode: ExposureMode) {
        self.config.exposure_mode = mode;
    }

    /// Build the plan for `config`
    pub fn plan(&self, config: &SessionConfig, lens_id: &str) -> BindPlan {
        let analysis = config.streaming.then(|| AnalysisOutput {
            backpressure: Backpressure::KeepOnlyLatest,
            sink: self.frames.clone(),
        });
        BindPlan {
            lens_id: lens_id.to_string(),
            target_size: config.preset.target_size(),
            frame_rate: config.frame_rate.normalized(),
            outputs: OutputSet {
                preview: true,
                still: true,
                analysis,
            },
        }
    }

    /// Bind the current config
    pub fn bind(&mut self, backend: &mut dyn CameraBackend) -> CameraResult<BoundSession> {
        self.bind_config(backend, self.config.clone())
    }

    /// Apply a config change, rebinding only if something is bound
    ///
    /// Returns the new binding, or `None` when the change was only stored.
    pub fn reconfigure(
        &mut self,
        backend: &mut dyn CameraBackend,
        update: impl FnOnce(&mut SessionConfig),
    ) -> CameraResult<Option<BoundSession>> {
        let mut candidate = self.config.clone();
        update(&mut candidate);
        if self.active.is_none() {
            self.frames.set_enabled(candidate.streaming);
            self.config = candidate;
            return Ok(None);
        }
        self.bind_config(backend, candidate).map(Some)
    }

    /// Select a lens and bind it
    pub fn bind_lens(
        &mut self,
        backend: &mut dyn CameraBackend,
        lens_id: &str,
    ) -> CameraResult<BoundSession> {
        let mut candidate = self.config.clone();
        candidate.lens_id = Some(lens_id.to_string());
        self.bind_config(backend, candidate)
    }

    fn bind_config(
        &mut self,
        backend: &mut dyn CameraBackend,
        mut candidate: SessionConfig,
    ) -> CameraResult<BoundSession> {
        let lens_id = match candidate.lens_id.clone() {
            Some(id) => id,
            None => {
                let catalog = LensCatalog::enumerate(backend)?;
                let lens = catalog
                    .default_lens()
                    .ok_or_else(|| CameraError::LensNotFound("default".into()))?;
                debug!(lens = %lens.id, "Selected default lens");
                candidate.lens_id = Some(lens.id.clone());
                lens.id.clone()
            }
        };

        let plan = self.plan(&candidate, &lens_id);
        let previous = self.active.take();

        if let Err(e) = backend.detach_all() {
            warn!(error = %e, "Detaching previous binding failed, keeping it");
            self.active = previous;
            return Err(CameraError::ConfigurationFailed(e.to_string()));
        }
        self.detach_count += 1;

        self.frames.set_enabled(candidate.streaming);
        if let Err(e) = backend.attach(&plan) {
            warn!(lens = %lens_id, error = %e, "Attach failed");
            self.restore(backend, previous);
            return Err(CameraError::ConfigurationFailed(e.to_string()));
        }

        let bound = BoundSession::from(&plan);
        info!(
            lens = %bound.lens_id,
            size = ?bound.target_size,
            fps = ?bound.frame_rate,
            streaming = bound.streaming,
            "Pipeline bound"
        );
        self.active = Some(plan);
        self.config = candidate;
        self.apply_modes(backend);
        Ok(bound)
    }

    fn restore(&mut self, backend: &mut dyn CameraBackend, previous: Option<BindPlan>) {
        self.frames.set_enabled(self.config.streaming);
        let Some(previous) = previous else {
            return;
        };
        match backend.attach(&previous) {
            Ok(()) => {
                debug!(lens = %previous.lens_id, "Previous binding restored");
                self.active = Some(previous);
                self.apply_modes(backend);
            }
            Err(e) => {
                warn!(lens = %previous.lens_id, error = %e, "Restoring previous binding failed");
            }
        }
    }

    fn apply_modes(&self, backend: &mut dyn CameraBackend) {
        if let Err(e) = backend.set_focus_mode(self.config.focus_mode) {
            warn!(mode = self.config.focus_mode.as_str(), error = %e, "Could not apply focus mode");
        }
        if let Err(e) = backend.set_exposure_mode(self.config.exposure_mode) {
            warn!(
                mode = self.config.exposure_mode.as_str(),
                error = %e,
                "Could not apply exposure mode"
            );
        }
    }

    /// Detach everything; the config is kept
    pub fn unbind(&mut self, backend: &mut dyn CameraBackend) -> CameraResult<()> {
        self.active = None;
        self.frames.set_enabled(false);
        backend
            .detach_all()
            .map_err(|e| CameraError::ConfigurationFailed(e.to_string()))?;
        self.detach_count += 1;
        Ok(())
    }

    /// Forget all settings, back to the construction defaults
    pub fn reset(&mut self) {
        self.config = self.defaults.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::{BackendOp, VirtualBackend};

    fn binder() -> SessionBinder {
        SessionBinder::new(SessionConfig::default(), FrameSink::new())
    }

    #[test]
    fn test_frame_rate_normalization() {
        assert_eq!(FrameRateRange::new(None, None).normalized(), None);
        assert_eq!(
            FrameRateRange::new(Some(10.0), Some(5.0)).normalized(),
            Some(FpsRange { min: 5, max: 10 })
        );
        assert_eq!(
            FrameRateRange::new(None, Some(30.0)).normalized(),
            Some(FpsRange { min: 30, max: 30 })
        );
        assert_eq!(
            FrameRateRange::new(Some(23.6), None).normalized(),
            Some(FpsRange { min: 24, max: 24 })
        );
    }

    #[test]
    fn test_preset_target_sizes() {
        assert_eq!(ResolutionPreset::Low.target_size(), Some(Resolution::new(640, 480)));
        assert_eq!(ResolutionPreset::Medium.target_size(), Some(Resolution::new(1280, 720)));
        assert_eq!(ResolutionPreset::High.target_size(), Some(Resolution::new(1920, 1080)));
        assert_eq!(ResolutionPreset::VeryHigh.target_size(), Some(Resolution::new(2560, 1440)));
        assert_eq!(ResolutionPreset::UltraHigh.target_size(), Some(Resolution::new(3840, 2160)));
        assert_eq!(ResolutionPreset::Max.target_size(), None);
    }

    #[test]
    fn test_plan_outputs_follow_streaming() {
        let binder = binder();
        let mut config = SessionConfig::default();
        let plan = binder.plan(&config, "0");
        assert!(plan.outputs.preview && plan.outputs.still);
        assert!(plan.outputs.analysis.is_none());

        config.streaming = true;
        let plan = binder.plan(&config, "0");
        let analysis = plan.outputs.analysis.expect("analysis output");
        assert_eq!(analysis.backpressure, Backpressure::KeepOnlyLatest);
    }

    #[test]
    fn test_bind_selects_default_lens() {
        let mut backend = VirtualBackend::with_default_units();
        let mut binder = binder();
        let bound = binder.bind(&mut backend).unwrap();
        assert_eq!(bound.lens_id, "0");
        assert_eq!(binder.config().lens_id.as_deref(), Some("0"));
        assert_eq!(bound.target_size, Some(Resolution::new(1920, 1080)));
    }

    #[test]
    fn test_bind_without_units_is_lens_not_found() {
        let mut backend = VirtualBackend::new(Vec::new());
        let mut binder = binder();
        assert!(matches!(
            binder.bind(&mut backend),
            Err(CameraError::LensNotFound(_))
        ));
        assert!(!binder.is_bound());
    }

    #[test]
    fn test_reconfigure_unbound_only_stores() {
        let mut backend = VirtualBackend::with_default_units();
        let probe = backend.probe();
        let mut binder = binder();
        let result = binder
            .reconfigure(&mut backend, |c| c.preset = ResolutionPreset::Low)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(binder.config().preset, ResolutionPreset::Low);
        assert!(probe.ops().is_empty());
    }

    #[test]
    fn test_failed_attach_restores_previous_plan() {
        let mut backend = VirtualBackend::with_default_units();
        let probe = backend.probe();
        let mut binder = binder();
        binder.bind(&mut backend).unwrap();

        probe.fail_next_attach("sensor busy");
        let err = binder
            .reconfigure(&mut backend, |c| c.preset = ResolutionPreset::UltraHigh)
            .unwrap_err();
        assert!(matches!(err, CameraError::ConfigurationFailed(_)));

        // Config untouched, previous plan re-attached
        assert_eq!(binder.config().preset, ResolutionPreset::High);
        let bound = binder.bound().unwrap();
        assert_eq!(bound.target_size, Some(Resolution::new(1920, 1080)));
        assert_eq!(probe.attached_lens().as_deref(), Some("0"));
        assert!(probe.max_simultaneous_inputs() <= 1);
    }

    #[test]
    fn test_failed_detach_keeps_previous_binding() {
        let mut backend = VirtualBackend::with_default_units();
        let probe = backend.probe();
        let mut binder = binder();
        binder.bind(&mut backend).unwrap();
        let detaches = binder.detach_count();

        probe.fail_next_detach("device busy");
        let err = binder.bind_lens(&mut backend, "3").unwrap_err();
        assert!(matches!(err, CameraError::ConfigurationFailed(_)));

        // Nothing new was attached on top of the old input
        assert!(!probe
            .ops()
            .iter()
            .any(|op| matches!(op, BackendOp::Attach { lens_id, .. } if lens_id == "3")));
        assert_eq!(probe.max_simultaneous_inputs(), 1);
        assert_eq!(binder.bound().unwrap().lens_id, "0");
        assert_eq!(binder.config().lens_id.as_deref(), Some("0"));
        assert_eq!(binder.detach_count(), detaches);

        // The next attempt goes through
        binder.bind_lens(&mut backend, "3").unwrap();
        assert_eq!(probe.attached_lens().as_deref(), Some("3"));
        assert_eq!(binder.detach_count(), detaches + 1);
    }

    #[test]
    fn test_rebind_detaches_before_attach() {
        let mut backend = VirtualBackend::with_default_units();
        let probe = backend.probe();
        let mut binder = binder();
        binder.bind(&mut backend).unwrap();
        binder.bind_lens(&mut backend, "3").unwrap();

        let ops = probe.ops();
        let attach_positions: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, BackendOp::Attach { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(attach_positions.len(), 2);
        assert!(matches!(ops[attach_positions[1] - 1], BackendOp::DetachAll));
        assert_eq!(probe.max_simultaneous_inputs(), 1);
    }
}
