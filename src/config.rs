// SPDX-License-Identifier: GPL-3.0-only

//! Session defaults loaded from disk
//!
//! The configuration is a JSON document at
//! `<config dir>/iris-camera/config.json`. Every field is optional; missing
//! fields and a missing file both fall back to [`Config::default`].

use crate::backends::camera::types::{ExposureMode, FocusMode};
use crate::constants::ResolutionPreset;
use crate::constants::session::DEFAULT_EVENT_CAPACITY;
use crate::errors::{CameraError, CameraResult};
use crate::session::binder::FrameRateRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR_NAME: &str = "iris-camera";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Preset used until the application sets one
    pub resolution_preset: ResolutionPreset,
    pub frame_rate: FrameRateRange,
    pub focus_mode: FocusMode,
    pub exposure_mode: ExposureMode,
    /// Directory for recordings started without a path (system temp dir when unset)
    pub recording_dir: Option<PathBuf>,
    /// Capacity of each broadcast event stream
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolution_preset: ResolutionPreset::default(),
            frame_rate: FrameRateRange::default(),
            focus_mode: FocusMode::default(),
            exposure_mode: ExposureMode::default(),
            recording_dir: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load(path: &Path) -> CameraResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CameraError::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("failed to parse {}: {e}", path.display())))?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location, or defaults when there is none
    pub fn load_default() -> CameraResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> CameraResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| {
                    CameraError::Config(format!("failed to create {}: {e}", parent.display()))
                })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CameraError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| CameraError::Config(format!("failed to write {}: {e}", path.display())))
    }
}
