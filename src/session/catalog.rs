// SPDX-License-Identifier: GPL-3.0-only

//! Lens enumeration and classification
//!
//! Units are enumerated fresh on every query and turned into
//! [`LensDescriptor`]s. A category declared by the platform wins; otherwise
//! the lens is classified by the horizontal field of view of its shortest
//! focal length.

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::{CameraUnit, DeclaredDeviceType, LensPosition};
use crate::constants::lens::{TELEPHOTO_MAX_FOV, ULTRA_WIDE_MIN_FOV};
use crate::errors::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LensCategory {
    Wide,
    UltraWide,
    Telephoto,
    TrueDepth,
    Dual,
    Triple,
    Continuity,
    External,
    Unknown,
}

impl LensCategory {
    pub const ALL: [LensCategory; 9] = [
        LensCategory::Wide,
        LensCategory::UltraWide,
        LensCategory::Telephoto,
        LensCategory::TrueDepth,
        LensCategory::Dual,
        LensCategory::Triple,
        LensCategory::Continuity,
        LensCategory::External,
        LensCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LensCategory::Wide => "wide",
            LensCategory::UltraWide => "ultraWide",
            LensCategory::Telephoto => "telephoto",
            LensCategory::TrueDepth => "trueDepth",
            LensCategory::Dual => "dual",
            LensCategory::Triple => "triple",
            LensCategory::Continuity => "continuity",
            LensCategory::External => "external",
            LensCategory::Unknown => "unknown",
        }
    }
}

impl FromStr for LensCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown lens category '{s}'"))
    }
}

impl std::fmt::Display for LensCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public description of one camera lens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensDescriptor {
    pub id: String,
    pub name: String,
    pub position: LensPosition,
    pub category: LensCategory,
    pub supports_focus: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    /// Horizontal field of view in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_of_view: Option<f64>,
}

impl LensDescriptor {
    pub fn describe(unit: &CameraUnit) -> Self {
        let focal_length = unit.min_focal_length();
        let field_of_view = match (focal_length, unit.sensor_width_mm) {
            (Some(focal), Some(sensor)) => horizontal_fov_degrees(focal, sensor),
            _ => None,
        };

        let category = unit
            .declared_type
            .and_then(declared_category)
            .or_else(|| field_of_view.map(classify_fov))
            .unwrap_or(match unit.position {
                LensPosition::External => LensCategory::External,
                _ => LensCategory::Unknown,
            });

        Self {
            id: unit.id.clone(),
            name: unit.name.clone(),
            position: unit.position,
            category,
            supports_focus: unit.supports_focus,
            focal_length,
            field_of_view,
        }
    }
}

fn declared_category(declared: DeclaredDeviceType) -> Option<LensCategory> {
    match declared {
        DeclaredDeviceType::WideAngle => Some(LensCategory::Wide),
        DeclaredDeviceType::UltraWide => Some(LensCategory::UltraWide),
        DeclaredDeviceType::Telephoto => Some(LensCategory::Telephoto),
        DeclaredDeviceType::TrueDepth => Some(LensCategory::TrueDepth),
        DeclaredDeviceType::Dual | DeclaredDeviceType::DualWide => Some(LensCategory::Dual),
        DeclaredDeviceType::Triple => Some(LensCategory::Triple),
        DeclaredDeviceType::Continuity => Some(LensCategory::Continuity),
        DeclaredDeviceType::Other => None,
    }
}

/// `2 * atan(sensor / (2 * focal))` in degrees
pub fn horizontal_fov_degrees(focal_length_mm: f64, sensor_width_mm: f64) -> Option<f64> {
    if focal_length_mm <= 0.0 || sensor_width_mm <= 0.0 {
        return None;
    }
    Some((2.0 * (sensor_width_mm / (2.0 * focal_length_mm)).atan()).to_degrees())
}

pub fn classify_fov(fov_degrees: f64) -> LensCategory {
    if fov_degrees > ULTRA_WIDE_MIN_FOV {
        LensCategory::UltraWide
    } else if fov_degrees < TELEPHOTO_MAX_FOV {
        LensCategory::Telephoto
    } else {
        LensCategory::Wide
    }
}

/// Snapshot of the lenses present at enumeration time
#[derive(Debug, Clone)]
pub struct LensCatalog {
    lenses: Vec<LensDescriptor>,
}

impl LensCatalog {
    pub fn enumerate(backend: &dyn CameraBackend) -> CameraResult<Self> {
        let units = backend
            .enumerate_units()
            .map_err(|e| CameraError::AccessFailed(e.to_string()))?;
        let lenses: Vec<LensDescriptor> = units.iter().map(LensDescriptor::describe).collect();
        debug!(count = lenses.len(), "Enumerated camera units");
        Ok(Self { lenses })
    }

    /// Lenses shown to the caller, optionally hiding front units
    pub fn visible(&self, include_front: bool) -> Vec<LensDescriptor> {
        self.lenses
            .iter()
            .filter(|l| include_front || l.position != LensPosition::Front)
            .cloned()
            .collect()
    }

    /// First back lens, else the first lens of any position
    pub fn default_lens(&self) -> Option<&LensDescriptor> {
        self.lenses
            .iter()
            .find(|l| l.position == LensPosition::Back)
            .or_else(|| self.lenses.first())
    }

    pub fn find_by_category(&self, category: LensCategory) -> CameraResult<&LensDescriptor> {
        self.lenses
            .iter()
            .find(|l| l.category == category)
            .ok_or_else(|| CameraError::LensNotFound(category.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, position: LensPosition) -> CameraUnit {
        CameraUnit::new(id, format!("Camera {id}"), position)
    }

    #[test]
    fn test_fov_classification() {
        // 1.8mm on a 5.6mm sensor is ~114 degrees
        let ultra = unit("0", LensPosition::Back).with_optics(&[1.8], 5.6);
        assert_eq!(LensDescriptor::describe(&ultra).category, LensCategory::UltraWide);

        let wide = unit("1", LensPosition::Back).with_optics(&[4.25], 5.6);
        assert_eq!(LensDescriptor::describe(&wide).category, LensCategory::Wide);

        let tele = unit("2", LensPosition::Back).with_optics(&[9.0], 5.6);
        let desc = LensDescriptor::describe(&tele);
        assert_eq!(desc.category, LensCategory::Telephoto);
        assert!((desc.field_of_view.unwrap() - 34.57).abs() < 0.1);
    }

    #[test]
    fn test_threshold_boundaries_are_wide() {
        assert_eq!(classify_fov(75.0), LensCategory::Wide);
        assert_eq!(classify_fov(40.0), LensCategory::Wide);
        assert_eq!(classify_fov(75.01), LensCategory::UltraWide);
        assert_eq!(classify_fov(39.99), LensCategory::Telephoto);
    }

    #[test]
    fn test_shortest_focal_length_drives_classification() {
        let zoom = unit("0", LensPosition::Back).with_optics(&[9.0, 1.8], 5.6);
        let desc = LensDescriptor::describe(&zoom);
        assert_eq!(desc.focal_length, Some(1.8));
        assert_eq!(desc.category, LensCategory::UltraWide);
    }

    #[test]
    fn test_declared_type_wins() {
        let triple = unit("0", LensPosition::Back)
            .with_optics(&[9.0], 5.6)
            .with_declared_type(DeclaredDeviceType::Triple);
        assert_eq!(LensDescriptor::describe(&triple).category, LensCategory::Triple);

        let other = unit("1", LensPosition::Back)
            .with_optics(&[9.0], 5.6)
            .with_declared_type(DeclaredDeviceType::Other);
        assert_eq!(LensDescriptor::describe(&other).category, LensCategory::Telephoto);
    }

    #[test]
    fn test_missing_optics() {
        assert_eq!(
            LensDescriptor::describe(&unit("0", LensPosition::External)).category,
            LensCategory::External
        );
        let desc = LensDescriptor::describe(&unit("1", LensPosition::Back));
        assert_eq!(desc.category, LensCategory::Unknown);
        assert_eq!(desc.field_of_view, None);
    }

    #[test]
    fn test_default_lens_prefers_back() {
        let catalog = LensCatalog {
            lenses: vec![
                LensDescriptor::describe(&unit("front", LensPosition::Front)),
                LensDescriptor::describe(&unit("backA", LensPosition::Back)),
                LensDescriptor::describe(&unit("backB", LensPosition::Back)),
            ],
        };
        assert_eq!(catalog.default_lens().unwrap().id, "backA");
        assert_eq!(catalog.visible(false).len(), 2);
        assert_eq!(catalog.visible(true).len(), 3);

        let fronts_only = LensCatalog {
            lenses: vec![LensDescriptor::describe(&unit("front", LensPosition::Front))],
        };
        assert_eq!(fronts_only.default_lens().unwrap().id, "front");
        assert!(LensCatalog { lenses: vec![] }.default_lens().is_none());
    }

    #[test]
    fn test_find_by_category() {
        let catalog = LensCatalog {
            lenses: vec![LensDescriptor::describe(
                &unit("0", LensPosition::Back).with_optics(&[4.25], 5.6),
            )],
        };
        assert_eq!(catalog.find_by_category(LensCategory::Wide).unwrap().id, "0");
        assert_eq!(
            catalog.find_by_category(LensCategory::Telephoto),
            Err(CameraError::LensNotFound("telephoto".into()))
        );
    }

    #[test]
    fn test_descriptor_json_shape() {
        let desc = LensDescriptor::describe(
            &unit("0", LensPosition::Back)
                .with_optics(&[1.8], 5.6)
                .with_focus(true),
        );
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["category"], "ultraWide");
        assert_eq!(json["position"], "back");
        assert_eq!(json["supportsFocus"], true);
        assert!(json.get("fieldOfView").is_some());
    }
}
