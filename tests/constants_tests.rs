// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use iris_camera::ResolutionPreset;

#[test]
fn test_resolution_preset_values() {
    assert_eq!(ResolutionPreset::ALL.len(), 6);
    assert_eq!(ResolutionPreset::default(), ResolutionPreset::High);
}

#[test]
fn test_resolution_preset_target_sizes() {
    let expected = [
        (ResolutionPreset::Low, Some((640, 480))),
        (ResolutionPreset::Medium, Some((1280, 720))),
        (ResolutionPreset::High, Some((1920, 1080))),
        (ResolutionPreset::VeryHigh, Some((2560, 1440))),
        (ResolutionPreset::UltraHigh, Some((3840, 2160))),
        (ResolutionPreset::Max, None),
    ];
    for (preset, size) in expected {
        assert_eq!(
            preset.target_size().map(|r| (r.width, r.height)),
            size,
            "Unexpected size for {:?}",
            preset
        );
    }
}

#[test]
fn test_resolution_preset_ordering() {
    // Constrained presets are ordered from lowest to highest pixel count
    let mut prev_pixels = 0u32;
    for preset in ResolutionPreset::ALL {
        if let Some(size) = preset.target_size() {
            let pixels = size.width * size.height;
            assert!(pixels > prev_pixels, "Presets should be ordered");
            prev_pixels = pixels;
        }
    }
}

#[test]
fn test_resolution_preset_names() {
    for preset in ResolutionPreset::ALL {
        assert!(
            !preset.display_name().is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
        assert_eq!(preset.as_str().parse::<ResolutionPreset>(), Ok(preset));
    }
    assert!("fourK".parse::<ResolutionPreset>().is_err());
}
