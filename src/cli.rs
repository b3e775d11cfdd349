// SPDX-License-Identifier: GPL-3.0-only

//! Subcommand handlers
//!
//! Each handler opens a [`CameraSession`] over the virtual backend, applies
//! the requested lens and preset, then runs one operation (lens listing,
//! still capture, frame streaming or recording) and disposes the session.

use chrono::Local;
use iris_camera::backends::virtual_camera::{VirtualAuthorization, VirtualBackend};
use iris_camera::session::capture::PhotoRequest;
use iris_camera::session::catalog::LensCategory;
use iris_camera::{CameraSession, Config, FlashMode, ResolutionPreset};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

type CliResult = Result<(), Box<dyn std::error::Error>>;

const SAVE_FOLDER: &str = "IrisCamera";

fn open_session(config: &Config) -> Result<CameraSession, Box<dyn std::error::Error>> {
    let session = CameraSession::spawn(
        Box::new(VirtualBackend::with_default_units()),
        Arc::new(VirtualAuthorization::granted()),
        config,
    )?;
    Ok(session)
}

async fn prepare(
    session: &CameraSession,
    lens: Option<LensCategory>,
    preset: Option<ResolutionPreset>,
) -> CliResult {
    if let Some(preset) = preset {
        session.set_resolution_preset(preset).await?;
    }
    session.initialize().await?;
    if let Some(category) = lens {
        let lens = session.switch_lens(category).await?;
        println!("Using lens: {} ({})", lens.name, lens.category);
    }
    Ok(())
}

/// List all available lenses
pub async fn list_lenses(config: &Config, include_front: bool) -> CliResult {
    let session = open_session(config)?;
    let lenses = session.list_lenses(include_front).await?;

    if lenses.is_empty() {
        println!("No lenses found.");
    } else {
        println!("Available lenses:");
        println!();
        for lens in &lenses {
            println!("  [{}] {}", lens.id, lens.name);
            print!("      {} / {}", lens.position, lens.category);
            if let Some(fov) = lens.field_of_view {
                print!(", {:.0}° FOV", fov);
            }
            if lens.supports_focus {
                print!(", autofocus");
            }
            println!();
        }
    }
    println!();
    println!("Platform: {}", session.platform_version().await?);

    session.dispose().await?;
    Ok(())
}

/// Take a photo and write it as JPEG
pub async fn take_photo(
    config: &Config,
    lens: Option<LensCategory>,
    preset: Option<ResolutionPreset>,
    flash: Option<String>,
    output: Option<PathBuf>,
) -> CliResult {
    let session = open_session(config)?;
    prepare(&session, lens, preset).await?;

    println!("Capturing...");
    let request = PhotoRequest {
        flash: FlashMode::from_arg(flash.as_deref()),
        ..Default::default()
    };
    let jpeg = session.take_photo(request).await?;

    let output_path = match output {
        Some(path) if path.is_dir() => path.join(photo_file_name()),
        Some(path) => path,
        None => media_dir(dirs::picture_dir()).join(photo_file_name()),
    };
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output_path, &jpeg)?;
    println!("Photo saved: {} ({} bytes)", output_path.display(), jpeg.len());

    session.dispose().await?;
    Ok(())
}

/// Print analysis frames as they arrive
pub async fn stream_frames(
    config: &Config,
    lens: Option<LensCategory>,
    count: usize,
) -> CliResult {
    let session = open_session(config)?;
    let mut frames = session.subscribe_frames();
    prepare(&session, lens, None).await?;
    session.start_image_stream().await?;

    let start = Instant::now();
    for index in 0..count {
        let Some(frame) = frames.next().await else {
            break;
        };
        println!(
            "  frame {:>3}: {}x{} {} stride={} ({} bytes) +{}ms",
            index,
            frame.width,
            frame.height,
            frame.format,
            frame.bytes_per_row,
            frame.bytes.len(),
            start.elapsed().as_millis()
        );
    }

    session.stop_image_stream().await?;
    session.dispose().await?;
    Ok(())
}

/// Record a video for `duration` seconds
pub async fn record_video(
    config: &Config,
    lens: Option<LensCategory>,
    duration: u64,
    output: Option<PathBuf>,
    audio: bool,
) -> CliResult {
    let session = open_session(config)?;
    prepare(&session, lens, None).await?;

    let output_path = output.unwrap_or_else(|| {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        media_dir(dirs::video_dir()).join(format!("video_{}.mp4", timestamp))
    });
    let path = session
        .start_video_recording(Some(output_path), audio)
        .await?;

    println!("Output: {}", path.display());
    println!("Duration: {} seconds", duration);
    if audio {
        println!("Audio: enabled");
    }
    println!();
    println!("Recording...");

    tokio::time::sleep(Duration::from_secs(duration)).await;

    let final_path = session.stop_video_recording().await?;
    println!("Video finalized: {}", final_path.display());

    session.dispose().await?;
    Ok(())
}

fn photo_file_name() -> String {
    format!("photo_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"))
}

/// `~/Pictures/IrisCamera` style folder under the given XDG media dir
fn media_dir(base: Option<PathBuf>) -> PathBuf {
    base.or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SAVE_FOLDER)
}
