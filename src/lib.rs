// SPDX-License-Identifier: GPL-3.0-only

//! Iris Camera - cross-platform camera session core
//!
//! This library owns everything a camera plugin does between the host
//! application and the platform camera stack: lens discovery, session
//! binding, still and video capture, device controls, lifecycle and the
//! event streams pushed back to the application.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`api`]: Method-name command surface over JSON argument bags
//! - [`session`]: Session thread, lens catalog, binder, capture and lifecycle
//! - [`backends`]: Camera hardware abstraction and the virtual backend
//! - [`media`]: Pixel conversion and frame delivery
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use iris_camera::backends::virtual_camera::{VirtualAuthorization, VirtualBackend};
//! use iris_camera::{CameraSession, Config};
//! use std::sync::Arc;
//!
//! # async fn run() -> iris_camera::CameraResult<()> {
//! let session = CameraSession::spawn(
//!     Box::new(VirtualBackend::with_default_units()),
//!     Arc::new(VirtualAuthorization::granted()),
//!     &Config::default(),
//! )?;
//! session.initialize().await?;
//! let jpeg = session.take_photo(Default::default()).await?;
//! std::fs::write("photo.jpg", jpeg)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod session;

// Re-export commonly used types
pub use backends::camera::types::{ExposureMode, FlashMode, FocusMode};
pub use config::Config;
pub use constants::ResolutionPreset;
pub use errors::{CameraError, CameraResult};
pub use session::CameraSession;
