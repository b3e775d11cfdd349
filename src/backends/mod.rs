// SPDX-License-Identifier: GPL-3.0-only

//! Camera backends
//!
//! [`camera`] defines the hardware contract every platform implements;
//! [`virtual_camera`] is the synthetic implementation used by the CLI and
//! the tests.

pub mod camera;
pub mod virtual_camera;
