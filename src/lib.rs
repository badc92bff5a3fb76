//! APIS servo positioning library.
//!
//! Aims the deterrent laser's pan/tilt bracket: angle/pulse conversion,
//! three PWM backends, a background interpolation task, a timing-based
//! hardware watchdog, and the laser interlock that fires when the watchdog
//! gives up on the servos.
//!
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module, so the whole crate builds and tests on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod safety;
pub mod servo;

pub use config::ServoConfig;
pub use error::{MoveStatus, ServoError};
pub use servo::controller::{ServoController, ServoStats};
pub use servo::{Axis, Position};
