//! Pan/tilt servo positioning: pure domain types and the controller.
//!
//! ```text
//!  caller threads ──▶ ServoController ──(one mutex)──▶ motion task
//!                          │                              │
//!                     convert (angle ⇄ µs)         interpolation + watchdog
//!                          │                              │
//!                          └────────── PwmPort ◀──────────┘
//! ```
//!
//! Everything except [`controller`] is pure logic with no I/O, so it is
//! unit-tested directly; the controller is exercised end-to-end in
//! `tests/integration/`.

pub mod controller;
pub mod convert;
pub mod motion;
pub mod watchdog;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ServoError;

/// One of the two rotational degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal.
    Pan,
    /// Vertical (never points above the horizon).
    Tilt,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Pan, Axis::Tilt];

    /// Upper-case axis name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pan => "PAN",
            Self::Tilt => "TILT",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Axis {
    type Error = ServoError;

    /// Map a raw axis index (0 = pan, 1 = tilt) as used on the wire.
    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::Pan),
            1 => Ok(Self::Tilt),
            _ => Err(ServoError::InvalidAxis),
        }
    }
}

/// A pan/tilt pair in degrees.
///
/// Used both as a commanded target and as a live snapshot of where the
/// servos were last driven.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub pan_deg: f32,
    pub tilt_deg: f32,
}

impl Position {
    pub const fn new(pan_deg: f32, tilt_deg: f32) -> Self {
        Self { pan_deg, tilt_deg }
    }

    pub const fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Pan => self.pan_deg,
            Axis::Tilt => self.tilt_deg,
        }
    }

    /// Copy with one axis replaced.
    #[must_use]
    pub const fn with(mut self, axis: Axis, angle_deg: f32) -> Self {
        match axis {
            Axis::Pan => self.pan_deg = angle_deg,
            Axis::Tilt => self.tilt_deg = angle_deg,
        }
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(pan={:.1}\u{00b0}, tilt={:.1}\u{00b0})", self.pan_deg, self.tilt_deg)
    }
}
