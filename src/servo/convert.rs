//! Angle ⇄ pulse-width conversion with per-axis mechanical clamping.
//!
//! Every PWM backend consumes nothing but pulse widths in microseconds;
//! this module is the only place that knows how degrees map onto them.

use serde::{Deserialize, Serialize};

/// Tolerance used by [`AxisCalibration::is_valid`].
pub const ANGLE_EPSILON_DEG: f32 = 0.01;

/// Mechanical limits and pulse range of a single servo axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    pub min_deg: f32,
    pub center_deg: f32,
    pub max_deg: f32,
    /// Pulse width at `min_deg`.
    pub pulse_min_us: u32,
    /// Nominal pulse at `center_deg` (informational; the mapping is linear).
    pub pulse_center_us: u32,
    /// Pulse width at `max_deg`.
    pub pulse_max_us: u32,
}

impl AxisCalibration {
    /// Pan defaults: ±45° around straight ahead.
    pub const PAN: Self = Self {
        min_deg: -45.0,
        center_deg: 0.0,
        max_deg: 45.0,
        pulse_min_us: 1000,
        pulse_center_us: 1500,
        pulse_max_us: 2000,
    };

    /// Tilt defaults: 0° (horizontal) down to −30°, resting at −15°.
    pub const TILT: Self = Self {
        min_deg: -30.0,
        center_deg: -15.0,
        max_deg: 0.0,
        pulse_min_us: 1000,
        pulse_center_us: 1500,
        pulse_max_us: 2000,
    };

    /// Bound `angle_deg` to `[min_deg, max_deg]`. NaN maps to center.
    pub fn clamp(&self, angle_deg: f32) -> f32 {
        if angle_deg.is_nan() {
            self.center_deg
        } else if angle_deg < self.min_deg {
            self.min_deg
        } else if angle_deg > self.max_deg {
            self.max_deg
        } else {
            angle_deg
        }
    }

    /// True when clamping would not move the angle (within 0.01°).
    pub fn is_valid(&self, angle_deg: f32) -> bool {
        (self.clamp(angle_deg) - angle_deg).abs() < ANGLE_EPSILON_DEG
    }

    /// Map an angle onto the pulse range, clamping it first.
    pub fn angle_to_pulse(&self, angle_deg: f32) -> u32 {
        let clamped = self.clamp(angle_deg);
        let normalized = (clamped - self.min_deg) / (self.max_deg - self.min_deg);
        let span = self.pulse_max_us.saturating_sub(self.pulse_min_us) as f32;
        self.pulse_min_us + (normalized * span).round() as u32
    }

    /// Inverse of [`angle_to_pulse`](Self::angle_to_pulse); the pulse is
    /// clamped to the calibrated range first.
    pub fn pulse_to_angle(&self, pulse_us: u32) -> f32 {
        let span = self.pulse_max_us.saturating_sub(self.pulse_min_us);
        if span == 0 {
            return self.min_deg;
        }
        let pulse_us = pulse_us.max(self.pulse_min_us).min(self.pulse_max_us);
        let normalized = (pulse_us - self.pulse_min_us) as f32 / span as f32;
        self.min_deg + normalized * (self.max_deg - self.min_deg)
    }

    /// Degrees represented by a single microsecond of pulse width.
    pub fn degrees_per_us(&self) -> f32 {
        (self.max_deg - self.min_deg) / self.pulse_max_us.saturating_sub(self.pulse_min_us) as f32
    }
}
