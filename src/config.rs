//! Servo controller configuration.
//!
//! All tunable parameters for the positioning core. Defaults match the
//! shipped pan/tilt bracket; values can be overridden from a JSON file via
//! [`JsonConfigStore`](crate::adapters::config_file::JsonConfigStore).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::servo::convert::AxisCalibration;
use crate::servo::{Axis, Position};

/// Core servo configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    // --- Geometry ---
    /// Pan axis limits and pulse range.
    pub pan: AxisCalibration,
    /// Tilt axis limits and pulse range.
    pub tilt: AxisCalibration,

    // --- PWM ---
    /// Servo frame rate (50 Hz = 20 ms period).
    pub pwm_frequency_hz: u32,

    // --- Motion ---
    /// Duration of one interpolated move, start to target.
    pub move_duration_ms: u32,
    /// Interpolation tick period.
    pub tick_ms: u32,

    // --- Watchdog ---
    /// How often the watchdog runs inside the motion loop.
    pub watchdog_interval_ms: u32,
    /// A move is late once it exceeds `move_duration_ms * factor`.
    pub watchdog_timeout_factor: u32,
    /// Consecutive late checks before the fault escalates.
    pub max_consecutive_failures: u32,

    // --- Self-test ---
    /// Poll period while waiting for a self-test position to settle.
    pub self_test_poll_ms: u32,
    /// Polls per position before the self-test gives up.
    pub self_test_max_polls: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pan: AxisCalibration::PAN,
            tilt: AxisCalibration::TILT,

            pwm_frequency_hz: 50,

            move_duration_ms: 45,
            tick_ms: 5, // 200 Hz

            watchdog_interval_ms: 100,
            watchdog_timeout_factor: 4,
            max_consecutive_failures: 3,

            self_test_poll_ms: 10,
            self_test_max_polls: 20,
        }
    }
}

impl ServoConfig {
    pub fn axis(&self, axis: Axis) -> &AxisCalibration {
        match axis {
            Axis::Pan => &self.pan,
            Axis::Tilt => &self.tilt,
        }
    }

    /// Bound an angle to the axis's mechanical limits.
    pub fn clamp(&self, axis: Axis, angle_deg: f32) -> f32 {
        self.axis(axis).clamp(angle_deg)
    }

    pub fn is_valid(&self, axis: Axis, angle_deg: f32) -> bool {
        self.axis(axis).is_valid(angle_deg)
    }

    pub fn angle_to_pulse(&self, axis: Axis, angle_deg: f32) -> u32 {
        self.axis(axis).angle_to_pulse(angle_deg)
    }

    pub fn pulse_to_angle(&self, axis: Axis, pulse_us: u32) -> f32 {
        self.axis(axis).pulse_to_angle(pulse_us)
    }

    /// Clamp both axes of a position.
    pub fn clamp_position(&self, position: Position) -> Position {
        Position::new(
            self.clamp(Axis::Pan, position.pan_deg),
            self.clamp(Axis::Tilt, position.tilt_deg),
        )
    }

    /// Pan center, tilt center.
    pub fn home(&self) -> Position {
        Position::new(self.pan.center_deg, self.tilt.center_deg)
    }

    /// PWM frame period in microseconds.
    pub fn pwm_period_us(&self) -> u32 {
        1_000_000 / self.pwm_frequency_hz.max(1)
    }

    /// Interpolation steps per move (never zero).
    pub fn total_steps(&self) -> u32 {
        (self.move_duration_ms / self.tick_ms.max(1)).max(1)
    }

    /// Motion-loop ticks between watchdog passes (never zero).
    pub fn watchdog_every_ticks(&self) -> u32 {
        (self.watchdog_interval_ms / self.tick_ms.max(1)).max(1)
    }

    /// Elapsed time after which an unfinished move counts as a failure.
    pub fn move_timeout_ms(&self) -> u64 {
        u64::from(self.move_duration_ms) * u64::from(self.watchdog_timeout_factor)
    }

    /// Reject values that would make the controller unsafe or divide by zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, cal) in [("pan", &self.pan), ("tilt", &self.tilt)] {
            if ![cal.min_deg, cal.center_deg, cal.max_deg].iter().all(|v| v.is_finite()) {
                log::warn!("config: {} limits not finite", name);
                return Err(ConfigError::ValidationFailed("axis limits must be finite"));
            }
            if cal.min_deg >= cal.max_deg {
                log::warn!("config: {} limits inverted", name);
                return Err(ConfigError::ValidationFailed("axis min_deg >= max_deg"));
            }
            if cal.center_deg < cal.min_deg || cal.center_deg > cal.max_deg {
                return Err(ConfigError::ValidationFailed("axis center outside limits"));
            }
            if cal.pulse_min_us >= cal.pulse_max_us {
                return Err(ConfigError::ValidationFailed("axis pulse_min_us >= pulse_max_us"));
            }
        }
        if self.pwm_frequency_hz == 0 || self.pwm_frequency_hz > 500 {
            return Err(ConfigError::ValidationFailed("pwm_frequency_hz out of 1..=500"));
        }
        let period = self.pwm_period_us();
        if self.pan.pulse_max_us >= period || self.tilt.pulse_max_us >= period {
            return Err(ConfigError::ValidationFailed("pulse exceeds PWM period"));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_ms must be non-zero"));
        }
        if self.watchdog_interval_ms < self.tick_ms {
            return Err(ConfigError::ValidationFailed("watchdog faster than motion tick"));
        }
        if self.watchdog_timeout_factor == 0 || self.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationFailed("watchdog thresholds must be non-zero"));
        }
        if self.self_test_max_polls == 0 {
            return Err(ConfigError::ValidationFailed("self_test_max_polls must be non-zero"));
        }
        Ok(())
    }
}
