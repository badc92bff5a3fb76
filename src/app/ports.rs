//! Port traits: the hexagonal boundary between the servo core and the
//! outside world.
//!
//! ```text
//!   PwmPort   ◀── ServoController ──▶ LaserPort / LedPort / callback
//!   (driven: LEDC, sysfs, mock)        (collaborators, fault path only)
//! ```
//!
//! The controller consumes [`PwmPort`] generically and the collaborators as
//! trait objects, so the core never touches hardware directly.
//!
//! ## Lock-ordering note
//!
//! Laser and LED implementations typically hold their own internal lock.
//! The controller therefore never calls into them while holding its state
//! mutex; see [`crate::safety`].

use crate::config::ServoConfig;
use crate::error::PwmError;
use crate::servo::Axis;

// ───────────────────────────────────────────────────────────────
// PWM port (driven adapter: domain → servo signal)
// ───────────────────────────────────────────────────────────────

/// Hardware abstraction for the two servo PWM outputs.
///
/// Backends only ever see pulse widths in microseconds; angle handling
/// stays in [`crate::servo::convert`].
pub trait PwmPort: Send {
    /// Bring up both channels. A backend may degrade (e.g. to a logging
    /// mock) instead of failing; returning `Err` aborts controller init.
    fn init(&mut self) -> Result<(), PwmError>;

    /// Drive one axis with the given pulse width.
    ///
    /// Errors are reported to the controller, which logs and retries on the
    /// next tick. They never reach API callers.
    fn set_pulse(&mut self, axis: Axis, pulse_us: u32) -> Result<(), PwmError>;

    /// Disable both outputs. Must tolerate being called after a failed or
    /// degraded `init`.
    fn cleanup(&mut self);

    /// Short backend name for log lines.
    fn name(&self) -> &'static str;
}

// ───────────────────────────────────────────────────────────────
// Collaborator ports (driven adapters: fault escalation only)
// ───────────────────────────────────────────────────────────────

/// The laser driver as seen by the servo fault path.
///
/// Both commands must be idempotent: they may arrive while the laser is
/// already off or disarmed.
pub trait LaserPort: Send + Sync {
    fn is_initialized(&self) -> bool;

    /// Cut the beam.
    fn off(&self);

    /// Drop the arm state so the beam cannot be re-enabled until re-armed.
    fn disarm(&self);
}

/// Indicator states the servo core may request. The LED driver owns the
/// actual blink patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    Off,
    /// Actively monitoring.
    Armed,
    /// Servo not responding (triple red blink).
    ServoFail,
    /// Laser fault.
    LaserFail,
    /// Fatal / general error.
    Error,
}

/// Status LED as seen by the servo fault path.
pub trait LedPort: Send + Sync {
    fn is_initialized(&self) -> bool;

    fn set_state(&self, state: LedState);
}

/// Invoked once per hardware fault with the axis blamed for it.
///
/// Runs on the motion task (or the thread that reported the fault) with no
/// controller lock held. Keep it short.
pub type FailureCallback = std::sync::Arc<dyn Fn(Axis) + Send + Sync>;

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists servo configuration.
///
/// # Security
///
/// Implementations MUST validate before persisting. Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped,
/// so a bad provisioning payload cannot widen the mechanical limits (e.g.
/// letting tilt point above the horizon).
pub trait ConfigPort {
    /// Load configuration. Returns [`ServoConfig::default()`] if no stored
    /// config exists.
    fn load(&self) -> Result<ServoConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ServoConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
