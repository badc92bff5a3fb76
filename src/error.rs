//! Error types for the servo positioning core.
//!
//! Follows the firmware convention: small `Copy` enums with hand-written
//! `Display`, so they can be passed through the control loop and logged
//! without allocation. Angle clamping is not an error: it is reported on the
//! success path as [`MoveStatus::AngleClamped`] and the move still executes.

use core::fmt;

// ---------------------------------------------------------------------------
// Controller errors
// ---------------------------------------------------------------------------

/// Every fallible public controller operation returns this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoError {
    /// Called before `init()` or after `cleanup()`.
    NotInitialized,
    /// Raw axis index out of range.
    InvalidAxis,
    /// Hardware fault escalated, HAL init failed, or self-test timed out.
    Hardware,
    /// The background motion task could not be created.
    NoMemory,
    /// Reserved. Not raised by the current controller.
    Busy,
}

impl ServoError {
    /// Stable upper-case name used in log lines and telemetry.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::InvalidAxis => "INVALID_AXIS",
            Self::Hardware => "HARDWARE_ERROR",
            Self::NoMemory => "NO_MEMORY",
            Self::Busy => "BUSY",
        }
    }
}

impl fmt::Display for ServoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "servo controller not initialized"),
            Self::InvalidAxis => write!(f, "invalid servo axis"),
            Self::Hardware => write!(f, "servo hardware failure"),
            Self::NoMemory => write!(f, "could not create servo motion task"),
            Self::Busy => write!(f, "servo busy"),
        }
    }
}

impl std::error::Error for ServoError {}

/// Outcome of an accepted movement command.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    /// The requested angles were inside the mechanical limits.
    Ok,
    /// At least one angle was clamped; motion proceeds to the clamped target.
    AngleClamped,
}

impl MoveStatus {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::AngleClamped => "ANGLE_CLAMPED",
        }
    }

    pub const fn is_clamped(self) -> bool {
        matches!(self, Self::AngleClamped)
    }
}

// ---------------------------------------------------------------------------
// PWM backend errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`PwmPort`](crate::app::ports::PwmPort) backend.
///
/// These stop at the controller: a failed write is logged and retried on
/// the next tick, never surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmError {
    /// Exporting a sysfs PWM channel failed.
    ExportFailed { channel: u8 },
    /// Writing a channel attribute (period, enable) failed.
    ConfigureFailed { channel: u8 },
    /// Writing a pulse width failed.
    WriteFailed { channel: u8 },
    /// Timer / channel peripheral initialisation failed (driver rc).
    InitFailed(i32),
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExportFailed { channel } => write!(f, "PWM export failed (channel {})", channel),
            Self::ConfigureFailed { channel } => {
                write!(f, "PWM configure failed (channel {})", channel)
            }
            Self::WriteFailed { channel } => write!(f, "PWM write failed (channel {})", channel),
            Self::InitFailed(rc) => write!(f, "PWM init failed (rc={})", rc),
        }
    }
}

impl std::error::Error for PwmError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, ServoError>;
