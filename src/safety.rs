//! Servo fault escalation and the laser interlock.
//!
//! When the watchdog (or any other subsystem) decides the pan/tilt
//! hardware can no longer be trusted, the beam must go dark before anything
//! else happens.
//!
//! ## Sequence
//!
//! 1. Under the controller lock: flip `hardware_ok` to `false` and take a
//!    copy of the registered callback. Only the caller that performs this
//!    transition gets to escalate, so duplicates are silent no-ops.
//! 2. Release the controller lock.
//! 3. Laser `off()` then `disarm()` (if the driver is initialized).
//! 4. LED → [`LedState::ServoFail`] (if initialized).
//! 5. Callback with the blamed axis.
//!
//! Steps 3–5 live here and must run with **no** controller lock held: the
//! laser and LED drivers take their own locks, and calling them from inside
//! ours would create a lock-order cycle with any thread that holds theirs
//! and then queries the servo.

use std::sync::Arc;

use log::{error, info, warn};

use crate::app::ports::{FailureCallback, LaserPort, LedPort, LedState};
use crate::servo::Axis;

/// What to tell the collaborators about a fault that just latched.
#[derive(Clone)]
pub struct FaultReport {
    pub axis: Axis,
    pub reason: &'static str,
    pub callback: Option<FailureCallback>,
}

impl core::fmt::Debug for FaultReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FaultReport")
            .field("axis", &self.axis)
            .field("reason", &self.reason)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// The laser and LED drivers the fault path reaches into.
#[derive(Clone, Default)]
pub struct FailureEscalation {
    laser: Option<Arc<dyn LaserPort>>,
    led: Option<Arc<dyn LedPort>>,
}

impl FailureEscalation {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_laser(mut self, laser: Arc<dyn LaserPort>) -> Self {
        self.laser = Some(laser);
        self
    }

    #[must_use]
    pub fn with_led(mut self, led: Arc<dyn LedPort>) -> Self {
        self.led = Some(led);
        self
    }

    /// Run steps 3–5 for a fault that has already latched.
    ///
    /// The caller must not hold the controller lock.
    pub fn engage(&self, report: FaultReport) {
        error!(
            "SERVO FAULT: {} (axis: {})",
            report.reason,
            report.axis.name()
        );

        match &self.laser {
            Some(laser) if laser.is_initialized() => {
                laser.off();
                laser.disarm();
                warn!("Laser disabled due to servo failure");
            }
            Some(_) => info!("Laser driver not initialized, nothing to disable"),
            None => {}
        }

        if let Some(led) = self.led.as_ref().filter(|led| led.is_initialized()) {
            led.set_state(LedState::ServoFail);
            info!("LED set to SERVO_FAIL state");
        }

        if let Some(cb) = report.callback {
            cb(report.axis);
        }
    }
}
