//! In-memory PWM backend.
//!
//! Records the last pulse per axis and a write count, no I/O. The state
//! sits behind an `Arc<Mutex<_>>` so a [`MockPwmHandle`] kept by a test can
//! inspect it (and inject a stall) after the backend itself has been
//! moved into the controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::app::ports::PwmPort;
use crate::error::PwmError;
use crate::pins;
use crate::servo::Axis;

/// Both axes idle at the mid-range pulse until first written.
pub const MOCK_CENTER_PULSE_US: u32 = 1500;

#[derive(Debug)]
struct MockPwmState {
    pan_pulse_us: u32,
    tilt_pulse_us: u32,
    writes: u64,
    initialized: bool,
    stalled_pan: bool,
    stalled_tilt: bool,
}

impl MockPwmState {
    fn new() -> Self {
        Self {
            pan_pulse_us: MOCK_CENTER_PULSE_US,
            tilt_pulse_us: MOCK_CENTER_PULSE_US,
            writes: 0,
            initialized: false,
            stalled_pan: false,
            stalled_tilt: false,
        }
    }
}

/// Test double implementing [`PwmPort`].
#[derive(Debug)]
pub struct MockPwm {
    state: Arc<Mutex<MockPwmState>>,
}

/// Inspection / fault-injection handle onto a [`MockPwm`].
#[derive(Debug, Clone)]
pub struct MockPwmHandle {
    state: Arc<Mutex<MockPwmState>>,
}

impl Default for MockPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPwm {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockPwmState::new())),
        }
    }

    /// Backend plus a handle onto the same state.
    pub fn with_handle() -> (Self, MockPwmHandle) {
        let pwm = Self::new();
        let handle = pwm.handle();
        (pwm, handle)
    }

    pub fn handle(&self) -> MockPwmHandle {
        MockPwmHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockPwmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MockPwmHandle {
    fn lock(&self) -> MutexGuard<'_, MockPwmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last pulse successfully written to `axis`.
    pub fn pulse_us(&self, axis: Axis) -> u32 {
        let s = self.lock();
        match axis {
            Axis::Pan => s.pan_pulse_us,
            Axis::Tilt => s.tilt_pulse_us,
        }
    }

    /// Number of successful `set_pulse` calls.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Make every subsequent write fail, emulating a servo that never
    /// settles.
    pub fn set_stalled(&self, stalled: bool) {
        let mut s = self.lock();
        s.stalled_pan = stalled;
        s.stalled_tilt = stalled;
    }

    /// Stall a single channel; the other keeps accepting writes.
    pub fn set_axis_stalled(&self, axis: Axis, stalled: bool) {
        let mut s = self.lock();
        match axis {
            Axis::Pan => s.stalled_pan = stalled,
            Axis::Tilt => s.stalled_tilt = stalled,
        }
    }
}

impl PwmPort for MockPwm {
    fn init(&mut self) -> Result<(), PwmError> {
        let mut s = self.lock();
        s.pan_pulse_us = MOCK_CENTER_PULSE_US;
        s.tilt_pulse_us = MOCK_CENTER_PULSE_US;
        s.initialized = true;
        debug!("PWM initialized (test mock)");
        Ok(())
    }

    fn set_pulse(&mut self, axis: Axis, pulse_us: u32) -> Result<(), PwmError> {
        let mut s = self.lock();
        let (stalled, channel) = match axis {
            Axis::Pan => (s.stalled_pan, pins::PWM_PAN_CHANNEL),
            Axis::Tilt => (s.stalled_tilt, pins::PWM_TILT_CHANNEL),
        };
        if stalled {
            return Err(PwmError::WriteFailed { channel });
        }
        match axis {
            Axis::Pan => s.pan_pulse_us = pulse_us,
            Axis::Tilt => s.tilt_pulse_us = pulse_us,
        }
        s.writes += 1;
        debug!("PWM set: {} = {} us", axis.name(), pulse_us);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.lock().initialized = false;
        debug!("PWM cleanup (test mock)");
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
