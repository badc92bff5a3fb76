//! Mock collaborators for integration tests.
//!
//! The laser and LED record every call into one shared, ordered log so
//! tests can assert both what happened and in which order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use apis_servo::app::ports::{LaserPort, LedPort, LedState};
use apis_servo::config::ServoConfig;
use apis_servo::drivers::pwm_mock::{MockPwm, MockPwmHandle};
use apis_servo::safety::FailureEscalation;
use apis_servo::servo::convert::AxisCalibration;
use apis_servo::ServoController;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    LaserOff,
    LaserDisarm,
    Led(LedState),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

// ── MockLaser ─────────────────────────────────────────────────

pub struct MockLaser {
    initialized: AtomicBool,
    log: CallLog,
}

impl MockLaser {
    pub fn new(log: &CallLog) -> Self {
        Self {
            initialized: AtomicBool::new(true),
            log: Arc::clone(log),
        }
    }

    pub fn uninitialized(log: &CallLog) -> Self {
        let laser = Self::new(log);
        laser.initialized.store(false, Ordering::SeqCst);
        laser
    }
}

impl LaserPort for MockLaser {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn off(&self) {
        self.log.lock().unwrap().push(Call::LaserOff);
    }

    fn disarm(&self) {
        self.log.lock().unwrap().push(Call::LaserDisarm);
    }
}

// ── MockLed ───────────────────────────────────────────────────

pub struct MockLed {
    log: CallLog,
}

impl MockLed {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Arc::clone(log),
        }
    }
}

impl LedPort for MockLed {
    fn is_initialized(&self) -> bool {
        true
    }

    fn set_state(&self, state: LedState) {
        self.log.lock().unwrap().push(Call::Led(state));
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub struct Rig {
    pub servo: Arc<ServoController<MockPwm>>,
    pub pwm: MockPwmHandle,
    pub calls: CallLog,
}

/// Controller on the mock backend with laser + LED wired in.
pub fn rig(config: ServoConfig) -> Rig {
    let calls = CallLog::default();
    let escalation = FailureEscalation::new()
        .with_laser(Arc::new(MockLaser::new(&calls)))
        .with_led(Arc::new(MockLed::new(&calls)));
    let (pwm, handle) = MockPwm::with_handle();
    Rig {
        servo: Arc::new(ServoController::new(pwm, config, escalation)),
        pwm: handle,
        calls,
    }
}

/// Wide pan bracket: [-90, 90] degrees.
pub fn wide_pan_config() -> ServoConfig {
    ServoConfig {
        pan: AxisCalibration {
            min_deg: -90.0,
            center_deg: 0.0,
            max_deg: 90.0,
            pulse_min_us: 1000,
            pulse_center_us: 1500,
            pulse_max_us: 2000,
        },
        ..ServoConfig::default()
    }
}

/// Poll `cond` every few ms; false if it never held within `timeout`.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}
