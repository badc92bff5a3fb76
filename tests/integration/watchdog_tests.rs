//! Watchdog detection and the one-shot laser interlock.
//!
//! Stalls are injected through `MockPwmHandle::set_stalled`: every write
//! fails, the interpolator holds its step and the move overruns until the
//! watchdog gives up on it.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apis_servo::app::ports::LedState;
use apis_servo::config::ServoConfig;
use apis_servo::drivers::pwm_mock::MockPwm;
use apis_servo::safety::FailureEscalation;
use apis_servo::{Axis, Position, ServoController, ServoError};

use super::mock_hw::{rig, wait_until, Call, CallLog, MockLaser, MockLed};

const FAULT_WINDOW: Duration = Duration::from_secs(3);

#[test]
fn stalled_move_escalates_exactly_once() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    let (tx, rx) = mpsc::channel();
    let weak = Arc::downgrade(&r.servo);
    r.servo.set_failure_callback(move |axis| {
        // Must not deadlock: the controller lock is released by now.
        let stats = weak.upgrade().map(|servo| servo.get_stats());
        let _ = tx.send((axis, stats));
    });

    r.pwm.set_stalled(true);
    let _ = r.servo.move_to(Position::new(30.0, -20.0)).unwrap();

    let (axis, stats) = rx.recv_timeout(FAULT_WINDOW).expect("watchdog never escalated");
    assert_eq!(axis, Axis::Pan, "faults are attributed to pan");
    let stats = stats.expect("controller alive").expect("stats readable after fault");
    assert!(!stats.hardware_ok);
    assert!(stats.consecutive_failures >= 3);
    assert!(!r.servo.is_hardware_ok());

    // Several more watchdog passes with the move still overrunning.
    std::thread::sleep(Duration::from_millis(500));
    assert!(rx.try_recv().is_err(), "escalation must be one-shot");
    assert_eq!(
        *r.calls.lock().unwrap(),
        vec![Call::LaserOff, Call::LaserDisarm, Call::Led(LedState::ServoFail)]
    );

    // Queries and commands keep working in the fault state.
    assert!(r.servo.get_position().is_ok());
    assert!(r.servo.move_immediate(Position::new(0.0, -15.0)).is_ok());
}

#[test]
fn recovered_stall_resets_failure_count() {
    let config = ServoConfig {
        max_consecutive_failures: 10,
        ..ServoConfig::default()
    };
    let r = rig(config);
    r.servo.init().unwrap();

    r.pwm.set_stalled(true);
    let _ = r.servo.move_to(Position::new(-30.0, -5.0)).unwrap();
    assert!(wait_until(FAULT_WINDOW, || {
        r.servo.get_stats().unwrap().consecutive_failures >= 1
    }));

    r.pwm.set_stalled(false);
    assert!(wait_until(FAULT_WINDOW, || !r.servo.is_moving()));

    let stats = r.servo.get_stats().unwrap();
    assert_eq!(stats.consecutive_failures, 0, "completion clears history");
    assert!(stats.hardware_ok);
    assert!(r.calls.lock().unwrap().is_empty());
}

#[test]
fn self_test_fails_instead_of_hanging_on_stall() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    r.pwm.set_stalled(true);

    let started = Instant::now();
    assert_eq!(r.servo.self_test(), Err(ServoError::Hardware));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}

#[test]
fn self_test_fails_after_fault() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    r.servo.report_hardware_fault(Axis::Tilt, "laser feedback mismatch");

    assert_eq!(r.servo.self_test(), Err(ServoError::Hardware));
}

#[test]
fn reported_fault_latches_until_reinit() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let hits = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let h = Arc::clone(&hits);
    r.servo.set_failure_callback(move |axis| {
        assert_eq!(axis, Axis::Tilt);
        h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    r.servo.report_hardware_fault(Axis::Tilt, "external");
    r.servo.report_hardware_fault(Axis::Tilt, "external");
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(!r.servo.is_hardware_ok());

    r.servo.cleanup();
    r.servo.init().unwrap();
    assert!(r.servo.is_hardware_ok(), "fresh epoch");

    r.servo.report_hardware_fault(Axis::Tilt, "external");
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[test]
fn cleared_callback_is_not_invoked() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let hits = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let h = Arc::clone(&hits);
    r.servo.set_failure_callback(move |_| {
        h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    r.servo.clear_failure_callback();

    r.servo.report_hardware_fault(Axis::Pan, "external");

    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(r.calls.lock().unwrap().len(), 3, "interlock still engages");
}

#[test]
fn fault_before_init_is_ignored() {
    let r = rig(ServoConfig::default());
    r.servo.report_hardware_fault(Axis::Pan, "too early");
    assert!(r.calls.lock().unwrap().is_empty());
}

#[test]
fn uninitialized_laser_is_left_alone() {
    let calls = CallLog::default();
    let escalation = FailureEscalation::new()
        .with_laser(Arc::new(MockLaser::uninitialized(&calls)))
        .with_led(Arc::new(MockLed::new(&calls)));
    let servo = ServoController::new(MockPwm::new(), ServoConfig::default(), escalation);
    servo.init().unwrap();

    servo.report_hardware_fault(Axis::Pan, "external");

    assert_eq!(*calls.lock().unwrap(), vec![Call::Led(LedState::ServoFail)]);
}

#[test]
fn cleanup_from_callback_does_not_block_concurrent_cleanup() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    let (cb_tx, cb_rx) = mpsc::channel();
    let weak = Arc::downgrade(&r.servo);
    r.servo.set_failure_callback(move |_| {
        // Give the other thread time to enter cleanup first.
        std::thread::sleep(Duration::from_millis(100));
        if let Some(servo) = weak.upgrade() {
            servo.cleanup();
        }
        let _ = cb_tx.send(());
    });

    r.pwm.set_stalled(true);
    let _ = r.servo.move_to(Position::new(30.0, -20.0)).unwrap();
    assert!(wait_until(FAULT_WINDOW, || !r.servo.is_hardware_ok()), "no fault latched");

    let (done_tx, done_rx) = mpsc::channel();
    let servo = Arc::clone(&r.servo);
    std::thread::spawn(move || {
        servo.cleanup();
        let _ = done_tx.send(());
    });

    assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok(), "external cleanup blocked");
    assert!(cb_rx.recv_timeout(Duration::from_secs(2)).is_ok(), "callback cleanup blocked");
    assert!(!r.servo.is_initialized());
    assert!(!r.pwm.is_initialized());
    assert!(wait_until(Duration::from_secs(1), || r.servo.motion_task_count() == 0));
}

#[test]
fn reinit_from_callback_leaves_a_single_motion_task() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    assert!(wait_until(Duration::from_secs(1), || r.servo.motion_task_count() == 1));

    let (tx, rx) = mpsc::channel();
    let weak = Arc::downgrade(&r.servo);
    let pwm = r.pwm.clone();
    r.servo.set_failure_callback(move |_| {
        let Some(servo) = weak.upgrade() else {
            return;
        };
        pwm.set_stalled(false);
        servo.cleanup();
        let _ = tx.send(servo.init());
    });

    r.pwm.set_stalled(true);
    let _ = r.servo.move_to(Position::new(30.0, -20.0)).unwrap();
    assert_eq!(rx.recv_timeout(FAULT_WINDOW).expect("watchdog never escalated"), Ok(()));
    assert!(r.servo.is_hardware_ok(), "recovery starts a fresh epoch");

    // The detached loop must notice the new epoch and exit.
    assert!(wait_until(Duration::from_secs(1), || r.servo.motion_task_count() == 1));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(r.servo.motion_task_count(), 1);

    // A single loop moves at the configured pace.
    let config = r.servo.config().clone();
    let started = Instant::now();
    let _ = r.servo.move_to(Position::new(-30.0, -5.0)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !r.servo.is_moving()));
    let floor = u64::from((config.total_steps() - 1) * config.tick_ms);
    assert!(
        started.elapsed() >= Duration::from_millis(floor),
        "move finished in {:?}",
        started.elapsed()
    );
}
