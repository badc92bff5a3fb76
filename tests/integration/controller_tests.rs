//! Public API and motion behaviour of `ServoController`.

use std::time::{Duration, Instant};

use apis_servo::config::ServoConfig;
use apis_servo::servo::motion::MotionPhase;
use apis_servo::{Axis, MoveStatus, Position, ServoError};

use super::mock_hw::{approx, rig, wait_until, wide_pan_config};

const SETTLE: Duration = Duration::from_secs(2);

#[test]
fn out_of_range_move_is_clamped_and_still_executes() {
    let r = rig(wide_pan_config());
    r.servo.init().unwrap();

    let status = r.servo.move_to(Position::new(120.0, 0.0)).unwrap();
    assert_eq!(status, MoveStatus::AngleClamped);
    assert!(status.is_clamped());

    assert!(wait_until(SETTLE, || !r.servo.is_moving()), "move never settled");
    let pos = r.servo.get_position().unwrap();
    assert!(approx(pos.pan_deg, 90.0), "pan={}", pos.pan_deg);
    assert!(approx(pos.tilt_deg, 0.0));
    assert_eq!(r.pwm.pulse_us(Axis::Pan), 2000);
    assert_eq!(r.servo.get_stats().unwrap().clamp_count, 1);
}

#[test]
fn tilt_never_points_above_horizon() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    assert_eq!(
        r.servo.move_axis(Axis::Tilt, 25.0),
        Ok(MoveStatus::AngleClamped)
    );
    assert!(wait_until(SETTLE, || !r.servo.is_moving()));
    assert!(approx(r.servo.get_position().unwrap().tilt_deg, 0.0));
}

#[test]
fn valid_move_reaches_target_after_its_duration() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let target = Position::new(30.0, -25.0);

    assert_eq!(r.servo.move_to(target), Ok(MoveStatus::Ok));
    assert!(r.servo.is_moving());
    assert_eq!(r.servo.phase(), MotionPhase::Moving);
    assert_eq!(r.servo.get_target().unwrap(), target);

    assert!(wait_until(SETTLE, || !r.servo.is_moving()));
    let pos = r.servo.get_position().unwrap();
    assert!(approx(pos.pan_deg, 30.0) && approx(pos.tilt_deg, -25.0), "{pos}");
    assert_eq!(r.pwm.pulse_us(Axis::Pan), r.servo.config().angle_to_pulse(Axis::Pan, 30.0));
}

#[test]
fn move_duration_matches_step_schedule() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let config = r.servo.config().clone();

    let started = Instant::now();
    let _ = r.servo.move_to(Position::new(40.0, -5.0)).unwrap();
    assert!(wait_until(SETTLE, || !r.servo.is_moving()));
    let elapsed = started.elapsed();

    // The first step may land right away; the rest are one tick apart.
    let floor = Duration::from_millis(u64::from((config.total_steps() - 1) * config.tick_ms));
    let budget = Duration::from_millis(config.move_timeout_ms());
    assert!(elapsed >= floor, "settled too early: {:?} < {:?}", elapsed, floor);
    assert!(elapsed <= budget, "settled too late: {:?} > {:?}", elapsed, budget);
}

#[test]
fn completed_move_is_confirmed_by_watchdog() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let _ = r.servo.move_to(Position::new(-20.0, -10.0)).unwrap();

    assert!(wait_until(SETTLE, || r.servo.phase() == MotionPhase::Idle));
    let stats = r.servo.get_stats().unwrap();
    assert!(!stats.is_moving);
    assert!(stats.hardware_ok);
    assert_eq!(stats.consecutive_failures, 0);
}

#[test]
fn move_axis_keeps_other_axis() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let _ = r.servo.move_immediate(Position::new(10.0, -20.0)).unwrap();

    let _ = r.servo.move_axis(Axis::Pan, -30.0).unwrap();
    assert!(wait_until(SETTLE, || !r.servo.is_moving()));

    let pos = r.servo.get_position().unwrap();
    assert!(approx(pos.pan_deg, -30.0));
    assert!(approx(pos.tilt_deg, -20.0));
}

#[test]
fn move_immediate_cancels_interpolation() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    let _ = r.servo.move_to(Position::new(45.0, -30.0)).unwrap();
    assert!(r.servo.is_moving());

    let target = Position::new(-10.0, -5.0);
    assert_eq!(r.servo.move_immediate(target), Ok(MoveStatus::Ok));
    assert!(!r.servo.is_moving(), "cancel must be synchronous");
    assert_eq!(r.servo.phase(), MotionPhase::Idle);
    assert_eq!(r.servo.get_position().unwrap(), target);

    // Nothing left in flight to drag the servos elsewhere.
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(r.servo.get_position().unwrap(), target);
}

#[test]
fn last_command_wins() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    let _ = r.servo.move_to(Position::new(40.0, -5.0)).unwrap();
    let _ = r.servo.move_to(Position::new(-40.0, -25.0)).unwrap();

    assert!(wait_until(SETTLE, || !r.servo.is_moving()));
    let pos = r.servo.get_position().unwrap();
    assert!(approx(pos.pan_deg, -40.0) && approx(pos.tilt_deg, -25.0));
    assert_eq!(r.servo.get_stats().unwrap().move_count, 2);
}

#[test]
fn home_returns_to_center() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let _ = r.servo.move_immediate(Position::new(40.0, -30.0)).unwrap();

    assert_eq!(r.servo.home(), Ok(MoveStatus::Ok));
    assert!(wait_until(SETTLE, || !r.servo.is_moving()));
    assert_eq!(r.servo.get_position().unwrap(), r.servo.config().home());
}

#[test]
fn second_init_keeps_counters() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    let _ = r.servo.move_immediate(Position::new(5.0, -5.0)).unwrap();
    let _ = r.servo.move_immediate(Position::new(90.0, -5.0)).unwrap();

    r.servo.init().unwrap();

    let stats = r.servo.get_stats().unwrap();
    assert_eq!(stats.move_count, 2);
    assert_eq!(stats.clamp_count, 1);
    assert_eq!(r.servo.get_position().unwrap(), Position::new(45.0, -5.0));
}

#[test]
fn cleanup_is_idempotent_and_disables_api() {
    let r = rig(ServoConfig::default());
    r.servo.cleanup();
    assert!(!r.servo.is_initialized());

    r.servo.init().unwrap();
    assert!(r.pwm.is_initialized());
    let _ = r.servo.move_to(Position::new(20.0, -10.0)).unwrap();

    r.servo.cleanup();
    r.servo.cleanup();

    assert!(!r.pwm.is_initialized(), "PWM outputs disabled");
    assert!(!r.servo.is_moving());
    assert_eq!(r.servo.move_to(Position::default()), Err(ServoError::NotInitialized));
    assert_eq!(r.servo.get_stats(), Err(ServoError::NotInitialized));

    // A fresh epoch starts from scratch.
    r.servo.init().unwrap();
    assert_eq!(r.servo.get_stats().unwrap().move_count, 0);
}

#[test]
fn stats_report_uptime() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let stats = r.servo.get_stats().unwrap();
    assert!(stats.uptime_ms >= 20, "uptime={}", stats.uptime_ms);
    assert_eq!(stats.position, r.servo.config().home());
}

#[test]
fn controllers_are_isolated() {
    let a = rig(ServoConfig::default());
    let b = rig(ServoConfig::default());
    a.servo.init().unwrap();
    b.servo.init().unwrap();

    let _ = a.servo.move_immediate(Position::new(30.0, -5.0)).unwrap();

    assert_eq!(b.servo.get_position().unwrap(), b.servo.config().home());
    assert_eq!(b.servo.get_stats().unwrap().move_count, 0);
}

#[test]
fn concurrent_callers_do_not_corrupt_state() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let servo = std::sync::Arc::clone(&r.servo);
            std::thread::spawn(move || {
                for n in 0..25 {
                    let pan = ((i * 25 + n) % 90) as f32 - 45.0;
                    let _ = servo.move_to(Position::new(pan, -10.0)).unwrap();
                    let _ = servo.get_stats().unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert!(wait_until(SETTLE, || !r.servo.is_moving()));
    let stats = r.servo.get_stats().unwrap();
    assert_eq!(stats.move_count, 100);
    assert_eq!(stats.clamp_count, 0);
    assert!(stats.position.pan_deg >= -45.0 && stats.position.pan_deg <= 45.0);
}

#[test]
fn self_test_passes_on_healthy_backend() {
    let r = rig(ServoConfig::default());
    r.servo.init().unwrap();

    assert_eq!(r.servo.self_test(), Ok(()));
    assert_eq!(r.servo.get_stats().unwrap().move_count, 7);
    assert_eq!(r.servo.get_position().unwrap(), r.servo.config().home());
    assert!(r.calls.lock().unwrap().is_empty(), "no escalation");
}
