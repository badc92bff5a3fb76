//! The servo controller: public API plus the background motion task.
//!
//! ```text
//!  caller threads                    motion task (every tick_ms)
//!  ──────────────                    ──────────────────────────
//!  move_to / move_immediate ──┐      lock ─▶ interpolation step ─▶ PwmPort
//!  get_position / get_stats ──┼──▶ State      │
//!  report_hardware_fault ─────┘      (Mutex)  └─▶ watchdog (every Nth tick)
//!                                        │
//!                        fault latched ──┴─▶ unlock ─▶ FailureEscalation
//! ```
//!
//! All mutable state, the PWM backend included, sits behind one
//! `std::sync::Mutex`. Laser, LED and the failure callback are only ever
//! reached after that lock has been released (see [`crate::safety`]).
//!
//! `hardware_ok` is a latch: the first fault of an epoch flips it and
//! escalates, every later fault is ignored until `cleanup()` + `init()`.
//!
//! Each `init()` starts a new epoch and the motion task it spawns only runs
//! while that epoch is current. A task detached by a `cleanup()` issued from
//! its own failure callback therefore exits on its next tick even if the
//! callback re-initializes the controller straight away.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::adapters::time::MonotonicClock;
use crate::app::ports::{FailureCallback, PwmPort};
use crate::config::ServoConfig;
use crate::drivers::task_pin::{self, SERVO_MOTION_TASK};
use crate::error::{MoveStatus, PwmError, Result, ServoError};
use crate::safety::{FailureEscalation, FaultReport};

use super::motion::{Interpolation, MotionPhase};
use super::watchdog::{FailureTracker, TickDivider, WatchdogVerdict};
use super::{Axis, Position};

/// Point-in-time snapshot returned by [`ServoController::get_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServoStats {
    pub move_count: u32,
    pub clamp_count: u32,
    pub position: Position,
    pub is_moving: bool,
    pub hardware_ok: bool,
    /// Milliseconds since the current `init()`.
    pub uptime_ms: u64,
    pub phase: MotionPhase,
    pub consecutive_failures: u32,
}

struct State<P> {
    pwm: P,
    initialized: bool,
    /// Bumped by every `init()`; a motion task exits once it no longer
    /// matches the epoch it was spawned for.
    epoch: u64,
    hardware_ok: bool,
    current: Position,
    target: Position,
    motion: Option<Interpolation>,
    tracker: FailureTracker,
    watchdog_divider: TickDivider,
    move_count: u32,
    clamp_count: u32,
    init_ms: u64,
    /// Consecutive failed writes on the in-flight step.
    write_failures: u32,
    callback: Option<FailureCallback>,
}

impl<P: PwmPort> State<P> {
    fn phase(&self) -> MotionPhase {
        if self.motion.is_some() {
            MotionPhase::Moving
        } else if self.tracker.awaiting_confirm() {
            MotionPhase::AwaitingConfirmation
        } else {
            MotionPhase::Idle
        }
    }

    /// Drive both axes. A failing channel does not stop the other one from
    /// being written; the first error is returned.
    fn write(&mut self, config: &ServoConfig, position: Position) -> core::result::Result<(), PwmError> {
        let mut first_err = None;
        for axis in Axis::ALL {
            let pulse = config.angle_to_pulse(axis, position.get(axis));
            if let Err(e) = self.pwm.set_pulse(axis, pulse) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.initialized && self.epoch == epoch
    }

    /// Flip `hardware_ok` and hand back what the escalation needs, or
    /// `None` if this epoch already faulted.
    fn latch_fault(&mut self, axis: Axis, reason: &'static str) -> Option<FaultReport> {
        if !self.hardware_ok {
            debug!("servo: duplicate fault ignored ({})", reason);
            return None;
        }
        self.hardware_ok = false;
        Some(FaultReport {
            axis,
            reason,
            callback: self.callback.clone(),
        })
    }
}

struct Shared<P> {
    state: Mutex<State<P>>,
    config: ServoConfig,
    clock: MonotonicClock,
    escalation: FailureEscalation,
    active_tasks: AtomicU32,
}

impl<P: PwmPort> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One motion tick. Runs under the lock; any returned report must be
    /// engaged after the guard is dropped.
    fn tick(&self, s: &mut State<P>) -> Option<FaultReport> {
        let now = self.clock.now_ms();

        if let Some(mut motion) = s.motion {
            let next = motion.next_position();
            match s.write(&self.config, next) {
                Ok(()) => {
                    s.write_failures = 0;
                    s.current = next;
                    if motion.advance() {
                        s.motion = None;
                        s.tracker.on_move_complete(now);
                        debug!("servo: movement complete {}", next);
                    } else {
                        s.motion = Some(motion);
                    }
                }
                Err(e) => {
                    s.write_failures = s.write_failures.saturating_add(1);
                    if s.write_failures == 1 {
                        warn!(
                            "servo: {} - holding step {}/{}",
                            e,
                            motion.step() + 1,
                            motion.total_steps()
                        );
                    } else {
                        debug!("servo: write retry {} failed: {}", s.write_failures, e);
                    }
                }
            }
        }

        if s.watchdog_divider.tick() && s.hardware_ok {
            return self.check_watchdog(s, now);
        }
        None
    }

    fn check_watchdog(&self, s: &mut State<P>, now: u64) -> Option<FaultReport> {
        let verdict = s.tracker.check(
            s.motion.is_some(),
            now,
            self.config.move_timeout_ms(),
            self.config.max_consecutive_failures,
        );
        match verdict {
            // Stalls are not attributed per axis; pan takes the blame.
            WatchdogVerdict::Fault { elapsed_ms, failures } => {
                error!(
                    "servo watchdog: {} consecutive timeouts (last {} ms)",
                    failures, elapsed_ms
                );
                s.latch_fault(Axis::Pan, "Movement timeout exceeded")
            }
            WatchdogVerdict::Healthy
            | WatchdogVerdict::Confirmed
            | WatchdogVerdict::Timeout { .. } => None,
        }
    }
}

/// Counts live motion tasks for as long as it is held.
struct ActiveTask<'a>(&'a AtomicU32);

impl<'a> ActiveTask<'a> {
    fn enter(count: &'a AtomicU32) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for ActiveTask<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn motion_loop<P: PwmPort>(shared: &Shared<P>, epoch: u64) {
    let _active = ActiveTask::enter(&shared.active_tasks);
    debug!("servo: motion task started (epoch {})", epoch);
    loop {
        let fault = {
            let mut s = shared.lock();
            if !s.is_current(epoch) {
                break;
            }
            shared.tick(&mut s)
        };
        if let Some(report) = fault {
            shared.escalation.engage(report);
        }
        shared.clock.sleep_ms(shared.config.tick_ms);
    }
    debug!("servo: motion task stopped (epoch {})", epoch);
}

/// Pan/tilt positioning controller.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct ServoController<P: PwmPort + 'static> {
    shared: Arc<Shared<P>>,
    /// Also serializes `init` against `cleanup`.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: PwmPort + 'static> ServoController<P> {
    /// Build an uninitialized controller. Nothing touches the hardware
    /// until [`init`](Self::init).
    pub fn new(pwm: P, config: ServoConfig, escalation: FailureEscalation) -> Self {
        let home = config.home();
        let state = State {
            pwm,
            initialized: false,
            epoch: 0,
            hardware_ok: true,
            current: home,
            target: home,
            motion: None,
            tracker: FailureTracker::new(),
            watchdog_divider: TickDivider::new(config.watchdog_every_ticks()),
            move_count: 0,
            clamp_count: 0,
            init_ms: 0,
            write_failures: 0,
            callback: None,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                config,
                clock: MonotonicClock::new(),
                escalation,
                active_tasks: AtomicU32::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServoConfig {
        &self.shared.config
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_initialized(&self) -> Result<MutexGuard<'_, State<P>>> {
        let s = self.shared.lock();
        if s.initialized {
            Ok(s)
        } else {
            Err(ServoError::NotInitialized)
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring up PWM, center both axes and start the motion task.
    ///
    /// Calling it again while initialized is a no-op that keeps counters.
    /// An invalid configuration is refused with [`ServoError::Hardware`]
    /// before the backend is touched.
    pub fn init(&self) -> Result<()> {
        let mut task = self.lock_task();
        let config = &self.shared.config;

        let epoch = {
            let mut s = self.shared.lock();
            if s.initialized {
                warn!("servo: controller already initialized");
                return Ok(());
            }

            config.validate().map_err(|e| {
                error!("servo: refusing to start with invalid config: {}", e);
                ServoError::Hardware
            })?;

            s.pwm.init().map_err(|e| {
                error!("servo: PWM init failed: {}", e);
                ServoError::Hardware
            })?;

            let home = config.home();
            s.move_count = 0;
            s.clamp_count = 0;
            s.hardware_ok = true;
            s.motion = None;
            s.tracker = FailureTracker::new();
            s.watchdog_divider = TickDivider::new(config.watchdog_every_ticks());
            s.write_failures = 0;
            s.init_ms = self.shared.clock.now_ms();
            if let Err(e) = s.write(config, home) {
                warn!("servo: initial centering write failed: {}", e);
            }
            s.current = home;
            s.target = home;
            s.epoch = s.epoch.wrapping_add(1);
            s.initialized = true;
            s.epoch
        };

        let shared = Arc::clone(&self.shared);
        match task_pin::spawn_on_core(SERVO_MOTION_TASK, move || motion_loop(&shared, epoch)) {
            Ok(handle) => *task = Some(handle),
            Err(e) => {
                error!("servo: failed to create motion task: {}", e);
                let mut s = self.shared.lock();
                s.initialized = false;
                s.pwm.cleanup();
                return Err(ServoError::NoMemory);
            }
        }

        info!(
            "servo: controller initialized on {} (home position {})",
            self.shared.lock().pwm.name(),
            config.home()
        );
        Ok(())
    }

    /// Stop and join the motion task, then disable the PWM outputs.
    ///
    /// No-op when not initialized; safe to call repeatedly and from the
    /// failure callback. The join happens without any controller lock held,
    /// so a callback calling `cleanup()` while another thread is already
    /// cleaning up returns instead of blocking.
    pub fn cleanup(&self) {
        let (handle, epoch) = {
            let mut task = self.lock_task();
            let mut s = self.shared.lock();
            if !s.initialized {
                return;
            }
            s.initialized = false;
            s.motion = None;
            (task.take(), s.epoch)
        };

        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // Called from a failure callback on the motion task itself;
                // the loop sees the stale epoch and exits after the callback.
                debug!("servo: cleanup from motion task, not joining");
            } else if handle.join().is_err() {
                error!("servo: motion task panicked");
            }
        }

        let mut s = self.shared.lock();
        if s.initialized || s.epoch != epoch {
            // Re-initialized while we were joining; the outputs are in use.
            debug!("servo: outputs kept for epoch {}", s.epoch);
            return;
        }
        s.pwm.cleanup();
        info!("servo: controller cleaned up");
    }

    // ── Motion commands ───────────────────────────────────────

    /// Start an interpolated move to `target` (last command wins).
    ///
    /// Out-of-range angles are clamped; the move still runs and the result
    /// is [`MoveStatus::AngleClamped`].
    pub fn move_to(&self, target: Position) -> Result<MoveStatus> {
        let config = &self.shared.config;
        let mut s = self.lock_initialized()?;

        let clamped = config.clamp_position(target);
        let status = if clamped == target {
            MoveStatus::Ok
        } else {
            s.clamp_count = s.clamp_count.saturating_add(1);
            warn!("servo: angle clamped: requested {} -> {}", target, clamped);
            MoveStatus::AngleClamped
        };

        let now = self.shared.clock.now_ms();
        let motion = Interpolation::new(s.current, clamped, config.total_steps());
        debug!(
            "servo: movement started {} -> {} in {} steps",
            s.current,
            clamped,
            motion.total_steps()
        );
        s.target = clamped;
        s.motion = Some(motion);
        s.write_failures = 0;
        s.tracker.on_move_commanded(now);
        s.move_count = s.move_count.saturating_add(1);
        Ok(status)
    }

    /// Move one axis, keeping the other where it currently is.
    pub fn move_axis(&self, axis: Axis, angle_deg: f32) -> Result<MoveStatus> {
        let current = self.get_position()?;
        self.move_to(current.with(axis, angle_deg))
    }

    /// [`move_axis`](Self::move_axis) with a raw axis index (0 = pan,
    /// 1 = tilt).
    pub fn move_axis_index(&self, index: u8, angle_deg: f32) -> Result<MoveStatus> {
        if !self.is_initialized() {
            return Err(ServoError::NotInitialized);
        }
        self.move_axis(Axis::try_from(index)?, angle_deg)
    }

    /// Cancel any in-flight move and drive straight to `target`.
    pub fn move_immediate(&self, target: Position) -> Result<MoveStatus> {
        let config = &self.shared.config;
        let mut s = self.lock_initialized()?;

        s.motion = None;
        s.write_failures = 0;
        s.tracker.on_move_cancelled();

        let clamped = config.clamp_position(target);
        let status = if clamped == target {
            MoveStatus::Ok
        } else {
            s.clamp_count = s.clamp_count.saturating_add(1);
            MoveStatus::AngleClamped
        };

        match s.write(config, clamped) {
            Ok(()) => s.current = clamped,
            Err(e) => warn!("servo: immediate move to {} failed: {}", clamped, e),
        }
        s.target = clamped;
        s.move_count = s.move_count.saturating_add(1);
        debug!("servo: immediate move {}", clamped);
        Ok(status)
    }

    /// Interpolated move back to the configured center.
    pub fn home(&self) -> Result<MoveStatus> {
        info!("servo: returning to home position");
        self.move_to(self.shared.config.home())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Where the servos were last driven.
    pub fn get_position(&self) -> Result<Position> {
        Ok(self.lock_initialized()?.current)
    }

    /// Commanded destination of the current (or last) move.
    pub fn get_target(&self) -> Result<Position> {
        Ok(self.lock_initialized()?.target)
    }

    /// False when not initialized.
    pub fn is_moving(&self) -> bool {
        let s = self.shared.lock();
        s.initialized && s.motion.is_some()
    }

    pub fn phase(&self) -> MotionPhase {
        let s = self.shared.lock();
        if s.initialized { s.phase() } else { MotionPhase::Idle }
    }

    pub fn get_stats(&self) -> Result<ServoStats> {
        let s = self.lock_initialized()?;
        Ok(ServoStats {
            move_count: s.move_count,
            clamp_count: s.clamp_count,
            position: s.current,
            is_moving: s.motion.is_some(),
            hardware_ok: s.hardware_ok,
            uptime_ms: self.shared.clock.now_ms().saturating_sub(s.init_ms),
            phase: s.phase(),
            consecutive_failures: s.tracker.consecutive_failures(),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.lock().initialized
    }

    /// Number of motion tasks still running: 1 while initialized, 0 once a
    /// cleanup has been reaped.
    pub fn motion_task_count(&self) -> u32 {
        self.shared.active_tasks.load(Ordering::SeqCst)
    }

    /// False when not initialized or after a fault this epoch.
    pub fn is_hardware_ok(&self) -> bool {
        let s = self.shared.lock();
        s.initialized && s.hardware_ok
    }

    // ── Faults ────────────────────────────────────────────────

    /// Register the fault callback, replacing any previous one.
    pub fn set_failure_callback<F>(&self, callback: F)
    where
        F: Fn(Axis) + Send + Sync + 'static,
    {
        self.shared.lock().callback = Some(Arc::new(callback));
    }

    pub fn clear_failure_callback(&self) {
        self.shared.lock().callback = None;
    }

    /// Latch a hardware fault detected outside the watchdog and run the
    /// escalation. Only the first fault of an epoch escalates.
    pub fn report_hardware_fault(&self, axis: Axis, reason: &'static str) {
        let report = {
            let mut s = self.shared.lock();
            if !s.initialized {
                warn!("servo: fault reported before init ignored ({})", reason);
                return;
            }
            s.latch_fault(axis, reason)
        };
        if let Some(report) = report {
            self.shared.escalation.engage(report);
        }
    }

    // ── Commissioning ─────────────────────────────────────────

    /// Sweep both axes through their limits and back home.
    ///
    /// Each position gets a bounded settle window; a move still running
    /// after it, or a fault latched meanwhile, fails with
    /// [`ServoError::Hardware`].
    pub fn self_test(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(ServoError::NotInitialized);
        }
        let config = &self.shared.config;
        let (pan, tilt) = (&config.pan, &config.tilt);
        let sequence = [
            Position::new(pan.min_deg, tilt.center_deg),
            Position::new(pan.max_deg, tilt.center_deg),
            Position::new(pan.center_deg, tilt.center_deg),
            Position::new(pan.center_deg, tilt.min_deg),
            Position::new(pan.center_deg, tilt.max_deg),
            Position::new(pan.center_deg, tilt.center_deg),
            config.home(),
        ];

        info!("servo: starting self-test ({} positions)", sequence.len());
        for (i, position) in sequence.into_iter().enumerate() {
            if self.move_to(position)?.is_clamped() {
                debug!("servo: self-test position {} clamped", i);
            }

            let mut polls = 0;
            while self.is_moving() && polls < config.self_test_max_polls {
                self.shared.clock.sleep_ms(config.self_test_poll_ms);
                polls += 1;
            }

            if self.is_moving() {
                error!("servo: self-test movement timeout at position {}", i);
                return Err(ServoError::Hardware);
            }
            if !self.is_hardware_ok() {
                error!("servo: self-test hardware fault at position {}", i);
                return Err(ServoError::Hardware);
            }
            debug!("servo: self-test position {} OK {}", i, position);
        }

        info!("servo: self-test completed successfully");
        Ok(())
    }
}

impl<P: PwmPort + 'static> Drop for ServoController<P> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
