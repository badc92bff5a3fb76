//! Timing-based servo failure inference.
//!
//! Hobby servos are open-loop: there is no feedback to say whether the horn
//! actually moved. The watchdog uses the only signal available, time. A
//! move that is still in flight well after it should have finished counts
//! as a missed confirmation; enough of them in a row is a hardware fault.
//!
//! This is a best-effort proxy for "did the servo move", not position
//! verification.

use log::{debug, warn};

/// Result of one watchdog pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Nothing late.
    Healthy,
    /// A completed move was confirmed (AwaitingConfirmation → Idle).
    Confirmed,
    /// The in-flight move overran its budget; counted, below threshold.
    Timeout { elapsed_ms: u64, failures: u32 },
    /// Threshold reached; escalate.
    Fault { elapsed_ms: u64, failures: u32 },
}

/// Failure bookkeeping shared between the interpolator and the watchdog.
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    last_move_ms: Option<u64>,
    awaiting_confirm: bool,
    consecutive_failures: u32,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new interpolated move was commanded.
    pub fn on_move_commanded(&mut self, now_ms: u64) {
        self.last_move_ms = Some(now_ms);
        self.awaiting_confirm = false;
    }

    /// The interpolator wrote its final step. Success clears the failure
    /// history.
    pub fn on_move_complete(&mut self, now_ms: u64) {
        self.last_move_ms = Some(now_ms);
        self.awaiting_confirm = true;
        self.consecutive_failures = 0;
    }

    /// An immediate move replaced whatever was in flight.
    pub fn on_move_cancelled(&mut self) {
        self.awaiting_confirm = false;
    }

    pub fn awaiting_confirm(&self) -> bool {
        self.awaiting_confirm
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_move_ms(&self) -> Option<u64> {
        self.last_move_ms
    }

    /// Run one watchdog pass.
    ///
    /// The caller skips this entirely once the hardware is flagged faulty,
    /// which is what makes escalation one-shot.
    pub fn check(
        &mut self,
        is_moving: bool,
        now_ms: u64,
        timeout_ms: u64,
        max_failures: u32,
    ) -> WatchdogVerdict {
        if !is_moving {
            if self.awaiting_confirm {
                self.awaiting_confirm = false;
                debug!("servo watchdog: move confirmed");
                return WatchdogVerdict::Confirmed;
            }
            return WatchdogVerdict::Healthy;
        }

        let Some(last) = self.last_move_ms else {
            return WatchdogVerdict::Healthy;
        };
        let elapsed_ms = now_ms.saturating_sub(last);
        if elapsed_ms <= timeout_ms {
            return WatchdogVerdict::Healthy;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        warn!(
            "servo watchdog: movement timeout {} ms (budget {} ms), failure count {}",
            elapsed_ms, timeout_ms, self.consecutive_failures
        );

        if self.consecutive_failures >= max_failures {
            WatchdogVerdict::Fault {
                elapsed_ms,
                failures: self.consecutive_failures,
            }
        } else {
            WatchdogVerdict::Timeout {
                elapsed_ms,
                failures: self.consecutive_failures,
            }
        }
    }
}

/// Divides the motion tick down to the watchdog cadence.
#[derive(Debug, Clone)]
pub struct TickDivider {
    every: u32,
    count: u32,
}

impl TickDivider {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            count: 0,
        }
    }

    /// Returns `true` on every `every`-th call.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.every {
            self.count = 0;
            true
        } else {
            false
        }
    }
}
