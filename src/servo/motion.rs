//! Fixed-duration linear interpolation between two positions.
//!
//! A move is split into `total_steps` equal increments, one per motion
//! tick. The step counter only advances once the position for that step
//! has actually been written, so a backend that keeps failing stalls the
//! move instead of silently "completing" it.

use super::Position;

/// Where the controller is in the move lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MotionPhase {
    /// Nothing commanded, or the last move has been confirmed.
    Idle,
    /// Interpolation in progress.
    Moving,
    /// Final step written, waiting for the watchdog's quiet pass.
    AwaitingConfirmation,
}

/// One in-flight movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    start: Position,
    target: Position,
    step: u32,
    total_steps: u32,
}

impl Interpolation {
    pub fn new(start: Position, target: Position, total_steps: u32) -> Self {
        Self {
            start,
            target,
            step: 0,
            total_steps: total_steps.max(1),
        }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn is_complete(&self) -> bool {
        self.step >= self.total_steps
    }

    /// Position at an arbitrary step (saturates at the target).
    pub fn position_at(&self, step: u32) -> Position {
        if step >= self.total_steps {
            return self.target;
        }
        let t = step as f32 / self.total_steps as f32;
        Position::new(
            lerp(self.start.pan_deg, self.target.pan_deg, t),
            lerp(self.start.tilt_deg, self.target.tilt_deg, t),
        )
    }

    /// Position the next tick should drive to.
    pub fn next_position(&self) -> Position {
        self.position_at(self.step + 1)
    }

    /// Commit the step returned by [`next_position`](Self::next_position).
    /// Returns `true` when this was the final step.
    pub fn advance(&mut self) -> bool {
        if self.step < self.total_steps {
            self.step += 1;
        }
        self.is_complete()
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + t * (to - from)
}
