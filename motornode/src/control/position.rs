// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Position loop (pidx): continuous angle in, velocity target out.
//!
//! This is the outer half of the cascade. Its output never reaches the motor directly; each step
//! overwrites the target of the channel's [`VelocityLoop`].
//!
//! Enabling the loop also zeroes the channel's angle reference in the feedback table, so a fresh
//! enable always starts from position 0.

use crate::control::{Loop, PidState, VelocityLoop};
use crate::motors::{Channel, MotorFeedback};

/// Position controller for one channel.
pub struct PositionLoop {
    channel: Channel,
    pid: PidState,
}

impl PositionLoop {
    /// Wrap a (disabled) PID state for `channel`.
    pub fn new(channel: Channel, pid: PidState) -> Self {
        Self { channel, pid }
    }

    /// Run one control step and feed the result to `velocity` as its new target. No-op while
    /// disabled.
    pub fn update<F>(&mut self, feedback: &F, velocity: &mut VelocityLoop)
    where
        F: MotorFeedback + ?Sized,
    {
        if !self.pid.is_enabled() {
            return;
        }
        let angle = feedback.status(self.channel).angle;
        let velocity_target = self.pid.compute(angle);
        velocity.set_target(velocity_target);
    }

    /// Enable with bumpless restart.
    ///
    /// Side effect: on the disabled→enabled edge the channel's continuous angle is reset to zero
    /// through `feedback`. Returns `true` on that edge.
    pub fn enable<F>(&mut self, feedback: &F) -> bool
    where
        F: MotorFeedback + ?Sized,
    {
        if !self.pid.enable() {
            return false;
        }
        feedback.reset_position(self.channel);
        true
    }

    /// Clear the enabled flag. The velocity loop keeps its last target.
    pub fn disable(&mut self) -> bool {
        self.pid.disable()
    }
}

impl Loop for PositionLoop {
    #[inline]
    fn channel(&self) -> Channel {
        self.channel
    }

    #[inline]
    fn pid(&self) -> &PidState {
        &self.pid
    }

    #[inline]
    fn pid_mut(&mut self) -> &mut PidState {
        &mut self.pid
    }
}
