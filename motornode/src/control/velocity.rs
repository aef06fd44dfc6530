// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Velocity loop (pidv): measured velocity in, motor current command out.
//!
//! Typical usage pattern, once per scheduler tick:
//!
//! ```ignore
//! velocity.set_target(120.0); // rpm
//! velocity.update(&feedback, &mut currents);
//! ```

#[allow(unused_imports)]
use micromath::F32Ext;

use crate::control::{Loop, PidState};
use crate::motors::{Channel, CurrentSink, MotorFeedback};

/// Convert a loop output into the ESC current-command range.
///
/// Rounds to nearest and saturates at the `i16` bounds; NaN maps to zero.
#[inline]
pub fn current_command(output: f32) -> i16 {
    output.round() as i16
}

/// Velocity controller for one channel.
pub struct VelocityLoop {
    channel: Channel,
    pid: PidState,
}

impl VelocityLoop {
    /// Wrap a (disabled) PID state for `channel`.
    pub fn new(channel: Channel, pid: PidState) -> Self {
        Self { channel, pid }
    }

    /// Run one control step. No-op while disabled.
    pub fn update<F, S>(&mut self, feedback: &F, sink: &mut S)
    where
        F: MotorFeedback + ?Sized,
        S: CurrentSink + ?Sized,
    {
        if !self.pid.is_enabled() {
            return;
        }
        let velocity = feedback.status(self.channel).velocity as f32;
        let output = self.pid.compute(velocity);
        sink.set_current(self.channel, current_command(output));
    }

    /// Enable with bumpless restart (integral and error history cleared).
    ///
    /// Returns `true` on the disabled→enabled edge.
    pub fn enable(&mut self) -> bool {
        self.pid.enable()
    }

    /// Clear the enabled flag only. The last queued current is left in place.
    pub fn disable(&mut self) -> bool {
        self.pid.disable()
    }
}

impl Loop for VelocityLoop {
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
