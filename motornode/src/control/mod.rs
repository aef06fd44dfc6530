// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Control Algorithms
//!
//! This module provides the cascaded position → velocity → current controller.
//!
//! ## Modules
//!
//! - [`pid`] - PID core with anti-windup and near/far gain switching.
//! - [`velocity`] - Velocity loop (pidv), drives the motor current command.
//! - [`position`] - Position loop (pidx), drives the velocity loop's target.

pub mod pid;
pub mod position;
pub mod velocity;

pub use pid::{Gains, PidState, PidTerms};
pub use position::PositionLoop;
pub use velocity::VelocityLoop;

use crate::config::NodeConfig;
use crate::motors::Channel;

/// Common access to a loop's PID state.
pub trait Loop {
    fn channel(&self) -> Channel;
    fn pid(&self) -> &PidState;
    fn pid_mut(&mut self) -> &mut PidState;

    #[inline]
    fn is_enabled(&self) -> bool {
        self.pid().is_enabled()
    }

    #[inline]
    fn set_target(&mut self, target: f32) {
        self.pid_mut().set_target(target);
    }

    /// Clear integrator and error history without touching the enabled flag.
    #[inline]
    fn reset(&mut self) {
        self.pid_mut().reset();
    }
}

/// Both loops of one actuator channel.
pub struct Axis {
    pub position: PositionLoop,
    pub velocity: VelocityLoop,
}

impl Axis {
    /// Build a disabled axis from the node configuration.
    pub fn new(channel: Channel, cfg: &NodeConfig) -> Self {
        let dt = cfg.dt();
        Self {
            position: PositionLoop::new(channel, PidState::from_config(&cfg.position, dt)),
            velocity: VelocityLoop::new(channel, PidState::from_config(&cfg.velocity, dt)),
        }
    }

    #[inline]
    pub fn channel(&self) -> Channel {
        self.velocity.channel()
    }
}
