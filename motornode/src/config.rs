// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Node configuration.
//!
//! Compile-time constants describe the fixed hardware topology (channel count, encoder resolution,
//! CAN identifiers). [`NodeConfig`] carries the tunable startup values for both control loops and
//! is validated once before the node is built.

use crate::control::Gains;

/// Number of motor channels on the bus.
pub const CHANNEL_COUNT: usize = 8;

/// Channels per current-command frame.
pub const CHANNELS_PER_GROUP: usize = 4;

/// Encoder counts per mechanical revolution. Raw samples live in `[0, ENCODER_ROUND)`.
pub const ENCODER_ROUND: u16 = 8192;

/// Scheduler tick rate (Hz).
pub const TICK_HZ: u32 = 100;

/// Scheduler tick period (seconds). Every loop `dt` must equal this.
pub const SECONDS_PER_TICK: f32 = 1.0 / TICK_HZ as f32;

/// Scheduler job-table capacity. Bounded by the width of the occupancy mask.
pub const JOB_CAPACITY: usize = 32;

/// Default velocity-loop output limit (current command units).
pub const VELOCITY_OUTPUT_LIMIT: f32 = 1000.0;

/// Default position-loop output limit (velocity target units).
pub const POSITION_OUTPUT_LIMIT: f32 = 10.0;

/// CAN identifiers for the ESC bus.
pub mod can_id {
    /// Current command for channels 0..=3.
    pub const CURRENT_GROUP_LOW: u16 = 0x200;
    /// Current command for channels 4..=7.
    pub const CURRENT_GROUP_HIGH: u16 = 0x1FF;
    /// Feedback from channel 0. Channel `n` reports on `FEEDBACK_BASE + n`.
    pub const FEEDBACK_BASE: u16 = 0x201;
    /// Feedback from channel 7.
    pub const FEEDBACK_LAST: u16 = 0x208;
}

/// Configuration rejected by [`NodeConfig::validate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The scheduler cannot run at 0 Hz.
    ZeroTickRate,
    /// A gain, radius or limit is NaN or infinite.
    NonFinite,
    /// Output limits are symmetric magnitudes and must be `>= 0`.
    NegativeOutputLimit,
}

/// Startup parameters for one PID loop.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopConfig {
    /// Gains used when `|error| >= r`.
    pub far: Gains,
    /// Gains used when `|error| < r`.
    pub near: Gains,
    /// Gain-switch radius.
    pub r: f32,
    /// Symmetric output clamp.
    pub output_limit: f32,
    /// Whether the near gain set is ever selected.
    pub gain_switching: bool,
}

impl LoopConfig {
    /// All-zero gains with the given output limit.
    pub const fn new(output_limit: f32) -> Self {
        Self {
            far: Gains::ZERO,
            near: Gains::ZERO,
            r: 0.0,
            output_limit,
            gain_switching: false,
        }
    }

    /// Set the far (default) gain set.
    pub fn with_gains(mut self, kp: f32, ki: f32, kd: f32) -> Self {
        self.far = Gains::new(kp, ki, kd);
        self
    }

    /// Set the near gain set and the radius inside which it is used.
    ///
    /// Gain switching is turned on whenever `r > 0`.
    pub fn with_near_gains(mut self, kpr: f32, kir: f32, kdr: f32, r: f32) -> Self {
        self.near = Gains::new(kpr, kir, kdr);
        self.r = r;
        self.gain_switching = r > 0.0;
        self
    }

    /// Force gain switching on or off regardless of `r`.
    pub fn with_gain_switching(mut self, enabled: bool) -> Self {
        self.gain_switching = enabled;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            self.far.kp,
            self.far.ki,
            self.far.kd,
            self.near.kp,
            self.near.ki,
            self.near.kd,
            self.r,
            self.output_limit,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::NonFinite);
        }
        if self.output_limit < 0.0 {
            return Err(ConfigError::NegativeOutputLimit);
        }
        Ok(())
    }
}

/// Startup configuration for the whole node.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// Scheduler tick rate (Hz). Loop `dt` is derived from it.
    pub tick_hz: u32,
    /// Velocity loop (pidv) startup values, shared by every channel.
    pub velocity: LoopConfig,
    /// Position loop (pidx) startup values, shared by every channel.
    pub position: LoopConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_hz: TICK_HZ,
            velocity: LoopConfig::new(VELOCITY_OUTPUT_LIMIT),
            position: LoopConfig::new(POSITION_OUTPUT_LIMIT),
        }
    }
}

impl NodeConfig {
    /// Loop period in seconds.
    #[inline]
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }

    /// Check the configuration before it reaches the controllers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        self.velocity.validate()?;
        self.position.validate()
    }
}
