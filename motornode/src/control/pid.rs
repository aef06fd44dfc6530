// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! PID controller core shared by the position and velocity loops.
//!
//! Works in `no_std` and does not allocate memory. One [`PidState`] is advanced exactly once per
//! scheduler tick, so `dt` is fixed at construction and never measured.
//!
//! Two gain sets are carried: the *far* set (`kp`, `ki`, `kd`) used while the error is large, and
//! the *near* set (`kpr`, `kir`, `kdr`) used while the error is strictly inside `(-r, r)`.

use crate::config::{LoopConfig, SECONDS_PER_TICK};

/// Added to `ki` when sizing the anti-windup bound so a zero gain never divides by zero.
pub const INTEGRAL_EPSILON: f32 = 1e-6;

/// One proportional/integral/derivative gain triple.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Gains {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    /// `true` when no gain is NaN or infinite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }
}

/// Per-step diagnostic terms, kept for the monitor view.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct PidTerms {
    /// `target - feedback`
    pub error: f32,
    /// Integral accumulator after clamping.
    pub integral: f32,
    /// Raw error derivative, before gain.
    pub derivative: f32,
    /// Clamped output.
    pub output: f32,
}

impl PidTerms {
    pub const ZERO: Self = Self {
        error: 0.0,
        integral: 0.0,
        derivative: 0.0,
        output: 0.0,
    };
}

/// PID state for one loop instance.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct PidState {
    far: Gains,
    near: Gains,
    r: f32,
    gain_switching: bool,

    dt: f32,
    output_limit: f32,
    target: f32,

    integral_accum: f32,
    prev_error: f32,
    enabled: bool,

    terms: PidTerms,
}

impl Default for PidState {
    fn default() -> Self {
        Self::new(SECONDS_PER_TICK)
    }
}

impl PidState {
    /// Disabled controller at the default tick period. Usable in `static` initialisers.
    pub const DISABLED: Self = Self {
        far: Gains::ZERO,
        near: Gains::ZERO,
        r: 0.0,
        gain_switching: false,
        dt: SECONDS_PER_TICK,
        output_limit: 0.0,
        target: 0.0,
        integral_accum: 0.0,
        prev_error: 0.0,
        enabled: false,
        terms: PidTerms::ZERO,
    };

    /// Create a disabled controller with zero gains, zero target and zero output limit.
    ///
    /// A non-positive or non-finite `dt` falls back to [`SECONDS_PER_TICK`].
    pub fn new(dt: f32) -> Self {
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            SECONDS_PER_TICK
        };
        Self { dt, ..Self::DISABLED }
    }

    /// Create a disabled controller from a validated [`LoopConfig`].
    pub fn from_config(cfg: &LoopConfig, dt: f32) -> Self {
        let mut pid = Self::new(dt).with_output_limit(cfg.output_limit);
        pid.far = cfg.far;
        pid.near = cfg.near;
        pid.r = cfg.r;
        pid.gain_switching = cfg.gain_switching;
        pid
    }

    /// Set the symmetric output limit.
    pub fn with_output_limit(mut self, limit: f32) -> Self {
        self.set_output_limit(limit);
        self
    }

    /// Set the far gain set.
    pub fn with_gains(mut self, kp: f32, ki: f32, kd: f32) -> Self {
        self.far = Gains::new(kp, ki, kd);
        self
    }

    /// Set the near gain set and switch radius. Enables switching when `r > 0`.
    pub fn with_near_gains(mut self, kpr: f32, kir: f32, kdr: f32, r: f32) -> Self {
        self.near = Gains::new(kpr, kir, kdr);
        self.set_switch_radius(r);
        self
    }

    /// Advance one control step and return the clamped output.
    ///
    /// A disabled controller returns `0.0` and leaves its accumulator and error history untouched.
    pub fn compute(&mut self, feedback: f32) -> f32 {
        if !self.enabled {
            return 0.0;
        }

        let error = self.target - feedback;
        if !error.is_finite() {
            // A NaN or infinite sample or target is skipped; history stays usable.
            return 0.0;
        }
        let gains = self.select_gains(error);

        // ----- P term -----
        let p = gains.kp * error;

        // ----- I term -----
        // The windup bound is sized from the far `ki` even while the near set is active.
        self.integral_accum += error * self.dt;
        let max_integral = self.output_limit / (self.far.ki + INTEGRAL_EPSILON);
        if self.integral_accum > max_integral {
            self.integral_accum = max_integral;
        }
        if self.integral_accum < -max_integral {
            self.integral_accum = -max_integral;
        }
        if self.integral_accum.is_nan() {
            self.integral_accum = 0.0;
        }
        let i = gains.ki * self.integral_accum;

        // ----- D term (on error) -----
        let derivative = (error - self.prev_error) / self.dt;
        let d = gains.kd * derivative;
        self.prev_error = error;

        // ----- Output clamp -----
        let mut out = p + i + d;
        if out > self.output_limit {
            out = self.output_limit;
        }
        if out < -self.output_limit {
            out = -self.output_limit;
        }
        if out.is_nan() {
            out = 0.0;
        }

        self.terms = PidTerms {
            error,
            integral: self.integral_accum,
            derivative,
            output: out,
        };

        out
    }

    /// Gain set used for a given error. The near band is open: `|error| == r` uses far gains.
    #[inline]
    pub fn select_gains(&self, error: f32) -> Gains {
        if self.gain_switching && -self.r < error && error < self.r {
            self.near
        } else {
            self.far
        }
    }

    /// Clear the integrator and derivative history.
    pub fn reset(&mut self) {
        self.integral_accum = 0.0;
        self.prev_error = 0.0;
        self.terms = PidTerms::default();
    }

    /// Enable the controller. The disabled→enabled edge resets transient state (bumpless start).
    ///
    /// Returns `true` if this call changed the state.
    pub fn enable(&mut self) -> bool {
        if self.enabled {
            return false;
        }
        self.reset();
        self.enabled = true;
        true
    }

    /// Disable the controller. Transient state is kept until the next enable.
    ///
    /// Returns `true` if this call changed the state.
    pub fn disable(&mut self) -> bool {
        let was = self.enabled;
        self.enabled = false;
        was
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    #[inline]
    pub fn far_gains(&self) -> Gains {
        self.far
    }

    #[inline]
    pub fn set_far_gains(&mut self, gains: Gains) {
        self.far = gains;
    }

    #[inline]
    pub fn near_gains(&self) -> Gains {
        self.near
    }

    #[inline]
    pub fn set_near_gains(&mut self, gains: Gains) {
        self.near = gains;
    }

    #[inline]
    pub fn switch_radius(&self) -> f32 {
        self.r
    }

    /// Set the gain-switch radius. Switching is on exactly when `r > 0`.
    pub fn set_switch_radius(&mut self, r: f32) {
        self.r = r;
        self.gain_switching = r > 0.0;
    }

    #[inline]
    pub fn gain_switching(&self) -> bool {
        self.gain_switching
    }

    #[inline]
    pub fn set_gain_switching(&mut self, enabled: bool) {
        self.gain_switching = enabled;
    }

    #[inline]
    pub fn output_limit(&self) -> f32 {
        self.output_limit
    }

    /// Set the symmetric output limit. Negative and NaN limits collapse to zero.
    pub fn set_output_limit(&mut self, limit: f32) {
        self.output_limit = if limit > 0.0 { limit } else { 0.0 };
    }

    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    #[inline]
    pub fn integral_accum(&self) -> f32 {
        self.integral_accum
    }

    #[inline]
    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }

    /// Terms from the most recent enabled step.
    #[inline]
    pub fn terms(&self) -> PidTerms {
        self.terms
    }
}
