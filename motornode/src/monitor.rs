// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Monitor bridge between the live controllers and an external tuning tool.
//!
//! The bridge owns two buffers:
//!
//! - a read-side [`MonitorSnapshot`], overwritten once per tick with motor status and every PID
//!   state;
//! - a write-side [`MonitorCommand`], edited by the external tool and applied once per tick.
//!
//! [`MonitorBridge::update`] runs as the last scheduler job. It copies first, then applies, so the
//! snapshot always shows the state the control jobs of *this* tick produced.
//!
//! Apply rules:
//!
//! - gains, switch radius and output limits are applied every tick;
//! - the position target is always applied; the velocity target only while the position loop is
//!   disabled (otherwise the cascade owns it);
//! - enable flags are edge-triggered against the live state, so holding a flag does not keep
//!   resetting the controller.
//!
//! The command buffer is seeded from the controllers at construction, so an untouched command is a
//! no-op. Non-finite gains, radii, limits or targets in a command are ignored.
//!
//! On the board the external tool does not own the node. It reads and writes a [`SharedMonitor`],
//! a `static` pair of buffers at a fixed symbol, and the node copies through it each tick.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use crate::config::CHANNEL_COUNT;
use crate::control::{Axis, Gains, Loop, PidState};
use crate::motors::{CurrentSink, CurrentTargets, MotorFeedback, MotorStatus};

/// Node-wide counters shown alongside the per-axis view.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct Counters {
    /// Elapsed scheduler ticks (wrapping).
    pub ticks: u32,
    /// Current-command frames the transport refused (wrapping).
    pub tx_failures: u32,
}

impl Counters {
    pub const ZERO: Self = Self {
        ticks: 0,
        tx_failures: 0,
    };
}

/// Read-side view of one axis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct AxisView {
    pub status: MotorStatus,
    /// Current command queued for transmission.
    pub current_target: i16,
    pub position: PidState,
    pub velocity: PidState,
}

impl AxisView {
    pub const EMPTY: Self = Self {
        status: MotorStatus::ZERO,
        current_target: 0,
        position: PidState::DISABLED,
        velocity: PidState::DISABLED,
    };
}

/// Read-side view of the whole node, latest tick only.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct MonitorSnapshot {
    pub counters: Counters,
    pub axes: [AxisView; CHANNEL_COUNT],
}

impl MonitorSnapshot {
    pub const EMPTY: Self = Self {
        counters: Counters::ZERO,
        axes: [AxisView::EMPTY; CHANNEL_COUNT],
    };

    /// Render a human-readable report, one line per channel.
    pub fn write_report<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        write!(
            w,
            "tick {} tx_fail {}\r\n",
            self.counters.ticks, self.counters.tx_failures
        )?;
        for (i, axis) in self.axes.iter().enumerate() {
            let s = &axis.status;
            write!(
                w,
                "ch{} th {:.3} v {} i {} T {} cmd {} | x {} {:.3} -> {:.2} | v {} {:.2} -> {:.1}\r\n",
                i,
                s.angle,
                s.velocity,
                s.current,
                s.temperature,
                axis.current_target,
                on_off(axis.position.is_enabled()),
                axis.position.target(),
                axis.position.terms().output,
                on_off(axis.velocity.is_enabled()),
                axis.velocity.target(),
                axis.velocity.terms().output,
            )?;
        }
        Ok(())
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Requested tuning for one loop.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct LoopCommand {
    pub far: Gains,
    pub near: Gains,
    pub r: f32,
    pub output_limit: f32,
    pub target: f32,
    pub enabled: bool,
}

impl LoopCommand {
    /// Zero tuning, loop off.
    pub const IDLE: Self = Self {
        far: Gains::ZERO,
        near: Gains::ZERO,
        r: 0.0,
        output_limit: 0.0,
        target: 0.0,
        enabled: false,
    };

    /// Command that reproduces a controller's current settings.
    pub fn from_pid(pid: &PidState) -> Self {
        Self {
            far: pid.far_gains(),
            near: pid.near_gains(),
            r: pid.switch_radius(),
            output_limit: pid.output_limit(),
            target: pid.target(),
            enabled: pid.is_enabled(),
        }
    }

    /// Copy gains, radius and limit into `pid`. Non-finite fields are skipped and the controller
    /// keeps its previous value for them.
    fn apply_tuning(&self, pid: &mut PidState) {
        if self.far.is_finite() {
            pid.set_far_gains(self.far);
        }
        if self.near.is_finite() {
            pid.set_near_gains(self.near);
        }
        if self.r.is_finite() && pid.switch_radius() != self.r {
            pid.set_switch_radius(self.r);
        }
        if self.output_limit.is_finite() {
            pid.set_output_limit(self.output_limit);
        }
    }
}

/// Requested tuning for both loops of one axis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct AxisCommand {
    pub position: LoopCommand,
    pub velocity: LoopCommand,
}

impl AxisCommand {
    pub const IDLE: Self = Self {
        position: LoopCommand::IDLE,
        velocity: LoopCommand::IDLE,
    };
}

/// Write-side buffer, latest value wins.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct MonitorCommand {
    pub axes: [AxisCommand; CHANNEL_COUNT],
}

impl MonitorCommand {
    pub const IDLE: Self = Self {
        axes: [AxisCommand::IDLE; CHANNEL_COUNT],
    };
}

/// Snapshot/apply bridge. Owned by the node; the external tool only touches its buffers.
pub struct MonitorBridge {
    read: MonitorSnapshot,
    write: MonitorCommand,
}

impl MonitorBridge {
    /// Create a bridge whose command mirrors the current controller settings.
    pub fn new(axes: &[Axis; CHANNEL_COUNT]) -> Self {
        let write = MonitorCommand {
            axes: core::array::from_fn(|i| AxisCommand {
                position: LoopCommand::from_pid(axes[i].position.pid()),
                velocity: LoopCommand::from_pid(axes[i].velocity.pid()),
            }),
        };
        Self {
            read: MonitorSnapshot::default(),
            write,
        }
    }

    /// Latest read-side snapshot.
    #[inline]
    pub fn snapshot(&self) -> &MonitorSnapshot {
        &self.read
    }

    /// Pending write-side command.
    #[inline]
    pub fn command(&self) -> &MonitorCommand {
        &self.write
    }

    /// Edit the write-side command. Takes effect on the next [`update`](Self::update).
    #[inline]
    pub fn command_mut(&mut self) -> &mut MonitorCommand {
        &mut self.write
    }

    /// Copy live state out, then apply the command back in.
    pub fn update<F>(
        &mut self,
        counters: Counters,
        feedback: &F,
        axes: &mut [Axis; CHANNEL_COUNT],
        currents: &mut CurrentTargets,
    ) where
        F: MotorFeedback + ?Sized,
    {
        self.capture(counters, feedback, axes, currents);
        for (axis, cmd) in axes.iter_mut().zip(self.write.axes.iter()) {
            Self::apply(cmd, feedback, axis, currents);
        }
    }

    fn capture<F>(
        &mut self,
        counters: Counters,
        feedback: &F,
        axes: &[Axis; CHANNEL_COUNT],
        currents: &CurrentTargets,
    ) where
        F: MotorFeedback + ?Sized,
    {
        let statuses = feedback.snapshot();
        self.read.counters = counters;
        for (i, view) in self.read.axes.iter_mut().enumerate() {
            let axis = &axes[i];
            *view = AxisView {
                status: statuses[i],
                current_target: currents.get(axis.channel()),
                position: *axis.position.pid(),
                velocity: *axis.velocity.pid(),
            };
        }
    }

    fn apply<F>(cmd: &AxisCommand, feedback: &F, axis: &mut Axis, currents: &mut CurrentTargets)
    where
        F: MotorFeedback + ?Sized,
    {
        let ch = axis.channel();

        cmd.velocity.apply_tuning(axis.velocity.pid_mut());
        if !axis.position.is_enabled() && cmd.velocity.target.is_finite() {
            axis.velocity.set_target(cmd.velocity.target);
        }
        cmd.position.apply_tuning(axis.position.pid_mut());
        if cmd.position.target.is_finite() {
            axis.position.set_target(cmd.position.target);
        }

        if axis.velocity.is_enabled() && !cmd.velocity.enabled {
            axis.velocity.disable();
            currents.set_current(ch, 0);
            info!("ch{} pidv disabled", ch.id());
        } else if !axis.velocity.is_enabled() && cmd.velocity.enabled {
            axis.velocity.enable();
            info!("ch{} pidv enabled", ch.id());
        }

        if axis.position.is_enabled() && !cmd.position.enabled {
            axis.position.disable();
            info!("ch{} pidx disabled", ch.id());
        } else if !axis.position.is_enabled() && cmd.position.enabled {
            axis.position.enable(feedback);
            info!("ch{} pidx enabled", ch.id());
        }
    }
}

/// Interrupt-safe buffer pair for an external tool that cannot borrow the node.
///
/// Meant to live in a `#[no_mangle] static`; a debugger or a host-side task edits `write` and
/// polls `read`. The node [`seed`](Self::seed)s the write side once when attached, then every
/// tick [`pull`](Self::pull)s the command in before its bridge update and
/// [`publish`](Self::publish)es the snapshot after it.
#[repr(C)]
pub struct SharedMonitor {
    write: Mutex<Cell<MonitorCommand>>,
    read: Mutex<Cell<MonitorSnapshot>>,
}

impl Default for SharedMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMonitor {
    pub const fn new() -> Self {
        Self {
            write: Mutex::new(Cell::new(MonitorCommand::IDLE)),
            read: Mutex::new(Cell::new(MonitorSnapshot::EMPTY)),
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MonitorSnapshot {
        critical_section::with(|cs| self.read.borrow(cs).get())
    }

    /// Copy of the pending command.
    pub fn command(&self) -> MonitorCommand {
        critical_section::with(|cs| self.write.borrow(cs).get())
    }

    /// Edit the pending command in place. The node picks it up on its next tick.
    pub fn edit<R>(&self, f: impl FnOnce(&mut MonitorCommand) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.write.borrow(cs);
            let mut cmd = cell.get();
            let out = f(&mut cmd);
            cell.set(cmd);
            out
        })
    }

    /// Overwrite the command with the bridge's, so an untouched buffer changes nothing.
    pub fn seed(&self, bridge: &MonitorBridge) {
        critical_section::with(|cs| self.write.borrow(cs).set(*bridge.command()));
    }

    /// Copy the pending command into the bridge.
    pub fn pull(&self, bridge: &mut MonitorBridge) {
        critical_section::with(|cs| *bridge.command_mut() = self.write.borrow(cs).get());
    }

    /// Copy the bridge's snapshot out.
    pub fn publish(&self, bridge: &MonitorBridge) {
        critical_section::with(|cs| self.read.borrow(cs).set(*bridge.snapshot()));
    }
}
