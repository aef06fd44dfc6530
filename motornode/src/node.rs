// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! The control node: every axis, the actuation queue, the monitor bridge and the bus transport,
//! bundled as the context the scheduler's jobs run against.
//!
//! Production order inside one tick (slot order, see [`Node::install`]):
//!
//! 1. [`jobs::count_tick`]
//! 2. [`jobs::position_loops`] - pidx → pidv target
//! 3. [`jobs::velocity_loops`] - pidv → queued current
//! 4. [`jobs::transmit_currents`] - queued currents → bus
//! 5. [`jobs::sync_monitor`] - snapshot out, command in
//!
//! Feedback is not a job; the bus receive interrupt writes the shared [`FeedbackTable`] directly.
//!
//! With a [`SharedMonitor`] attached, the monitor command comes from that buffer instead of
//! [`Node::monitor_mut`], and every snapshot is published back to it.

use crate::config::{ConfigError, NodeConfig, CHANNEL_COUNT};
use crate::control::Axis;
use crate::cron::{self, Cron};
use crate::monitor::{Counters, MonitorBridge, SharedMonitor};
use crate::motors::{Channel, CurrentTargets, FeedbackTable, Transport};

/// Scheduler context for one motor-control node.
pub struct Node<'a, T> {
    feedback: &'a FeedbackTable,
    transport: T,
    axes: [Axis; CHANNEL_COUNT],
    currents: CurrentTargets,
    monitor: MonitorBridge,
    shared: Option<&'a SharedMonitor>,
    counters: Counters,
}

impl<'a, T: Transport> Node<'a, T> {
    /// Build a node with every loop disabled.
    pub fn new(
        cfg: &NodeConfig,
        feedback: &'a FeedbackTable,
        transport: T,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let axes: [Axis; CHANNEL_COUNT] = core::array::from_fn(|i| Axis::new(Channel::at(i), cfg));
        let monitor = MonitorBridge::new(&axes);
        Ok(Self {
            feedback,
            transport,
            axes,
            currents: CurrentTargets::new(),
            monitor,
            shared: None,
            counters: Counters::default(),
        })
    }

    /// Register the node's jobs in production order.
    pub fn install<const N: usize>(cron: &mut Cron<Self, N>) -> Result<(), cron::Error> {
        cron.add_job(jobs::count_tick)?;
        cron.add_job(jobs::position_loops)?;
        cron.add_job(jobs::velocity_loops)?;
        cron.add_job(jobs::transmit_currents)?;
        cron.add_job(jobs::sync_monitor)?;
        Ok(())
    }
}

impl<'a, T> Node<'a, T> {
    /// Route the monitor through `shared`. Its command is seeded from the live controllers first.
    pub fn attach_monitor(&mut self, shared: &'a SharedMonitor) {
        shared.seed(&self.monitor);
        shared.publish(&self.monitor);
        self.shared = Some(shared);
    }

    #[inline]
    pub fn axes(&self) -> &[Axis; CHANNEL_COUNT] {
        &self.axes
    }

    #[inline]
    pub fn axis(&self, channel: Channel) -> &Axis {
        &self.axes[channel.index()]
    }

    #[inline]
    pub fn currents(&self) -> &CurrentTargets {
        &self.currents
    }

    #[inline]
    pub fn monitor(&self) -> &MonitorBridge {
        &self.monitor
    }

    #[inline]
    pub fn monitor_mut(&mut self) -> &mut MonitorBridge {
        &mut self.monitor
    }

    #[inline]
    pub fn counters(&self) -> Counters {
        self.counters
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Scheduler jobs over a [`Node`].
pub mod jobs {
    use super::Node;
    use crate::motors::Transport;

    /// Advance the tick counter.
    pub fn count_tick<T: Transport>(node: &mut Node<'_, T>) {
        node.counters.ticks = node.counters.ticks.wrapping_add(1);
    }

    /// Run every position loop, feeding each velocity loop's target.
    pub fn position_loops<T: Transport>(node: &mut Node<'_, T>) {
        let feedback = node.feedback;
        for axis in node.axes.iter_mut() {
            axis.position.update(feedback, &mut axis.velocity);
        }
    }

    /// Run every velocity loop, queueing current commands.
    pub fn velocity_loops<T: Transport>(node: &mut Node<'_, T>) {
        let feedback = node.feedback;
        for axis in node.axes.iter_mut() {
            axis.velocity.update(feedback, &mut node.currents);
        }
    }

    /// Push the queued currents onto the bus. Failures are counted, never retried.
    pub fn transmit_currents<T: Transport>(node: &mut Node<'_, T>) {
        if let Err(e) = node.currents.transmit(&mut node.transport) {
            node.counters.tx_failures = node.counters.tx_failures.wrapping_add(1);
            warn!("current transmit failed: {}", e);
        }
    }

    /// Snapshot state for the monitor, then apply its pending command.
    pub fn sync_monitor<T: Transport>(node: &mut Node<'_, T>) {
        if let Some(shared) = node.shared {
            shared.pull(&mut node.monitor);
        }
        node.monitor.update(
            node.counters,
            node.feedback,
            &mut node.axes,
            &mut node.currents,
        );
        if let Some(shared) = node.shared {
            shared.publish(&node.monitor);
        }
    }
}
