// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Motor Channels
//!
//! This module holds the per-channel motor model and the narrow interfaces the control core uses to
//! talk to the outside world.
//!
//! ## Modules
//!
//! - [`feedback`] - Feedback ingestion: interrupt-safe status table with encoder unwrap.
//! - [`actuation`] - Queued current targets and their periodic transmission.
//!
//! ## Interfaces
//!
//! - [`MotorFeedback`] - read motor status, zero the position reference.
//! - [`CurrentSink`] - queue a current command for one channel.
//! - [`Transport`] - push one group of four current commands onto the bus.

pub mod actuation;
pub mod feedback;

pub use actuation::CurrentTargets;
pub use feedback::FeedbackTable;

use crate::config::{CHANNELS_PER_GROUP, CHANNEL_COUNT};

/// A valid motor channel index in `0..CHANNEL_COUNT`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Validate a raw channel id. Out-of-range ids yield `None`.
    #[inline]
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < CHANNEL_COUNT {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Channel for a position in a `[_; CHANNEL_COUNT]` table. Indices wrap into range.
    #[inline]
    pub(crate) const fn at(index: usize) -> Self {
        Self((index % CHANNEL_COUNT) as u8)
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The current-command frame this channel is carried in.
    #[inline]
    pub const fn group(self) -> ChannelGroup {
        if self.index() < CHANNELS_PER_GROUP {
            ChannelGroup::Low
        } else {
            ChannelGroup::High
        }
    }

    /// Every channel, in index order.
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNEL_COUNT as u8).map(Channel)
    }
}

/// One of the two current-command frames, each covering four channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelGroup {
    /// Channels 0..=3.
    Low,
    /// Channels 4..=7.
    High,
}

impl ChannelGroup {
    /// Index of the first channel in this group.
    #[inline]
    pub const fn first_index(self) -> usize {
        match self {
            ChannelGroup::Low => 0,
            ChannelGroup::High => CHANNELS_PER_GROUP,
        }
    }
}

/// Latest feedback for one motor.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct MotorStatus {
    /// Measured current (raw ESC units).
    pub current: i16,
    /// Measured velocity (rpm).
    pub velocity: i16,
    /// Continuous shaft angle (rad). Accumulates across turns; never wrapped.
    pub angle: f32,
    /// Temperature (°C).
    pub temperature: u8,
}

impl MotorStatus {
    pub const ZERO: Self = Self {
        current: 0,
        velocity: 0,
        angle: 0.0,
        temperature: 0,
    };
}

/// Read access to motor feedback.
pub trait MotorFeedback {
    /// Latest status for one channel.
    fn status(&self, channel: Channel) -> MotorStatus;

    /// Zero the continuous angle reference of one channel.
    fn reset_position(&self, channel: Channel);

    /// Status of every channel, captured as one consistent set.
    fn snapshot(&self) -> [MotorStatus; CHANNEL_COUNT] {
        let mut out = [MotorStatus::default(); CHANNEL_COUNT];
        for ch in Channel::all() {
            out[ch.index()] = self.status(ch);
        }
        out
    }
}

/// Queue a current command for a channel. Transmission happens separately.
pub trait CurrentSink {
    fn set_current(&mut self, channel: Channel, value: i16);
}

/// Transmit failure reported by a [`Transport`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// No free transmit mailbox.
    MailboxFull,
}

/// Bus transport for current commands.
pub trait Transport {
    /// Send one group's four current targets in a single frame.
    fn send(
        &mut self,
        group: ChannelGroup,
        currents: &[i16; CHANNELS_PER_GROUP],
    ) -> Result<(), TxError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(
        &mut self,
        group: ChannelGroup,
        currents: &[i16; CHANNELS_PER_GROUP],
    ) -> Result<(), TxError> {
        (**self).send(group, currents)
    }
}
