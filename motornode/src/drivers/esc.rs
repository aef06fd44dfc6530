// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Frame codec for the ESC bus protocol (RoboMaster-style current-controlled ESCs).
//!
//! Host → ESC, one frame per group of four channels:
//!   - `StdID = 0x200` carries channels 0..=3, `StdID = 0x1FF` carries channels 4..=7
//!   - 8 data bytes: four big-endian `i16` current commands
//!
//! ESC → host, one frame per channel:
//!   - `StdID = 0x201 + channel`
//!   - bytes 0..2 angle (`u16` BE, `0..8192`), 2..4 velocity (`i16` BE, rpm),
//!     4..6 current (`i16` BE), 6 temperature (`u8`, °C)
//!
//! This module is pure byte shuffling; the bus itself lives in `hw::can`.

use crate::config::{can_id, CHANNELS_PER_GROUP};
use crate::motors::{Channel, ChannelGroup, FeedbackTable};

/// Minimum data length of a feedback frame.
pub const FEEDBACK_LEN: usize = 7;

/// Error type for frame decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Identifier outside the feedback range.
    UnknownId(u16),
    /// Frame shorter than [`FEEDBACK_LEN`].
    ShortFrame(usize),
}

/// Standard identifier of a group's current-command frame.
#[inline]
pub const fn command_id(group: ChannelGroup) -> u16 {
    match group {
        ChannelGroup::Low => can_id::CURRENT_GROUP_LOW,
        ChannelGroup::High => can_id::CURRENT_GROUP_HIGH,
    }
}

/// Pack four current commands into one frame payload.
pub fn encode_currents(currents: &[i16; CHANNELS_PER_GROUP]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    for (chunk, value) in buf.chunks_exact_mut(2).zip(currents.iter()) {
        chunk.copy_from_slice(&value.to_be_bytes());
    }
    buf
}

/// One decoded feedback frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Feedback {
    pub channel: Channel,
    pub angle_raw: u16,
    pub velocity: i16,
    pub current: i16,
    pub temperature: u8,
}

impl Feedback {
    /// Store this sample in the feedback table.
    #[inline]
    pub fn record(&self, table: &FeedbackTable) {
        table.update_status(
            self.channel.id(),
            self.angle_raw,
            self.velocity,
            self.current,
            self.temperature,
        );
    }
}

/// Decode a feedback frame by standard identifier and payload.
pub fn decode_feedback(std_id: u16, data: &[u8]) -> Result<Feedback, Error> {
    if !(can_id::FEEDBACK_BASE..=can_id::FEEDBACK_LAST).contains(&std_id) {
        return Err(Error::UnknownId(std_id));
    }
    let channel = Channel::new((std_id - can_id::FEEDBACK_BASE) as u8)
        .ok_or(Error::UnknownId(std_id))?;
    if data.len() < FEEDBACK_LEN {
        return Err(Error::ShortFrame(data.len()));
    }

    Ok(Feedback {
        channel,
        angle_raw: u16::from_be_bytes([data[0], data[1]]),
        velocity: i16::from_be_bytes([data[2], data[3]]),
        current: i16::from_be_bytes([data[4], data[5]]),
        temperature: data[6],
    })
}
