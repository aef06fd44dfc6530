// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Queued current targets.
//!
//! The velocity loops only *queue* a command per channel. A separate scheduler job packs all eight
//! queued values into the two group frames and hands them to the [`Transport`].

use crate::config::{CHANNELS_PER_GROUP, CHANNEL_COUNT};
use crate::motors::{Channel, ChannelGroup, CurrentSink, Transport, TxError};

/// Latest current command for every channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentTargets {
    targets: [i16; CHANNEL_COUNT],
}

impl CurrentTargets {
    pub const fn new() -> Self {
        Self {
            targets: [0; CHANNEL_COUNT],
        }
    }

    /// Queued command for one channel.
    #[inline]
    pub fn get(&self, channel: Channel) -> i16 {
        self.targets[channel.index()]
    }

    /// Queue a command by raw channel id. Unknown ids are ignored.
    pub fn set_raw(&mut self, channel_id: u8, value: i16) {
        if let Some(ch) = Channel::new(channel_id) {
            self.set_current(ch, value);
        }
    }

    /// The four commands carried by one group frame.
    pub fn group(&self, group: ChannelGroup) -> [i16; CHANNELS_PER_GROUP] {
        let first = group.first_index();
        core::array::from_fn(|i| self.targets[first + i])
    }

    /// Send both group frames.
    ///
    /// Each group is attempted even if the other fails; the first failure is returned.
    pub fn transmit<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), TxError> {
        let low = transport.send(ChannelGroup::Low, &self.group(ChannelGroup::Low));
        let high = transport.send(ChannelGroup::High, &self.group(ChannelGroup::High));
        low.and(high)
    }
}

impl CurrentSink for CurrentTargets {
    #[inline]
    fn set_current(&mut self, channel: Channel, value: i16) {
        self.targets[channel.index()] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: [Option<[i16; 4]>; 2],
        fail_low: bool,
    }

    impl Transport for Recorder {
        fn send(&mut self, group: ChannelGroup, currents: &[i16; 4]) -> Result<(), TxError> {
            if group == ChannelGroup::Low && self.fail_low {
                return Err(TxError::MailboxFull);
            }
            let slot = match group {
                ChannelGroup::Low => 0,
                ChannelGroup::High => 1,
            };
            self.sent[slot] = Some(*currents);
            Ok(())
        }
    }

    #[test]
    fn queued_targets_split_by_group() {
        let mut targets = CurrentTargets::new();
        for id in 0..8u8 {
            targets.set_raw(id, (id as i16 + 1) * 100);
        }
        assert_eq!(targets.group(ChannelGroup::Low), [100, 200, 300, 400]);
        assert_eq!(targets.group(ChannelGroup::High), [500, 600, 700, 800]);

        let mut rec = Recorder::default();
        assert_eq!(targets.transmit(&mut rec), Ok(()));
        assert_eq!(rec.sent[0], Some([100, 200, 300, 400]));
        assert_eq!(rec.sent[1], Some([500, 600, 700, 800]));
    }

    #[test]
    fn unknown_channel_is_ignored() {
        let mut targets = CurrentTargets::new();
        targets.set_raw(8, 1234);
        targets.set_raw(99, -1);
        assert_eq!(targets, CurrentTargets::new());
    }

    #[test]
    fn failed_group_does_not_block_the_other() {
        let mut targets = CurrentTargets::new();
        targets.set_raw(5, -42);
        let mut rec = Recorder {
            fail_low: true,
            ..Default::default()
        };
        assert_eq!(targets.transmit(&mut rec), Err(TxError::MailboxFull));
        assert_eq!(rec.sent[0], None);
        assert_eq!(rec.sent[1], Some([0, -42, 0, 0]));
    }
}
