// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Feedback ingestion.
//!
//! [`FeedbackTable`] is written from the CAN receive interrupt and read from the scheduler tick. It
//! is designed to live in a `static` and be shared by reference across both contexts:
//!
//! - current, velocity and temperature are independent atomics (last write wins);
//! - the encoder track (previous raw sample + continuous count) is a read-modify-write and sits
//!   behind a critical section, so a concurrent [`reset_position`](FeedbackTable::reset_position)
//!   can never be lost.
//!
//! The continuous angle is stored as a signed count of encoder ticks and only converted to radians
//! on read.

use core::cell::Cell;
use core::f32::consts::TAU;
use core::sync::atomic::{AtomicI16, AtomicU8, Ordering};

use critical_section::Mutex;

use crate::config::{CHANNEL_COUNT, ENCODER_ROUND};
use crate::motors::{Channel, MotorFeedback, MotorStatus};

/// Shaft angle covered by one encoder count (rad).
pub const RAD_PER_COUNT: f32 = TAU / ENCODER_ROUND as f32;

/// Signed encoder movement between two raw samples, accounting for wraparound.
///
/// A jump of more than half a revolution is taken as a wrap in the opposite direction. A jump of
/// exactly half a revolution is not.
#[inline]
pub fn encoder_delta(prev: u16, next: u16) -> i32 {
    let round = ENCODER_ROUND as i32;
    let half = round / 2;
    let diff = next as i32 - prev as i32;
    if diff < -half {
        diff + round
    } else if diff > half {
        diff - round
    } else {
        diff
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct EncoderTrack {
    /// Previous raw sample. `None` until the first frame arrives.
    last_raw: Option<u16>,
    /// Continuous position in encoder counts.
    counts: i64,
}

impl EncoderTrack {
    const EMPTY: Self = Self {
        last_raw: None,
        counts: 0,
    };

    fn push(&mut self, raw: u16) {
        if let Some(prev) = self.last_raw {
            self.counts += encoder_delta(prev, raw) as i64;
        }
        self.last_raw = Some(raw);
    }

    #[inline]
    fn angle(&self) -> f32 {
        self.counts as f32 * RAD_PER_COUNT
    }
}

struct ChannelFeedback {
    current: AtomicI16,
    velocity: AtomicI16,
    temperature: AtomicU8,
    encoder: Mutex<Cell<EncoderTrack>>,
}

impl ChannelFeedback {
    const fn new() -> Self {
        Self {
            current: AtomicI16::new(0),
            velocity: AtomicI16::new(0),
            temperature: AtomicU8::new(0),
            encoder: Mutex::new(Cell::new(EncoderTrack::EMPTY)),
        }
    }

    fn status_in(&self, cs: critical_section::CriticalSection<'_>) -> MotorStatus {
        MotorStatus {
            current: self.current.load(Ordering::Relaxed),
            velocity: self.velocity.load(Ordering::Relaxed),
            angle: self.encoder.borrow(cs).get().angle(),
            temperature: self.temperature.load(Ordering::Relaxed),
        }
    }
}

/// Interrupt-shared motor feedback for every channel.
pub struct FeedbackTable {
    channels: [ChannelFeedback; CHANNEL_COUNT],
}

impl Default for FeedbackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackTable {
    pub const fn new() -> Self {
        Self {
            channels: [const { ChannelFeedback::new() }; CHANNEL_COUNT],
        }
    }

    /// Record one feedback sample. Call from the bus receive path.
    ///
    /// Unknown channel ids are ignored. A raw angle outside `[0, ENCODER_ROUND)` is dropped while the
    /// other fields are still recorded.
    pub fn update_status(
        &self,
        channel_id: u8,
        angle_raw: u16,
        velocity_raw: i16,
        current_raw: i16,
        temperature_raw: u8,
    ) {
        let Some(ch) = Channel::new(channel_id) else {
            trace!("feedback for unknown channel {}", channel_id);
            return;
        };
        let slot = &self.channels[ch.index()];

        // One critical section per frame, so a snapshot never sees half of it.
        critical_section::with(|cs| {
            slot.current.store(current_raw, Ordering::Relaxed);
            slot.velocity.store(velocity_raw, Ordering::Relaxed);
            slot.temperature.store(temperature_raw, Ordering::Relaxed);

            if angle_raw >= ENCODER_ROUND {
                trace!("channel {} angle {} out of range", channel_id, angle_raw);
                return;
            }
            let cell = slot.encoder.borrow(cs);
            let mut track = cell.get();
            track.push(angle_raw);
            cell.set(track);
        });
    }
}

impl MotorFeedback for FeedbackTable {
    fn status(&self, channel: Channel) -> MotorStatus {
        critical_section::with(|cs| self.channels[channel.index()].status_in(cs))
    }

    /// Zero the continuous angle. The last raw sample is kept so the next frame still unwraps
    /// against it.
    fn reset_position(&self, channel: Channel) {
        critical_section::with(|cs| {
            let cell = self.channels[channel.index()].encoder.borrow(cs);
            let mut track = cell.get();
            track.counts = 0;
            cell.set(track);
        });
        debug!("channel {} position reset", channel.id());
    }

    fn snapshot(&self) -> [MotorStatus; CHANNEL_COUNT] {
        critical_section::with(|cs| core::array::from_fn(|i| self.channels[i].status_in(cs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: u8) -> Channel {
        Channel::new(id).unwrap()
    }

    #[test]
    fn unwrap_handles_both_wrap_directions() {
        assert_eq!(encoder_delta(8190, 2), 4);
        assert_eq!(encoder_delta(2, 8190), -4);
        assert_eq!(encoder_delta(100, 150), 50);
        assert_eq!(encoder_delta(150, 100), -50);
    }

    #[test]
    fn exactly_half_range_is_not_a_wrap() {
        assert_eq!(encoder_delta(0, 4096), 4096);
        assert_eq!(encoder_delta(4096, 0), -4096);
        assert_eq!(encoder_delta(0, 4097), -4095);
        assert_eq!(encoder_delta(4097, 0), 4095);
    }

    #[test]
    fn noise_at_half_range_does_not_drift() {
        let table = FeedbackTable::new();
        for raw in [0u16, 4096, 0, 4096, 0, 4097, 0, 4097, 0] {
            table.update_status(0, raw, 0, 0, 0);
        }
        assert_eq!(table.status(ch(0)).angle, 0.0);
    }

    #[test]
    fn first_sample_seeds_reference() {
        let table = FeedbackTable::new();
        table.update_status(2, 5000, 0, 0, 0);
        assert_eq!(table.status(ch(2)).angle, 0.0);
        table.update_status(2, 5100, 0, 0, 0);
        assert!((table.status(ch(2)).angle - 100.0 * RAD_PER_COUNT).abs() < 1e-6);
    }

    #[test]
    fn forward_wrap_accumulates_into_continuous_angle() {
        let table = FeedbackTable::new();
        table.update_status(1, 8190, 0, 0, 0);
        table.update_status(1, 2, 0, 0, 0);
        let angle = table.status(ch(1)).angle;
        assert!((angle - 4.0 * RAD_PER_COUNT).abs() < 1e-6);

        table.update_status(1, 8190, 0, 0, 0);
        assert!(table.status(ch(1)).angle.abs() < 1e-6);
    }

    #[test]
    fn multi_turn_angle_is_not_wrapped() {
        let table = FeedbackTable::new();
        // Three full forward turns in steps of a quarter revolution.
        let mut raw = 0u16;
        table.update_status(3, raw, 0, 0, 0);
        for _ in 0..12 {
            raw = (raw + ENCODER_ROUND / 4) % ENCODER_ROUND;
            table.update_status(3, raw, 0, 0, 0);
        }
        let angle = table.status(ch(3)).angle;
        assert!((angle - 3.0 * TAU).abs() < 1e-4, "angle {}", angle);
    }

    #[test]
    fn reset_zeroes_angle_but_keeps_reference() {
        let table = FeedbackTable::new();
        table.update_status(4, 1000, 0, 0, 0);
        table.update_status(4, 3000, 0, 0, 0);
        table.reset_position(ch(4));
        assert_eq!(table.status(ch(4)).angle, 0.0);

        table.update_status(4, 3010, 0, 0, 0);
        assert!((table.status(ch(4)).angle - 10.0 * RAD_PER_COUNT).abs() < 1e-6);
    }

    #[test]
    fn scalar_fields_are_latest_value() {
        let table = FeedbackTable::new();
        table.update_status(5, 0, 120, -300, 41);
        table.update_status(5, 0, -80, 250, 42);
        let s = table.status(ch(5));
        assert_eq!(s.velocity, -80);
        assert_eq!(s.current, 250);
        assert_eq!(s.temperature, 42);
    }

    #[test]
    fn unknown_channel_and_bad_angle_are_ignored() {
        let table = FeedbackTable::new();
        table.update_status(8, 100, 1, 1, 1);
        table.update_status(200, 100, 1, 1, 1);
        assert!(table.snapshot().iter().all(|s| *s == MotorStatus::default()));

        table.update_status(6, 10, 0, 0, 0);
        table.update_status(6, ENCODER_ROUND, 9, 0, 0);
        let s = table.status(ch(6));
        assert_eq!(s.velocity, 9);
        assert_eq!(s.angle, 0.0);
    }

    #[test]
    fn concurrent_snapshot_sees_whole_frames() {
        let table = FeedbackTable::new();
        table.update_status(0, 0, 0, 0, 0);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for k in 1..2000i16 {
                    table.update_status(0, k as u16, k, -k, k as u8);
                }
            });
            for _ in 0..2000 {
                let s = table.snapshot()[0];
                assert_eq!(s.current, -s.velocity);
                assert_eq!(s.temperature, s.velocity as u8);
                let expected = f32::from(s.velocity) * RAD_PER_COUNT;
                assert!((s.angle - expected).abs() < 1e-4, "{:?}", s);
            }
        });
    }

    #[test]
    fn snapshot_matches_individual_reads() {
        let table = FeedbackTable::new();
        for id in 0..CHANNEL_COUNT as u8 {
            table.update_status(id, 0, id as i16 * 10, -(id as i16), 30 + id);
        }
        let snap = table.snapshot();
        for c in Channel::all() {
            assert_eq!(snap[c.index()], table.status(c));
        }
        assert_eq!(snap[7].velocity, 70);
    }
}
