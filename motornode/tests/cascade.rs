// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Whole-node behaviour: real feedback table, real scheduler, recorded bus.

use motornode::config::{NodeConfig, CHANNELS_PER_GROUP, ENCODER_ROUND, JOB_CAPACITY};
use motornode::control::{Gains, Loop};
use motornode::cron::{self, Cron};
use motornode::drivers::{decode_feedback, encode_currents};
use motornode::monitor::SharedMonitor;
use motornode::motors::{Channel, ChannelGroup, FeedbackTable, MotorFeedback, Transport, TxError};
use motornode::node::Node;

#[derive(Default)]
struct Recorder {
    frames: Vec<(ChannelGroup, [i16; CHANNELS_PER_GROUP])>,
}

impl Recorder {
    fn last(&self, group: ChannelGroup) -> [i16; CHANNELS_PER_GROUP] {
        self.frames
            .iter()
            .rev()
            .find(|(g, _)| *g == group)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }
}

impl Transport for Recorder {
    fn send(
        &mut self,
        group: ChannelGroup,
        currents: &[i16; CHANNELS_PER_GROUP],
    ) -> Result<(), TxError> {
        self.frames.push((group, *currents));
        Ok(())
    }
}

fn ch(id: u8) -> Channel {
    Channel::new(id).unwrap()
}

fn config() -> NodeConfig {
    let mut cfg = NodeConfig::default();
    cfg.velocity = cfg.velocity.with_gains(2.0, 0.0, 0.0);
    cfg.position = cfg.position.with_gains(1.0, 0.0, 0.0);
    cfg
}

fn running(feedback: &FeedbackTable) -> (Cron<Node<'_, Recorder>>, Node<'_, Recorder>) {
    let node = Node::new(&config(), feedback, Recorder::default()).unwrap();
    let mut table = Cron::new();
    Node::install(&mut table).unwrap();
    (table, node)
}

/// Feed one ESC frame through the codec, the way the receive interrupt does.
fn esc_frame(feedback: &FeedbackTable, id: u8, angle: u16, velocity: i16) {
    let mut data = [0u8; 7];
    data[0..2].copy_from_slice(&angle.to_be_bytes());
    data[2..4].copy_from_slice(&velocity.to_be_bytes());
    data[6] = 35;
    decode_feedback(0x201 + id as u16, &data)
        .unwrap()
        .record(feedback);
}

#[test]
fn position_error_reaches_the_bus_as_current() {
    let feedback = FeedbackTable::new();
    esc_frame(&feedback, 0, 1000, 0);
    let (mut table, mut node) = running(&feedback);

    let cmd = &mut node.monitor_mut().command_mut().axes[0];
    cmd.position.target = 1.0;
    cmd.position.enabled = true;
    cmd.velocity.enabled = true;

    // Tick 1 applies the command at its end; tick 2 is the first controlled step.
    table.tick(&mut node);
    assert_eq!(node.transport().last(ChannelGroup::Low), [0; 4]);
    table.tick(&mut node);

    // angle was zeroed on enable: pidx 1.0 * (1.0 - 0) = 1.0 rpm, pidv 2.0 * (1.0 - 0) = 2
    assert_eq!(node.axis(ch(0)).velocity.pid().target(), 1.0);
    assert_eq!(node.currents().get(ch(0)), 2);
    assert_eq!(node.transport().last(ChannelGroup::Low), [2, 0, 0, 0]);
    assert_eq!(node.transport().last(ChannelGroup::High), [0; 4]);

    let snap = node.monitor().snapshot();
    assert_eq!(snap.counters.ticks, 2);
    assert_eq!(snap.axes[0].current_target, 2);
    assert_eq!(snap.axes[0].velocity.terms().output, 2.0);
}

#[test]
fn velocity_target_follows_monitor_only_while_position_loop_is_off() {
    let feedback = FeedbackTable::new();
    let (mut table, mut node) = running(&feedback);

    {
        let cmd = &mut node.monitor_mut().command_mut().axes[5];
        cmd.velocity.enabled = true;
        cmd.velocity.target = 5.0;
    }
    table.tick(&mut node);
    table.tick(&mut node);
    assert_eq!(node.axis(ch(5)).velocity.pid().target(), 5.0);
    assert_eq!(node.currents().get(ch(5)), 10);
    assert_eq!(node.transport().last(ChannelGroup::High), [0, 10, 0, 0]);

    // With pidx on, its output owns the velocity target.
    node.monitor_mut().command_mut().axes[5].position.enabled = true;
    table.tick(&mut node);
    node.monitor_mut().command_mut().axes[5].velocity.target = 50.0;
    table.tick(&mut node);
    table.tick(&mut node);
    assert_eq!(node.axis(ch(5)).velocity.pid().target(), 0.0);

    // Once pidx is off again the monitor value applies and then persists.
    node.monitor_mut().command_mut().axes[5].position.enabled = false;
    table.tick(&mut node);
    table.tick(&mut node);
    assert_eq!(node.axis(ch(5)).velocity.pid().target(), 50.0);
    table.tick(&mut node);
    assert_eq!(node.axis(ch(5)).velocity.pid().target(), 50.0);
}

#[test]
fn nan_target_from_monitor_does_not_poison_the_loop() {
    let feedback = FeedbackTable::new();
    let (mut table, mut node) = running(&feedback);

    {
        let cmd = &mut node.monitor_mut().command_mut().axes[0].velocity;
        cmd.far = Gains::new(1.0, 1.0, 0.0);
        cmd.target = f32::NAN;
        cmd.enabled = true;
    }
    table.tick(&mut node);
    table.tick(&mut node);
    assert_eq!(node.axis(ch(0)).velocity.pid().target(), 0.0);

    node.monitor_mut().command_mut().axes[0].velocity.target = 10.0;
    for _ in 0..5 {
        table.tick(&mut node);
    }

    // Target lands at the end of the first of the five ticks; four controlled steps follow.
    let pid = node.axis(ch(0)).velocity.pid();
    assert!((pid.integral_accum() - 0.4).abs() < 1e-4);
    assert!(pid.terms().output.is_finite());
    assert_eq!(node.currents().get(ch(0)), 10);
    assert_eq!(node.transport().last(ChannelGroup::Low), [10, 0, 0, 0]);
}

#[test]
fn disabling_velocity_loop_parks_the_current() {
    let feedback = FeedbackTable::new();
    let (mut table, mut node) = running(&feedback);

    {
        let cmd = &mut node.monitor_mut().command_mut().axes[3];
        cmd.velocity.enabled = true;
        cmd.velocity.target = -4.0;
    }
    table.tick(&mut node);
    table.tick(&mut node);
    assert_eq!(node.currents().get(ch(3)), -8);

    node.monitor_mut().command_mut().axes[3].velocity.enabled = false;
    table.tick(&mut node);
    table.tick(&mut node);
    assert!(!node.axis(ch(3)).velocity.is_enabled());
    assert_eq!(node.currents().get(ch(3)), 0);
    assert_eq!(node.transport().last(ChannelGroup::Low), [0; 4]);
}

#[test]
fn position_accumulates_across_encoder_wrap() {
    let feedback = FeedbackTable::new();
    esc_frame(&feedback, 1, 8000, 0);
    esc_frame(&feedback, 1, 100, 0);
    let counts = 100 + i32::from(ENCODER_ROUND) - 8000;
    let expected = counts as f32 * core::f32::consts::TAU / f32::from(ENCODER_ROUND);
    let angle = feedback.status(ch(1)).angle;
    assert!((angle - expected).abs() < 1e-5, "{angle} vs {expected}");

    let (mut table, mut node) = running(&feedback);
    node.monitor_mut().command_mut().axes[1].position.enabled = true;
    table.tick(&mut node);
    assert_eq!(feedback.status(ch(1)).angle, 0.0);
    esc_frame(&feedback, 1, 200, 0);
    table.tick(&mut node);
    assert!(node.monitor().snapshot().axes[1].status.angle > 0.0);
}

#[test]
fn shared_monitor_steers_the_cascade() {
    let feedback = FeedbackTable::new();
    esc_frame(&feedback, 6, 4000, 0);
    let shared = SharedMonitor::new();
    let (mut table, mut node) = running(&feedback);
    node.attach_monitor(&shared);

    shared.edit(|cmd| {
        let axis = &mut cmd.axes[6];
        axis.position.target = -1.5;
        axis.position.enabled = true;
        axis.velocity.enabled = true;
    });
    table.tick(&mut node);
    table.tick(&mut node);

    // pidx 1.0 * (-1.5 - 0) = -1.5 rpm, pidv 2.0 * -1.5 = -3
    let snap = shared.snapshot();
    assert_eq!(snap.counters.ticks, 2);
    assert_eq!(snap.axes[6].velocity.target(), -1.5);
    assert_eq!(snap.axes[6].current_target, -3);
    assert_eq!(node.transport().last(ChannelGroup::High), [0, 0, -3, 0]);
}

#[test]
fn groups_are_framed_big_endian() {
    assert_eq!(
        encode_currents(&[1, -2, 0x1234, 0]),
        [0x00, 0x01, 0xFF, 0xFE, 0x12, 0x34, 0x00, 0x00]
    );
}

#[test]
fn job_table_reports_full_and_sealed() {
    fn noop(_: &mut Node<'_, Recorder>) {}

    let feedback = FeedbackTable::new();
    let (mut table, mut node) = running(&feedback);
    while table.len() < JOB_CAPACITY {
        table.add_job(noop).unwrap();
    }
    assert_eq!(table.add_job(noop), Err(cron::Error::Full));

    table.remove_job(31).unwrap();
    table.tick(&mut node);
    assert_eq!(table.add_job(noop), Err(cron::Error::Sealed));
}
