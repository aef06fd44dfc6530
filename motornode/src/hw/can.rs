// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Controller Area Network (CAN) abstraction layer.
//!
//! - `CanBus` wraps a HAL `can::Can` instance in `bxcan::Can`.
//! - `CanBus::split` hands out an interrupt-driven receive half and a non-blocking transmit half.
//! - `CanTx` is the ESC [`Transport`]; `CanRx` drains FIFO0 into the [`FeedbackTable`].

use bxcan::{self, filter::Mask32, Fifo, Frame, Id, Interrupt, StandardId};
use stm32f7xx_hal::can as hal_can;

use crate::config::CHANNELS_PER_GROUP;
use crate::drivers::esc;
use crate::motors::{ChannelGroup, FeedbackTable, Transport, TxError};

/// Wrapper around a bxcan CAN instance built from a HAL CAN peripheral.
pub struct CanBus<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    can: bxcan::Can<hal_can::Can<I>>,
}

impl<I> CanBus<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    /// Create and enable a bxcan instance from a HAL CAN peripheral.
    ///
    /// * `hal_can` – the HAL CAN wrapper
    /// * `btr` – value for the CAN_BTR register (bit timing). Get this from the
    ///           reference manual or the bxcan timing tables.
    /// * `loopback` – enable internal loopback
    /// * `silent` – enable silent mode
    pub fn new(hal_can: hal_can::Can<I>, btr: u32, loopback: bool, silent: bool) -> Self {
        let can = bxcan::Can::builder(hal_can)
            .set_bit_timing(btr)
            .set_loopback(loopback)
            .set_silent(silent)
            .enable();

        Self { can }
    }

    /// Arm the FIFO0 pending interrupt and split into transmit and receive halves.
    ///
    /// FIFO1 is unused; the filters route everything to FIFO0.
    pub fn split(mut self) -> (CanTx<I>, CanRx<I>) {
        self.can.enable_interrupt(Interrupt::Fifo0MessagePending);
        let (tx, rx0, _rx1) = self.can.split();
        (CanTx { tx }, CanRx { rx: rx0 })
    }
}

/// Filter setup for the instance that owns the filter banks (CAN1 on STM32F7).
impl<I> CanBus<I>
where
    hal_can::Can<I>: bxcan::Instance + bxcan::FilterOwner,
{
    /// Accept every frame into FIFO0. The feedback decoder does the id filtering.
    pub fn accept_all(&mut self) {
        self.can
            .modify_filters()
            .enable_bank(0, Fifo::Fifo0, Mask32::accept_all());
    }
}

/// Transmit half. Never blocks: a full mailbox set is reported, not waited out.
pub struct CanTx<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    tx: bxcan::Tx<hal_can::Can<I>>,
}

#[inline]
const fn command_id(group: ChannelGroup) -> StandardId {
    match StandardId::new(esc::command_id(group)) {
        Some(id) => id,
        None => StandardId::ZERO,
    }
}

impl<I> Transport for CanTx<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    fn send(
        &mut self,
        group: ChannelGroup,
        currents: &[i16; CHANNELS_PER_GROUP],
    ) -> Result<(), TxError> {
        let frame = Frame::new_data(command_id(group), esc::encode_currents(currents));
        match self.tx.transmit(&frame) {
            Ok(_) => Ok(()),
            Err(nb::Error::WouldBlock) => Err(TxError::MailboxFull),
            Err(nb::Error::Other(never)) => match never {},
        }
    }
}

/// Receive half, bound to FIFO0.
pub struct CanRx<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    rx: bxcan::Rx0<hal_can::Can<I>>,
}

impl<I> CanRx<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    /// Decode every pending frame into `table`. Returns the number of feedback samples stored.
    ///
    /// Call from the FIFO0 interrupt; returning with the FIFO empty clears the pending flag.
    pub fn drain(&mut self, table: &FeedbackTable) -> usize {
        let mut stored = 0;
        loop {
            match self.rx.receive() {
                Ok(frame) => {
                    if record(&frame, table) {
                        stored += 1;
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => warn!("CAN FIFO0 overrun"),
            }
        }
        stored
    }
}

fn record(frame: &Frame, table: &FeedbackTable) -> bool {
    let Id::Standard(id) = frame.id() else {
        return false;
    };
    let Some(data) = frame.data() else {
        return false;
    };
    match esc::decode_feedback(id.as_raw(), data) {
        Ok(fb) => {
            fb.record(table);
            true
        }
        Err(e) => {
            trace!("ignored frame: {}", e);
            false
        }
    }
}
