// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! MCU-level wrappers, compiled only for the board.

pub mod can;
pub mod pins;
pub mod usart;

pub use can::{CanBus, CanRx, CanTx};
pub use pins::BoardPins;
pub use usart::Usart;
