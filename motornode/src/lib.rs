// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Motor Node Firmware
//!
//! Cascaded position/velocity control for up to eight current-controlled ESCs on a CAN bus,
//! written in Rust, targeting an STM32F777 MCU.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`config`] | Compile-time constants, loop and node configuration |
//! | [`control`] | PID core, velocity loop (pidv), position loop (pidx) |
//! | [`cron`] | Fixed-capacity periodic job table |
//! | [`motors`] | Channels, feedback ingestion, queued current targets |
//! | [`drivers`] | ESC bus frame codec |
//! | [`monitor`] | Snapshot/command bridge for an external monitor |
//! | [`node`] | The scheduler context and its jobs |
//! | `hw` | MCU-level wrappers around USART, CAN (`board` feature) |
//!
//! The control core is hardware-free: everything except `hw` builds and tests on the host.
//!
//! ## Getting Started
//!
//! Run the host tests:
//!
//! ```bash
//! cargo test -p motornode
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cargo run --release --features board --target thumbv7em-none-eabihf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod config;
pub mod control;
pub mod cron;
pub mod drivers;
pub mod monitor;
pub mod motors;
pub mod node;

#[cfg(feature = "board")]
pub mod hw;
