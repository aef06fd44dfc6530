// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! This module contains device-level protocol code that sits above the raw `hw/` layer and below the
//! control core.
//!
//! ## Existing drivers
//!
//! - [`esc`] – current-controlled ESC bus protocol (group current commands, per-channel feedback)

pub mod esc;

pub use esc::{decode_feedback, encode_currents, Feedback};
