//! Silicon model for the bit-serial 5×5 convolution fabric.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the fabric as seen from the HPS: the lightweight bridge
//! window, the five PIO registers and their bit fields, the fabric clock,
//! and the geometry of one bit-serial transfer.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`bridge`] | Lightweight HPS-to-FPGA bridge base address and span |
//! | [`regs`] | PIO register offsets and bit definitions |
//! | [`clock`] | Fabric clock and cycle/time conversion |
//! | [`geometry`] | Window size, plane width, result width, chunk width |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod clock;
pub mod geometry;
pub mod regs;
