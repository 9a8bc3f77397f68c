//! Register set implementations
//!
//! - **Bridge**: the five PIO ports through an uncached `/dev/mem` mapping
//! - **Software**: a simulated fabric that speaks the same handshake

pub mod bridge;
pub mod mmap;
pub mod software;

pub use bridge::{BridgeBackend, BridgeConfig};
pub use mmap::DevMemWindow;
pub use software::{Fault, SimConfig, SimulatedAccelerator};
