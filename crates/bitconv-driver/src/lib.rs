//! Host driver for the bit-serial 5×5 convolution fabric.
//!
//! The fabric sits behind five PIO ports on the HPS-to-FPGA lightweight
//! bridge. For every output cell the driver streams the input window and
//! the kernel one bit-plane at a time and collects the 16-bit result two
//! bits at a time, synchronising on ready/valid bits in the same ports.
//!
//! # Backends
//!
//! ```text
//! Hardware:
//!   BridgeBackend         /dev/mem mapping of 0xFF200000, O_SYNC
//!
//! Development / CI:
//!   SimulatedAccelerator  register-level fabric model, fault injection
//! ```
//!
//! # Quick start
//!
//! ```
//! use bitconv_driver::{HandshakeConfig, HandshakeDriver, PerformanceSampler, SimulatedAccelerator};
//! use bitconv_models::{compare, Image, Kernel, ReferenceConvolver, Shape, Verdict};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = Image::filled(Shape::new(9, 9, 1), 10);
//! let kernel = Kernel::CENTER_WEIGHTED;
//!
//! let mut driver = HandshakeDriver::new(SimulatedAccelerator::default(), HandshakeConfig::default());
//! let (fabric, _stats) = driver.run(&image, &kernel)?;
//! let perf = PerformanceSampler::default().sample(driver.registers_mut(), fabric.len())?;
//!
//! let reference = ReferenceConvolver::new(kernel)?.convolve(&image)?;
//! assert_eq!(compare(&reference, &fabric)?.verdict(), Verdict::Pass);
//! assert!(perf.compute.cycles > 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
mod error;
pub mod handshake;
pub mod perf;
pub mod register;
pub mod serializer;

pub use backend::{select_backend, BackendOptions, BackendSelection, BackendType};
pub use backends::{BridgeBackend, BridgeConfig, DevMemWindow, Fault, SimConfig, SimulatedAccelerator};
pub use error::{DriverError, Result};
pub use handshake::{CancelToken, CellStats, HandshakeConfig, HandshakeDriver, HandshakePhase, RunStats};
pub use perf::{CounterReading, PerfSample, PerformanceSampler};
pub use register::{ControlWord, ReadRegister, RegisterInterface, StatusWord, WriteRegister};
pub use serializer::{bit_plane, reassemble_grid, reassemble_sample};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        select_backend, BackendOptions, BackendSelection, CancelToken, DriverError,
        HandshakeConfig, HandshakeDriver, PerformanceSampler, RegisterInterface, Result,
        SimConfig, SimulatedAccelerator,
    };
}
