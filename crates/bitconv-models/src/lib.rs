//! Data side of the bit-serial convolution bench.
//!
//! Holds everything that does not touch the fabric: the input [`Image`],
//! the fixed [`Kernel`], the [`OutputTensor`] both convolvers fill, the
//! software [`ReferenceConvolver`] used as the correctness oracle, the
//! exact-equality [`compare`] step, and the text formats read and written
//! by the harness.
//!
//! ```
//! use bitconv_models::{Image, Kernel, ReferenceConvolver, Shape};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = Image::filled(Shape::new(9, 9, 1), 10);
//! let convolver = ReferenceConvolver::new(Kernel::CENTER_WEIGHTED)?;
//! let out = convolver.convolve(&image)?;
//! assert!(out.as_slice().iter().all(|&v| v == 450));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod compare;
mod error;
pub mod kernel;
pub mod loading;
pub mod reference;
pub mod report;
pub mod tensor;

pub use compare::{compare, Comparison, Mismatch, Verdict};
pub use error::{ModelError, Result};
pub use kernel::Kernel;
pub use loading::{load_image, parse_image};
pub use reference::{ReferenceConvolver, SoftwareTiming};
pub use report::{render_output, write_output};
pub use tensor::{CellIndex, Image, OutputTensor, Shape, Window};
