//! Software reference convolution.
//!
//! `out[i][j][c] = Σ image[i+ki][j+kj][c] · kernel[ki][kj]` over the 5×5
//! window, stride 1, no padding. Sums are formed in `u32` and stored as
//! `u16`; the kernel is checked at construction so the narrowing can never
//! lose bits.

use crate::error::{ModelError, Result};
use crate::kernel::Kernel;
use crate::tensor::{CellIndex, Image, OutputTensor};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wall-clock timing of one reference pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftwareTiming {
    /// Elapsed monotonic time
    pub total: Duration,
    /// Output cells computed
    pub cells: usize,
}

impl SoftwareTiming {
    /// Average time per output cell in microseconds
    pub fn micros_per_cell(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let cells = self.cells as f64;
        self.total.as_secs_f64() * 1e6 / cells
    }
}

impl fmt::Display for SoftwareTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance metrics in software:")?;
        writeln!(
            f,
            "Total time in software                  : {:.9} seconds",
            self.total.as_secs_f64()
        )?;
        write!(
            f,
            "Average time per computation in software: {:.9} useconds",
            self.micros_per_cell()
        )
    }
}

/// Reference convolver bound to one kernel
#[derive(Debug, Clone, Copy)]
pub struct ReferenceConvolver {
    kernel: Kernel,
}

impl ReferenceConvolver {
    /// Bind a kernel.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AccumulatorOverflow`] if a window of 255s could
    /// push the response past `u16::MAX`.
    pub fn new(kernel: Kernel) -> Result<Self> {
        let worst_case = kernel.worst_case_response();
        if worst_case > u32::from(u16::MAX) {
            return Err(ModelError::AccumulatorOverflow { worst_case });
        }
        debug!("Reference kernel accepted: worst case {worst_case}");
        Ok(Self { kernel })
    }

    /// Bound kernel
    pub const fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Response of a single output cell.
    ///
    /// # Panics
    ///
    /// Panics if the window at `cell` extends past the image.
    pub fn cell(&self, image: &Image, cell: CellIndex) -> u16 {
        let window = image.window(cell.row, cell.col, cell.channel);
        let sum: u32 = window
            .iter()
            .flatten()
            .zip(self.kernel.weights().iter().flatten())
            .map(|(&x, &k)| u32::from(x) * u32::from(k))
            .sum();
        // Bounded by worst_case_response, checked in new()
        u16::try_from(sum).unwrap_or(u16::MAX)
    }

    /// Convolve the whole image.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DimensionTooSmall`] if the image is smaller than
    /// the window.
    pub fn convolve(&self, image: &Image) -> Result<OutputTensor> {
        let mut out = OutputTensor::for_image(image)?;
        let cells: Vec<CellIndex> = out.cells().collect();
        for cell in cells {
            out.set(cell, self.cell(image, cell));
        }
        Ok(out)
    }

    /// Convolve and time the pass with a monotonic clock.
    ///
    /// # Errors
    ///
    /// Same as [`convolve`](Self::convolve).
    pub fn convolve_timed(&self, image: &Image) -> Result<(OutputTensor, SoftwareTiming)> {
        let start = Instant::now();
        let out = self.convolve(image)?;
        let timing = SoftwareTiming {
            total: start.elapsed(),
            cells: out.len(),
        };
        info!(
            "Reference convolution {} -> {} in {:?}",
            image.shape(),
            out.shape(),
            timing.total
        );
        Ok((out, timing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    fn convolver() -> ReferenceConvolver {
        ReferenceConvolver::new(Kernel::CENTER_WEIGHTED).unwrap()
    }

    #[test]
    fn all_ones_gives_weight_sum() {
        let out = convolver().convolve(&Image::filled(Shape::new(5, 5, 1), 1)).unwrap();
        assert_eq!(out.shape(), Shape::new(1, 1, 1));
        assert_eq!(out.as_slice(), &[45]);
    }

    #[test]
    fn constant_ten_gives_450_everywhere() {
        let out = convolver().convolve(&Image::filled(Shape::new(9, 9, 1), 10)).unwrap();
        assert_eq!(out.shape(), Shape::new(5, 5, 1));
        assert!(out.as_slice().iter().all(|&v| v == 450));
    }

    #[test]
    fn saturated_image_hits_worst_case() {
        let out = convolver().convolve(&Image::filled(Shape::new(6, 7, 3), 255)).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 11_475));
    }

    #[test]
    fn center_tap_dominates() {
        // Single bright pixel at (2,2): only the cell whose center lands on it sees 25×
        let image = Image::from_fn(Shape::new(5, 5, 1), |r, c, _| u8::from(r == 2 && c == 2));
        assert_eq!(convolver().convolve(&image).unwrap().as_slice(), &[25]);
    }

    #[test]
    fn channels_are_independent() {
        let image = Image::from_fn(Shape::new(5, 5, 3), |_, _, ch| [0, 1, 2][ch]);
        let out = convolver().convolve(&image).unwrap();
        assert_eq!(out.as_slice(), &[0, 45, 90]);
    }

    #[test]
    fn overflowing_kernel_is_rejected() {
        let err = ReferenceConvolver::new(Kernel::new([[255; 5]; 5])).unwrap_err();
        assert!(matches!(err, ModelError::AccumulatorOverflow { worst_case: 1_625_625 }));
    }

    #[test]
    fn timing_average_divides_by_cells() {
        let (out, timing) = convolver()
            .convolve_timed(&Image::filled(Shape::new(8, 8, 3), 3))
            .unwrap();
        assert_eq!(timing.cells, out.len());
        assert_eq!(timing.cells, 4 * 4 * 3);
        let expected = timing.total.as_secs_f64() * 1e6 / 48.0;
        assert!((timing.micros_per_cell() - expected).abs() < 1e-9);
        assert!(timing.micros_per_cell() >= 0.0);
    }
}
