//! Transfer geometry.
//!
//! One transfer carries one bit-plane: a single bit from each of the 25
//! window cells, packed row-major into bits 24:0. The result comes back
//! two bits at a time and fills a 16-bit accumulator.

/// Side length of the square convolution window.
pub const KERNEL_SIZE: usize = 5;

/// Number of cells in one window (and bits in one plane).
pub const PLANE_WIDTH: usize = KERNEL_SIZE * KERNEL_SIZE;

/// Mask of the plane bits in a transfer word.
pub const PLANE_MASK: u32 = (1 << PLANE_WIDTH) - 1;

/// Width of one input sample or kernel weight in bits.
pub const SAMPLE_BITS: u32 = 8;

/// Width of the per-cell result accumulator in bits.
pub const RESULT_BITS: u32 = 16;

/// Width of one result chunk returned by the fabric.
pub const CHUNK_BITS: u32 = 2;

/// Number of result reads needed to complete one cell.
pub const CHUNKS_PER_RESULT: u32 = RESULT_BITS / CHUNK_BITS;

/// Output extent along one axis for an input extent of `input` in
/// stride-1 "valid" mode. Returns `None` if the input is smaller than
/// the window.
#[must_use]
pub const fn valid_extent(input: usize) -> Option<usize> {
    if input < KERNEL_SIZE {
        None
    } else {
        Some(input - KERNEL_SIZE + 1)
    }
}
