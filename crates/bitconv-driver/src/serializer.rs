//! Bit-plane serialization of 5×5 grids.
//!
//! Plane `p` of a grid is the word whose bit `i·5 + j` is bit `p` of cell
//! `(i, j)`. Eight planes carry a full byte per cell; any higher plane is
//! all zeros.

use bitconv_chip::geometry::SAMPLE_BITS;
use bitconv_models::Window;

/// Serialize bit-plane `plane` of `grid`.
///
/// Defined for every `plane`; planes at or above 8 yield 0.
pub fn bit_plane(grid: &Window, plane: u32) -> u32 {
    grid.iter()
        .flatten()
        .enumerate()
        .fold(0, |word, (pos, &sample)| {
            let bit = u32::from(sample).checked_shr(plane).unwrap_or(0) & 1;
            word | (bit << pos)
        })
}

/// Rebuild the byte at row-major position `cell` from successive planes.
///
/// `planes[p]` must hold plane `p`; only the first eight are used and
/// missing planes count as zero.
pub fn reassemble_sample(planes: &[u32], cell: usize) -> u8 {
    planes
        .iter()
        .take(SAMPLE_BITS as usize)
        .enumerate()
        .fold(0, |sample, (p, &word)| {
            let bit = u8::from((word >> cell) & 1 == 1);
            sample | (bit << p)
        })
}

/// Rebuild a whole grid from successive planes.
pub fn reassemble_grid(planes: &[u32]) -> Window {
    let mut grid = Window::default();
    for (pos, cell) in grid.iter_mut().flatten().enumerate() {
        *cell = reassemble_sample(planes, pos);
    }
    grid
}
