//! Flat, row-major tensors.
//!
//! Both the input image and the output accumulators live in one contiguous
//! buffer each, addressed as `((row * width) + col) * channels + channel`.

use crate::error::{ModelError, Result};
use bitconv_chip::geometry::{valid_extent, KERNEL_SIZE};
use std::fmt;

/// One 5×5 grid of byte samples: an input window or the kernel weights.
pub type Window = [[u8; KERNEL_SIZE]; KERNEL_SIZE];

/// Tensor dimensions, `height × width × channels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Rows
    pub height: usize,
    /// Columns
    pub width: usize,
    /// Channels per pixel
    pub channels: usize,
}

impl Shape {
    /// Create a shape
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Total number of elements
    pub const fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Total number of elements, or `None` if the product overflows `usize`
    pub const fn checked_len(&self) -> Option<usize> {
        match self.height.checked_mul(self.width) {
            Some(plane) => plane.checked_mul(self.channels),
            None => None,
        }
    }

    /// True if any dimension is zero
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of the stride-1 "valid" 5×5 convolution of this shape.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DimensionTooSmall`] if height or width is below 5.
    pub fn valid_output(&self) -> Result<Self> {
        match (valid_extent(self.height), valid_extent(self.width)) {
            (Some(height), Some(width)) => Ok(Self::new(height, width, self.channels)),
            _ => Err(ModelError::DimensionTooSmall {
                height: self.height,
                width: self.width,
            }),
        }
    }

    const fn offset(&self, row: usize, col: usize, channel: usize) -> usize {
        (row * self.width + col) * self.channels + channel
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Position of one output cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    /// Output row
    pub row: usize,
    /// Output column
    pub col: usize,
    /// Channel
    pub channel: usize,
}

impl CellIndex {
    /// Create a cell index
    pub const fn new(row: usize, col: usize, channel: usize) -> Self {
        Self { row, col, channel }
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}][{}]", self.row, self.col, self.channel)
    }
}

/// Input image of unsigned 8-bit samples.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    shape: Shape,
    data: Vec<u8>,
}

impl Image {
    /// Wrap a row-major, channel-interleaved buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Truncated`] if `data.len()` does not equal
    /// `shape.len()`.
    pub fn new(shape: Shape, data: Vec<u8>) -> Result<Self> {
        if data.len() != shape.len() {
            return Err(ModelError::Truncated {
                expected: shape.len(),
                found: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Image with every sample set to `value`.
    pub fn filled(shape: Shape, value: u8) -> Self {
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }

    /// Image whose sample at `(row, col, channel)` is `f(row, col, channel)`.
    pub fn from_fn(shape: Shape, mut f: impl FnMut(usize, usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(shape.len());
        for row in 0..shape.height {
            for col in 0..shape.width {
                for channel in 0..shape.channels {
                    data.push(f(row, col, channel));
                }
            }
        }
        Self { shape, data }
    }

    /// Dimensions
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Sample at `(row, col, channel)`.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the image.
    pub fn get(&self, row: usize, col: usize, channel: usize) -> u8 {
        assert!(
            row < self.shape.height && col < self.shape.width && channel < self.shape.channels,
            "sample [{row}][{col}][{channel}] outside {}",
            self.shape
        );
        self.data[self.shape.offset(row, col, channel)]
    }

    /// The 5×5 window of `channel` whose top-left corner is `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the window extends past the image.
    pub fn window(&self, row: usize, col: usize, channel: usize) -> Window {
        let mut w = [[0u8; KERNEL_SIZE]; KERNEL_SIZE];
        for (ki, line) in w.iter_mut().enumerate() {
            for (kj, cell) in line.iter_mut().enumerate() {
                *cell = self.get(row + ki, col + kj, channel);
            }
        }
        w
    }

    /// Raw samples in row-major, channel-interleaved order
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Output tensor of 16-bit accumulators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTensor {
    shape: Shape,
    data: Vec<u16>,
}

impl OutputTensor {
    /// Zero-initialised tensor
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0; shape.len()],
        }
    }

    /// Zero-initialised tensor sized for the valid convolution of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DimensionTooSmall`] if the image is smaller than
    /// the window.
    pub fn for_image(image: &Image) -> Result<Self> {
        Ok(Self::zeros(image.shape().valid_output()?))
    }

    /// Dimensions
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the tensor has no cells
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `cell`.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is outside the tensor.
    pub fn get(&self, cell: CellIndex) -> u16 {
        self.data[self.checked_offset(cell)]
    }

    /// Store `value` at `cell`.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is outside the tensor.
    pub fn set(&mut self, cell: CellIndex, value: u16) {
        let offset = self.checked_offset(cell);
        self.data[offset] = value;
    }

    /// Cells in processing order: channel-major, then row, then column.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> {
        let Shape {
            height,
            width,
            channels,
        } = self.shape;
        (0..channels).flat_map(move |channel| {
            (0..height)
                .flat_map(move |row| (0..width).map(move |col| CellIndex::new(row, col, channel)))
        })
    }

    /// Raw values in row-major, channel-interleaved order
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    fn checked_offset(&self, cell: CellIndex) -> usize {
        assert!(
            cell.row < self.shape.height
                && cell.col < self.shape.width
                && cell.channel < self.shape.channels,
            "cell {cell} outside {}",
            self.shape
        );
        self.shape.offset(cell.row, cell.col, cell.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_shape_shrinks_by_four() {
        for h in 5..20 {
            for w in 5..20 {
                let out = Shape::new(h, w, 3).valid_output().unwrap();
                assert_eq!(out, Shape::new(h - 4, w - 4, 3));
            }
        }
    }

    #[test]
    fn too_small_image_is_rejected() {
        let err = Shape::new(4, 9, 1).valid_output().unwrap_err();
        assert!(matches!(
            err,
            ModelError::DimensionTooSmall { height: 4, width: 9 }
        ));
    }

    #[test]
    fn image_length_must_match_shape() {
        assert!(Image::new(Shape::new(2, 2, 1), vec![0; 3]).is_err());
        assert!(Image::new(Shape::new(2, 2, 1), vec![0; 4]).is_ok());
    }

    #[test]
    fn offsets_are_channel_interleaved() {
        let image = Image::new(Shape::new(1, 2, 3), vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(image.get(0, 0, 2), 3);
        assert_eq!(image.get(0, 1, 0), 4);
    }

    #[test]
    fn window_extracts_one_channel() {
        let image = Image::from_fn(Shape::new(6, 6, 2), |r, c, ch| {
            u8::try_from(r * 10 + c + ch * 100).unwrap()
        });
        let w = image.window(1, 1, 1);
        assert_eq!(w[0][0], 111);
        assert_eq!(w[4][4], 155);
    }

    #[test]
    fn cells_visit_each_cell_once_channel_major() {
        let t = OutputTensor::zeros(Shape::new(2, 3, 2));
        let cells: Vec<_> = t.cells().collect();
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], CellIndex::new(0, 0, 0));
        assert_eq!(cells[5], CellIndex::new(1, 2, 0));
        assert_eq!(cells[6], CellIndex::new(0, 0, 1));
    }

    #[test]
    fn checked_len_detects_overflow() {
        assert_eq!(Shape::new(2, 3, 4).checked_len(), Some(24));
        assert_eq!(Shape::new(usize::MAX, 2, 1).checked_len(), None);
        assert_eq!(Shape::new(1 << 32, 1 << 32, 1 << 32).checked_len(), None);
    }

    #[test]
    fn zeros_start_at_zero() {
        let t = OutputTensor::zeros(Shape::new(3, 3, 3));
        assert!(t.as_slice().iter().all(|&v| v == 0));
    }
}
