//! Error types for tensor, kernel and file-format operations

use crate::tensor::Shape;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building tensors, convolving, or reading/writing files
#[derive(Debug, Error)]
pub enum ModelError {
    /// Input file not found
    #[error("Input file not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// Malformed dimension header or structure
    #[error("Failed to parse image: {reason}")]
    ParseError {
        /// Reason for failure
        reason: String,
    },

    /// A pixel token is not an unsigned byte
    #[error("Invalid sample {token:?} at [{row}][{col}][{channel}]")]
    InvalidSample {
        /// Pixel row
        row: usize,
        /// Pixel column
        col: usize,
        /// Channel within the pixel
        channel: usize,
        /// Offending token
        token: String,
    },

    /// Fewer sample tokens than the header promised
    #[error("Image data truncated: expected {expected} samples, found {found}")]
    Truncated {
        /// Samples required by the header
        expected: usize,
        /// Samples actually present
        found: usize,
    },

    /// Image is smaller than the convolution window
    #[error("Image {height}x{width} is smaller than the 5x5 window")]
    DimensionTooSmall {
        /// Input height
        height: usize,
        /// Input width
        width: usize,
    },

    /// Buffer length or tensor shape does not match
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Expected shape
        expected: Shape,
        /// Shape actually supplied
        found: Shape,
    },

    /// Kernel can overflow the 16-bit output accumulator
    #[error("Kernel worst-case response {worst_case} exceeds 16-bit accumulator")]
    AccumulatorOverflow {
        /// 255 × sum of weights
        worst_case: u32,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Create a parse error
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// Create a file-not-found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
