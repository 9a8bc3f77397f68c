//! Error types for driver operations

use bitconv_models::{CellIndex, ModelError};
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur while talking to the fabric
#[derive(Debug, Error)]
pub enum DriverError {
    /// Register window could not be mapped
    #[error("Failed to map register window: {reason}")]
    MapFailed {
        /// Reason for failure
        reason: String,
    },

    /// Register access outside the mapped window
    #[error("Register offset {offset:#x} outside {span:#x}-byte window")]
    OutOfBounds {
        /// Requested offset
        offset: usize,
        /// Window span
        span: usize,
    },

    /// Fabric produced no result within the cycle budget
    #[error("Accelerator unresponsive at cell {cell}: no result after {cycles} cycles")]
    AcceleratorUnresponsive {
        /// Cell being computed
        cell: CellIndex,
        /// Cycles spent on the cell
        cycles: u32,
    },

    /// Run cancelled between polling cycles
    #[error("Cancelled at cell {cell}")]
    Cancelled {
        /// Cell being computed
        cell: CellIndex,
    },

    /// Driver used out of order
    #[error("Driver in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Tensor or kernel error
    #[error(transparent)]
    Model {
        /// Underlying model error
        #[from]
        source: ModelError,
    },
}

impl DriverError {
    /// Create a map failed error
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Self::MapFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }
}
