//! Fixed 5×5 convolution kernel.

use crate::tensor::Window;

/// A 5×5 grid of unsigned 8-bit weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    weights: Window,
}

impl Kernel {
    /// Center-weighted smoothing filter: all ones, 25 at the center.
    ///
    /// Weights sum to 45.
    pub const CENTER_WEIGHTED: Self = Self::new([
        [1, 1, 1, 1, 1],
        [1, 1, 1, 1, 1],
        [1, 1, 25, 1, 1],
        [1, 1, 1, 1, 1],
        [1, 1, 1, 1, 1],
    ]);

    /// Kernel from explicit weights
    pub const fn new(weights: Window) -> Self {
        Self { weights }
    }

    /// Weight grid
    pub const fn weights(&self) -> &Window {
        &self.weights
    }

    /// Sum of all weights
    pub fn weight_sum(&self) -> u32 {
        self.weights.iter().flatten().map(|&w| u32::from(w)).sum()
    }

    /// Largest possible response: every sample at 255.
    pub fn worst_case_response(&self) -> u32 {
        self.weight_sum() * u32::from(u8::MAX)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::CENTER_WEIGHTED
    }
}
