//! Exact comparison of reference and accelerator tensors.

use crate::error::{ModelError, Result};
use crate::tensor::{CellIndex, OutputTensor};
use std::fmt;

/// Mismatches kept for diagnostics by [`compare`].
pub const DEFAULT_MISMATCH_LIMIT: usize = 16;

/// Overall outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every cell matches
    Pass,
    /// At least one cell differs
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// One differing cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Cell position
    pub cell: CellIndex,
    /// Software value
    pub reference: u16,
    /// Fabric value
    pub accelerator: u16,
}

/// Result of comparing two tensors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    cells: usize,
    mismatch_count: usize,
    mismatches: Vec<Mismatch>,
}

impl Comparison {
    /// PASS iff no cell differs
    pub fn verdict(&self) -> Verdict {
        if self.mismatch_count == 0 {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// True iff every cell matched
    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Pass
    }

    /// Number of cells compared
    pub const fn cells(&self) -> usize {
        self.cells
    }

    /// Number of differing cells
    pub const fn mismatch_count(&self) -> usize {
        self.mismatch_count
    }

    /// First differing cells, in processing order
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }
}

/// Compare element-wise, keeping up to [`DEFAULT_MISMATCH_LIMIT`] mismatches.
///
/// # Errors
///
/// Returns [`ModelError::ShapeMismatch`] if the tensors differ in shape.
pub fn compare(reference: &OutputTensor, accelerator: &OutputTensor) -> Result<Comparison> {
    compare_with_limit(reference, accelerator, DEFAULT_MISMATCH_LIMIT)
}

/// Compare element-wise, keeping up to `limit` mismatches.
///
/// # Errors
///
/// Returns [`ModelError::ShapeMismatch`] if the tensors differ in shape.
pub fn compare_with_limit(
    reference: &OutputTensor,
    accelerator: &OutputTensor,
    limit: usize,
) -> Result<Comparison> {
    if reference.shape() != accelerator.shape() {
        return Err(ModelError::ShapeMismatch {
            expected: reference.shape(),
            found: accelerator.shape(),
        });
    }

    let mut mismatch_count = 0;
    let mut mismatches = Vec::new();
    for cell in reference.cells() {
        let (r, a) = (reference.get(cell), accelerator.get(cell));
        if r != a {
            mismatch_count += 1;
            if mismatches.len() < limit {
                mismatches.push(Mismatch {
                    cell,
                    reference: r,
                    accelerator: a,
                });
            }
        }
    }

    if mismatch_count > 0 {
        tracing::warn!(
            "{mismatch_count} of {} cells differ from reference",
            reference.len()
        );
    }

    Ok(Comparison {
        cells: reference.len(),
        mismatch_count,
        mismatches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn identical_zero_tensors_pass() {
        let a = OutputTensor::zeros(Shape::new(3, 3, 3));
        let c = compare(&a, &a.clone()).unwrap();
        assert_eq!(c.verdict(), Verdict::Pass);
        assert_eq!(c.cells(), 27);
    }

    #[test]
    fn single_difference_fails() {
        let a = OutputTensor::zeros(Shape::new(5, 5, 1));
        let mut b = a.clone();
        b.set(CellIndex::new(4, 0, 0), 1);
        let c = compare(&a, &b).unwrap();
        assert!(!c.passed());
        assert_eq!(c.mismatch_count(), 1);
        assert_eq!(
            c.mismatches(),
            &[Mismatch {
                cell: CellIndex::new(4, 0, 0),
                reference: 0,
                accelerator: 1
            }]
        );
    }

    #[test]
    fn mismatch_list_is_capped_but_count_is_not() {
        let a = OutputTensor::zeros(Shape::new(4, 4, 1));
        let mut b = a.clone();
        for cell in a.cells() {
            b.set(cell, 7);
        }
        let c = compare_with_limit(&a, &b, 3).unwrap();
        assert_eq!(c.mismatch_count(), 16);
        assert_eq!(c.mismatches().len(), 3);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = OutputTensor::zeros(Shape::new(2, 2, 1));
        let b = OutputTensor::zeros(Shape::new(2, 2, 3));
        assert!(matches!(
            compare(&a, &b),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(Verdict::Fail.to_string(), "FAIL");
    }
}
