//! Lightweight wrapper for tensor shapes and dimension bookkeeping.

use std::fmt;

use crate::error::{D2sError, Dim, Result};

/// Stores the logical dimensions of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Constructs a new shape from the provided dimensions.
    ///
    /// Panics if `dims` is empty, ensuring every tensor has at least one axis.
    pub fn new<D: Into<Vec<usize>>>(dims: D) -> Self {
        let dims = dims.into();
        assert!(!dims.is_empty(), "shape must have at least one dimension");
        Shape { dims }
    }

    /// Borrow the raw dimension slice for downstream calculations.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the rank (number of axes) of the shape.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Computes the total number of elements implied by the shape.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Computes the element count, returning `None` when the product overflows.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Row-major strides for a contiguous buffer of this shape.
    pub fn contiguous_strides(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.dims.len()];
        let mut stride = 1usize;
        for axis in (0..self.dims.len()).rev() {
            strides[axis] = stride;
            stride *= self.dims[axis];
        }
        strides
    }

    /// Views the shape as `(batch, channel, height, width)`.
    pub fn nchw(&self) -> Result<[usize; 4]> {
        match self.dims.as_slice() {
            &[n, c, h, w] => Ok([n, c, h, w]),
            other => Err(D2sError::shape(
                Dim::Rank,
                format!("expected a rank-4 NCHW tensor, got rank {} {:?}", other.len(), other),
            )),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .dims
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        f.write_str(&dims)
    }
}

impl From<[usize; 4]> for Shape {
    fn from(dims: [usize; 4]) -> Self {
        Shape::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_strides_are_row_major() {
        assert_eq!(Shape::new([2, 3, 4]).contiguous_strides(), vec![12, 4, 1]);
    }

    #[test]
    fn nchw_rejects_other_ranks() {
        let err = Shape::new([2, 3, 4]).nchw().expect_err("rank 3 must fail");
        assert_eq!(err.dim(), Some(Dim::Rank));
        assert_eq!(Shape::new([1, 8, 2, 2]).nchw().unwrap(), [1, 8, 2, 2]);
    }

    #[test]
    fn checked_num_elements_reports_overflow() {
        assert_eq!(Shape::new([usize::MAX, 2]).checked_num_elements(), None);
        assert_eq!(Shape::new([2, 3]).checked_num_elements(), Some(6));
    }
}
