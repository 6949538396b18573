use std::fmt;

use crate::error::{Error, Result};

// Shape: N-dimensional extents of an Array
//
//   - Scalar: Shape([])          has 0 dimensions, 1 element
//   - Vector: Shape([3])         has 1 dimension, 3 elements
//   - Matrix: Shape([2, 3])      has 2 dimensions, 6 elements
//
// A Shape on its own may hold zero-sized dims; Arrays reject them through
// `Shape::validate` so every stored buffer has at least one element.

/// N-dimensional shape of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The rank-0 shape.
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix, etc.).
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    /// A scalar shape [] has 1 element.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>().max(1)
    }

    /// Fail with `InvalidDimension` if any extent is zero.
    pub fn validate(&self) -> Result<()> {
        if self.0.iter().any(|&d| d == 0) {
            return Err(Error::InvalidDimension {
                shape: self.clone(),
            });
        }
        Ok(())
    }

    /// Contiguous (row-major) strides for this shape.
    ///
    /// For shape [2, 3, 4], strides are [12, 4, 1].
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.rank()];
        if self.rank() > 0 {
            strides[self.rank() - 1] = 1;
            for i in (0..self.rank() - 1).rev() {
                strides[i] = strides[i + 1] * self.0[i + 1];
            }
        }
        strides
    }

    // Broadcasting

    /// Compute the broadcast output shape from two input shapes.
    ///
    /// NumPy-style rules:
    ///   1. Align shapes from the right (trailing dimensions).
    ///   2. Dimensions are compatible if they are equal or one of them is 1.
    ///   3. Missing leading dimensions are treated as 1.
    ///
    /// Examples:
    ///   [3, 4] and [4]       → [3, 4]
    ///   [2, 1] and [1, 3]    → [2, 3]
    ///   [5, 3, 1] and [3, 4] → [5, 3, 4]
    ///   [3] and [4]          → Error
    pub fn broadcast_shape(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
        let l = lhs.dims();
        let r = rhs.dims();
        let max_rank = l.len().max(r.len());
        let mut result = Vec::with_capacity(max_rank);

        for i in 0..max_rank {
            let ld = if i < l.len() { l[l.len() - 1 - i] } else { 1 };
            let rd = if i < r.len() { r[r.len() - 1 - i] } else { 1 };

            if ld == rd || rd == 1 {
                result.push(ld);
            } else if ld == 1 {
                result.push(rd);
            } else {
                return Err(Error::BroadcastIncompatible {
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                });
            }
        }

        result.reverse();
        Ok(Shape::new(result))
    }

    /// Whether `self` can be stretched to `target` without changing `target`.
    pub fn broadcasts_to(&self, target: &Shape) -> bool {
        matches!(Shape::broadcast_shape(self, target), Ok(s) if &s == target)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(s: [usize; N]) -> Self {
        Shape(s.to_vec())
    }
}
