use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout: how a logical shape maps onto a flat buffer
//
// Arrays always own contiguous row-major data. A Layout with non-default
// strides is a transient *view* that kernels build on the fly and throw
// away; it is never stored inside an Array.
//
// KEY CONCEPTS:
//
// 1. **Strides**: how many elements to skip in the flat buffer to move one
//    step along each dimension. A contiguous [2,3] matrix has strides [3,1].
//
// 2. **Broadcast view**: a dimension of size 1 (or a dimension the source does
//    not have at all) gets stride 0 in the target rank. Reading index k along
//    that axis then always lands on the same element, so [3] behaves like
//    [4, 3] without copying anything.
//
//      source [3]      strides [1]
//      target [4, 3]   aligned [0, 1]
//
// 3. **Transpose view**: swap shape and strides of two axes. Walking the view
//    in logical order reads the source column-major.

/// A shape plus the strides used to address it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
}

impl Layout {
    /// Contiguous (row-major) layout for the given shape.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout { shape, strides }
    }

    /// Layout with explicit strides (for views).
    pub fn new(shape: Shape, strides: Vec<usize>) -> Self {
        Layout { shape, strides }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn is_contiguous(&self) -> bool {
        self.strides == self.shape.stride_contiguous()
    }

    /// Virtual broadcast of this layout to `target`, with stride 0 on every
    /// stretched or padded axis.
    pub fn broadcast_to(&self, target: &Shape) -> Result<Layout> {
        let strides = align_strides_for_broadcast(&self.shape, &self.strides, target)?;
        Ok(Layout::new(target.clone(), strides))
    }

    /// Swap two axes without touching data.
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Layout> {
        let rank = self.rank();
        if dim0 >= rank || dim1 >= rank {
            return Err(Error::msg(format!(
                "transpose: axes ({}, {}) out of range for shape {}",
                dim0, dim1, self.shape
            )));
        }
        let mut dims = self.shape.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.swap(dim0, dim1);
        strides.swap(dim0, dim1);
        Ok(Layout::new(Shape::new(dims), strides))
    }

    /// flat_index = sum(index[i] * stride[i])
    pub fn flat_index(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(&i, &s)| i * s)
            .sum()
    }

    /// Buffer offset of the element at logical linear position `idx`.
    pub fn offset_of(&self, idx: usize) -> usize {
        offset_from_linear(idx, &self.shape, &self.strides)
    }

    /// Iterator over buffer offsets of all elements, in logical order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self)
    }
}

/// Strides of `target`'s rank for reading a `shape`/`strides` source as if it
/// had been broadcast to `target`.
///
/// Source axes that are size 1 while the target axis is larger, and target
/// axes the source does not have (left padding), map to stride 0.
pub fn align_strides_for_broadcast(
    shape: &Shape,
    strides: &[usize],
    target: &Shape,
) -> Result<Vec<usize>> {
    let src = shape.dims();
    let dst = target.dims();
    if src.len() > dst.len() || strides.len() != src.len() {
        return Err(Error::BroadcastIncompatible {
            lhs: shape.clone(),
            rhs: target.clone(),
        });
    }

    let pad = dst.len() - src.len();
    let mut aligned = vec![0usize; dst.len()];
    for (i, (&d, &s)) in src.iter().zip(strides.iter()).enumerate() {
        let t = dst[pad + i];
        if d == t {
            aligned[pad + i] = s;
        } else if d != 1 {
            return Err(Error::BroadcastIncompatible {
                lhs: shape.clone(),
                rhs: target.clone(),
            });
        }
    }
    Ok(aligned)
}

/// Decode a linear index into coordinates of `shape` (row-major) and dot the
/// coordinates with `aligned_strides`.
pub fn offset_from_linear(idx: usize, shape: &Shape, aligned_strides: &[usize]) -> usize {
    let dims = shape.dims();
    let mut remainder = idx;
    let mut offset = 0;
    for axis in (0..dims.len()).rev() {
        let coord = remainder % dims[axis];
        remainder /= dims[axis];
        offset += coord * aligned_strides[axis];
    }
    offset
}

// StridedIter: walks a view in logical order
//
// Odometer over the multi-dimensional index, rightmost axis fastest. For a
// contiguous layout this yields 0, 1, 2, ...; for a broadcast view it repeats
// offsets along stride-0 axes; for a transposed view it jumps around.

/// Iterator that yields buffer offsets for each element of a Layout.
pub struct StridedIter {
    current: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
    remaining: usize,
    started: bool,
}

impl StridedIter {
    fn new(layout: &Layout) -> Self {
        StridedIter {
            current: vec![0; layout.rank()],
            dims: layout.dims().to_vec(),
            strides: layout.strides().to_vec(),
            offset: 0,
            remaining: layout.elem_count(),
            started: false,
        }
    }

    /// Advance the index by one, keeping `offset` in sync incrementally.
    fn advance(&mut self) {
        for i in (0..self.dims.len()).rev() {
            self.current[i] += 1;
            self.offset += self.strides[i];
            if self.current[i] < self.dims[i] {
                return;
            }
            self.offset -= self.current[i] * self.strides[i];
            self.current[i] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        if self.started {
            self.advance();
        }
        self.started = true;
        self.remaining -= 1;
        Some(self.offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}
