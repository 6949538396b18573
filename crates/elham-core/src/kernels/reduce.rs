use rayon::prelude::*;

use super::{check_device, parallel_for};
use crate::array::Array;
use crate::error::{Error, Result};
use crate::layout::{align_strides_for_broadcast, Layout};
use crate::shape::Shape;

// reduce_to_shape: undo a broadcast by summation
//
// If an operand of shape [3] was broadcast to [2, 3] in the forward pass, its
// gradient arrives as [2, 3] and must be summed over the stretched axis:
//
//   grad [2, 3]  →  sum over axis 0  →  [3]
//
// Rather than reducing axis by axis, the target's contiguous strides are
// aligned against the source shape (stretched axes get stride 0). Walking the
// source in order and adding each element at its aligned offset performs every
// reduction in one pass.
//
// In parallel the work is split by target cell instead. Each cell sums its own
// preimages by walking a "fiber" view that spans only the reduced axes:
//
//   src [4, 5, 6] → target [5, 1]
//   cell  shape [1, 5, 1]  strides [0, 6, 0]   (base offset of each cell)
//   fiber shape [4, 1, 6]  strides [30, 6, 1]  (preimages around that base)
//
// Workers never share an output slot and need no scratch buffers.

/// Sum `src` down to `target`, the adjoint of broadcasting `target` to
/// `src.shape()`.
///
/// Identity when the shapes match. Fails with `BroadcastIncompatible` when
/// `target` does not broadcast to `src.shape()`.
pub fn reduce_to_shape(src: &Array, target: &Shape) -> Result<Array> {
    let device = check_device("reduce_to_shape", src)?;
    if src.shape() == target {
        return Ok(src.clone());
    }
    if !target.broadcasts_to(src.shape()) {
        return Err(Error::BroadcastIncompatible {
            lhs: src.shape().clone(),
            rhs: target.clone(),
        });
    }

    let out = if parallel_for(src.size()) {
        reduce_by_cell(src, target)
    } else {
        let aligned =
            align_strides_for_broadcast(target, &target.stride_contiguous(), src.shape())?;
        let view = Layout::new(src.shape().clone(), aligned);
        let mut acc = vec![0.0; target.elem_count()];
        for (off, &v) in view.strided_indices().zip(src.data()) {
            acc[off] += v;
        }
        acc
    };
    Ok(Array::from_parts(target.clone(), out, device))
}

/// One rayon task per target cell. `target` must already be known to
/// broadcast to `src.shape()`.
fn reduce_by_cell(src: &Array, target: &Shape) -> Vec<f64> {
    let dims = src.dims();
    let pad = dims.len() - target.rank();
    let padded: Vec<usize> = std::iter::repeat(1)
        .take(pad)
        .chain(target.dims().iter().copied())
        .collect();

    let mut cell_strides = vec![0; dims.len()];
    let mut fiber_dims = vec![1; dims.len()];
    for (axis, (&s, &t)) in dims.iter().zip(&padded).enumerate() {
        if t == s {
            cell_strides[axis] = src.strides()[axis];
        } else {
            fiber_dims[axis] = s;
        }
    }
    let cell = Layout::new(Shape::new(padded), cell_strides);
    let fiber = Layout::new(Shape::new(fiber_dims), src.strides().to_vec());
    let data = src.data();

    (0..target.elem_count())
        .into_par_iter()
        .map(|j| {
            let base = cell.offset_of(j);
            fiber
                .strided_indices()
                .map(|off| data[base + off])
                .sum::<f64>()
        })
        .collect()
}

/// Sum of every element, as a rank-0 array.
pub fn sum(a: &Array) -> Result<Array> {
    let device = check_device("sum", a)?;
    let total: f64 = if parallel_for(a.size()) {
        a.data().par_iter().sum()
    } else {
        a.data().iter().sum()
    };
    Ok(Array::scalar(total).with_device(device))
}
