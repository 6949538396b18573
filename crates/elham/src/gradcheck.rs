//! Numerical gradient checking.
//!
//! Central differences give an independent estimate of
//! `d(sum(root)) / d(variable)` that analytic gradients from
//! [`Graph::backward`](crate::Graph::backward) can be compared against:
//!
//! ```text
//!   df/dx_i ≈ (f(x + eps e_i) - f(x - eps e_i)) / (2 eps)
//! ```

use elham_core::{bail, kernels, Array, Result};

use crate::graph::Graph;
use crate::node::Node;

fn sum_of_root(graph: &Graph) -> Result<f64> {
    kernels::sum(&graph.forward()?)?.item()
}

/// Central-difference gradient of `sum(root)` with respect to `variable`.
///
/// Each element of the variable is perturbed by `±eps` and the graph is
/// re-run. The variable's original value is restored (and the graph
/// re-evaluated) before returning, even if an evaluation fails. Gradients
/// already stored on the graph's nodes are reset by the re-evaluation.
pub fn finite_diff_grad(graph: &Graph, variable: &Node, eps: f64) -> Result<Array> {
    let original = variable.value()?;
    let estimate = probe(graph, variable, &original, eps);
    variable.set_value(original)?;
    graph.forward()?;
    estimate
}

fn probe(graph: &Graph, variable: &Node, original: &Array, eps: f64) -> Result<Array> {
    let mut grad = Vec::with_capacity(original.size());
    for i in 0..original.size() {
        let mut plus = original.clone();
        plus.data_mut()[i] += eps;
        variable.set_value(plus)?;
        let f_plus = sum_of_root(graph)?;

        let mut minus = original.clone();
        minus.data_mut()[i] -= eps;
        variable.set_value(minus)?;
        let f_minus = sum_of_root(graph)?;

        grad.push((f_plus - f_minus) / (2.0 * eps));
    }
    Array::from_vec(grad, original.shape().clone())
}

/// Largest absolute elementwise difference between two same-shaped arrays.
pub fn max_grad_error(a: &Array, b: &Array) -> Result<f64> {
    if a.shape() != b.shape() {
        bail!(
            "max_grad_error: shape mismatch {} vs {}",
            a.shape(),
            b.shape()
        );
    }
    Ok(a.data()
        .iter()
        .zip(b.data())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max))
}
