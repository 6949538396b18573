//! # Elham
//!
//! Reverse-mode automatic differentiation over N-dimensional `f64` arrays.
//!
//! This is the top-level crate: it builds computation graphs out of
//! [`Node`]s, evaluates them with [`Graph::forward`] and differentiates them
//! with [`Graph::backward`].
//!
//! ## Usage
//!
//! ```rust
//! use elham::prelude::*;
//!
//! # fn main() -> elham::Result<()> {
//! let x = Node::variable(Array::scalar(3.0), "x");
//! let two = Node::constant(Array::scalar(2.0), "two");
//! let y = Node::pow(&x, &two, "y");
//!
//! let graph = Graph::new(&y);
//! assert_eq!(graph.forward()?.item()?, 9.0);
//! graph.backward()?;
//! assert_eq!(x.grad()?.item()?, 6.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `elham-core` | Array, Shape, Layout, Device, nested literals, kernels, errors |
//! | `elham` | Node, OpKind derivative rules, Graph, gradient checking |

/// Re-export core types.
pub use elham_core::{
    bail, config, kernels, Array, Device, Error, KernelConfig, Layout, Nested, Result, Shape,
};

pub mod gradcheck;
pub mod graph;
pub mod node;
pub mod op;

pub use graph::Graph;
pub use node::{Node, NodeId, NodeKind};
pub use op::OpKind;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::gradcheck::{finite_diff_grad, max_grad_error};
    pub use crate::{Array, Device, Error, Graph, Nested, Node, OpKind, Result, Shape};
}
