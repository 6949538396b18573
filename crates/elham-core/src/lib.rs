//! # elham-core
//!
//! Array primitives and CPU kernels for Elham.
//!
//! This crate provides:
//! - [`Array`]: contiguous N-dimensional `f64` buffer tagged with a [`Device`]
//! - [`Shape`] / [`Layout`]: extents, strides and zero-copy broadcast views
//! - [`Nested`]: rectangular literal structures for building arrays
//! - [`kernels`]: broadcasting elementwise ops, matmul, dot, cross and
//!   gradient reduction
//! - [`KernelConfig`]: process-wide parallelism switches
//! - [`Error`] / [`Result`]: the error type shared by every Elham crate
// - Shape: n-dimensional shape + broadcasting rules
// - Layout: strides and view arithmetic used inside kernels
// - Array: owned data, always contiguous
// - Kernels: free functions Array -> Array, rayon-parallel above a threshold

pub mod array;
pub mod config;
pub mod device;
pub mod error;
pub mod kernels;
pub mod layout;
pub mod nested;
pub mod shape;

pub use array::Array;
pub use config::KernelConfig;
pub use device::Device;
pub use error::{Error, Result};
pub use layout::Layout;
pub use nested::{Nested, MAX_RANK};
pub use shape::Shape;
