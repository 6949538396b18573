// Kernels: free functions that compute new Arrays from existing ones
//
// Every kernel validates shapes and devices up front, then allocates a fresh
// output. Inputs are never modified.
//
// KEY CONCEPTS:
//
// 1. **Elementwise template**: binary and unary ops share one loop. The output
//    shape is the broadcast of the operand shapes; each operand is read
//    through a stride-aligned view, so broadcasting never copies.
//
// 2. **Linear algebra**: matmul (2-D), dot (1-D, rank-0 result), cross
//    (3-vectors) and transpose (2-D).
//
// 3. **Gradient reduction**: `reduce_to_shape` sums a broadcast gradient back
//    down to an operand's shape. It is the adjoint of broadcasting.
//
// Work is split across rayon workers once the element count reaches the
// threshold in `config::kernel_config()`.

mod elementwise;
mod linalg;
mod reduce;

pub use elementwise::{add, binary, div, exp, ln, mul, neg, pow, sqrt, sub, unary};
pub use linalg::{cross, dot, matmul, transpose};
pub use reduce::{reduce_to_shape, sum};

use crate::array::Array;
use crate::device::Device;
use crate::error::{Error, Result};

/// Elementwise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
        }
    }
}

/// Elementwise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Ln,
    Sqrt,
}

impl UnaryOp {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Ln => x.ln(),
            UnaryOp::Sqrt => x.sqrt(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Exp => "exp",
            UnaryOp::Ln => "ln",
            UnaryOp::Sqrt => "sqrt",
        }
    }
}

/// Only CPU arrays have kernels.
fn check_device(op: &'static str, a: &Array) -> Result<Device> {
    let device = a.device();
    if device.is_cpu() {
        Ok(device)
    } else {
        Err(Error::UnsupportedDevice { op, device })
    }
}

/// Both operands must share a device, and that device must be the CPU.
fn check_devices(op: &'static str, a: &Array, b: &Array) -> Result<Device> {
    if a.device() != b.device() {
        return Err(Error::DeviceMismatch {
            lhs: a.device(),
            rhs: b.device(),
        });
    }
    check_device(op, a)
}

/// Whether a kernel touching `work` elements should go parallel.
fn parallel_for(work: usize) -> bool {
    crate::config::kernel_config().should_parallelize(work)
}
