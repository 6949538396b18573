// OpKind: the closed set of differentiable operators
//
// Each operator knows two things:
//
//   apply(a, b)                  → forward value
//   partials(g, a, b, value)     → (∂/∂a, ∂/∂b) given the upstream gradient g
//
// Partials are returned at the *broadcast* shape of the operation. The caller
// reduces each one to its child's shape with `reduce_to_shape`, so the rules
// below never deal with broadcasting themselves.
//
// DERIVATIVE TABLE (⊙ is elementwise product):
//
//   add       g                          g
//   sub       g                          -g
//   mul       g ⊙ b                      g ⊙ a
//   div       g / b                      -(g ⊙ a) / (b ⊙ b)
//   pow a^b   g ⊙ b ⊙ a^(b-1)            g ⊙ ln(a) ⊙ a^b
//   ln        g / a
//   exp       g ⊙ exp(a)
//   sqrt      g / (2 ⊙ sqrt(a))
//   log_b(x)  g / (x ⊙ ln b)             -g ⊙ ln(x) / (b ⊙ (ln b)²)
//   matmul    g @ Bᵗ                     Aᵗ @ g
//   dot       g ⊙ b                      g ⊙ a          (g is rank-0)
//   cross     b × g                      g × a
//
// Cached forward values are reused: exp and sqrt take their own `value`
// instead of recomputing it, and pow reuses a^b for ∂/∂b.

use elham_core::kernels;
use elham_core::{Array, Error, Result};

/// A differentiable operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Ln,
    Exp,
    Sqrt,
    /// `log_base(x, b)`: logarithm of `x` in base `b`.
    LogBase,
    Matmul,
    Dot,
    Cross,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Pow => "pow",
            OpKind::Ln => "ln",
            OpKind::Exp => "exp",
            OpKind::Sqrt => "sqrt",
            OpKind::LogBase => "log_base",
            OpKind::Matmul => "matmul",
            OpKind::Dot => "dot",
            OpKind::Cross => "cross",
        }
    }

    fn rhs<'a>(self, b: Option<&'a Array>) -> Result<&'a Array> {
        b.ok_or_else(|| Error::msg(format!("{}: missing second operand", self.name())))
    }

    /// Forward evaluation.
    pub fn apply(self, a: &Array, b: Option<&Array>) -> Result<Array> {
        match self {
            OpKind::Add => kernels::add(a, self.rhs(b)?),
            OpKind::Sub => kernels::sub(a, self.rhs(b)?),
            OpKind::Mul => kernels::mul(a, self.rhs(b)?),
            OpKind::Div => kernels::div(a, self.rhs(b)?),
            OpKind::Pow => kernels::pow(a, self.rhs(b)?),
            OpKind::Ln => kernels::ln(a),
            OpKind::Exp => kernels::exp(a),
            OpKind::Sqrt => kernels::sqrt(a),
            OpKind::LogBase => kernels::div(&kernels::ln(a)?, &kernels::ln(self.rhs(b)?)?),
            OpKind::Matmul => kernels::matmul(a, self.rhs(b)?),
            OpKind::Dot => kernels::dot(a, self.rhs(b)?),
            OpKind::Cross => kernels::cross(a, self.rhs(b)?),
        }
    }

    /// Partial derivatives with respect to each operand, not yet reduced to
    /// the operand shapes. The second entry is `None` for unary operators.
    pub fn partials(
        self,
        upstream: &Array,
        a: &Array,
        b: Option<&Array>,
        value: &Array,
    ) -> Result<(Array, Option<Array>)> {
        let g = upstream;
        match self {
            OpKind::Add => Ok((g.clone(), Some(g.clone()))),
            OpKind::Sub => Ok((g.clone(), Some(kernels::neg(g)?))),
            OpKind::Mul => {
                let b = self.rhs(b)?;
                Ok((kernels::mul(g, b)?, Some(kernels::mul(g, a)?)))
            }
            OpKind::Div => {
                let b = self.rhs(b)?;
                let da = kernels::div(g, b)?;
                let ga = kernels::mul(g, a)?;
                let db = kernels::neg(&kernels::div(&ga, &kernels::mul(b, b)?)?)?;
                Ok((da, Some(db)))
            }
            OpKind::Pow => {
                let b = self.rhs(b)?;
                let b_minus_one = kernels::sub(b, &Array::scalar(1.0))?;
                let da = kernels::mul(
                    &kernels::mul(g, b)?,
                    &kernels::pow(a, &b_minus_one)?,
                )?;
                let db = kernels::mul(&kernels::mul(g, &kernels::ln(a)?)?, value)?;
                Ok((da, Some(db)))
            }
            OpKind::Ln => Ok((kernels::div(g, a)?, None)),
            OpKind::Exp => Ok((kernels::mul(g, value)?, None)),
            OpKind::Sqrt => {
                let two_value = kernels::mul(&Array::scalar(2.0), value)?;
                Ok((kernels::div(g, &two_value)?, None))
            }
            OpKind::LogBase => {
                let base = self.rhs(b)?;
                let ln_b = kernels::ln(base)?;
                let dx = kernels::div(g, &kernels::mul(a, &ln_b)?)?;
                let num = kernels::mul(g, &kernels::ln(a)?)?;
                let den = kernels::mul(base, &kernels::mul(&ln_b, &ln_b)?)?;
                let db = kernels::neg(&kernels::div(&num, &den)?)?;
                Ok((dx, Some(db)))
            }
            OpKind::Matmul => {
                let b = self.rhs(b)?;
                let da = kernels::matmul(g, &kernels::transpose(b)?)?;
                let db = kernels::matmul(&kernels::transpose(a)?, g)?;
                Ok((da, Some(db)))
            }
            OpKind::Dot => {
                let b = self.rhs(b)?;
                Ok((kernels::mul(g, b)?, Some(kernels::mul(g, a)?)))
            }
            OpKind::Cross => {
                let b = self.rhs(b)?;
                Ok((kernels::cross(b, g)?, Some(kernels::cross(g, a)?)))
            }
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
