use crate::device::Device;
use crate::shape::Shape;

/// All errors that can occur within Elham.
///
/// Shape and structure violations are reported the moment they are detected,
/// at construction or kernel invocation. Numeric domain problems (division by
/// zero, logarithm of a non-positive value) are NOT errors: they surface as the
/// IEEE result (inf / NaN) and propagate through later operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two shapes cannot be broadcast together (e.g. [2, 3] and [4]).
    #[error("shapes {lhs} and {rhs} are not broadcast-compatible")]
    BroadcastIncompatible { lhs: Shape, rhs: Shape },

    /// Operation requires a specific rank (number of dimensions).
    #[error("{op}: expected rank {expected}, got shape {got}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        got: Shape,
    },

    /// Matrix multiplication inner-dimension mismatch.
    #[error("matmul shape mismatch: [{m}x{k1}] @ [{k2}x{n}], inner dims must match")]
    MatmulShapeMismatch {
        m: usize,
        k1: usize,
        k2: usize,
        n: usize,
    },

    /// Dot product operands have different lengths.
    #[error("dot: vectors must have the same length, got {lhs} and {rhs}")]
    DotLengthMismatch { lhs: usize, rhs: usize },

    /// Cross product operand is not a 3-vector.
    #[error("{op}: requires shape [3], got {got}")]
    NotVec3 { op: &'static str, got: Shape },

    /// Nested literal is not rectangular.
    #[error("ragged structure at depth {depth}: expected sub-shape {expected}, got {got}")]
    RaggedLiteral {
        depth: usize,
        expected: Shape,
        got: Shape,
    },

    /// A requested shape has a zero-sized dimension.
    #[error("invalid shape {shape}: every dimension must be positive")]
    InvalidDimension { shape: Shape },

    /// Nested literal nests deeper than the supported maximum rank.
    #[error("rank {rank} exceeds the maximum supported rank {max}")]
    RankTooLarge { rank: usize, max: usize },

    /// Element count mismatch when creating from a vec or reshaping.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Operands live on different devices.
    #[error("device mismatch: {lhs} vs {rhs}")]
    DeviceMismatch { lhs: Device, rhs: Device },

    /// No kernel exists for this device.
    #[error("{op}: no kernel available for device {device}")]
    UnsupportedDevice { op: &'static str, device: Device },

    /// A node's value was requested before it was ever evaluated.
    #[error("node '{name}' has not been evaluated; run forward() first")]
    NotEvaluated { name: String },

    /// Tried to assign a value to a node computed by an operator.
    #[error("node '{name}' is an operator; only leaf values can be assigned")]
    NotALeaf { name: String },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Whether this error belongs to the shape/structure class.
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Error::BroadcastIncompatible { .. }
                | Error::RankMismatch { .. }
                | Error::MatmulShapeMismatch { .. }
                | Error::DotLengthMismatch { .. }
                | Error::NotVec3 { .. }
                | Error::RaggedLiteral { .. }
                | Error::InvalidDimension { .. }
                | Error::RankTooLarge { .. }
                | Error::ElementCountMismatch { .. }
        )
    }
}

/// Convenience Result type used throughout Elham.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
