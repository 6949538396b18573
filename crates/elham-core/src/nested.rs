use std::fmt;

use crate::error::{Error, Result};
use crate::shape::Shape;

/// Deepest nesting accepted when building an Array from a literal.
pub const MAX_RANK: usize = 6;

// Nested: rectangular literal structures
//
// A nested literal is either a single number or a list of nested literals.
// The shape is measured level by level: the outer length at each depth is
// that dimension's extent, and every sibling at a given depth must report the
// same sub-shape.
//
//   1.0                      → []
//   [1.0, 2.0, 3.0]          → [3]
//   [[1.0, 2.0], [3.0, 4.0]] → [2, 2]
//   [[1.0, 2.0], [3.0]]      → RaggedLiteral at depth 1
//
// Flattening visits scalars in row-major order, which is exactly the storage
// order of a contiguous Array.

/// A number or an arbitrarily nested list of numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Scalar(f64),
    List(Vec<Nested>),
}

impl Nested {
    /// Infer the shape, validating rectangularity and rank.
    pub fn shape(&self) -> Result<Shape> {
        Ok(Shape::new(self.infer_dims(0)?))
    }

    fn infer_dims(&self, depth: usize) -> Result<Vec<usize>> {
        let items = match self {
            Nested::Scalar(_) => return Ok(Vec::new()),
            Nested::List(items) => items,
        };
        // A list at this depth would exceed MAX_RANK dimensions.
        if depth >= MAX_RANK {
            return Err(Error::RankTooLarge {
                rank: depth + self.depth_below(),
                max: MAX_RANK,
            });
        }
        let first = match items.first() {
            Some(first) => first.infer_dims(depth + 1)?,
            None => {
                return Err(Error::InvalidDimension {
                    shape: Shape::from(0),
                })
            }
        };
        for item in &items[1..] {
            let got = item.infer_dims(depth + 1)?;
            if got != first {
                return Err(Error::RaggedLiteral {
                    depth: depth + 1,
                    expected: Shape::new(first),
                    got: Shape::new(got),
                });
            }
        }
        let mut dims = Vec::with_capacity(first.len() + 1);
        dims.push(items.len());
        dims.extend(first);
        Ok(dims)
    }

    // Depth of the leftmost descent, used only for the RankTooLarge report.
    fn depth_below(&self) -> usize {
        let mut depth = 0;
        let mut cur = self;
        while let Nested::List(items) = cur {
            match items.first() {
                Some(next) => {
                    depth += 1;
                    cur = next;
                }
                None => break,
            }
        }
        depth
    }

    /// Scalars in row-major order.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            Nested::Scalar(v) => out.push(*v),
            Nested::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
        }
    }

    /// Rebuild a nested structure of `dims` from row-major `data`.
    pub(crate) fn from_flat(data: &[f64], dims: &[usize]) -> Nested {
        match dims.split_first() {
            None => Nested::Scalar(data.first().copied().unwrap_or(0.0)),
            Some((&n, rest)) => {
                let chunk = rest.iter().product::<usize>().max(1);
                Nested::List(
                    data.chunks(chunk)
                        .take(n)
                        .map(|c| Nested::from_flat(c, rest))
                        .collect(),
                )
            }
        }
    }
}

impl fmt::Display for Nested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nested::Scalar(v) => write!(f, "{}", v),
            Nested::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for Nested {
    fn from(v: f64) -> Self {
        Nested::Scalar(v)
    }
}

impl<T: Into<Nested>> From<Vec<T>> for Nested {
    fn from(v: Vec<T>) -> Self {
        Nested::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Nested>, const N: usize> From<[T; N]> for Nested {
    fn from(v: [T; N]) -> Self {
        Nested::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_inference() {
        assert_eq!(Nested::from(2.5).shape().unwrap(), Shape::scalar());
        assert_eq!(
            Nested::from([1.0, 2.0, 3.0]).shape().unwrap(),
            Shape::from(3)
        );
        assert_eq!(
            Nested::from([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
                .shape()
                .unwrap(),
            Shape::from((2, 3))
        );
    }

    #[test]
    fn test_ragged_rejected() {
        let lit = Nested::from(vec![vec![1.0, 2.0], vec![3.0]]);
        match lit.shape() {
            Err(Error::RaggedLiteral { depth, expected, got }) => {
                assert_eq!(depth, 1);
                assert_eq!(expected, Shape::from(2));
                assert_eq!(got, Shape::from(1));
            }
            other => panic!("expected RaggedLiteral, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_scalar_and_list_is_ragged() {
        let lit = Nested::List(vec![Nested::Scalar(1.0), Nested::from([2.0])]);
        assert!(matches!(lit.shape(), Err(Error::RaggedLiteral { .. })));
    }

    #[test]
    fn test_empty_list_is_invalid_dimension() {
        let lit = Nested::List(vec![]);
        assert!(matches!(lit.shape(), Err(Error::InvalidDimension { .. })));
    }

    #[test]
    fn test_rank_limit() {
        let six = Nested::from([[[[[[1.0]]]]]]);
        assert_eq!(six.shape().unwrap().rank(), 6);

        let seven = Nested::from([[[[[[[1.0]]]]]]]);
        assert!(matches!(
            seven.shape(),
            Err(Error::RankTooLarge { rank: 7, max: 6 })
        ));
    }

    #[test]
    fn test_flatten_and_rebuild() {
        let lit = Nested::from([[1.0, 2.0], [3.0, 4.0]]);
        let flat = lit.flatten();
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(Nested::from_flat(&flat, &[2, 2]), lit);
        assert_eq!(lit.to_string(), "[[1, 2], [3, 4]]");
    }
}
