use std::fmt;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::nested::Nested;
use crate::shape::Shape;

// Array: owning N-dimensional buffer of f64
//
// An Array is the value type that flows through the graph: node values,
// gradients and every kernel output are Arrays.
//
// MEMORY MODEL:
//
//   Data is always stored contiguously in row-major order and the array owns
//   it outright. Kernels never mutate their inputs; they allocate a fresh
//   Array for every result. Strided views (broadcast, transpose) exist only as
//   `Layout` values built inside a kernel.
//
// INVARIANTS:
//
//   - data.len() == shape.elem_count()  (1 for a rank-0 scalar)
//   - every extent is positive
//   - strides are the contiguous strides of the shape; `reshape` recomputes
//     them

/// Contiguous N-dimensional array of `f64` values tagged with a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    layout: Layout,
    data: Vec<f64>,
    device: Device,
}

impl Array {
    // Construction

    /// Build from parts a kernel has already sized correctly.
    pub(crate) fn from_parts(shape: Shape, data: Vec<f64>, device: Device) -> Self {
        debug_assert_eq!(data.len(), shape.elem_count());
        Array {
            layout: Layout::contiguous(shape),
            data,
            device,
        }
    }

    /// Array of `shape` with every element set to `fill`.
    pub fn full(shape: impl Into<Shape>, fill: f64) -> Result<Self> {
        let shape = shape.into();
        shape.validate()?;
        let n = shape.elem_count();
        Ok(Self::from_parts(shape, vec![fill; n], Device::Cpu))
    }

    pub fn zeros(shape: impl Into<Shape>) -> Result<Self> {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: impl Into<Shape>) -> Result<Self> {
        Self::full(shape, 1.0)
    }

    /// Same shape and device as `other`, every element set to `fill`.
    pub fn like(other: &Array, fill: f64) -> Self {
        Array {
            layout: other.layout.clone(),
            data: vec![fill; other.data.len()],
            device: other.device,
        }
    }

    /// Rank-0 array holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self::from_parts(Shape::scalar(), vec![value], Device::Cpu)
    }

    /// Array from row-major `data` laid out as `shape`.
    pub fn from_vec(data: Vec<f64>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        shape.validate()?;
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        Ok(Self::from_parts(shape, data, Device::Cpu))
    }

    /// Array from a (possibly nested) literal.
    ///
    /// ```ignore
    /// let m = Array::from_nested([[1.0, 2.0], [3.0, 4.0]])?;
    /// assert_eq!(m.dims(), &[2, 2]);
    /// ```
    pub fn from_nested(literal: impl Into<Nested>) -> Result<Self> {
        let literal = literal.into();
        let shape = literal.shape()?;
        Ok(Self::from_parts(shape, literal.flatten(), Device::Cpu))
    }

    /// Re-tag this array with another device. Data is not moved.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.layout.dims()
    }

    pub fn strides(&self) -> &[usize] {
        self.layout.strides()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Elements in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Element at a multi-dimensional index, or None when out of range.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.rank() || index.iter().zip(self.dims()).any(|(&i, &d)| i >= d) {
            return None;
        }
        self.data.get(self.layout.flat_index(index)).copied()
    }

    /// The single value of a one-element array.
    pub fn item(&self) -> Result<f64> {
        match self.data.as_slice() {
            [v] => Ok(*v),
            _ => Err(Error::msg(format!(
                "item: array of shape {} has {} elements, expected 1",
                self.shape(),
                self.size()
            ))),
        }
    }

    /// Same data under a new shape with the same element count.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        shape.validate()?;
        if shape.elem_count() != self.size() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: self.size(),
                shape,
            });
        }
        Ok(Self::from_parts(shape, self.data.clone(), self.device))
    }

    /// Nested literal with this array's shape and contents.
    pub fn to_nested(&self) -> Nested {
        Nested::from_flat(&self.data, self.dims())
    }

    /// Short one-line description, e.g. `Array([2, 2], size=4, dev=cpu)`.
    pub fn desc(&self) -> String {
        format!(
            "Array({}, size={}, dev={})",
            self.shape(),
            self.size(),
            self.device
        )
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Array(shape={}, device={}, data={})",
            self.shape(),
            self.device,
            self.to_nested()
        )
    }
}
