//! Host-backed tensor used by the eager path, literals, and tests.

use std::sync::Arc;

use rand::Rng;

use super::{shape::Shape, storage::StorageElement};
use crate::backend::spec::{self, Dimension, TensorLiteral, TensorSpec};
use crate::error::{D2sError, Dim, Result};

/// Dense row-major tensor owning its element buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<E: StorageElement = f32> {
    shape: Shape,
    data: Vec<E>,
}

impl<E: StorageElement> Tensor<E> {
    /// Constructs a tensor from raw values, validating the length against the shape.
    pub fn from_vec(shape: Shape, data: Vec<E>) -> Result<Self> {
        let expected = shape.checked_num_elements().ok_or_else(|| {
            D2sError::shape(
                Dim::Elements,
                format!("element count of shape {:?} overflows usize", shape.dims()),
            )
        })?;
        if data.len() != expected {
            return Err(D2sError::shape(
                Dim::Elements,
                format!(
                    "tensor data length ({}) does not match shape {:?}",
                    data.len(),
                    shape.dims()
                ),
            ));
        }
        Ok(Tensor { shape, data })
    }

    /// Builds a tensor by evaluating `f` at every flat row-major index.
    pub fn from_fn<F>(shape: Shape, f: F) -> Self
    where
        F: FnMut(usize) -> E,
    {
        let data = (0..shape.num_elements()).map(f).collect();
        Tensor { shape, data }
    }

    /// Returns a zero-initialized tensor of the requested shape.
    pub fn zeros(shape: Shape) -> Self {
        let len = shape.num_elements();
        Tensor {
            shape,
            data: vec![E::default(); len],
        }
    }

    /// Samples from a normal distribution (`N(0, std^2)`) using the Box-Muller transform.
    pub fn randn(shape: Shape, std: f64, rng: &mut impl Rng) -> Self {
        let len = shape.num_elements();
        let mut values = Vec::with_capacity(len);
        while values.len() < len {
            let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
            let u2: f64 = rng.gen::<f64>();
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f64::consts::PI * u2;
            values.push(E::from_f64(r * theta.cos() * std));
            if values.len() < len {
                values.push(E::from_f64(r * theta.sin() * std));
            }
        }
        Tensor {
            shape,
            data: values,
        }
    }

    /// Returns the total number of elements stored in the tensor.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Reports whether the tensor contains zero elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Provides access to the tensor shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the portable dtype of the element type.
    pub fn dtype(&self) -> spec::DType {
        E::DTYPE
    }

    /// Borrows the flat row-major element buffer.
    pub fn data(&self) -> &[E] {
        &self.data
    }

    /// Consumes the tensor and returns its element buffer.
    pub fn into_data(self) -> Vec<E> {
        self.data
    }

    /// Describes the tensor as a fully static backend spec.
    pub fn spec(&self) -> TensorSpec {
        TensorSpec::new(E::DTYPE, spec::Shape::from_static(self.shape.dims()))
    }

    /// Wraps the tensor in a backend-neutral little-endian literal.
    pub fn to_literal(&self) -> TensorLiteral {
        let mut bytes = Vec::with_capacity(self.data.len() * E::BYTES);
        for &value in &self.data {
            value.write_le(&mut bytes);
        }
        TensorLiteral::new(self.spec(), Arc::from(bytes.into_boxed_slice()))
    }

    /// Reconstructs a host tensor from a backend literal of the same dtype.
    pub fn from_literal(literal: &TensorLiteral) -> Result<Self> {
        if literal.spec.dtype != E::DTYPE {
            return Err(D2sError::shape(
                Dim::Elements,
                format!(
                    "literal dtype {:?} does not match host element dtype {:?}",
                    literal.spec.dtype,
                    E::DTYPE
                ),
            ));
        }
        let dims = literal
            .spec
            .shape
            .dims()
            .iter()
            .map(|dim| match dim {
                Dimension::Static(value) => Ok(*value),
                Dimension::Dynamic(symbol) => Err(D2sError::shape(
                    Dim::Rank,
                    format!("literal carries dynamic dimension ?{}", symbol.as_str()),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        if dims.is_empty() {
            return Err(D2sError::shape(
                Dim::Rank,
                "literal must have at least one dimension",
            ));
        }
        let shape = Shape::new(dims);
        let expected_bytes = shape
            .checked_num_elements()
            .and_then(|count| count.checked_mul(E::BYTES))
            .ok_or_else(|| {
                D2sError::shape(Dim::Elements, format!("literal shape {shape} overflows usize"))
            })?;
        if literal.bytes.len() != expected_bytes {
            return Err(D2sError::shape(
                Dim::Elements,
                format!(
                    "literal byte length {} does not match expected {}",
                    literal.bytes.len(),
                    expected_bytes
                ),
            ));
        }
        let data = literal
            .bytes
            .chunks_exact(E::BYTES)
            .map(E::read_le)
            .collect();
        Ok(Tensor { shape, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::spec::DType;

    #[test]
    fn from_vec_rejects_length_mismatch() {
        let err = Tensor::from_vec(Shape::new([2, 2]), vec![1.0f32, 2.0, 3.0])
            .expect_err("three values cannot fill a 2x2 tensor");
        assert_eq!(err.dim(), Some(Dim::Elements));
    }

    #[test]
    fn literal_roundtrip_preserves_values_and_shape() {
        let tensor = Tensor::from_fn(Shape::new([1, 2, 2, 2]), |i| i as i32 - 3);
        let literal = tensor.to_literal();
        assert_eq!(literal.byte_len(), 8 * 4);
        let back = Tensor::<i32>::from_literal(&literal).unwrap();
        assert_eq!(back, tensor);
    }

    #[test]
    fn from_literal_rejects_scalar_and_overflowing_shapes() {
        let scalar = TensorLiteral::new(
            TensorSpec::new(DType::F32, spec::Shape::from_static(&[])),
            Arc::from(vec![0u8; 4].into_boxed_slice()),
        );
        let err = Tensor::<f32>::from_literal(&scalar).unwrap_err();
        assert_eq!(err.dim(), Some(Dim::Rank));

        let huge = TensorLiteral::new(
            TensorSpec::new(DType::F32, spec::Shape::from_static(&[usize::MAX, 2])),
            Arc::from(vec![0u8; 4].into_boxed_slice()),
        );
        let err = Tensor::<f32>::from_literal(&huge).unwrap_err();
        assert_eq!(err.dim(), Some(Dim::Elements));
    }

    #[test]
    fn from_literal_rejects_dtype_mismatch() {
        let literal = Tensor::from_vec(Shape::new([2]), vec![1.0f32, 2.0])
            .unwrap()
            .to_literal();
        assert!(Tensor::<f64>::from_literal(&literal).is_err());
    }
}
