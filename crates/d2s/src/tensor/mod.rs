//! Host tensor abstractions consumed by the eager depth-to-space engine.
//!
//! Tensors are dense, row-major, and generic over a [`StorageElement`]. The dtype enumeration is
//! shared with the portable backend spec so literals cross the boundary without a mapping table.

mod host_tensor;
pub mod shape;
pub mod storage;

pub use crate::backend::spec::DType;
pub use host_tensor::Tensor;
pub use shape::Shape;
pub use storage::StorageElement;
