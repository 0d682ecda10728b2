//! Defines the scalar element trait implemented by host-side tensors.

use std::fmt::Debug;

use crate::backend::spec::DType;

/// Trait describing what the layout kernels and literal conversion need from an element type.
///
/// Depth-to-space only moves values, so no arithmetic is required. The `f64` conversions exist
/// solely for tolerance comparisons in the validator.
pub trait StorageElement: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    /// Portable dtype tag recorded in tensor specs and literals.
    const DTYPE: DType;
    /// Width of one element in a little-endian literal payload.
    const BYTES: usize;

    /// Widens the element to `f64` for comparisons.
    fn to_f64(self) -> f64;
    /// Narrows an `f64` into this element type.
    fn from_f64(v: f64) -> Self;
    /// Appends the little-endian encoding of the element to `out`.
    fn write_le(self, out: &mut Vec<u8>);
    /// Decodes one element from exactly [`Self::BYTES`] little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_storage_element {
    ($ty:ty, $dtype:expr, $bytes:expr) => {
        impl StorageElement for $ty {
            const DTYPE: DType = $dtype;
            const BYTES: usize = $bytes;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $bytes];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

impl_storage_element!(f32, DType::F32, 4);
impl_storage_element!(f64, DType::F64, 8);
impl_storage_element!(i32, DType::Si32, 4);
impl_storage_element!(i64, DType::Si64, 8);
