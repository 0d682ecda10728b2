pub mod backend;
mod env;
pub mod error;
pub mod logging;
pub mod ops;
pub mod tensor;
pub mod validate;

pub use backend::spec::PortableBackend;
pub use error::{D2sError, Dim, Result};
pub use ops::depth_to_space::{emit_node, transform, GraphNodeDescriptor, IntoMode, Mode};
pub use tensor::{DType, Shape, Tensor};
