//! Symbolic path: data-free operator descriptors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_params, DepthToSpaceParams, IntoMode};
use crate::backend::spec::{DepthToSpaceSpec, Operation};
use crate::error::{D2sError, Dim, Result};

/// Portable operator name.
pub const OPERATOR_NAME: &str = "DepthToSpace";

const ATTR_BLOCKSIZE: &str = "blocksize";
const ATTR_MODE: &str = "mode";

/// Name of a graph value consumed or produced by a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorRef(String);

impl TensorRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TensorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TensorRef {
    fn from(name: &str) -> Self {
        TensorRef::new(name)
    }
}

impl From<String> for TensorRef {
    fn from(name: String) -> Self {
        TensorRef(name)
    }
}

/// Attribute value. Only the two kinds the operator schema uses are representable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum NodeAttr {
    Int(i64),
    String(String),
}

/// Immutable description of one `DepthToSpace` invocation. Carries no tensor data.
///
/// Two descriptors built from the same arguments compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGraphNodeDescriptor")]
pub struct GraphNodeDescriptor {
    operator_name: String,
    attributes: BTreeMap<String, NodeAttr>,
    input_ref: TensorRef,
    output_ref: TensorRef,
}

#[derive(Deserialize)]
struct RawGraphNodeDescriptor {
    operator_name: String,
    attributes: BTreeMap<String, NodeAttr>,
    input_ref: TensorRef,
    output_ref: TensorRef,
}

impl TryFrom<RawGraphNodeDescriptor> for GraphNodeDescriptor {
    type Error = String;

    fn try_from(raw: RawGraphNodeDescriptor) -> std::result::Result<Self, Self::Error> {
        if raw.operator_name != OPERATOR_NAME {
            return Err(format!(
                "expected operator '{OPERATOR_NAME}', found '{}'",
                raw.operator_name
            ));
        }
        Ok(Self {
            operator_name: raw.operator_name,
            attributes: raw.attributes,
            input_ref: raw.input_ref,
            output_ref: raw.output_ref,
        })
    }
}

/// Emits a node descriptor after applying the same parameter checks as [`super::transform`].
pub fn emit_node(
    block_size: usize,
    mode: impl IntoMode,
    input_ref: impl Into<TensorRef>,
    output_ref: impl Into<TensorRef>,
) -> Result<GraphNodeDescriptor> {
    let params = check_params(block_size, mode)?;
    let node = GraphNodeDescriptor::from_params(&params, input_ref.into(), output_ref.into());
    debug!(
        op = OPERATOR_NAME,
        block_size = params.block_size(),
        mode = %params.mode(),
        input = %node.input_ref,
        output = %node.output_ref,
        "emitted graph node"
    );
    Ok(node)
}

impl GraphNodeDescriptor {
    fn from_params(
        params: &DepthToSpaceParams,
        input_ref: TensorRef,
        output_ref: TensorRef,
    ) -> Self {
        let spec = params.to_spec();
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_BLOCKSIZE.to_string(), NodeAttr::Int(spec.blocksize));
        attributes.insert(ATTR_MODE.to_string(), NodeAttr::String(spec.mode));
        Self {
            operator_name: OPERATOR_NAME.to_string(),
            attributes,
            input_ref,
            output_ref,
        }
    }

    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    pub fn attributes(&self) -> &BTreeMap<String, NodeAttr> {
        &self.attributes
    }

    pub fn input_ref(&self) -> &TensorRef {
        &self.input_ref
    }

    pub fn output_ref(&self) -> &TensorRef {
        &self.output_ref
    }

    /// Integer `blocksize` attribute, if present and well-typed.
    pub fn blocksize(&self) -> Option<i64> {
        match self.attributes.get(ATTR_BLOCKSIZE) {
            Some(NodeAttr::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// String `mode` attribute, if present and well-typed.
    pub fn mode(&self) -> Option<&str> {
        match self.attributes.get(ATTR_MODE) {
            Some(NodeAttr::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Re-validates the attributes. Needed for descriptors that were deserialized rather than
    /// emitted.
    pub fn params(&self) -> Result<DepthToSpaceParams> {
        self.to_spec()?.params()
    }

    /// Lowers the descriptor into a portable IR operation.
    pub fn to_operation(&self) -> Result<Operation> {
        let spec = self.to_spec()?;
        spec.params()?;
        Ok(Operation::DepthToSpace(spec))
    }

    fn to_spec(&self) -> Result<DepthToSpaceSpec> {
        let blocksize = self.blocksize().ok_or_else(|| {
            D2sError::shape(Dim::BlockSize, "missing integer 'blocksize' attribute")
        })?;
        let mode = self
            .mode()
            .ok_or_else(|| D2sError::unsupported_mode("<missing>"))?;
        Ok(DepthToSpaceSpec {
            blocksize,
            mode: mode.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::depth_to_space::Mode;

    #[test]
    fn emitted_node_carries_schema_attributes() {
        let node = emit_node(2, Mode::Crd, "input", "output").unwrap();
        assert_eq!(node.operator_name(), "DepthToSpace");
        assert_eq!(node.blocksize(), Some(2));
        assert_eq!(node.mode(), Some("CRD"));
        assert_eq!(node.input_ref().as_str(), "input");
        assert_eq!(node.output_ref().as_str(), "output");
        assert_eq!(node.attributes().len(), 2);
    }

    #[test]
    fn emission_uses_eager_validation() {
        assert!(matches!(
            emit_node(2, "crd", "x", "y"),
            Err(D2sError::UnsupportedMode { .. })
        ));
        assert_eq!(
            emit_node(0, Mode::Dcr, "x", "y").unwrap_err().dim(),
            Some(Dim::BlockSize)
        );
    }

    #[test]
    fn tampered_descriptor_fails_revalidation() {
        let node = emit_node(2, Mode::Dcr, "x", "y").unwrap();
        let mut json = serde_json::to_value(&node).unwrap();
        json["attributes"]["mode"]["value"] = serde_json::Value::String("DRC".to_string());
        let tampered: GraphNodeDescriptor = serde_json::from_value(json).unwrap();
        assert!(matches!(
            tampered.params(),
            Err(D2sError::UnsupportedMode { ref mode }) if mode == "DRC"
        ));
        assert!(tampered.to_operation().is_err());
    }

    #[test]
    fn foreign_operator_does_not_deserialize() {
        let node = emit_node(2, Mode::Dcr, "x", "y").unwrap();
        let mut json = serde_json::to_value(&node).unwrap();
        json["operator_name"] = serde_json::Value::String("SpaceToDepth".to_string());
        let err = serde_json::from_value::<GraphNodeDescriptor>(json).unwrap_err();
        assert!(err.to_string().contains("SpaceToDepth"), "{err}");
    }
}
