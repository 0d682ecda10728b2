use std::{collections::HashMap, collections::HashSet, fmt, fs, io, path::Path, sync::Arc};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use thiserror::Error;

use crate::error::D2sError;

/// Frozen IR version enforced by this interface.
pub const SPEC_VERSION: &str = "d2s.ir.v1";

fn default_spec_version() -> String {
    SPEC_VERSION.to_string()
}

/// Enumerates scalar element types supported by the portable backend contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    Si32,
    Si64,
}

impl DType {
    /// Returns `true` when the dtype is a floating-point representation.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Returns the size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 | DType::Si32 => 4,
            DType::F64 | DType::Si64 => 8,
        }
    }
}

/// Names a symbolic dynamic dimension (e.g. `?B`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimSymbol(Arc<str>);

impl DimSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for DimSymbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DimSymbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(DimSymbol::new(name))
    }
}

/// Represents a single axis extent in a tensor shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Static(usize),
    Dynamic(DimSymbol),
}

impl Dimension {
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dimension::Static(value) => Some(*value),
            Dimension::Dynamic(_) => None,
        }
    }
}

/// Logical tensor shape as an ordered list of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dimension>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<Dimension>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn from_static(dims: &[usize]) -> Self {
        Self::new(dims.iter().copied().map(Dimension::Static).collect::<Vec<_>>())
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    /// Returns static dimensions when all dims are static.
    pub fn static_dims(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(Dimension::as_static).collect()
    }

    /// Returns element count when all dims are static and the product fits in `usize`.
    pub fn element_count(&self) -> Option<usize> {
        self.static_dims()?
            .into_iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(dim))
    }
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    /// Returns total byte length when the shape is static.
    pub fn byte_len(&self) -> Option<usize> {
        self.shape
            .element_count()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

/// Dense literal tensor payload, stored little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLiteral {
    pub spec: TensorSpec,
    pub bytes: Arc<[u8]>,
}

impl TensorLiteral {
    pub fn new(spec: TensorSpec, bytes: Arc<[u8]>) -> Self {
        Self { spec, bytes }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl Serialize for TensorLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TensorLiteral", 2)?;
        state.serialize_field("spec", &self.spec)?;
        state.serialize_field("bytes", &self.bytes.as_ref())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TensorLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorLiteralHelper {
            spec: TensorSpec,
            bytes: Vec<u8>,
        }

        let helper = TensorLiteralHelper::deserialize(deserializer)?;
        Ok(TensorLiteral {
            spec: helper.spec,
            bytes: Arc::<[u8]>::from(helper.bytes),
        })
    }
}

/// Initialization payload when materialising tensors on a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TensorInit {
    Literal(TensorLiteral),
    Zeroed(TensorSpec),
}

/// Attribute payload for `reshape`. The element count must be preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReshapeSpec {
    pub new_shape: Vec<usize>,
}

/// Permutation payload for `transpose`: output axis `i` reads input axis `perm[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransposeSpec {
    pub perm: Vec<usize>,
}

/// Attribute payload for `DepthToSpace`, kept in its portable spelling.
///
/// `mode` is the raw string attribute; backends resolve it through
/// [`DepthToSpaceSpec::params`] so that every consumer applies the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepthToSpaceSpec {
    pub blocksize: i64,
    pub mode: String,
}

/// Unique identifier for SSA values in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Typing information for SSA values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Tensor(TensorSpec),
}

impl ValueType {
    pub fn tensor_spec(&self) -> &TensorSpec {
        match self {
            ValueType::Tensor(spec) => spec,
        }
    }
}

/// Operand reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Literal(TensorLiteral),
}

/// Declarative form of portable operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Constant(TensorLiteral),
    Reshape(ReshapeSpec),
    Transpose(TransposeSpec),
    DepthToSpace(DepthToSpaceSpec),
}

impl Operation {
    /// Stable operator name as it appears in exported graphs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Constant(_) => "Constant",
            Operation::Reshape(_) => "Reshape",
            Operation::Transpose(_) => "Transpose",
            Operation::DepthToSpace(_) => "DepthToSpace",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Constant(lit) => write!(
                f,
                "Constant(dtype={:?}, shape={})",
                lit.spec.dtype,
                format_shape(&lit.spec.shape)
            ),
            Operation::Reshape(spec) => {
                let dims = spec
                    .new_shape
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join("x");
                write!(f, "Reshape({dims})")
            }
            Operation::Transpose(spec) => write!(f, "Transpose(perm={:?})", spec.perm),
            Operation::DepthToSpace(spec) => write!(
                f,
                "DepthToSpace(blocksize={}, mode={})",
                spec.blocksize, spec.mode
            ),
        }
    }
}

/// Single SSA instruction in the declarative program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: ValueId,
    pub op: Operation,
    pub operands: Vec<Operand>,
    pub output: ValueType,
}

/// Function describing a reusable computation, with named entry inputs and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<ValueType>,
    pub parameter_ids: Vec<ValueId>,
    #[serde(default)]
    pub parameter_names: Vec<String>,
    pub results: Vec<ValueType>,
    pub body: Vec<Instruction>,
    pub result_ids: Vec<ValueId>,
    #[serde(default)]
    pub result_names: Vec<String>,
}

/// Complete portable module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default = "default_spec_version")]
    pub spec_version: String,
    pub entry: String,
    pub functions: Vec<Function>,
}

#[derive(Debug, Error)]
pub enum ProgramSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("program spec version '{found}' does not match expected '{expected}'")]
    SpecVersionMismatch {
        found: String,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ProgramIoError {
    #[error(transparent)]
    Serialization(#[from] ProgramSerdeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Program {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            entry: entry.into(),
            functions: Vec::new(),
        }
    }

    pub fn with_functions(mut self, functions: Vec<Function>) -> Self {
        self.functions = functions;
        self
    }

    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == self.entry)
    }

    /// Verifies that the entry exists and that every operand and result refers to a value
    /// defined earlier in the same function.
    pub fn check(&self) -> Result<(), SpecError> {
        let function = self.entry_function().ok_or_else(|| {
            SpecError::new(
                SpecErrorCode::MalformedProgram,
                format!("entry function '{}' not found", self.entry),
            )
        })?;
        if function.parameter_ids.len() != function.parameters.len() {
            return Err(SpecError::new(
                SpecErrorCode::MalformedProgram,
                "parameter ids and types differ in length".to_string(),
            ));
        }
        let mut defined: HashSet<ValueId> = function.parameter_ids.iter().copied().collect();
        for instruction in &function.body {
            for operand in &instruction.operands {
                if let Operand::Value(id) = operand {
                    if !defined.contains(id) {
                        return Err(SpecError::new(
                            SpecErrorCode::MalformedProgram,
                            format!("%{} used before definition", id.0),
                        ));
                    }
                }
            }
            if !defined.insert(instruction.id) {
                return Err(SpecError::new(
                    SpecErrorCode::MalformedProgram,
                    format!("%{} defined twice", instruction.id.0),
                ));
            }
        }
        for id in &function.result_ids {
            if !defined.contains(id) {
                return Err(SpecError::new(
                    SpecErrorCode::MalformedProgram,
                    format!("result %{} is never defined", id.0),
                ));
            }
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String, ProgramSerdeError> {
        serde_json::to_string_pretty(self).map_err(ProgramSerdeError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ProgramSerdeError> {
        let mut program: Program = serde_json::from_str(src).map_err(ProgramSerdeError::from)?;
        program.spec_version = normalize_spec_version(program.spec_version)?;
        Ok(program)
    }

    pub fn to_bincode_bytes(&self) -> Result<Vec<u8>, ProgramSerdeError> {
        bincode::serialize(self).map_err(ProgramSerdeError::from)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, ProgramSerdeError> {
        let mut program: Program = bincode::deserialize(bytes).map_err(ProgramSerdeError::from)?;
        program.spec_version = normalize_spec_version(program.spec_version)?;
        Ok(program)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ProgramIoError> {
        let contents = self.to_json_string()?;
        fs::write(path, contents).map_err(ProgramIoError::from)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ProgramIoError> {
        let contents = fs::read_to_string(path).map_err(ProgramIoError::from)?;
        Program::from_json_str(&contents).map_err(ProgramIoError::from)
    }

    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<(), ProgramIoError> {
        let bytes = self.to_bincode_bytes()?;
        fs::write(path, bytes).map_err(ProgramIoError::from)
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self, ProgramIoError> {
        let bytes = fs::read(path).map_err(ProgramIoError::from)?;
        Program::from_bincode_slice(&bytes).map_err(ProgramIoError::from)
    }

    pub fn to_text(&self) -> String {
        format!("{self}")
    }
}

fn normalize_spec_version(version: String) -> Result<String, ProgramSerdeError> {
    if version.is_empty() {
        return Ok(SPEC_VERSION.to_string());
    }
    if version == SPEC_VERSION {
        Ok(version)
    } else {
        Err(ProgramSerdeError::SpecVersionMismatch {
            found: version,
            expected: SPEC_VERSION,
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(
            f,
            0,
            &format!(
                "program @{} (spec_version = {}) {{",
                self.entry, self.spec_version
            ),
        )?;
        for function in &self.functions {
            fmt_function(function, 1, f)?;
        }
        write_line(f, 0, "}")
    }
}

fn fmt_function(function: &Function, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write_line(f, indent, &format!("func @{} {{", function.name))?;
    if !function.parameter_ids.is_empty() {
        write_line(f, indent + 1, "params:")?;
        for (index, (value_id, value_type)) in function
            .parameter_ids
            .iter()
            .zip(function.parameters.iter())
            .enumerate()
        {
            write_line(
                f,
                indent + 2,
                &format!(
                    "%{}{} : {}",
                    value_id.0,
                    name_suffix(&function.parameter_names, index),
                    format_value_type(value_type)
                ),
            )?;
        }
    }
    if !function.body.is_empty() {
        write_line(f, indent + 1, "body:")?;
        for instruction in &function.body {
            fmt_instruction(instruction, indent + 2, f)?;
        }
    }
    if !function.result_ids.is_empty() {
        write_line(f, indent + 1, "results:")?;
        for (index, (value_id, value_type)) in function
            .result_ids
            .iter()
            .zip(function.results.iter())
            .enumerate()
        {
            write_line(
                f,
                indent + 2,
                &format!(
                    "%{}{} : {}",
                    value_id.0,
                    name_suffix(&function.result_names, index),
                    format_value_type(value_type)
                ),
            )?;
        }
    }
    write_line(f, indent, "}")
}

fn name_suffix(names: &[String], index: usize) -> String {
    names
        .get(index)
        .map(|name| format!(" \"{name}\""))
        .unwrap_or_default()
}

fn fmt_instruction(
    instruction: &Instruction,
    indent: usize,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let operands = instruction
        .operands
        .iter()
        .map(format_operand)
        .collect::<Vec<_>>()
        .join(", ");
    let line = if operands.is_empty() {
        format!(
            "%{} = {} -> {}",
            instruction.id.0,
            instruction.op,
            format_value_type(&instruction.output)
        )
    } else {
        format!(
            "%{} = {}({}) -> {}",
            instruction.id.0,
            instruction.op,
            operands,
            format_value_type(&instruction.output)
        )
    };
    write_line(f, indent, &line)
}

fn format_value_type(value_type: &ValueType) -> String {
    match value_type {
        ValueType::Tensor(spec) => {
            format!("tensor<{:?} x {}>", spec.dtype, format_shape(&spec.shape))
        }
    }
}

fn format_shape(shape: &Shape) -> String {
    let dims = shape
        .dims()
        .iter()
        .map(|dim| match dim {
            Dimension::Static(v) => v.to_string(),
            Dimension::Dynamic(sym) => format!("?{}", sym.as_str()),
        })
        .collect::<Vec<_>>();
    if dims.is_empty() {
        "[]".to_string()
    } else {
        dims.join("x")
    }
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Value(id) => format!("%{}", id.0),
        Operand::Literal(lit) => format!(
            "literal(dtype={:?}, shape={})",
            lit.spec.dtype,
            format_shape(&lit.spec.shape)
        ),
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}

/// Lightweight builder for constructing functions programmatically.
#[derive(Default)]
pub struct ProgramBuilder {
    next_value_id: u32,
    parameters: Vec<(ValueId, ValueType, String)>,
    instructions: Vec<Instruction>,
    value_types: HashMap<ValueId, ValueType>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, ty: ValueType) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        self.value_types.insert(id, ty.clone());
        self.parameters.push((id, ty, name.into()));
        id
    }

    pub fn emit_single(
        &mut self,
        op: Operation,
        operands: Vec<Operand>,
        output: ValueType,
    ) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        self.value_types.insert(id, output.clone());
        self.instructions.push(Instruction {
            id,
            op,
            operands,
            output,
        });
        id
    }

    pub fn value_type(&self, id: ValueId) -> Option<&ValueType> {
        self.value_types.get(&id)
    }

    /// Seals the function. Results are `(value, name)` pairs; unknown ids are rejected.
    pub fn finish(
        self,
        name: impl Into<String>,
        results: Vec<(ValueId, String)>,
    ) -> Result<Function, SpecError> {
        let mut result_ids = Vec::with_capacity(results.len());
        let mut result_types = Vec::with_capacity(results.len());
        let mut result_names = Vec::with_capacity(results.len());
        for (id, result_name) in results {
            let ty = self.value_types.get(&id).cloned().ok_or_else(|| {
                SpecError::new(
                    SpecErrorCode::MalformedProgram,
                    format!("result %{} has no recorded type", id.0),
                )
            })?;
            result_ids.push(id);
            result_types.push(ty);
            result_names.push(result_name);
        }
        let mut parameter_ids = Vec::with_capacity(self.parameters.len());
        let mut parameters = Vec::with_capacity(self.parameters.len());
        let mut parameter_names = Vec::with_capacity(self.parameters.len());
        for (id, ty, param_name) in self.parameters {
            parameter_ids.push(id);
            parameters.push(ty);
            parameter_names.push(param_name);
        }
        Ok(Function {
            name: name.into(),
            parameters,
            parameter_ids,
            parameter_names,
            results: result_types,
            body: self.instructions,
            result_ids,
            result_names,
        })
    }
}

/// Stable set of IR validation error identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecErrorCode {
    DynamicDimensionMismatch,
    DTypeNotSupported,
    InvalidAttributeValue,
    UnsupportedMode,
    RankMismatch,
    ShapeMismatch,
    MalformedProgram,
    Unspecified(&'static str),
}

impl SpecErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecErrorCode::DynamicDimensionMismatch => "SpecError: dynamic dimension mismatch",
            SpecErrorCode::DTypeNotSupported => "SpecError: dtype not supported for op",
            SpecErrorCode::InvalidAttributeValue => "SpecError: invalid attribute value",
            SpecErrorCode::UnsupportedMode => "SpecError: unsupported mode attribute",
            SpecErrorCode::RankMismatch => "SpecError: rank mismatch",
            SpecErrorCode::ShapeMismatch => "SpecError: shape mismatch",
            SpecErrorCode::MalformedProgram => "SpecError: malformed program",
            SpecErrorCode::Unspecified(code) => code,
        }
    }
}

/// Validation failure captured before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecError {
    pub code: SpecErrorCode,
    pub detail: Option<String>,
}

impl SpecError {
    pub fn new(code: SpecErrorCode, detail: impl Into<Option<String>>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.code.as_str()),
            None => write!(f, "{}", self.code.as_str()),
        }
    }
}

impl std::error::Error for SpecError {}

impl From<D2sError> for SpecError {
    fn from(err: D2sError) -> Self {
        let code = match &err {
            D2sError::UnsupportedMode { .. } => SpecErrorCode::UnsupportedMode,
            D2sError::Shape {
                dim: crate::error::Dim::BlockSize,
                ..
            } => SpecErrorCode::InvalidAttributeValue,
            D2sError::Shape {
                dim: crate::error::Dim::Rank,
                ..
            } => SpecErrorCode::RankMismatch,
            D2sError::Shape { .. } => SpecErrorCode::ShapeMismatch,
            D2sError::Tolerance { .. } => SpecErrorCode::Unspecified("SpecError: tolerance"),
        };
        SpecError::new(code, err.to_string())
    }
}

/// Backend error surfaced to higher layers.
#[derive(Debug)]
pub enum BackendError {
    SpecViolation(SpecError),
    Unimplemented { op: &'static str, reason: String },
    Execution { message: String },
}

impl BackendError {
    pub fn spec(code: SpecErrorCode, detail: impl Into<Option<String>>) -> Self {
        BackendError::SpecViolation(SpecError::new(code, detail))
    }

    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }

    /// Returns the spec code for validation failures.
    pub fn spec_code(&self) -> Option<&SpecErrorCode> {
        match self {
            BackendError::SpecViolation(err) => Some(&err.code),
            _ => None,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::SpecViolation(err) => write!(f, "{err}"),
            BackendError::Unimplemented { op, reason } => {
                write!(f, "{op} is not implemented: {reason}")
            }
            BackendError::Execution { message } => {
                write!(f, "backend execution failure: {message}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

impl From<SpecError> for BackendError {
    fn from(err: SpecError) -> Self {
        BackendError::SpecViolation(err)
    }
}

impl From<D2sError> for BackendError {
    fn from(err: D2sError) -> Self {
        BackendError::SpecViolation(SpecError::from(err))
    }
}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Portable backend trait that evaluates exported programs.
pub trait PortableBackend: Send + Sync {
    type TensorHandle: Clone + Send + Sync + 'static;

    /// Returns a human-readable backend identifier (e.g., `"cpu"`).
    fn backend_name(&self) -> &str;

    /// Materialises a tensor handle from host initialisation data.
    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle>;

    /// Reads back a tensor handle into a dense literal.
    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral>;

    /// Executes a single instruction given already materialised operand handles.
    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>>;

    /// Executes an entire program starting from the entry function.
    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>>;
}
