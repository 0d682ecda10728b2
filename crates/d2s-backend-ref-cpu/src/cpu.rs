use std::collections::HashMap;
use std::sync::Arc;

use d2s::backend::spec::{
    BackendError, BackendResult, DType, DepthToSpaceSpec, Dimension, Instruction, Operand,
    Operation, PortableBackend, Program, ReshapeSpec, Shape, SpecErrorCode, TensorInit,
    TensorLiteral, TensorSpec, TransposeSpec, ValueId, ValueType,
};
use d2s::ops::depth_to_space::input_coord;
use d2s::tensor::StorageElement;
use tracing::{debug_span, trace};

#[derive(Debug, Clone)]
pub struct CpuTensor {
    pub spec: TensorSpec,
    pub data: TensorData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
    Si32(Arc<[i32]>),
    Si64(Arc<[i64]>),
}

/// Applies `$body` to the buffer of any variant and rewraps the result in the same variant.
/// `$body` is instantiated once per element type, so it may call generic helpers.
macro_rules! map_data {
    ($data:expr, |$values:ident| $body:expr) => {
        match $data {
            TensorData::F32($values) => TensorData::F32($body),
            TensorData::F64($values) => TensorData::F64($body),
            TensorData::Si32($values) => TensorData::Si32($body),
            TensorData::Si64($values) => TensorData::Si64($body),
        }
    };
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::Si32(_) => DType::Si32,
            TensorData::Si64(_) => DType::Si64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(values) => values.len(),
            TensorData::F64(values) => values.len(),
            TensorData::Si32(values) => values.len(),
            TensorData::Si64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hook that may take over an operation before the built-in kernels run.
pub trait CpuKernelInterceptor: Send + Sync {
    fn try_execute(
        &self,
        op: &Operation,
        inputs: &[CpuTensor],
        outputs: &[TensorSpec],
    ) -> Option<BackendResult<Vec<CpuTensor>>>;
}

#[derive(Debug, Default)]
pub struct NoopInterceptor;

impl CpuKernelInterceptor for NoopInterceptor {
    fn try_execute(
        &self,
        _op: &Operation,
        _inputs: &[CpuTensor],
        _outputs: &[TensorSpec],
    ) -> Option<BackendResult<Vec<CpuTensor>>> {
        None
    }
}

#[derive(Clone)]
pub struct GenericCpuBackend<I: CpuKernelInterceptor> {
    interceptor: Arc<I>,
}

impl<I: CpuKernelInterceptor> GenericCpuBackend<I> {
    pub fn with_interceptor(interceptor: I) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn with_arc(interceptor: Arc<I>) -> Self {
        Self { interceptor }
    }

    pub fn interceptor(&self) -> &I {
        self.interceptor.as_ref()
    }
}

impl GenericCpuBackend<NoopInterceptor> {
    pub fn new() -> Self {
        Self::with_interceptor(NoopInterceptor)
    }
}

impl Default for GenericCpuBackend<NoopInterceptor> {
    fn default() -> Self {
        Self::new()
    }
}

pub type CpuPortableBackend = GenericCpuBackend<NoopInterceptor>;

impl<I: CpuKernelInterceptor> PortableBackend for GenericCpuBackend<I> {
    type TensorHandle = CpuTensor;

    fn backend_name(&self) -> &str {
        "cpu-portable"
    }

    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle> {
        match init {
            TensorInit::Literal(lit) => literal_to_tensor(&lit),
            TensorInit::Zeroed(spec) => zeroed_tensor(&spec),
        }
    }

    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral> {
        Ok(tensor_to_literal(tensor))
    }

    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        execute_operation(self.interceptor.as_ref(), instruction, inputs)
    }

    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        program.check()?;
        let function = program
            .entry_function()
            .ok_or_else(|| BackendError::execution("entry function not found"))?;
        let _span = debug_span!(
            "run_program",
            backend = self.backend_name(),
            entry = %function.name,
            instructions = function.body.len(),
        )
        .entered();

        if function.parameter_ids.len() != entry_inputs.len() {
            return Err(BackendError::execution("entry input arity mismatch"));
        }

        let mut values: HashMap<ValueId, CpuTensor> = HashMap::new();
        for ((param_id, param_ty), handle) in function
            .parameter_ids
            .iter()
            .zip(function.parameters.iter())
            .zip(entry_inputs.iter())
        {
            check_entry_input(param_ty.tensor_spec(), handle)?;
            values.insert(*param_id, handle.clone());
        }

        for (instr_index, instruction) in function.body.iter().enumerate() {
            let mut inputs = Vec::with_capacity(instruction.operands.len());
            for operand in &instruction.operands {
                let tensor = match operand {
                    Operand::Value(id) => values
                        .get(id)
                        .cloned()
                        .ok_or_else(|| BackendError::execution("operand value missing"))?,
                    Operand::Literal(lit) => literal_to_tensor(lit)?,
                };
                inputs.push(tensor);
            }
            let outputs = execute_operation(self.interceptor.as_ref(), instruction, &inputs)
                .map_err(|err| {
                    augment_backend_error(err, &function.name, instr_index, instruction, &inputs)
                })?;
            let [output] = <[CpuTensor; 1]>::try_from(outputs).map_err(|_| {
                BackendError::execution("instructions must produce exactly one result")
            })?;
            trace!(id = instruction.id.0, op = instruction.op.name(), "instruction done");
            values.insert(instruction.id, output);
        }

        let mut results = Vec::with_capacity(function.result_ids.len());
        for id in &function.result_ids {
            let value = values
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::execution("missing function result value"))?;
            results.push(value);
        }
        Ok(results)
    }
}

/// Entry inputs are concrete, so they must carry static dims. A dynamic parameter dim accepts
/// any extent.
fn check_entry_input(param: &TensorSpec, handle: &CpuTensor) -> BackendResult<()> {
    if param.dtype != handle.spec.dtype {
        return Err(BackendError::spec(
            SpecErrorCode::DTypeNotSupported,
            format!(
                "entry expects {:?}, got {:?}",
                param.dtype, handle.spec.dtype
            ),
        ));
    }
    let actual = static_dims(&handle.spec.shape)?;
    if param.shape.rank() != actual.len() {
        return Err(BackendError::spec(
            SpecErrorCode::RankMismatch,
            format!(
                "entry expects rank {}, got {}",
                param.shape.rank(),
                actual.len()
            ),
        ));
    }
    for (axis, (expected, &got)) in param.shape.dims().iter().zip(actual.iter()).enumerate() {
        if let Dimension::Static(expected) = expected {
            if *expected != got {
                return Err(BackendError::spec(
                    SpecErrorCode::ShapeMismatch,
                    format!("entry axis {axis} expects {expected}, got {got}"),
                ));
            }
        }
    }
    check_buffer(handle)
}

/// The buffer must hold exactly the elements its spec describes.
fn check_buffer(tensor: &CpuTensor) -> BackendResult<()> {
    let expected = element_count(&tensor.spec.shape)?;
    if tensor.data.len() != expected {
        return Err(BackendError::spec(
            SpecErrorCode::ShapeMismatch,
            format!(
                "buffer holds {} elements but its spec needs {expected}",
                tensor.data.len()
            ),
        ));
    }
    Ok(())
}

fn decode<E: StorageElement>(bytes: &[u8]) -> BackendResult<Arc<[E]>> {
    if bytes.len() % E::BYTES != 0 {
        return Err(BackendError::execution(format!(
            "literal byte length {} mismatches {:?}",
            bytes.len(),
            E::DTYPE
        )));
    }
    Ok(bytes.chunks_exact(E::BYTES).map(E::read_le).collect())
}

fn encode<E: StorageElement>(values: &[E]) -> Arc<[u8]> {
    let mut bytes = Vec::with_capacity(values.len() * E::BYTES);
    for &value in values {
        value.write_le(&mut bytes);
    }
    Arc::from(bytes.into_boxed_slice())
}

fn literal_to_tensor(literal: &TensorLiteral) -> BackendResult<CpuTensor> {
    let bytes = literal.bytes.as_ref();
    let data = match literal.spec.dtype {
        DType::F32 => TensorData::F32(decode(bytes)?),
        DType::F64 => TensorData::F64(decode(bytes)?),
        DType::Si32 => TensorData::Si32(decode(bytes)?),
        DType::Si64 => TensorData::Si64(decode(bytes)?),
    };
    if data.len() != element_count(&literal.spec.shape)? {
        return Err(BackendError::execution(
            "literal element count mismatches its shape",
        ));
    }
    Ok(CpuTensor {
        spec: literal.spec.clone(),
        data,
    })
}

fn zeroed_tensor(spec: &TensorSpec) -> BackendResult<CpuTensor> {
    let elem_count = element_count(&spec.shape)?;
    let data = match spec.dtype {
        DType::F32 => TensorData::F32(Arc::from(vec![0.0; elem_count])),
        DType::F64 => TensorData::F64(Arc::from(vec![0.0; elem_count])),
        DType::Si32 => TensorData::Si32(Arc::from(vec![0; elem_count])),
        DType::Si64 => TensorData::Si64(Arc::from(vec![0; elem_count])),
    };
    Ok(CpuTensor {
        spec: spec.clone(),
        data,
    })
}

fn tensor_to_literal(tensor: &CpuTensor) -> TensorLiteral {
    let bytes = match &tensor.data {
        TensorData::F32(values) => encode(values),
        TensorData::F64(values) => encode(values),
        TensorData::Si32(values) => encode(values),
        TensorData::Si64(values) => encode(values),
    };
    TensorLiteral::new(tensor.spec.clone(), bytes)
}

fn execute_operation(
    interceptor: &dyn CpuKernelInterceptor,
    instruction: &Instruction,
    inputs: &[CpuTensor],
) -> BackendResult<Vec<CpuTensor>> {
    let output_spec = match &instruction.output {
        ValueType::Tensor(spec) => spec.clone(),
    };
    let output_specs = [output_spec];

    if let Some(result) = interceptor.try_execute(&instruction.op, inputs, &output_specs) {
        return result;
    }

    let result = match &instruction.op {
        Operation::Constant(literal) => literal_to_tensor(literal)?,
        Operation::Reshape(spec) => op_reshape(inputs, &output_specs[0], spec)?,
        Operation::Transpose(spec) => op_transpose(inputs, &output_specs[0], spec)?,
        Operation::DepthToSpace(spec) => op_depth_to_space(inputs, &output_specs[0], spec)?,
    };
    Ok(vec![result])
}

fn augment_backend_error(
    error: BackendError,
    function_name: &str,
    instruction_index: usize,
    instruction: &Instruction,
    inputs: &[CpuTensor],
) -> BackendError {
    match error {
        BackendError::Execution { message } => BackendError::Execution {
            message: format!(
                "{message} (at function `{}` instruction #{}, {} id {:?} operands [{}])",
                function_name,
                instruction_index,
                backend_operation_label(&instruction.op),
                instruction.id,
                format_operands(&instruction.operands, inputs)
            ),
        },
        BackendError::Unimplemented { op, reason } => BackendError::Unimplemented {
            op,
            reason: format!(
                "{} (while executing function `{}` instruction #{}, {} id {:?})",
                reason,
                function_name,
                instruction_index,
                backend_operation_label(&instruction.op),
                instruction.id,
            ),
        },
        other => other,
    }
}

fn format_operands(operands: &[Operand], inputs: &[CpuTensor]) -> String {
    if operands.is_empty() {
        return String::from("<none>");
    }

    operands
        .iter()
        .zip(inputs.iter())
        .map(|(operand, tensor)| format_operand(operand, tensor))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_operand(operand: &Operand, tensor: &CpuTensor) -> String {
    let shape_desc = match static_dims(&tensor.spec.shape) {
        Ok(dims) if dims.is_empty() => String::from("[]"),
        Ok(dims) => format!(
            "[{}]",
            dims.iter()
                .map(|dim| dim.to_string())
                .collect::<Vec<_>>()
                .join("x")
        ),
        Err(_) => String::from("dynamic"),
    };

    match operand {
        Operand::Value(id) => format!("value {:?} {} dtype={:?}", id, shape_desc, tensor.spec.dtype),
        Operand::Literal(_) => format!("literal {} dtype={:?}", shape_desc, tensor.spec.dtype),
    }
}

fn backend_operation_label(op: &Operation) -> &'static str {
    match op {
        Operation::Constant(_) => "backend.constant",
        Operation::Reshape(_) => "backend.reshape",
        Operation::Transpose(_) => "backend.transpose",
        Operation::DepthToSpace(_) => "backend.depth_to_space",
    }
}

fn check_dtype(input: &CpuTensor, output: &TensorSpec) -> BackendResult<()> {
    if input.data.dtype() != output.dtype {
        return Err(BackendError::spec(
            SpecErrorCode::DTypeNotSupported,
            format!(
                "layout ops preserve dtype, got {:?} -> {:?}",
                input.data.dtype(),
                output.dtype
            ),
        ));
    }
    Ok(())
}

fn op_reshape(
    inputs: &[CpuTensor],
    output: &TensorSpec,
    spec: &ReshapeSpec,
) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    check_dtype(input, output)?;
    let out_dims = static_dims(&output.shape)?;
    if out_dims != spec.new_shape {
        return Err(BackendError::spec(
            SpecErrorCode::ShapeMismatch,
            format!(
                "reshape target {:?} disagrees with output type {:?}",
                spec.new_shape, out_dims
            ),
        ));
    }
    if element_count(&input.spec.shape)? != checked_product(&out_dims)? {
        return Err(BackendError::execution("reshape element count mismatch"));
    }
    Ok(CpuTensor {
        spec: output.clone(),
        data: input.data.clone(),
    })
}

fn op_transpose(
    inputs: &[CpuTensor],
    output: &TensorSpec,
    spec: &TransposeSpec,
) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    check_dtype(input, output)?;
    check_buffer(input)?;
    let input_dims = static_dims(&input.spec.shape)?;
    if spec.perm.len() != input_dims.len() {
        return Err(BackendError::execution("transpose rank mismatch"));
    }
    let mut seen = vec![false; input_dims.len()];
    for &axis in &spec.perm {
        if axis >= seen.len() || std::mem::replace(&mut seen[axis], true) {
            return Err(BackendError::spec(
                SpecErrorCode::InvalidAttributeValue,
                format!("{:?} is not a permutation", spec.perm),
            ));
        }
    }
    let out_dims = static_dims(&output.shape)?;
    let expected: Vec<usize> = spec.perm.iter().map(|&axis| input_dims[axis]).collect();
    if out_dims != expected {
        return Err(BackendError::spec(
            SpecErrorCode::ShapeMismatch,
            format!("transpose output {out_dims:?} does not match permuted input {expected:?}"),
        ));
    }
    let len = checked_product(&out_dims)?;
    let input_strides = compute_strides(&input_dims);
    let data = map_data!(&input.data, |values| {
        permute(values, len, &out_dims, &input_strides, &spec.perm)
    });
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn permute<E: StorageElement>(
    values: &[E],
    len: usize,
    out_dims: &[usize],
    input_strides: &[usize],
    perm: &[usize],
) -> Arc<[E]> {
    let mut result = Vec::with_capacity(len);
    for idx in 0..len {
        let out_coord = unravel_index(idx, out_dims);
        let mut in_index = 0usize;
        for (out_axis, &out_c) in out_coord.iter().enumerate() {
            in_index += out_c * input_strides[perm[out_axis]];
        }
        result.push(values[in_index]);
    }
    Arc::from(result)
}

/// Evaluates the node by mapping every output coordinate back to its source, independently of
/// the plane-filling eager engine.
fn op_depth_to_space(
    inputs: &[CpuTensor],
    output: &TensorSpec,
    spec: &DepthToSpaceSpec,
) -> BackendResult<CpuTensor> {
    let params = spec.params()?;
    let input = expect_single(inputs)?;
    check_dtype(input, output)?;
    check_buffer(input)?;
    let in_dims = static_dims(&input.spec.shape)?;
    let Ok(in_nchw) = <[usize; 4]>::try_from(in_dims.as_slice()) else {
        return Err(BackendError::spec(
            SpecErrorCode::RankMismatch,
            format!("DepthToSpace expects rank 4, got {in_dims:?}"),
        ));
    };
    let out_nchw = params.output_dims(in_nchw)?;
    let output = resolve_output(output, &out_nchw)?;
    let out_dims = out_nchw.to_vec();

    let in_strides = compute_strides(&in_dims);
    let out_channels = out_nchw[1];
    let gather = |out_index: usize| {
        let coord = unravel_index(out_index, &out_dims);
        let src = input_coord(&params, out_channels, [coord[0], coord[1], coord[2], coord[3]]);
        src.iter()
            .zip(in_strides.iter())
            .map(|(c, stride)| c * stride)
            .sum::<usize>()
    };
    let len = checked_product(&out_dims)?;
    let data = map_data!(&input.data, |values| {
        (0..len).map(|i| values[gather(i)]).collect()
    });
    Ok(CpuTensor { spec: output, data })
}

/// Binds the declared output type to the computed extents. Static axes must agree; dynamic axes
/// take the computed value.
fn resolve_output(declared: &TensorSpec, computed: &[usize]) -> BackendResult<TensorSpec> {
    if declared.shape.rank() != computed.len() {
        return Err(BackendError::spec(
            SpecErrorCode::RankMismatch,
            format!(
                "declared output rank {} but computed {:?}",
                declared.shape.rank(),
                computed
            ),
        ));
    }
    for (axis, (dim, &extent)) in declared.shape.dims().iter().zip(computed).enumerate() {
        if let Dimension::Static(expected) = dim {
            if *expected != extent {
                return Err(BackendError::spec(
                    SpecErrorCode::ShapeMismatch,
                    format!("output axis {axis} declared {expected}, computed {extent}"),
                ));
            }
        }
    }
    Ok(TensorSpec::new(declared.dtype, Shape::from_static(computed)))
}

fn expect_single(inputs: &[CpuTensor]) -> BackendResult<&CpuTensor> {
    if inputs.len() != 1 {
        Err(BackendError::execution("operation expects single input"))
    } else {
        Ok(&inputs[0])
    }
}

fn static_dims(shape: &Shape) -> BackendResult<Vec<usize>> {
    shape
        .dims()
        .iter()
        .map(|dim| match dim {
            Dimension::Static(v) => Ok(*v),
            Dimension::Dynamic(sym) => Err(BackendError::spec(
                SpecErrorCode::DynamicDimensionMismatch,
                format!("dynamic dimension {} not supported at runtime", sym.as_str()),
            )),
        })
        .collect()
}

fn element_count(shape: &Shape) -> BackendResult<usize> {
    checked_product(&static_dims(shape)?)
}

fn checked_product(dims: &[usize]) -> BackendResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            BackendError::spec(
                SpecErrorCode::ShapeMismatch,
                format!("element count of {dims:?} overflows usize"),
            )
        })
}

fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1usize;
    for (i, dim) in dims.iter().enumerate().rev() {
        strides[i] = acc;
        acc *= *dim;
    }
    strides
}

fn unravel_index(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (i, dim) in dims.iter().enumerate().rev() {
        coords[i] = index % *dim;
        index /= *dim;
    }
    coords
}
