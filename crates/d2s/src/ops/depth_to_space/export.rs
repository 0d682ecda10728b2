//! Lowering into the portable graph IR.
//!
//! [`export_program`] keeps the operator intact as a single `DepthToSpace` instruction.
//! [`export_decomposed_program`] spells it out as `Reshape -> Transpose -> Reshape`, for
//! consumers that only understand layout primitives.

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use super::{emit_node, DepthToSpaceParams, IntoMode, Mode};
use crate::backend::spec::{
    Dimension, Operand, Operation, Program, ProgramBuilder, ReshapeSpec, Shape, TensorSpec,
    TransposeSpec, ValueType,
};
use crate::error::{D2sError, Dim};

/// Name of the single graph input.
pub const DEFAULT_INPUT_NAME: &str = "input";
/// Name of the single graph output.
pub const DEFAULT_OUTPUT_NAME: &str = "output";

/// 6-D view of the input, the axis order that brings block offsets next to their spatial
/// axes, and the final 4-D shape.
///
/// After permuting, the axes are always `(n, c_out, h, by, w, bx)`, so collapsing `(h, by)` and
/// `(w, bx)` yields the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    pub split_dims: [usize; 6],
    pub perm: [usize; 6],
    pub output_dims: [usize; 4],
}

impl DepthToSpaceParams {
    /// Describes the transform as reshape/permute/reshape for a concrete input shape.
    pub fn decomposition(&self, input: [usize; 4]) -> crate::Result<Decomposition> {
        let output_dims = self.output_dims(input)?;
        let [n, _, h, w] = input;
        let c_out = output_dims[1];
        let s = self.block_size();
        let (split_dims, perm) = match self.mode() {
            Mode::Dcr => ([n, s, s, c_out, h, w], [0, 3, 4, 1, 5, 2]),
            Mode::Crd => ([n, c_out, s, s, h, w], [0, 1, 4, 2, 5, 3]),
        };
        Ok(Decomposition {
            split_dims,
            perm,
            output_dims,
        })
    }
}

/// Computes the output tensor spec.
///
/// The batch axis may be dynamic and is carried through unchanged. Channel and spatial axes
/// must be static because the output extents depend on them.
pub fn infer_output_spec(
    input: &TensorSpec,
    params: &DepthToSpaceParams,
) -> crate::Result<TensorSpec> {
    let dims = input.shape.dims();
    if dims.len() != 4 {
        return Err(D2sError::shape(
            Dim::Rank,
            format!("expected a rank-4 NCHW input, got rank {}", dims.len()),
        ));
    }
    let static_axis = |index: usize, dim: Dim| {
        dims[index].as_static().ok_or_else(|| {
            D2sError::shape(dim, format!("{dim} axis must be static for depth-to-space"))
        })
    };
    let c = static_axis(1, Dim::Channel)?;
    let h = static_axis(2, Dim::Height)?;
    let w = static_axis(3, Dim::Width)?;
    let n = dims[0].as_static().unwrap_or(1);
    let [_, c_out, out_h, out_w] = params.output_dims([n, c, h, w])?;
    let shape = Shape::new(vec![
        dims[0].clone(),
        Dimension::Static(c_out),
        Dimension::Static(out_h),
        Dimension::Static(out_w),
    ]);
    Ok(TensorSpec::new(input.dtype, shape))
}

fn entry_name(mode: Mode, suffix: &str) -> String {
    format!(
        "depth_to_space_{}{suffix}",
        mode.as_str().to_ascii_lowercase()
    )
}

/// Exports a one-instruction program: `output = DepthToSpace(input)`.
pub fn export_program(
    input_spec: &TensorSpec,
    block_size: usize,
    mode: impl IntoMode,
) -> Result<Program> {
    let node = emit_node(block_size, mode, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME)?;
    let params = node.params()?;
    let output_spec = infer_output_spec(input_spec, &params)
        .with_context(|| format!("cannot export DepthToSpace for input {input_spec:?}"))?;

    let mut builder = ProgramBuilder::new();
    let input = builder.add_parameter(
        node.input_ref().as_str(),
        ValueType::Tensor(input_spec.clone()),
    );
    let output = builder.emit_single(
        node.to_operation()?,
        vec![Operand::Value(input)],
        ValueType::Tensor(output_spec),
    );
    let entry = entry_name(params.mode(), "");
    let function = builder.finish(&entry, vec![(output, node.output_ref().to_string())])?;
    let program = Program::new(&entry).with_functions(vec![function]);
    program.check()?;
    debug!(entry = %entry, block_size, mode = %params.mode(), "exported program");
    Ok(program)
}

/// Exports the transform as `Reshape -> Transpose -> Reshape`. Requires a fully static input.
pub fn export_decomposed_program(
    input_spec: &TensorSpec,
    block_size: usize,
    mode: impl IntoMode,
) -> Result<Program> {
    let params = super::check_params(block_size, mode)?;
    let dims = input_spec
        .shape
        .static_dims()
        .ok_or_else(|| anyhow!("decomposed export needs static dims, got {input_spec:?}"))?;
    let Ok(input_dims) = <[usize; 4]>::try_from(dims.as_slice()) else {
        bail!(D2sError::shape(
            Dim::Rank,
            format!("expected a rank-4 NCHW input, got rank {}", dims.len()),
        ));
    };
    let decomposition = params.decomposition(input_dims)?;
    let dtype = input_spec.dtype;
    let tensor =
        |dims: &[usize]| ValueType::Tensor(TensorSpec::new(dtype, Shape::from_static(dims)));

    let permuted = decomposition.perm.map(|axis| decomposition.split_dims[axis]);

    let mut builder = ProgramBuilder::new();
    let input = builder.add_parameter(DEFAULT_INPUT_NAME, ValueType::Tensor(input_spec.clone()));
    let split = builder.emit_single(
        Operation::Reshape(ReshapeSpec {
            new_shape: decomposition.split_dims.to_vec(),
        }),
        vec![Operand::Value(input)],
        tensor(&decomposition.split_dims[..]),
    );
    let moved = builder.emit_single(
        Operation::Transpose(TransposeSpec {
            perm: decomposition.perm.to_vec(),
        }),
        vec![Operand::Value(split)],
        tensor(&permuted[..]),
    );
    let output = builder.emit_single(
        Operation::Reshape(ReshapeSpec {
            new_shape: decomposition.output_dims.to_vec(),
        }),
        vec![Operand::Value(moved)],
        tensor(&decomposition.output_dims[..]),
    );
    let entry = entry_name(params.mode(), "_decomposed");
    let function = builder.finish(&entry, vec![(output, DEFAULT_OUTPUT_NAME.to_string())])?;
    let program = Program::new(&entry).with_functions(vec![function]);
    program.check()?;
    debug!(
        entry = %entry,
        split = ?decomposition.split_dims,
        perm = ?decomposition.perm,
        "exported decomposed program"
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::spec::{DType, DimSymbol};
    use crate::ops::depth_to_space::{check_params, transform};
    use crate::tensor::{Shape as HostShape, Tensor};

    fn spec(dims: &[usize]) -> TensorSpec {
        TensorSpec::new(DType::F32, Shape::from_static(dims))
    }

    #[test]
    fn export_names_entry_input_and_output() {
        let program = export_program(&spec(&[1, 8, 2, 2]), 2, Mode::Crd).unwrap();
        assert_eq!(program.entry, "depth_to_space_crd");
        let function = program.entry_function().unwrap();
        assert_eq!(function.parameter_names, vec!["input".to_string()]);
        assert_eq!(function.result_names, vec!["output".to_string()]);
        assert_eq!(function.body.len(), 1);
        assert_eq!(function.results[0].tensor_spec(), &spec(&[1, 2, 4, 4]));
        let text = program.to_text();
        assert!(
            text.contains("%1 = DepthToSpace(blocksize=2, mode=CRD)(%0) -> tensor<F32 x 1x2x4x4>"),
            "{text}"
        );
    }

    #[test]
    fn dynamic_batch_passes_through() {
        let input = TensorSpec::new(
            DType::F64,
            Shape::new(vec![
                Dimension::Dynamic(DimSymbol::new("B")),
                Dimension::Static(18),
                Dimension::Static(3),
                Dimension::Static(5),
            ]),
        );
        let params = check_params(3, Mode::Dcr).unwrap();
        let out = infer_output_spec(&input, &params).unwrap();
        assert_eq!(out.dtype, DType::F64);
        assert_eq!(out.shape.dims()[0], Dimension::Dynamic(DimSymbol::new("B")));
        assert_eq!(
            out.shape.dims()[1..],
            [
                Dimension::Static(2),
                Dimension::Static(9),
                Dimension::Static(15)
            ]
        );
    }

    #[test]
    fn dynamic_channels_are_rejected() {
        let input = TensorSpec::new(
            DType::F32,
            Shape::new(vec![
                Dimension::Static(1),
                Dimension::Dynamic(DimSymbol::new("C")),
                Dimension::Static(2),
                Dimension::Static(2),
            ]),
        );
        let params = check_params(2, Mode::Crd).unwrap();
        let err = infer_output_spec(&input, &params).unwrap_err();
        assert_eq!(err.dim(), Some(Dim::Channel));
        assert!(export_program(&input, 2, Mode::Crd).is_err());
    }

    #[test]
    fn export_rejects_what_the_engine_rejects() {
        let err = export_program(&spec(&[1, 8, 2, 2]), 3, Mode::Crd).unwrap_err();
        let root = err.downcast_ref::<D2sError>().expect("shape error at the root");
        assert_eq!(root.dim(), Some(Dim::Channel));
        let err = export_program(&spec(&[1, 8, 2, 2]), 2, "crd").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<D2sError>(),
            Some(D2sError::UnsupportedMode { .. })
        ));
    }

    /// Applies a decomposition by explicit 6-D index arithmetic.
    fn apply_decomposition(input: &Tensor<f32>, d: &Decomposition) -> Vec<f32> {
        let src_strides = HostShape::new(d.split_dims.to_vec()).contiguous_strides();
        let permuted = d.perm.map(|axis| d.split_dims[axis]);
        let total: usize = permuted.iter().product();
        let mut out = Vec::with_capacity(total);
        for flat in 0..total {
            let mut rem = flat;
            let mut src = 0;
            for axis in (0..6).rev() {
                let coord = rem % permuted[axis];
                rem /= permuted[axis];
                src += coord * src_strides[d.perm[axis]];
            }
            out.push(input.data()[src]);
        }
        out
    }

    #[test]
    fn decomposition_agrees_with_direct_mapping() {
        let input = Tensor::from_fn(HostShape::new([2, 18, 2, 3]), |i| i as f32);
        for mode in Mode::ALL {
            let params = check_params(3, mode).unwrap();
            let d = params.decomposition([2, 18, 2, 3]).unwrap();
            assert_eq!(d.output_dims, [2, 2, 6, 9]);
            let direct = transform(&input, 3, mode).unwrap();
            assert_eq!(apply_decomposition(&input, &d), direct.data(), "{mode}");
        }
    }

    #[test]
    fn decomposed_program_is_reshape_transpose_reshape() {
        let program = export_decomposed_program(&spec(&[1, 8, 2, 2]), 2, "DCR").unwrap();
        assert_eq!(program.entry, "depth_to_space_dcr_decomposed");
        let body = &program.entry_function().unwrap().body;
        let ops: Vec<_> = body.iter().map(|i| i.op.name()).collect();
        assert_eq!(ops, ["Reshape", "Transpose", "Reshape"]);
        match &body[1].op {
            Operation::Transpose(t) => assert_eq!(t.perm, vec![0, 3, 4, 1, 5, 2]),
            other => panic!("unexpected op {other}"),
        }
    }
}
