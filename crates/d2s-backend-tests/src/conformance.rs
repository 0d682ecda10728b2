use std::sync::Arc;

use d2s::backend::spec::{
    DType, DepthToSpaceSpec, DimSymbol, Dimension, Operand, Operation, PortableBackend, Program,
    ProgramBuilder, Shape as SpecShape, SpecErrorCode, TensorInit, TensorSpec, ValueType,
};
use d2s::ops::depth_to_space::{export_decomposed_program, export_program, transform, Mode};
use d2s::ops::pixel_shuffle::pixel_shuffle;
use d2s::tensor::{Shape, Tensor};
use d2s::validate::{assert_allclose, canonical_fixture, ToleranceConfig};

use crate::harness::{random_tensor, run_single, seeded_rng};

const CASES: [([usize; 4], usize); 4] = [
    ([1, 8, 2, 2], 2),
    ([2, 18, 3, 4], 3),
    ([3, 4, 5, 1], 2),
    ([1, 3, 2, 2], 1),
];

pub fn graph_matches_eager_for_both_modes<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let mut rng = seeded_rng(7);
    for (dims, block_size) in CASES {
        let input = random_tensor(&mut rng, dims);
        for mode in Mode::ALL {
            let program = export_program(&input.spec(), block_size, mode).unwrap();
            let graph = run_single(backend, &program, &input).unwrap();
            let eager = transform(&input, block_size, mode).unwrap();
            assert_eq!(graph, eager, "{mode} dims={dims:?} s={block_size}");
        }
    }
}

pub fn decomposed_program_matches_eager<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let mut rng = seeded_rng(11);
    for (dims, block_size) in CASES {
        let input = random_tensor(&mut rng, dims);
        for mode in Mode::ALL {
            let program = export_decomposed_program(&input.spec(), block_size, mode).unwrap();
            let graph = run_single(backend, &program, &input).unwrap();
            let eager = transform(&input, block_size, mode).unwrap();
            assert_eq!(graph, eager, "{mode} dims={dims:?} s={block_size}");
        }
    }
}

pub fn crd_graph_matches_pixel_shuffle<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let input = canonical_fixture();
    let reference = pixel_shuffle(&input, 2).unwrap();

    let crd = export_program(&input.spec(), 2, Mode::Crd).unwrap();
    let crd_out = run_single(backend, &crd, &input).unwrap();
    assert_allclose(&crd_out, &reference, &ToleranceConfig::default()).unwrap();

    let dcr = export_program(&input.spec(), 2, Mode::Dcr).unwrap();
    let dcr_out = run_single(backend, &dcr, &input).unwrap();
    assert!(assert_allclose(&dcr_out, &reference, &ToleranceConfig::default()).is_err());
}

pub fn integer_tensors_survive_graph<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let input = Tensor::from_fn(Shape::new([2, 8, 3, 2]), |i| i as i64 * 1_000_000_000_007);
    let program = export_program(&input.spec(), 2, Mode::Dcr).unwrap();
    let graph = run_single(backend, &program, &input).unwrap();
    assert_eq!(graph, transform(&input, 2, Mode::Dcr).unwrap());

    let input = Tensor::from_fn(Shape::new([1, 9, 1, 2]), |i| -(i as i32));
    let program = export_program(&input.spec(), 3, Mode::Crd).unwrap();
    let graph = run_single(backend, &program, &input).unwrap();
    assert_eq!(graph, transform(&input, 3, Mode::Crd).unwrap());
}

pub fn serialized_program_runs_identically<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let input = random_tensor(&mut seeded_rng(13), [1, 8, 3, 3]);
    let program = export_program(&input.spec(), 2, Mode::Crd).unwrap();
    let expected = run_single(backend, &program, &input).unwrap();

    let from_json = Program::from_json_str(&program.to_json_string().unwrap()).unwrap();
    assert_eq!(from_json, program);
    assert_eq!(run_single(backend, &from_json, &input).unwrap(), expected);

    let from_bincode = Program::from_bincode_slice(&program.to_bincode_bytes().unwrap()).unwrap();
    assert_eq!(run_single(backend, &from_bincode, &input).unwrap(), expected);
}

pub fn dynamic_batch_program_accepts_any_batch<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let spec = TensorSpec::new(
        DType::F32,
        SpecShape::new(vec![
            Dimension::Dynamic(DimSymbol::new("N")),
            Dimension::Static(8),
            Dimension::Static(2),
            Dimension::Static(2),
        ]),
    );
    let program = export_program(&spec, 2, Mode::Crd).unwrap();
    let mut rng = seeded_rng(17);
    for batch in [1, 3] {
        let input = random_tensor(&mut rng, [batch, 8, 2, 2]);
        let graph = run_single(backend, &program, &input).unwrap();
        assert_eq!(graph, transform(&input, 2, Mode::Crd).unwrap());
    }
}

pub fn dynamic_dims_cannot_be_materialized<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let spec = TensorSpec::new(
        DType::F32,
        SpecShape::new(vec![Dimension::Dynamic(DimSymbol::new("N")), Dimension::Static(4)]),
    );
    let err = backend.materialize(TensorInit::Zeroed(spec)).err().unwrap();
    assert_eq!(
        err.spec_code(),
        Some(&SpecErrorCode::DynamicDimensionMismatch)
    );
}

pub fn entry_shape_mismatch_is_rejected<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let program = export_program(
        &TensorSpec::new(DType::F32, SpecShape::from_static(&[1, 8, 2, 2])),
        2,
        Mode::Dcr,
    )
    .unwrap();
    let wrong = Tensor::<f32>::zeros(Shape::new([1, 8, 2, 3]));
    let handle = backend
        .materialize(TensorInit::Literal(wrong.to_literal()))
        .unwrap();
    let err = backend.run_program(&program, &[handle]).err().unwrap();
    assert_eq!(err.spec_code(), Some(&SpecErrorCode::ShapeMismatch));
}

/// Builds a DepthToSpace program without going through the exporter's validation.
fn unchecked_program(
    input: [usize; 4],
    output: [usize; 4],
    blocksize: i64,
    mode: &str,
) -> Program {
    let tensor = |dims: [usize; 4]| {
        ValueType::Tensor(TensorSpec::new(DType::F32, SpecShape::from_static(&dims)))
    };
    let mut builder = ProgramBuilder::new();
    let x = builder.add_parameter("input", tensor(input));
    let y = builder.emit_single(
        Operation::DepthToSpace(DepthToSpaceSpec {
            blocksize,
            mode: mode.to_string(),
        }),
        vec![Operand::Value(x)],
        tensor(output),
    );
    let function = builder
        .finish("unchecked", vec![(y, "output".to_string())])
        .unwrap();
    Program::new("unchecked").with_functions(vec![function])
}

pub fn invalid_attributes_are_rejected<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let input = canonical_fixture();
    let cases = [
        (0, "CRD", [1, 8, 2, 2], SpecErrorCode::InvalidAttributeValue),
        (-2, "DCR", [1, 2, 4, 4], SpecErrorCode::InvalidAttributeValue),
        (2, "crd", [1, 2, 4, 4], SpecErrorCode::UnsupportedMode),
        (0, "RDC", [1, 2, 4, 4], SpecErrorCode::UnsupportedMode),
        (3, "CRD", [1, 0, 6, 6], SpecErrorCode::ShapeMismatch),
    ];
    for (blocksize, mode, output, code) in cases {
        let program = unchecked_program([1, 8, 2, 2], output, blocksize, mode);
        let handle = backend
            .materialize(TensorInit::Literal(input.to_literal()))
            .unwrap();
        let err = backend.run_program(&program, &[handle]).err().unwrap();
        assert_eq!(
            err.spec_code(),
            Some(&code),
            "blocksize={blocksize} mode={mode}: {err}"
        );
    }
}
