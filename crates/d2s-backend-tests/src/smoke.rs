use std::sync::Arc;

use d2s::backend::spec::PortableBackend;
use d2s::ops::depth_to_space::{export_program, Mode};
use d2s::tensor::Tensor;
use d2s::validate::canonical_fixture;

use crate::harness::run_single;

pub fn backend_reports_name<B: PortableBackend + 'static>(backend: &Arc<B>) {
    assert!(!backend.backend_name().is_empty());
}

pub fn fixture_crd_layout<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let input = canonical_fixture();
    let program = export_program(&input.spec(), 2, Mode::Crd).unwrap();
    let out: Tensor = run_single(backend, &program, &input).unwrap();
    assert_eq!(out.shape().dims(), &[1, 2, 4, 4]);
    #[rustfmt::skip]
    let expected = [
        0.0, 0.0, 2.0, 2.0,
        1.0, 1.0, 3.0, 3.0,
        8.0, 8.0, 10.0, 10.0,
        9.0, 9.0, 11.0, 11.0,
        4.0, 4.0, 6.0, 6.0,
        5.0, 5.0, 7.0, 7.0,
        12.0, 12.0, 14.0, 14.0,
        13.0, 13.0, 15.0, 15.0,
    ];
    assert_eq!(out.data(), &expected);
}

pub fn fixture_dcr_layout<B: PortableBackend + 'static>(backend: &Arc<B>) {
    let input = canonical_fixture();
    let program = export_program(&input.spec(), 2, Mode::Dcr).unwrap();
    let out: Tensor = run_single(backend, &program, &input).unwrap();
    assert_eq!(out.shape().dims(), &[1, 2, 4, 4]);
    // Each output channel comes out as 0..16 in row-major order.
    let expected: Vec<f32> = (0..32).map(|i| (i % 16) as f32).collect();
    assert_eq!(out.data(), expected.as_slice());
}
