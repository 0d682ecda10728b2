use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use d2s::backend::spec::{BackendResult, Operation, TensorSpec};
use d2s::ops::depth_to_space::{export_decomposed_program, export_program, Mode};
use d2s::tensor::{Shape, Tensor};
use d2s_backend_ref_cpu::{CpuKernelInterceptor, CpuTensor, GenericCpuBackend};
use d2s_backend_tests::harness::run_single;

/// Counts the operations it sees and never takes one over.
#[derive(Default)]
struct CountingInterceptor {
    depth_to_space: AtomicUsize,
    other: AtomicUsize,
}

impl CpuKernelInterceptor for CountingInterceptor {
    fn try_execute(
        &self,
        op: &Operation,
        _inputs: &[CpuTensor],
        _outputs: &[TensorSpec],
    ) -> Option<BackendResult<Vec<CpuTensor>>> {
        match op {
            Operation::DepthToSpace(_) => self.depth_to_space.fetch_add(1, Ordering::Relaxed),
            _ => self.other.fetch_add(1, Ordering::Relaxed),
        };
        None
    }
}

#[test]
fn interceptor_sees_every_instruction() -> Result<()> {
    let backend = Arc::new(GenericCpuBackend::with_interceptor(
        CountingInterceptor::default(),
    ));
    let input = Tensor::from_fn(Shape::new([1, 8, 2, 2]), |i| i as f32);

    run_single(&backend, &export_program(&input.spec(), 2, Mode::Crd)?, &input)?;
    run_single(
        &backend,
        &export_decomposed_program(&input.spec(), 2, Mode::Dcr)?,
        &input,
    )?;

    let seen = backend.interceptor();
    assert_eq!(seen.depth_to_space.load(Ordering::Relaxed), 1);
    assert_eq!(seen.other.load(Ordering::Relaxed), 3);
    Ok(())
}

/// Replaces every op with a zero tensor of the declared output type.
struct ZeroingInterceptor;

impl CpuKernelInterceptor for ZeroingInterceptor {
    fn try_execute(
        &self,
        _op: &Operation,
        _inputs: &[CpuTensor],
        outputs: &[TensorSpec],
    ) -> Option<BackendResult<Vec<CpuTensor>>> {
        let spec = outputs[0].clone();
        let len = spec.shape.element_count()?;
        Some(Ok(vec![CpuTensor {
            spec,
            data: d2s_backend_ref_cpu::TensorData::F32(Arc::from(vec![0.0f32; len])),
        }]))
    }
}

#[test]
fn interceptor_result_replaces_builtin_kernel() -> Result<()> {
    let backend = Arc::new(GenericCpuBackend::with_interceptor(ZeroingInterceptor));
    let input = Tensor::from_fn(Shape::new([1, 4, 1, 1]), |i| i as f32 + 1.0);
    let out = run_single(&backend, &export_program(&input.spec(), 2, "DCR")?, &input)?;
    assert_eq!(out.data(), &[0.0; 4]);
    Ok(())
}
