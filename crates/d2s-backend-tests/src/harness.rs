use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use d2s::backend::spec::{PortableBackend, Program, TensorInit};
use d2s::tensor::{Shape, StorageElement, Tensor};
use rand::{rngs::StdRng, SeedableRng};

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn random_tensor(rng: &mut StdRng, dims: [usize; 4]) -> Tensor<f32> {
    Tensor::randn(Shape::from(dims), 1.0, rng)
}

/// Uploads `input`, runs the entry function, and reads back its single result.
pub fn run_single<B, E>(
    backend: &Arc<B>,
    program: &Program,
    input: &Tensor<E>,
) -> Result<Tensor<E>>
where
    B: PortableBackend + 'static,
    E: StorageElement,
{
    let handle = backend
        .materialize(TensorInit::Literal(input.to_literal()))
        .context("materialize entry input")?;
    let mut outputs = backend.run_program(program, &[handle]).with_context(|| {
        format!(
            "run program @{} on {}",
            program.entry,
            backend.backend_name()
        )
    })?;
    ensure!(
        outputs.len() == 1,
        "expected a single result, got {}",
        outputs.len()
    );
    let output = outputs
        .pop()
        .ok_or_else(|| anyhow!("program produced no result"))?;
    let literal = backend.to_literal(&output)?;
    Ok(Tensor::from_literal(&literal)?)
}
