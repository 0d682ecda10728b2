//! Eager evaluation over host tensors.

use tracing::debug_span;

use super::mapping::{ChannelOrder, Crd, Dcr};
use super::{check_params, DepthToSpaceParams, IntoMode, Mode};
use crate::env;
use crate::error::Result;
use crate::tensor::{Shape, StorageElement, Tensor};

/// Rearranges `input` from `(n, c, h, w)` to `(n, c / s², h * s, w * s)`.
///
/// All preconditions (block size, mode spelling, rank 4, channel divisibility, overflow) are
/// checked before the output buffer is allocated. The input is only read.
pub fn transform<E, M>(input: &Tensor<E>, block_size: usize, mode: M) -> Result<Tensor<E>>
where
    E: StorageElement,
    M: IntoMode,
{
    check_params(block_size, mode)?.apply(input)
}

impl DepthToSpaceParams {
    /// Eager path with already validated parameters.
    pub fn apply<E: StorageElement>(&self, input: &Tensor<E>) -> Result<Tensor<E>> {
        let in_dims = input.shape().nchw()?;
        let out_dims = self.output_dims(in_dims)?;
        let _span = debug_span!(
            "depth_to_space",
            mode = %self.mode(),
            block_size = self.block_size(),
            input = %input.shape(),
        )
        .entered();

        let data = match self.mode() {
            Mode::Dcr => rearrange::<E, Dcr>(input.data(), in_dims, out_dims, self.block_size()),
            Mode::Crd => rearrange::<E, Crd>(input.data(), in_dims, out_dims, self.block_size()),
        };
        tracing::debug!(output = ?out_dims, elements = data.len(), "depth_to_space done");
        Tensor::from_vec(Shape::from(out_dims), data)
    }
}

/// Fills the output one `(batch, c_out)` plane at a time. Planes are disjoint, so they can be
/// written concurrently without synchronization.
fn rearrange<E, O>(
    input: &[E],
    in_dims: [usize; 4],
    out_dims: [usize; 4],
    s: usize,
) -> Vec<E>
where
    E: StorageElement,
    O: ChannelOrder,
{
    let [_, in_c, in_h, in_w] = in_dims;
    let [_, out_c, out_h, out_w] = out_dims;
    let plane = out_h * out_w;
    let mut out = vec![E::default(); out_dims.iter().product()];
    if out.is_empty() {
        return out;
    }

    let fill = |plane_index: usize, dst: &mut [E]| {
        let b = plane_index / out_c;
        let c = plane_index % out_c;
        for y in 0..out_h {
            let (h_in, by) = (y / s, y % s);
            let row = &mut dst[y * out_w..(y + 1) * out_w];
            for (x, slot) in row.iter_mut().enumerate() {
                let (w_in, bx) = (x / s, x % s);
                let c_in = O::input_channel(c, by, bx, s, out_c);
                *slot = input[((b * in_c + c_in) * in_h + h_in) * in_w + w_in];
            }
        }
    };

    #[cfg(feature = "parallel")]
    {
        if out.len() >= env::parallel_min_elements() {
            use rayon::prelude::*;

            tracing::trace!(
                mode = %O::MODE,
                planes = out.len() / plane,
                "filling planes in parallel"
            );
            out.par_chunks_mut(plane)
                .enumerate()
                .for_each(|(index, dst)| fill(index, dst));
            return out;
        }
    }

    tracing::trace!(
        mode = %O::MODE,
        planes = out.len() / plane,
        threshold = env::parallel_min_elements(),
        "filling planes sequentially"
    );
    for (index, dst) in out.chunks_mut(plane).enumerate() {
        fill(index, dst);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{D2sError, Dim};

    fn iota(dims: [usize; 4]) -> Tensor<f32> {
        Tensor::from_fn(Shape::from(dims), |i| i as f32)
    }

    #[test]
    fn crd_matches_hand_computed_layout() {
        // One output channel: CRD and DCR coincide and the four channels tile a 2x2 block.
        let input = iota([1, 4, 1, 2]);
        let out = transform(&input, 2, Mode::Crd).unwrap();
        assert_eq!(out.shape().dims(), &[1, 1, 2, 4]);
        assert_eq!(out.data(), &[0.0, 2.0, 1.0, 3.0, 4.0, 6.0, 5.0, 7.0]);
        let dcr = transform(&input, 2, Mode::Dcr).unwrap();
        assert_eq!(dcr, out);
    }

    #[test]
    fn dcr_reads_block_major_channels() {
        let input = iota([1, 8, 1, 1]);
        let out = transform(&input, 2, "DCR").unwrap();
        assert_eq!(out.shape().dims(), &[1, 2, 2, 2]);
        assert_eq!(out.data(), &[0.0, 2.0, 4.0, 6.0, 1.0, 3.0, 5.0, 7.0]);
        let crd = transform(&input, 2, "CRD").unwrap();
        assert_eq!(crd.data(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn block_size_one_is_identity() {
        let input = iota([2, 3, 4, 5]);
        for mode in Mode::ALL {
            assert_eq!(transform(&input, 1, mode).unwrap(), input);
        }
    }

    #[test]
    fn rejects_indivisible_channels_before_allocating() {
        let input = iota([1, 8, 2, 2]);
        let err = transform(&input, 3, Mode::Crd).unwrap_err();
        assert!(matches!(err, D2sError::Shape { dim: Dim::Channel, .. }));
    }

    #[test]
    fn rejects_non_nchw_rank() {
        let input = Tensor::from_fn(Shape::new([4, 2, 2]), |i| i as f32);
        let err = transform(&input, 2, Mode::Dcr).unwrap_err();
        assert_eq!(err.dim(), Some(Dim::Rank));
    }

    #[test]
    fn empty_spatial_extent_yields_empty_output() {
        let input = Tensor::<f32>::zeros(Shape::new([1, 4, 0, 3]));
        let out = transform(&input, 2, Mode::Dcr).unwrap();
        assert_eq!(out.shape().dims(), &[1, 1, 0, 6]);
        assert!(out.is_empty());
    }

    #[test]
    fn integer_tensors_move_verbatim() {
        let input = Tensor::from_fn(Shape::new([1, 4, 2, 2]), |i| i as i64 * 1_000_000_007);
        let out = transform(&input, 2, Mode::Crd).unwrap();
        let mut moved = out.into_data();
        moved.sort_unstable();
        assert_eq!(moved, input.into_data());
    }
}
