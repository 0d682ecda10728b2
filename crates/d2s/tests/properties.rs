use d2s::ops::depth_to_space::{transform, Mode};
use d2s::tensor::{Shape, Tensor};
use proptest::prelude::*;

fn mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Dcr), Just(Mode::Crd)]
}

/// `(n, c_out, h, w, s)` with small extents.
fn geometry() -> impl Strategy<Value = (usize, usize, usize, usize, usize)> {
    (1usize..3, 1usize..4, 0usize..4, 1usize..4, 1usize..4)
}

fn iota(dims: [usize; 4]) -> Tensor<i64> {
    Tensor::from_fn(Shape::from(dims), |i| i as i64)
}

proptest! {
    #[test]
    fn output_shape_follows_block_size(
        (n, c_out, h, w, s) in geometry(),
        mode in mode(),
    ) {
        let input = iota([n, c_out * s * s, h, w]);
        let out = transform(&input, s, mode).unwrap();
        prop_assert_eq!(out.shape().dims(), &[n, c_out, h * s, w * s]);
    }

    #[test]
    fn every_element_lands_exactly_once(
        (n, c_out, h, w, s) in geometry(),
        mode in mode(),
    ) {
        let input = iota([n, c_out * s * s, h, w]);
        let mut moved = transform(&input, s, mode).unwrap().into_data();
        moved.sort_unstable();
        prop_assert_eq!(moved, input.into_data());
    }

    #[test]
    fn block_size_one_is_identity(
        dims in (1usize..3, 1usize..6, 0usize..5, 1usize..5),
        mode in mode(),
    ) {
        let input = iota([dims.0, dims.1, dims.2, dims.3]);
        prop_assert_eq!(transform(&input, 1, mode).unwrap(), input);
    }

    #[test]
    fn indivisible_channels_are_rejected(
        c in 1usize..40,
        s in 2usize..5,
        mode in mode(),
    ) {
        prop_assume!(c % (s * s) != 0);
        let input = iota([1, c, 1, 1]);
        let err = transform(&input, s, mode).unwrap_err();
        prop_assert_eq!(err.dim(), Some(d2s::Dim::Channel));
    }
}
