//! Canonical sub-pixel rearrangement, written directly from its definition:
//!
//! `out[b, c, h * r + i, w * r + j] = in[b, c * r * r + i * r + j, h, w]`
//!
//! It shares no indexing code with [`crate::ops::depth_to_space`], which makes it usable as an
//! independent oracle for the CRD mode.

use crate::error::{D2sError, Dim, Result};
use crate::tensor::{Shape, StorageElement, Tensor};

/// Reference pixel shuffle with upscale factor `r`.
pub fn pixel_shuffle<E: StorageElement>(input: &Tensor<E>, upscale: usize) -> Result<Tensor<E>> {
    let [n, c, h, w] = input.shape().nchw()?;
    if upscale == 0 {
        return Err(D2sError::shape(Dim::BlockSize, "upscale factor must be >= 1"));
    }
    let r = upscale;
    let r2 = r.checked_mul(r).ok_or_else(|| {
        D2sError::shape(Dim::BlockSize, format!("upscale {r} squared overflows"))
    })?;
    if c % r2 != 0 {
        return Err(D2sError::shape(
            Dim::Channel,
            format!("pixel shuffle needs channels divisible by {r2}, got {c}"),
        ));
    }
    let oc = c / r2;
    let (oh, ow) = match (h.checked_mul(r), w.checked_mul(r)) {
        (Some(oh), Some(ow)) => (oh, ow),
        _ => {
            return Err(D2sError::shape(
                Dim::Elements,
                format!("spatial extent {h}x{w} times {r} overflows"),
            ))
        }
    };

    let out_shape = Shape::new([n, oc, oh, ow]);
    let len = out_shape.checked_num_elements().ok_or_else(|| {
        D2sError::shape(Dim::Elements, format!("output {out_shape} overflows usize"))
    })?;

    let src = input.data();
    let mut out = vec![E::default(); len];
    for b in 0..n {
        for co in 0..oc {
            for hi in 0..h {
                for i in 0..r {
                    for wi in 0..w {
                        for j in 0..r {
                            let ci = co * r2 + i * r + j;
                            let from = ((b * c + ci) * h + hi) * w + wi;
                            let to = ((b * oc + co) * oh + hi * r + i) * ow + wi * r + j;
                            out[to] = src[from];
                        }
                    }
                }
            }
        }
    }
    Tensor::from_vec(out_shape, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffles_single_channel_block() {
        let input =
            Tensor::from_vec(Shape::new([1, 4, 1, 1]), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let out = pixel_shuffle(&input, 2).unwrap();
        assert_eq!(out.shape().dims(), &[1, 1, 2, 2]);
        assert_eq!(out.data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn interleaves_columns_from_neighbouring_channels() {
        let input = Tensor::from_fn(Shape::new([1, 4, 1, 2]), |i| i as i32);
        let out = pixel_shuffle(&input, 2).unwrap();
        assert_eq!(out.data(), &[0, 2, 1, 3, 4, 6, 5, 7]);
    }

    #[test]
    fn rejects_bad_factors() {
        let input = Tensor::<f32>::zeros(Shape::new([1, 8, 2, 2]));
        assert_eq!(pixel_shuffle(&input, 0).unwrap_err().dim(), Some(Dim::BlockSize));
        assert_eq!(pixel_shuffle(&input, 3).unwrap_err().dim(), Some(Dim::Channel));
    }
}
