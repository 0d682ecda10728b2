//! Output-to-input coordinate mapping, one strategy per mode.

use super::{DepthToSpaceParams, Mode};

/// Strategy for locating the input channel that feeds output channel `c_out` at block offset
/// `(by, bx)`. `out_channels` is `C_out = C_in / s²`.
pub(crate) trait ChannelOrder {
    const MODE: Mode;

    fn input_channel(c_out: usize, by: usize, bx: usize, s: usize, out_channels: usize) -> usize;
}

/// Input channel axis viewed as `(block_row, block_col, c_out)`.
pub(crate) struct Dcr;

impl ChannelOrder for Dcr {
    const MODE: Mode = Mode::Dcr;

    #[inline(always)]
    fn input_channel(c_out: usize, by: usize, bx: usize, s: usize, out_channels: usize) -> usize {
        by * s * out_channels + bx * out_channels + c_out
    }
}

/// Input channel axis viewed as `(c_out, block_row, block_col)`.
pub(crate) struct Crd;

impl ChannelOrder for Crd {
    const MODE: Mode = Mode::Crd;

    #[inline(always)]
    fn input_channel(c_out: usize, by: usize, bx: usize, s: usize, _out_channels: usize) -> usize {
        c_out * s * s + by * s + bx
    }
}

/// Input channel feeding `(c_out, by, bx)` for the given mode.
pub fn input_channel(
    mode: Mode,
    block_size: usize,
    out_channels: usize,
    c_out: usize,
    by: usize,
    bx: usize,
) -> usize {
    match mode {
        Mode::Dcr => Dcr::input_channel(c_out, by, bx, block_size, out_channels),
        Mode::Crd => Crd::input_channel(c_out, by, bx, block_size, out_channels),
    }
}

/// Maps an output coordinate `(b, c_out, y, x)` to its source `(b, c_in, h_in, w_in)`.
///
/// `out_channels` is the output channel count. The coordinate is not bounds-checked.
pub fn input_coord(
    params: &DepthToSpaceParams,
    out_channels: usize,
    [b, c_out, y, x]: [usize; 4],
) -> [usize; 4] {
    let s = params.block_size();
    let (h_in, by) = (y / s, y % s);
    let (w_in, bx) = (x / s, x % s);
    let c_in = input_channel(params.mode(), s, out_channels, c_out, by, bx);
    [b, c_in, h_in, w_in]
}

#[cfg(test)]
mod tests {
    use super::super::check_params;
    use super::*;

    fn covers_every_channel_once(mode: Mode, s: usize, out_channels: usize) -> bool {
        let mut hits = vec![0usize; out_channels * s * s];
        for c in 0..out_channels {
            for by in 0..s {
                for bx in 0..s {
                    hits[input_channel(mode, s, out_channels, c, by, bx)] += 1;
                }
            }
        }
        hits.iter().all(|&n| n == 1)
    }

    #[test]
    fn channel_mappings_are_bijective() {
        for mode in Mode::ALL {
            for s in 1..=4 {
                for out_channels in 1..=5 {
                    assert!(
                        covers_every_channel_once(mode, s, out_channels),
                        "{mode} s={s} C_out={out_channels}"
                    );
                }
            }
        }
    }

    #[test]
    fn dcr_and_crd_disagree_when_both_factors_exceed_one() {
        // C_out = 2, s = 2, (c_out, by, bx) = (1, 0, 0)
        assert_eq!(input_channel(Mode::Dcr, 2, 2, 1, 0, 0), 1);
        assert_eq!(input_channel(Mode::Crd, 2, 2, 1, 0, 0), 4);
    }

    #[test]
    fn input_coord_splits_spatial_offsets() {
        let params = check_params(2, Mode::Crd).unwrap();
        assert_eq!(input_coord(&params, 2, [0, 1, 3, 2]), [0, 6, 1, 1]);
        let params = check_params(2, Mode::Dcr).unwrap();
        assert_eq!(input_coord(&params, 2, [0, 1, 3, 2]), [0, 5, 1, 1]);
    }
}
