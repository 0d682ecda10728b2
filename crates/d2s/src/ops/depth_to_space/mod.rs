//! Depth-to-space: moves `s*s` channel blocks into an `s x s` spatial neighbourhood.
//!
//! An NCHW input `(n, c, h, w)` becomes `(n, c / s², h * s, w * s)`. The two supported modes
//! differ only in how the input channel axis is split:
//!
//! | mode | channel axis layout         | `c_in` for `(c_out, by, bx)`        |
//! |------|-----------------------------|-------------------------------------|
//! | DCR  | `(block_row, block_col, c)` | `by * s * C_out + bx * C_out + c_out` |
//! | CRD  | `(c, block_row, block_col)` | `c_out * s * s + by * s + bx`       |
//!
//! There are two entry points. [`transform`] evaluates eagerly on a host [`Tensor`], and
//! [`emit_node`] produces a data-free [`GraphNodeDescriptor`]. Both run the same parameter
//! validation ([`check_params`]), so they never disagree on what is valid.
//!
//! [`Tensor`]: crate::tensor::Tensor

mod engine;
mod export;
mod mapping;
mod node;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::spec::DepthToSpaceSpec;
use crate::error::{D2sError, Dim, Result};

pub use engine::transform;
pub use export::{
    export_decomposed_program, export_program, infer_output_spec, Decomposition,
    DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME,
};
pub use mapping::{input_channel, input_coord};
pub use node::{emit_node, GraphNodeDescriptor, NodeAttr, TensorRef, OPERATOR_NAME};

/// Channel-subdivision ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Depth-column-row: block indices vary slowest along the input channel axis.
    #[serde(rename = "DCR")]
    Dcr,
    /// Column-row-depth: the output channel varies slowest; matches pixel shuffle.
    #[serde(rename = "CRD")]
    Crd,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Dcr, Mode::Crd];

    /// Portable attribute spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Dcr => "DCR",
            Mode::Crd => "CRD",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = D2sError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DCR" => Ok(Mode::Dcr),
            "CRD" => Ok(Mode::Crd),
            other => Err(D2sError::unsupported_mode(other)),
        }
    }
}

/// Anything that can name a [`Mode`]: the enum itself or its attribute spelling.
pub trait IntoMode {
    fn into_mode(self) -> Result<Mode>;
}

impl IntoMode for Mode {
    fn into_mode(self) -> Result<Mode> {
        Ok(self)
    }
}

impl IntoMode for &str {
    fn into_mode(self) -> Result<Mode> {
        self.parse()
    }
}

impl IntoMode for String {
    fn into_mode(self) -> Result<Mode> {
        self.as_str().parse()
    }
}

impl IntoMode for &String {
    fn into_mode(self) -> Result<Mode> {
        self.as_str().parse()
    }
}

/// Validated block size and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthToSpaceParams {
    block_size: usize,
    mode: Mode,
}

/// Validates the shape-independent parameters shared by every entry point.
///
/// `block_size` must be at least 1 and its square must fit the signed 64-bit attribute range
/// used by the portable schema.
pub fn check_params(block_size: usize, mode: impl IntoMode) -> Result<DepthToSpaceParams> {
    let mode = mode.into_mode()?;
    if block_size == 0 {
        return Err(D2sError::shape(Dim::BlockSize, "block size must be >= 1"));
    }
    let squared = block_size
        .checked_mul(block_size)
        .and_then(|sq| i64::try_from(sq).ok());
    if squared.is_none() {
        return Err(D2sError::shape(
            Dim::BlockSize,
            format!("block size {block_size} exceeds the supported attribute range"),
        ));
    }
    Ok(DepthToSpaceParams { block_size, mode })
}

impl DepthToSpaceParams {
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of channels folded into each output channel (`s²`).
    pub fn block_area(&self) -> usize {
        self.block_size * self.block_size
    }

    /// Checks an NCHW input shape and returns the output shape.
    pub fn output_dims(&self, input: [usize; 4]) -> Result<[usize; 4]> {
        let [n, c, h, w] = input;
        let s = self.block_size;
        let area = self.block_area();
        if c % area != 0 {
            return Err(D2sError::shape(
                Dim::Channel,
                format!("channel count {c} is not divisible by block_size^2 = {area}"),
            ));
        }
        let out_h = h.checked_mul(s).ok_or_else(|| {
            D2sError::shape(Dim::Height, format!("height {h} * block size {s} overflows"))
        })?;
        let out_w = w.checked_mul(s).ok_or_else(|| {
            D2sError::shape(Dim::Width, format!("width {w} * block size {s} overflows"))
        })?;
        let out = [n, c / area, out_h, out_w];
        if out.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).is_none() {
            return Err(D2sError::shape(
                Dim::Elements,
                format!("output shape {out:?} has more elements than fit in usize"),
            ));
        }
        Ok(out)
    }

    /// Portable attribute payload for this invocation.
    pub fn to_spec(&self) -> DepthToSpaceSpec {
        DepthToSpaceSpec {
            // check_params guarantees s² fits in i64, so s does too.
            blocksize: self.block_size as i64,
            mode: self.mode.as_str().to_string(),
        }
    }
}

impl DepthToSpaceSpec {
    /// Resolves raw portable attributes through the shared validation policy.
    pub fn params(&self) -> Result<DepthToSpaceParams> {
        let block_size = usize::try_from(self.blocksize).map_err(|_| {
            D2sError::shape(
                Dim::BlockSize,
                format!("blocksize attribute {} must be positive", self.blocksize),
            )
        })?;
        check_params(block_size, self.mode.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_exact_spellings_only() {
        assert_eq!("DCR".parse::<Mode>().unwrap(), Mode::Dcr);
        assert_eq!("CRD".parse::<Mode>().unwrap(), Mode::Crd);
        for bad in ["dcr", "RCD", "", "CRD "] {
            let err = bad.parse::<Mode>().expect_err("mode spelling must be exact");
            assert!(matches!(err, D2sError::UnsupportedMode { .. }), "{bad:?}");
        }
    }

    #[test]
    fn check_params_rejects_zero_and_oversized_blocks() {
        let zero = check_params(0, Mode::Crd).unwrap_err();
        assert_eq!(zero.dim(), Some(Dim::BlockSize));
        let huge = check_params(usize::MAX, Mode::Dcr).unwrap_err();
        assert_eq!(huge.dim(), Some(Dim::BlockSize));
    }

    #[test]
    fn mode_error_wins_over_block_size_error() {
        let err = check_params(0, "XYZ").unwrap_err();
        assert!(matches!(err, D2sError::UnsupportedMode { ref mode } if mode == "XYZ"));
    }

    #[test]
    fn output_dims_follow_block_size() {
        let params = check_params(2, Mode::Dcr).unwrap();
        assert_eq!(params.output_dims([3, 8, 5, 7]).unwrap(), [3, 2, 10, 14]);
        let err = check_params(3, Mode::Dcr)
            .unwrap()
            .output_dims([1, 8, 2, 2])
            .unwrap_err();
        assert_eq!(err.dim(), Some(Dim::Channel));
    }

    #[test]
    fn spec_params_reject_negative_blocksize() {
        let spec = DepthToSpaceSpec {
            blocksize: -2,
            mode: "CRD".to_string(),
        };
        assert_eq!(spec.params().unwrap_err().dim(), Some(Dim::BlockSize));
        let spec = DepthToSpaceSpec {
            blocksize: 4,
            mode: "DCR".to_string(),
        };
        let params = spec.params().unwrap();
        assert_eq!((params.block_size(), params.mode()), (4, Mode::Dcr));
        assert_eq!(params.to_spec(), spec);
    }
}
