//! Equivalence checks between the CRD engine path and the pixel-shuffle reference.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{D2sError, Dim, Result};
use crate::ops::depth_to_space::{transform, Mode};
use crate::ops::pixel_shuffle::pixel_shuffle;
use crate::tensor::{Shape, StorageElement, Tensor};

pub const DEFAULT_ATOL: f64 = 1e-6;
pub const DEFAULT_RTOL: f64 = 0.0;

fn default_atol() -> f64 {
    DEFAULT_ATOL
}

fn default_rtol() -> f64 {
    DEFAULT_RTOL
}

/// Elementwise tolerance: `|actual - expected| <= atol + rtol * |expected|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default = "default_atol")]
    pub atol: f64,
    #[serde(default = "default_rtol")]
    pub rtol: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            atol: DEFAULT_ATOL,
            rtol: DEFAULT_RTOL,
        }
    }
}

impl ToleranceConfig {
    /// Reads a JSON object such as `{"atol": 1e-5}`. Missing fields keep their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read tolerance config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse tolerance config {}", path.display()))
    }

    pub fn allowed(&self, expected: f64) -> f64 {
        self.atol + self.rtol * expected.abs()
    }
}

/// Largest absolute elementwise difference. `None` when the shapes differ. A NaN facing a
/// number counts as an infinite difference.
pub fn max_abs_diff<E: StorageElement>(actual: &Tensor<E>, expected: &Tensor<E>) -> Option<f64> {
    if actual.shape() != expected.shape() {
        return None;
    }
    Some(
        actual
            .data()
            .iter()
            .zip(expected.data())
            .map(|(&a, &e)| diff(a.to_f64(), e.to_f64()))
            .fold(0.0, f64::max),
    )
}

// NaN only ever arrives by being moved, so NaN against NaN counts as a match.
fn diff(actual: f64, expected: f64) -> f64 {
    if (actual.is_nan() && expected.is_nan()) || actual == expected {
        0.0
    } else if actual.is_nan() || expected.is_nan() {
        f64::INFINITY
    } else {
        (actual - expected).abs()
    }
}

/// Fails on the first element outside tolerance.
pub fn assert_allclose<E: StorageElement>(
    actual: &Tensor<E>,
    expected: &Tensor<E>,
    tolerance: &ToleranceConfig,
) -> Result<()> {
    if actual.shape() != expected.shape() {
        return Err(D2sError::shape(
            Dim::Elements,
            format!(
                "cannot compare tensors of shape {} and {}",
                actual.shape(),
                expected.shape()
            ),
        ));
    }
    for (index, (&a, &e)) in actual.data().iter().zip(expected.data()).enumerate() {
        let (a, e) = (a.to_f64(), e.to_f64());
        if a.is_nan() && e.is_nan() {
            continue;
        }
        let delta = diff(a, e);
        let allowed = tolerance.allowed(e);
        // `!(<=)` so that a NaN tolerance fails too.
        if a.is_nan() || e.is_nan() || !(delta <= allowed) {
            return Err(D2sError::Tolerance {
                index,
                actual: a,
                expected: e,
                diff: delta,
                allowed,
            });
        }
    }
    Ok(())
}

/// The `(1, 8, 2, 2)` input used to pin the CRD/pixel-shuffle equivalence.
pub fn canonical_fixture() -> Tensor<f32> {
    let values = [
        [[0.0, 2.0], [8.0, 10.0]],
        [[0.0, 2.0], [8.0, 10.0]],
        [[1.0, 3.0], [9.0, 11.0]],
        [[1.0, 3.0], [9.0, 11.0]],
        [[4.0, 6.0], [12.0, 14.0]],
        [[4.0, 6.0], [12.0, 14.0]],
        [[5.0, 7.0], [13.0, 15.0]],
        [[5.0, 7.0], [13.0, 15.0]],
    ];
    let data: Vec<f32> = values.iter().flatten().flatten().copied().collect();
    Tensor::from_fn(Shape::new([1, 8, 2, 2]), |i| data[i])
}

/// Outcome of [`EquivalenceValidator::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquivalenceReport {
    /// Largest CRD vs reference difference. Always within tolerance in a returned report.
    pub max_abs_diff: f64,
    /// Whether DCR output differs from the reference at some coordinate.
    pub dcr_diverges: bool,
    /// Whether the two channel orderings are distinct permutations for this shape, i.e.
    /// `s > 1` and `C / s² > 1`.
    pub divergence_expected: bool,
}

impl EquivalenceReport {
    /// False only when divergence was expected but DCR still matched the reference.
    pub fn dcr_consistent(&self) -> bool {
        !self.divergence_expected || self.dcr_diverges
    }
}

/// Runs the engine against the pixel-shuffle reference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EquivalenceValidator {
    tolerance: ToleranceConfig,
}

impl EquivalenceValidator {
    pub fn new(tolerance: ToleranceConfig) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &ToleranceConfig {
        &self.tolerance
    }

    /// CRD output must equal the reference within tolerance.
    pub fn check_crd_matches_reference<E: StorageElement>(
        &self,
        input: &Tensor<E>,
        block_size: usize,
    ) -> Result<f64> {
        let actual = transform(input, block_size, Mode::Crd)?;
        let expected = pixel_shuffle(input, block_size)?;
        assert_allclose(&actual, &expected, &self.tolerance)?;
        Ok(max_abs_diff(&actual, &expected).unwrap_or(0.0))
    }

    /// Checks CRD equivalence and records whether DCR departs from the reference.
    pub fn validate<E: StorageElement>(
        &self,
        input: &Tensor<E>,
        block_size: usize,
    ) -> Result<EquivalenceReport> {
        let _span =
            tracing::debug_span!("validate", input = %input.shape(), block_size).entered();
        let max_abs_diff = self.check_crd_matches_reference(input, block_size)?;

        let reference = pixel_shuffle(input, block_size)?;
        let dcr = transform(input, block_size, Mode::Dcr)?;
        let dcr_diverges = assert_allclose(&dcr, &reference, &self.tolerance).is_err();
        let [_, channels, _, _] = input.shape().nchw()?;
        let divergence_expected = block_size > 1 && channels / (block_size * block_size) > 1;

        let report = EquivalenceReport {
            max_abs_diff,
            dcr_diverges,
            divergence_expected,
        };
        if report.dcr_consistent() {
            debug!(?report, "equivalence holds");
        } else {
            // Possible when the input repeats values across channels.
            warn!(?report, "DCR output coincides with the reference");
        }
        Ok(report)
    }
}
