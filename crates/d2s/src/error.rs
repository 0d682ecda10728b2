//! Error taxonomy shared by the eager and symbolic depth-to-space paths.

use std::fmt;

use thiserror::Error;

/// Names the dimension (or parameter) a [`D2sError::Shape`] failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Rank,
    Batch,
    Channel,
    Height,
    Width,
    BlockSize,
    Elements,
}

impl Dim {
    pub fn as_str(self) -> &'static str {
        match self {
            Dim::Rank => "rank",
            Dim::Batch => "batch",
            Dim::Channel => "channel",
            Dim::Height => "height",
            Dim::Width => "width",
            Dim::BlockSize => "block_size",
            Dim::Elements => "elements",
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised synchronously at the violated precondition. None of them are transient.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum D2sError {
    #[error("shape error on {dim}: {detail}")]
    Shape { dim: Dim, detail: String },
    #[error("unsupported depth-to-space mode '{mode}' (expected \"DCR\" or \"CRD\")")]
    UnsupportedMode { mode: String },
    #[error(
        "tolerance exceeded at flat index {index}: actual {actual} vs expected {expected} \
         (|diff| {diff} > allowed {allowed})"
    )]
    Tolerance {
        index: usize,
        actual: f64,
        expected: f64,
        diff: f64,
        allowed: f64,
    },
}

impl D2sError {
    pub fn shape(dim: Dim, detail: impl Into<String>) -> Self {
        D2sError::Shape {
            dim,
            detail: detail.into(),
        }
    }

    pub fn unsupported_mode(mode: impl Into<String>) -> Self {
        D2sError::UnsupportedMode { mode: mode.into() }
    }

    /// Returns the offending dimension for shape failures.
    pub fn dim(&self) -> Option<Dim> {
        match self {
            D2sError::Shape { dim, .. } => Some(*dim),
            _ => None,
        }
    }
}

pub type Result<T, E = D2sError> = std::result::Result<T, E>;
