// src/error.rs
use core::fmt;

/// Library-wide error for shapefit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractError {
    /// Sample is unusable for the requested operation: empty, too small, or
    /// contains NaN/±inf. `context` pinpoints where it came from
    /// (e.g., "sample value", "mode detection sample").
    InvalidInput { context: &'static str },

    /// A configuration value is out of its documented range
    /// (e.g., a negative boundary-extension fraction, fewer than 2 bins).
    InvalidConfig { context: &'static str },

    /// Model parameters violate a variant invariant (σ ≤ 0, lower ≥ upper,
    /// composite weights not summing to 1, ...).
    InvalidModel { context: &'static str },

    /// Composite fitting declined: the sample shows no multimodal structure.
    /// Expected, recoverable. Callers fall back to single-distribution fitting.
    NotMultimodal { dip: f64 },

    /// A detected mode has too few points to fit a component distribution.
    /// Expected, recoverable.
    SparseMode {
        mode: usize,
        count: usize,
        required: usize,
    },

    /// The fitted composite's CDF strays too far from the empirical CDF.
    /// Expected, recoverable. Carries the measured deviation for diagnostics.
    CdfValidationFailed { max_deviation: f64, threshold: f64 },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::InvalidInput { context } => write!(
                f,
                "shapefit: invalid input ({}). \
hint: samples must be finite, non-empty, and large enough for the operation",
                context
            ),
            ExtractError::InvalidConfig { context } => {
                write!(f, "shapefit: invalid configuration ({})", context)
            }
            ExtractError::InvalidModel { context } => {
                write!(f, "shapefit: invalid model parameters ({})", context)
            }
            ExtractError::NotMultimodal { dip } => write!(
                f,
                "shapefit: sample is not multimodal (dip={:.4}); \
a composite model is not appropriate. hint: fall back to a single-distribution fit",
                dip
            ),
            ExtractError::SparseMode {
                mode,
                count,
                required,
            } => write!(
                f,
                "shapefit: mode {} has {} points, need at least {}. \
hint: lower max_components or supply a larger sample",
                mode, count, required
            ),
            ExtractError::CdfValidationFailed {
                max_deviation,
                threshold,
            } => write!(
                f,
                "shapefit: composite CDF deviation {:.4} exceeds threshold {:.4}. \
hint: relax max_cdf_deviation or fall back to a single-distribution fit",
                max_deviation, threshold
            ),
        }
    }
}

impl std::error::Error for ExtractError {}

pub type ExtractResult<T> = Result<T, ExtractError>;
