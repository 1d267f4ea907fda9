//! # shapefit
//!
//! Infers a compact generative model — one parametric distribution, or a
//! weighted mixture of them — that best explains a one-dimensional sample,
//! such as one coordinate of an embedding-vector dataset.
//!
//! The pipeline: moment profile + histogram → mode detection → either a
//! [`extract::BestFitSelector`] run over single-distribution fitters, or
//! (for multimodal samples) a [`extract::CompositeModelFitter`] that fits
//! each detected mode and validates the mixture CDF against the data.
//! Fitted models serialize to a tagged JSON document and can be compared
//! for statistical equivalence, which is what makes
//! generate → extract → regenerate round trips verifiable.
//!
//! Everything is a pure function of its inputs: no hidden caches, no I/O,
//! no global state. Instances are cheap values; callers that fan out over
//! dimensions construct one per task.

pub mod error;
pub mod extract;
pub mod math;
pub mod model;
pub mod quality;

pub use error::{ExtractError, ExtractResult};
pub use extract::{
    BestFitSelector, CompositeModelFitter, EquivalenceChecker, FitResult, FitterKind,
    ModeDetection, MomentProfile,
};
pub use model::{to_canonical_form, ScalarModel};
pub use quality::QualityReport;

// Opt-in tracing (cheap unless env var set)
#[macro_export]
macro_rules! strace {
    ($($arg:tt)*) => {
        if std::env::var("SHAPEFIT_TRACE").is_ok() {
            eprintln!($($arg)*);
        }
    }
}
