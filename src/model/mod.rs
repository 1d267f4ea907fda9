pub mod canonical;
pub mod scalar;
pub mod wire;

pub use canonical::{compare_models, to_canonical_form};
pub use scalar::{ScalarModel, WEIGHT_SUM_TOLERANCE};
