pub mod composite;
pub mod equivalence;
pub mod fitters;
pub mod histogram;
pub mod modes;
pub mod pearson;
pub mod selector;
pub mod stats;

// Public surface
pub use composite::{
    CdfValidationResult, ClusteringStrategy, CompositeConfig, CompositeFit, CompositeModelFitter,
};
pub use equivalence::EquivalenceChecker;
pub use fitters::{FitResult, FitterKind, INFEASIBLE_PENALTY};
pub use histogram::{GapAnalysis, Histogram, Peak};
pub use modes::{detect, detect_adaptive, dip_statistic, ModeDetection};
pub use pearson::{classify, classify_detailed, Classification, PearsonType};
pub use selector::BestFitSelector;
pub use stats::{MomentAccumulator, MomentProfile};
