//! Composite (mixture) model fitting for multimodal samples.
//!
//! # Pipeline
//! 1. **Detect** modes ([`crate::extract::modes::detect`]). Fewer than two
//!    modes is the primary rejection path: [`ExtractError::NotMultimodal`].
//! 2. **Cluster** the sample into per-mode sub-samples — nearest-peak
//!    assignment, or a light Gaussian EM refinement seeded from the peaks.
//! 3. **Fit** each sub-sample with the component selector.
//! 4. **Weight** components by sub-sample fraction, renormalized to sum to
//!    exactly 1.
//! 5. **Validate** the mixture CDF against the empirical CDF on an evenly
//!    spaced grid; rejection carries the measured deviation
//!    ([`ExtractError::CdfValidationFailed`]).
//!
//! The goodness-of-fit of an accepted composite is its BIC normalized by
//! sample size, so mixtures pay for their extra parameters when ranked
//! against single distributions.
//!
//! `fit` returns the validation result alongside the model — there is no
//! hidden "last result" state, and one fitter value can be shared freely.

use crate::error::{ExtractError, ExtractResult};
use crate::extract::fitters::FitResult;
use crate::extract::modes::{self, ModeDetection};
use crate::extract::selector::BestFitSelector;
use crate::model::ScalarModel;
use crate::strace;

/// How sample values are partitioned among detected modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringStrategy {
    /// Assign each value to the closest peak location.
    NearestPeak,
    /// Refine peak-seeded Gaussian components by EM, then hard-assign by
    /// maximum responsibility. Helps when modes overlap or have unequal
    /// spreads.
    ExpectationMaximization,
}

/// Configuration for [`CompositeModelFitter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeConfig {
    /// Maximum mixture components to consider, clamped to 2..=10.
    pub max_components: usize,
    /// Acceptance threshold for the max CDF deviation.
    pub max_cdf_deviation: f64,
    pub clustering: ClusteringStrategy,
    /// Minimum sub-sample size per mode.
    pub min_points_per_mode: usize,
    /// Number of grid intervals for CDF validation (≥ 10).
    pub validation_points: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            max_components: 3,
            max_cdf_deviation: 0.05,
            clustering: ClusteringStrategy::NearestPeak,
            min_points_per_mode: 50,
            validation_points: 100,
        }
    }
}

/// Outcome of comparing a fitted composite's CDF to the empirical CDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdfValidationResult {
    pub max_deviation: f64,
    pub avg_deviation: f64,
    pub threshold: f64,
    pub sample_points: usize,
    pub is_valid: bool,
}

impl CdfValidationResult {
    pub fn format_summary(&self) -> String {
        format!(
            "CDF validation: max_dev={:.4}, avg_dev={:.4}, threshold={:.4}, points={}, {}",
            self.max_deviation,
            self.avg_deviation,
            self.threshold,
            self.sample_points,
            if self.is_valid { "PASSED" } else { "FAILED" }
        )
    }
}

/// An accepted composite fit: the ranked result plus the validation that
/// accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFit {
    pub result: FitResult,
    pub validation: CdfValidationResult,
}

/// Fits mixtures of single distributions to multimodal samples.
#[derive(Debug, Clone)]
pub struct CompositeModelFitter {
    selector: BestFitSelector,
    config: CompositeConfig,
}

impl Default for CompositeModelFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeModelFitter {
    /// Bounded-data component selector, default configuration.
    pub fn new() -> Self {
        Self::with_config(BestFitSelector::bounded_data(), CompositeConfig::default())
    }

    pub fn with_selector(selector: BestFitSelector) -> Self {
        Self::with_config(selector, CompositeConfig::default())
    }

    pub fn with_config(selector: BestFitSelector, config: CompositeConfig) -> Self {
        Self { selector, config }
    }

    #[inline]
    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    /// - [`ExtractError::NotMultimodal`] — no multimodal structure; fall
    ///   back to single-distribution fitting.
    /// - [`ExtractError::SparseMode`] — a mode has too few points.
    /// - [`ExtractError::CdfValidationFailed`] — mixture CDF strays beyond
    ///   the configured threshold.
    pub fn fit(&self, values: &[f64]) -> ExtractResult<CompositeFit> {
        let max_components = self.config.max_components.clamp(2, 10);
        let detection = modes::detect(values, max_components)?;

        if !detection.is_multimodal {
            return Err(ExtractError::NotMultimodal {
                dip: detection.dip_statistic,
            });
        }
        strace!(
            "composite: {} modes at {:?}",
            detection.mode_count,
            detection.peak_locations
        );

        let segments = self.cluster(values, &detection);
        for (i, seg) in segments.iter().enumerate() {
            if seg.len() < self.config.min_points_per_mode {
                return Err(ExtractError::SparseMode {
                    mode: i,
                    count: seg.len(),
                    required: self.config.min_points_per_mode,
                });
            }
        }

        let mut components = Vec::with_capacity(segments.len());
        let mut weights = Vec::with_capacity(segments.len());
        let mut total_log_likelihood = 0.0;
        let mut param_count = 0usize;

        for seg in &segments {
            let fit = self.selector.select_best_result(seg)?;
            // Different families score with the same KS-based statistic, so
            // a common transform approximates each component's likelihood.
            total_log_likelihood += -(seg.len() as f64) * fit.goodness_of_fit;
            param_count += model_parameter_count(&fit.model);
            components.push(fit.model);
            weights.push(seg.len() as f64 / values.len() as f64);
        }
        // Mixture weights are k−1 free parameters.
        param_count += components.len() - 1;

        let total_weight: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total_weight;
        }

        let composite = ScalarModel::composite(weights, components)?;
        let validation = self.validate_cdf(values, &composite);
        if !validation.is_valid {
            return Err(ExtractError::CdfValidationFailed {
                max_deviation: validation.max_deviation,
                threshold: validation.threshold,
            });
        }

        let n = values.len() as f64;
        let bic = -2.0 * total_log_likelihood + param_count as f64 * n.ln();
        let goodness_of_fit = bic / n;

        Ok(CompositeFit {
            result: FitResult {
                model_type: "composite",
                model: composite,
                goodness_of_fit,
            },
            validation,
        })
    }

    fn cluster(&self, values: &[f64], detection: &ModeDetection) -> Vec<Vec<f64>> {
        match self.config.clustering {
            ClusteringStrategy::NearestPeak => {
                segment_by_nearest_peak(values, &detection.peak_locations)
            }
            ClusteringStrategy::ExpectationMaximization => {
                segment_by_em(values, &detection.peak_locations)
            }
        }
    }

    /// Samples the composite CDF against the empirical CDF at evenly spaced
    /// points across the observed range.
    fn validate_cdf(&self, values: &[f64], composite: &ScalarModel) -> CdfValidationResult {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let threshold = self.config.max_cdf_deviation;
        let points = self.config.validation_points.max(10);
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let range = max - min;

        if range <= 0.0 {
            return CdfValidationResult {
                max_deviation: 0.0,
                avg_deviation: 0.0,
                threshold,
                sample_points: 1,
                is_valid: true,
            };
        }

        let mut max_deviation = 0.0f64;
        let mut total_deviation = 0.0;
        for i in 0..=points {
            let x = min + range * i as f64 / points as f64;
            let empirical = sorted.partition_point(|&v| v <= x) as f64 / sorted.len() as f64;
            let model = composite.cdf(x);
            let deviation = (empirical - model).abs();
            max_deviation = max_deviation.max(deviation);
            total_deviation += deviation;
        }

        CdfValidationResult {
            max_deviation,
            avg_deviation: total_deviation / (points + 1) as f64,
            threshold,
            sample_points: points + 1,
            is_valid: max_deviation <= threshold,
        }
    }
}

fn segment_by_nearest_peak(values: &[f64], peaks: &[f64]) -> Vec<Vec<f64>> {
    let mut segments = vec![Vec::new(); peaks.len()];
    for &v in values {
        let mut nearest = 0;
        let mut min_dist = (v - peaks[0]).abs();
        for (i, &p) in peaks.iter().enumerate().skip(1) {
            let dist = (v - p).abs();
            if dist < min_dist {
                min_dist = dist;
                nearest = i;
            }
        }
        segments[nearest].push(v);
    }
    segments
}

/* =============================================================================
 * EM refinement
 * ============================================================================= */

const EM_MAX_ITERATIONS: usize = 50;
const EM_CONVERGENCE: f64 = 1e-6;
const EM_MIN_VARIANCE: f64 = 1e-10;
const EM_LOG_EPSILON: f64 = 1e-300;

/// Gaussian-mixture EM seeded from the detected peaks, then hard assignment
/// by maximum responsibility.
fn segment_by_em(values: &[f64], peaks: &[f64]) -> Vec<Vec<f64>> {
    let k = peaks.len();
    let n = values.len();

    let mut means: Vec<f64> = peaks.to_vec();
    let mut weights = vec![1.0 / k as f64; k];

    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let spread = ((hi - lo) / (2.0 * k as f64)).max(EM_MIN_VARIANCE.sqrt());
    let mut std_devs = vec![spread; k];

    let mut resp = vec![0.0f64; n * k];
    let mut last_ll = f64::NEG_INFINITY;

    for iteration in 0..EM_MAX_ITERATIONS {
        // E-step.
        let mut log_likelihood = 0.0;
        for (i, &x) in values.iter().enumerate() {
            let mut sum_density = 0.0;
            for j in 0..k {
                let d = weights[j] * crate::math::normal_pdf(x, means[j], std_devs[j]);
                resp[i * k + j] = d;
                sum_density += d;
            }
            let sum_density = sum_density.max(EM_LOG_EPSILON);
            for j in 0..k {
                resp[i * k + j] /= sum_density;
            }
            log_likelihood += sum_density.ln();
        }

        if iteration > 0 && (log_likelihood - last_ll).abs() < EM_CONVERGENCE {
            break;
        }
        last_ll = log_likelihood;

        // M-step.
        for j in 0..k {
            let nk: f64 = (0..n).map(|i| resp[i * k + j]).sum();
            if nk <= 0.0 {
                continue;
            }
            let mean = (0..n).map(|i| resp[i * k + j] * values[i]).sum::<f64>() / nk;
            let var = (0..n)
                .map(|i| {
                    let d = values[i] - mean;
                    resp[i * k + j] * d * d
                })
                .sum::<f64>()
                / nk;
            means[j] = mean;
            std_devs[j] = var.max(EM_MIN_VARIANCE).sqrt();
            weights[j] = nk / n as f64;
        }
    }

    let mut segments = vec![Vec::new(); k];
    for (i, &x) in values.iter().enumerate() {
        let mut best = 0;
        let mut best_r = resp[i * k];
        for j in 1..k {
            if resp[i * k + j] > best_r {
                best_r = resp[i * k + j];
                best = j;
            }
        }
        segments[best].push(x);
    }
    segments
}

/// Free-parameter counts per family, used by the BIC score.
fn model_parameter_count(model: &ScalarModel) -> usize {
    match model {
        ScalarModel::Normal { .. } => 2,
        ScalarModel::Uniform { .. } => 2,
        ScalarModel::Beta { .. } => 4,
        ScalarModel::Gamma { .. } => 3,
        ScalarModel::StudentT { .. } => 3,
        ScalarModel::InverseGamma { .. } => 2,
        ScalarModel::BetaPrime { .. } => 2,
        ScalarModel::PearsonIv { .. } => 4,
        ScalarModel::Empirical { bin_edges, .. } => bin_edges.len() - 1,
        ScalarModel::Composite { sub_models, .. } => {
            sub_models.iter().map(model_parameter_count).sum::<usize>() + sub_models.len() - 1
        }
    }
}
