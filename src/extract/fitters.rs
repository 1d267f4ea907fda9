//! Single-distribution fitters: one per supported family.
//!
//! # Contract
//! - `fit(values)` computes the moment profile and delegates to
//!   `fit_with(profile, values)`; both fail on empty/non-finite input.
//! - Parameter estimation is method-of-moments. When the sample's moments
//!   fall outside a family's domain (negative values for Gamma, kurtosis
//!   ≤ 3 for Student-t, ...), the fitter does NOT error: it returns a
//!   clamped fallback model with [`INFEASIBLE_PENALTY`] as its score so the
//!   selector simply ranks it last.
//! - Goodness-of-fit is the two-sided Kolmogorov–Smirnov D-statistic scaled
//!   by √n (lower is better), comparable across families.
//! - Zero-variance samples short-circuit every fitter to a zero-width
//!   Uniform at the observed value with a perfect score.
//!
//! # Performance
//! KS evaluation switches to Rayon above [`PAR_MIN`] sorted values; below
//! that the scalar loop wins. The parallel path changes no results.

use rayon::prelude::*;

use crate::error::{ExtractError, ExtractResult};
use crate::extract::stats::MomentProfile;
use crate::model::ScalarModel;

/// Score assigned when a family's moment domain rejects the sample.
/// Large but finite, so ranking logic degrades gracefully.
pub const INFEASIBLE_PENALTY: f64 = 1e9;

/// Crossover for parallel KS evaluation with Rayon.
const PAR_MIN: usize = 32_768;

/// Default bin count for the empirical fallback fitter.
pub const DEFAULT_EMPIRICAL_BINS: usize = 50;

/// Outcome of fitting one family to one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub model: ScalarModel,
    /// Wire type tag of `model`.
    pub model_type: &'static str,
    /// Lower is better; finite even for infeasible fits.
    pub goodness_of_fit: f64,
}

/// The closed set of single-distribution fitters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitterKind {
    Normal,
    /// `extension` widens the fitted support by that fraction of the range
    /// on each side. Must be in [0, 0.5).
    Uniform { extension: f64 },
    Beta,
    Gamma,
    StudentT,
    InverseGamma,
    BetaPrime,
    PearsonIv,
    /// Non-parametric fallback with a fixed bin count (≥ 2).
    Empirical { bins: usize },
}

impl FitterKind {
    /// Uniform fitter with no boundary extension.
    pub fn uniform() -> Self {
        FitterKind::Uniform { extension: 0.0 }
    }

    /// Empirical fitter with the default bin count.
    pub fn empirical() -> Self {
        FitterKind::Empirical {
            bins: DEFAULT_EMPIRICAL_BINS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FitterKind::Normal => "normal",
            FitterKind::Uniform { .. } => "uniform",
            FitterKind::Beta => "beta",
            FitterKind::Gamma => "gamma",
            FitterKind::StudentT => "student_t",
            FitterKind::InverseGamma => "inverse_gamma",
            FitterKind::BetaPrime => "beta_prime",
            FitterKind::PearsonIv => "pearson_iv",
            FitterKind::Empirical { .. } => "empirical",
        }
    }

    /// Fits this family to a sample.
    pub fn fit(&self, values: &[f64]) -> ExtractResult<FitResult> {
        let profile = MomentProfile::from_values(values)?;
        self.fit_with(&profile, values)
    }

    /// Fits this family using a precomputed moment profile.
    pub fn fit_with(&self, profile: &MomentProfile, values: &[f64]) -> ExtractResult<FitResult> {
        if values.is_empty() {
            return Err(ExtractError::InvalidInput {
                context: "empty sample",
            });
        }
        self.validate_config()?;

        // Degenerate sample: every family collapses to a point mass.
        if profile.variance <= 0.0 {
            let model = ScalarModel::uniform(profile.min, profile.max)?;
            return Ok(FitResult {
                model_type: model.model_type(),
                model,
                goodness_of_fit: 0.0,
            });
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let (model, feasible) = self.estimate(profile, &sorted)?;
        let goodness_of_fit = if feasible {
            ks_scaled(&model, &sorted)
        } else {
            INFEASIBLE_PENALTY
        };

        Ok(FitResult {
            model_type: model.model_type(),
            model,
            goodness_of_fit,
        })
    }

    fn validate_config(&self) -> ExtractResult<()> {
        match self {
            FitterKind::Uniform { extension } => {
                if !(0.0..0.5).contains(extension) {
                    return Err(ExtractError::InvalidConfig {
                        context: "uniform boundary extension must be in [0, 0.5)",
                    });
                }
            }
            FitterKind::Empirical { bins } => {
                if *bins < 2 {
                    return Err(ExtractError::InvalidConfig {
                        context: "empirical fitter needs at least 2 bins",
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Estimates parameters. Returns the model plus whether the sample is
    /// inside the family's moment domain.
    fn estimate(&self, p: &MomentProfile, sorted: &[f64]) -> ExtractResult<(ScalarModel, bool)> {
        let std_dev = p.std_dev();
        match *self {
            FitterKind::Normal => {
                // Bounded-looking data gets empirical truncation bounds; a
                // full-width normal sample spans well past 6σ and stays
                // unbounded.
                let model = if p.appears_bounded() {
                    ScalarModel::truncated_normal(p.mean, std_dev, p.min, p.max)?
                } else {
                    ScalarModel::normal(p.mean, std_dev)?
                };
                Ok((model, true))
            }
            FitterKind::Uniform { extension } => {
                let eps = extension * p.range();
                Ok((ScalarModel::uniform(p.min - eps, p.max + eps)?, true))
            }
            FitterKind::Beta => {
                let range = p.range();
                let m = (p.mean - p.min) / range;
                let v = p.variance / (range * range);
                if m <= 0.0 || m >= 1.0 || v <= 0.0 || v >= m * (1.0 - m) {
                    return Ok((ScalarModel::beta(1.0, 1.0, p.min, p.max)?, false));
                }
                let common = m * (1.0 - m) / v - 1.0;
                let alpha = m * common;
                let beta = (1.0 - m) * common;
                Ok((ScalarModel::beta(alpha, beta, p.min, p.max)?, true))
            }
            FitterKind::Gamma => {
                if p.min < 0.0 || p.mean <= 0.0 {
                    let model = ScalarModel::gamma(1.0, std_dev.max(1e-9), p.min)?;
                    return Ok((model, false));
                }
                let shape = p.mean * p.mean / p.variance;
                let scale = p.variance / p.mean;
                Ok((ScalarModel::gamma(shape, scale, 0.0)?, true))
            }
            FitterKind::StudentT => {
                let excess = p.kurtosis - 3.0;
                if excess <= 0.0 {
                    let model = ScalarModel::student_t(30.0, p.mean, std_dev)?;
                    return Ok((model, false));
                }
                // kurtosis = 3 + 6/(ν−4), inverted; always lands above the
                // ν > 2 variance-existence floor.
                let nu = (4.0 + 6.0 / excess).max(2.01);
                let sigma = (p.variance * (nu - 2.0) / nu).sqrt();
                Ok((ScalarModel::student_t(nu, p.mean, sigma)?, true))
            }
            FitterKind::InverseGamma => {
                if p.min <= 0.0 || p.mean <= 0.0 {
                    let model = ScalarModel::inverse_gamma(3.0, p.mean.abs().max(0.1) * 2.0)?;
                    return Ok((model, false));
                }
                let shape = p.mean * p.mean / p.variance + 2.0;
                let scale = p.mean * (shape - 1.0);
                Ok((ScalarModel::inverse_gamma(shape, scale)?, true))
            }
            FitterKind::BetaPrime => {
                if p.min <= 0.0 || p.mean <= 0.0 {
                    return Ok((ScalarModel::beta_prime(2.0, 3.0)?, false));
                }
                let beta = 2.0 + p.mean * (1.0 + p.mean) / p.variance;
                let alpha = p.mean * (beta - 1.0);
                Ok((ScalarModel::beta_prime(alpha, beta)?, true))
            }
            FitterKind::PearsonIv => {
                let beta1 = p.skewness * p.skewness;
                let beta2 = p.kurtosis;
                let denom = 2.0 * beta2 - 3.0 * beta1 - 6.0;
                if denom <= 0.0 {
                    let model = ScalarModel::pearson_iv(2.0, 0.0, std_dev.max(1e-9), p.mean)?;
                    return Ok((model, false));
                }
                let r = 6.0 * (beta2 - beta1 - 1.0) / denom;
                let m = (r + 2.0) / 2.0;
                let disc = 16.0 * (r - 1.0) - beta1 * (r - 2.0) * (r - 2.0);
                if !(m > 0.5) || disc <= 0.0 {
                    let model = ScalarModel::pearson_iv(2.0, 0.0, std_dev.max(1e-9), p.mean)?;
                    return Ok((model, false));
                }
                let nu = -r * (r - 2.0) * p.skewness / disc.sqrt();
                let a = std_dev * disc.sqrt() / 4.0;
                let lambda = p.mean - (r - 2.0) * p.skewness * std_dev / 4.0;
                Ok((ScalarModel::pearson_iv(m, nu, a, lambda)?, true))
            }
            FitterKind::Empirical { bins } => {
                let model = empirical_from_sorted(sorted, p.min, p.max, bins)?;
                Ok((model, true))
            }
        }
    }
}

/// Builds the binned-CDF fallback model from a sorted sample.
fn empirical_from_sorted(
    sorted: &[f64],
    min: f64,
    max: f64,
    bins: usize,
) -> ExtractResult<ScalarModel> {
    let n = sorted.len();
    let width = (max - min) / bins as f64;

    let mut edges = Vec::with_capacity(bins + 1);
    for i in 0..=bins {
        edges.push(min + i as f64 * width);
    }
    // Counter float drift at the top edge.
    edges[bins] = max;

    let mut counts = vec![0u64; bins];
    for &v in sorted {
        let bin = (((v - min) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }

    let mut cdf = Vec::with_capacity(bins + 1);
    cdf.push(0.0);
    let mut running = 0u64;
    for &c in &counts {
        running += c;
        cdf.push(running as f64 / n as f64);
    }

    ScalarModel::empirical(edges, cdf)
}

/// Two-sided KS D-statistic between the model CDF and the empirical CDF of
/// a **sorted** sample, in [0, 1].
pub fn ks_statistic(model: &ScalarModel, sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let nf = n as f64;

    let eval = |(i, x): (usize, &f64)| -> f64 {
        let cdf = model.cdf(*x);
        let after = ((i + 1) as f64 / nf - cdf).abs();
        let before = (i as f64 / nf - cdf).abs();
        after.max(before)
    };

    if n >= PAR_MIN {
        sorted
            .par_iter()
            .enumerate()
            .with_min_len(4096)
            .map(eval)
            .reduce(|| 0.0, f64::max)
    } else {
        sorted.iter().enumerate().map(eval).fold(0.0, f64::max)
    }
}

/// KS D-statistic scaled by √n — the goodness-of-fit used for ranking.
pub fn ks_scaled(model: &ScalarModel, sorted: &[f64]) -> f64 {
    ks_statistic(model, sorted) * (sorted.len() as f64).sqrt()
}
