//! `ScalarModel`: the closed set of distribution families the extractor can
//! produce, as one tagged enum.
//!
//! # Semantics
//! - Every variant evaluates a density (`pdf`), a CDF (`cdf`, always in
//!   [0, 1] and non-decreasing), an inverse CDF (`quantile`), and analytic
//!   moments. Moments that do not exist for the variant's parameters (e.g.
//!   Student-t variance at ν ≤ 2) evaluate to `f64::INFINITY`.
//! - `Composite` holds a flat list of `(weight, sub-model)` pairs. Weights
//!   are non-negative and sum to 1 within 1e-3; components are never
//!   themselves composite (the checked constructor flattens).
//! - Values are immutable; nothing here caches or mutates.
//!
//! # Wire format
//! The serde representation is the JSON document consumed by the
//! persistence layer: `{"type": "<family>", ...}` with composites carrying
//! `"weights"` and `"sub_models"`. Field names are part of the wire
//! contract — do not rename.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, ExtractResult};
use crate::math;

/// Tolerance for composite weights summing to 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// A one-dimensional generative distribution model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalarModel {
    /// Gaussian, optionally truncated to `[lower_bound, upper_bound]`.
    Normal {
        mean: f64,
        std_dev: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lower_bound: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        upper_bound: Option<f64>,
    },
    /// Uniform on `[lower, upper]`. `lower == upper` encodes a point mass.
    Uniform { lower: f64, upper: f64 },
    /// Beta(α, β) rescaled onto `[lower, upper]`.
    Beta {
        alpha: f64,
        beta: f64,
        lower: f64,
        upper: f64,
    },
    /// Gamma(shape k, scale θ) shifted by `location`.
    Gamma {
        shape: f64,
        scale: f64,
        location: f64,
    },
    /// Student-t with `nu` degrees of freedom, location `mu`, scale `sigma`.
    StudentT { nu: f64, mu: f64, sigma: f64 },
    /// Inverse-Gamma(shape α, scale β) on (0, ∞).
    InverseGamma { shape: f64, scale: f64 },
    /// Beta-prime(α, β) on (0, ∞).
    BetaPrime { alpha: f64, beta: f64 },
    /// Pearson type IV with shape `m`, skew parameter `nu`, scale `a`,
    /// location `lambda`.
    PearsonIv { m: f64, nu: f64, a: f64, lambda: f64 },
    /// Non-parametric fallback: a binned CDF table. `cdf` has one entry per
    /// bin edge, starts at 0 and ends at 1.
    Empirical { bin_edges: Vec<f64>, cdf: Vec<f64> },
    /// Weighted mixture of non-composite models.
    Composite {
        weights: Vec<f64>,
        sub_models: Vec<ScalarModel>,
    },
}

/* =============================================================================
 * Checked constructors
 * ============================================================================= */

impl ScalarModel {
    pub fn normal(mean: f64, std_dev: f64) -> ExtractResult<Self> {
        if !(std_dev > 0.0) || !mean.is_finite() {
            return Err(ExtractError::InvalidModel {
                context: "normal requires finite mean and std_dev > 0",
            });
        }
        Ok(ScalarModel::Normal {
            mean,
            std_dev,
            lower_bound: None,
            upper_bound: None,
        })
    }

    pub fn truncated_normal(mean: f64, std_dev: f64, lower: f64, upper: f64) -> ExtractResult<Self> {
        if !(std_dev > 0.0) {
            return Err(ExtractError::InvalidModel {
                context: "normal requires std_dev > 0",
            });
        }
        if !(lower < upper) {
            return Err(ExtractError::InvalidModel {
                context: "truncation requires lower < upper",
            });
        }
        Ok(ScalarModel::Normal {
            mean,
            std_dev,
            lower_bound: Some(lower),
            upper_bound: Some(upper),
        })
    }

    /// `lower == upper` is allowed and encodes a degenerate point mass.
    pub fn uniform(lower: f64, upper: f64) -> ExtractResult<Self> {
        if !(lower <= upper) || !lower.is_finite() || !upper.is_finite() {
            return Err(ExtractError::InvalidModel {
                context: "uniform requires finite lower <= upper",
            });
        }
        Ok(ScalarModel::Uniform { lower, upper })
    }

    pub fn beta(alpha: f64, beta: f64, lower: f64, upper: f64) -> ExtractResult<Self> {
        if !(alpha > 0.0 && beta > 0.0) {
            return Err(ExtractError::InvalidModel {
                context: "beta requires alpha > 0 and beta > 0",
            });
        }
        if !(lower < upper) {
            return Err(ExtractError::InvalidModel {
                context: "beta requires lower < upper",
            });
        }
        Ok(ScalarModel::Beta {
            alpha,
            beta,
            lower,
            upper,
        })
    }

    pub fn gamma(shape: f64, scale: f64, location: f64) -> ExtractResult<Self> {
        if !(shape > 0.0 && scale > 0.0) || !location.is_finite() {
            return Err(ExtractError::InvalidModel {
                context: "gamma requires shape > 0 and scale > 0",
            });
        }
        Ok(ScalarModel::Gamma {
            shape,
            scale,
            location,
        })
    }

    pub fn student_t(nu: f64, mu: f64, sigma: f64) -> ExtractResult<Self> {
        if !(nu > 0.0 && sigma > 0.0) {
            return Err(ExtractError::InvalidModel {
                context: "student_t requires nu > 0 and sigma > 0",
            });
        }
        Ok(ScalarModel::StudentT { nu, mu, sigma })
    }

    pub fn inverse_gamma(shape: f64, scale: f64) -> ExtractResult<Self> {
        if !(shape > 0.0 && scale > 0.0) {
            return Err(ExtractError::InvalidModel {
                context: "inverse_gamma requires shape > 0 and scale > 0",
            });
        }
        Ok(ScalarModel::InverseGamma { shape, scale })
    }

    pub fn beta_prime(alpha: f64, beta: f64) -> ExtractResult<Self> {
        if !(alpha > 0.0 && beta > 0.0) {
            return Err(ExtractError::InvalidModel {
                context: "beta_prime requires alpha > 0 and beta > 0",
            });
        }
        Ok(ScalarModel::BetaPrime { alpha, beta })
    }

    pub fn pearson_iv(m: f64, nu: f64, a: f64, lambda: f64) -> ExtractResult<Self> {
        if !(m > 0.5 && a > 0.0) || !nu.is_finite() || !lambda.is_finite() {
            return Err(ExtractError::InvalidModel {
                context: "pearson_iv requires m > 0.5 and a > 0",
            });
        }
        Ok(ScalarModel::PearsonIv { m, nu, a, lambda })
    }

    /// `bin_edges` must be strictly increasing with at least 3 entries
    /// (≥ 2 bins); `cdf` must align with the edges, start at 0, end at 1,
    /// and be non-decreasing.
    pub fn empirical(bin_edges: Vec<f64>, cdf: Vec<f64>) -> ExtractResult<Self> {
        if bin_edges.len() < 3 || cdf.len() != bin_edges.len() {
            return Err(ExtractError::InvalidModel {
                context: "empirical requires >= 2 bins and a CDF entry per edge",
            });
        }
        let edges_ok = bin_edges.windows(2).all(|w| w[0] < w[1]);
        let cdf_ok = cdf.windows(2).all(|w| w[0] <= w[1])
            && cdf[0].abs() < 1e-9
            && (cdf[cdf.len() - 1] - 1.0).abs() < 1e-9;
        if !edges_ok || !cdf_ok {
            return Err(ExtractError::InvalidModel {
                context: "empirical requires increasing edges and a monotone CDF from 0 to 1",
            });
        }
        Ok(ScalarModel::Empirical { bin_edges, cdf })
    }

    /// Builds a composite, enforcing the flatness invariant.
    ///
    /// Nested composites are flattened (weight products), a single-component
    /// composite unwraps to that component, and weights are renormalized to
    /// sum to exactly 1 (rejecting inputs off by more than
    /// [`WEIGHT_SUM_TOLERANCE`]).
    pub fn composite(weights: Vec<f64>, sub_models: Vec<ScalarModel>) -> ExtractResult<Self> {
        if sub_models.is_empty() || weights.len() != sub_models.len() {
            return Err(ExtractError::InvalidModel {
                context: "composite requires one weight per non-empty component list",
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ExtractError::InvalidModel {
                context: "composite weights must be finite and non-negative",
            });
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE || sum <= 0.0 {
            return Err(ExtractError::InvalidModel {
                context: "composite weights must sum to 1 within 1e-3",
            });
        }

        let mut flat_weights = Vec::with_capacity(weights.len());
        let mut flat_models = Vec::with_capacity(sub_models.len());
        for (w, model) in weights.into_iter().zip(sub_models) {
            match model {
                ScalarModel::Composite {
                    weights: inner_w,
                    sub_models: inner_m,
                } => {
                    for (iw, im) in inner_w.into_iter().zip(inner_m) {
                        flat_weights.push(w * iw);
                        flat_models.push(im);
                    }
                }
                other => {
                    flat_weights.push(w);
                    flat_models.push(other);
                }
            }
        }

        if flat_models.len() == 1 {
            return Ok(flat_models.pop().expect("one component"));
        }

        let total: f64 = flat_weights.iter().sum();
        for w in &mut flat_weights {
            *w /= total;
        }

        Ok(ScalarModel::Composite {
            weights: flat_weights,
            sub_models: flat_models,
        })
    }
}

/* =============================================================================
 * Introspection
 * ============================================================================= */

impl ScalarModel {
    /// The wire-format type tag for this variant.
    pub fn model_type(&self) -> &'static str {
        match self {
            ScalarModel::Normal { .. } => "normal",
            ScalarModel::Uniform { .. } => "uniform",
            ScalarModel::Beta { .. } => "beta",
            ScalarModel::Gamma { .. } => "gamma",
            ScalarModel::StudentT { .. } => "student_t",
            ScalarModel::InverseGamma { .. } => "inverse_gamma",
            ScalarModel::BetaPrime { .. } => "beta_prime",
            ScalarModel::PearsonIv { .. } => "pearson_iv",
            ScalarModel::Empirical { .. } => "empirical",
            ScalarModel::Composite { .. } => "composite",
        }
    }

    #[inline]
    pub fn is_composite(&self) -> bool {
        matches!(self, ScalarModel::Composite { .. })
    }

    /// Number of mixture components (1 for non-composites).
    pub fn component_count(&self) -> usize {
        match self {
            ScalarModel::Composite { sub_models, .. } => sub_models.len(),
            _ => 1,
        }
    }

    /// Effective support used for CDF-grid comparisons: exact bounds for
    /// bounded families, a ±4σ-style window otherwise.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            ScalarModel::Normal {
                mean,
                std_dev,
                lower_bound,
                upper_bound,
            } => match (lower_bound, upper_bound) {
                (Some(lo), Some(hi)) => (*lo, *hi),
                _ => (mean - 4.0 * std_dev, mean + 4.0 * std_dev),
            },
            ScalarModel::Uniform { lower, upper } => (*lower, *upper),
            ScalarModel::Beta { lower, upper, .. } => (*lower, *upper),
            ScalarModel::Gamma {
                shape,
                scale,
                location,
            } => {
                let mean = location + shape * scale;
                let sd = shape.sqrt() * scale;
                (*location, mean + 4.0 * sd)
            }
            ScalarModel::StudentT { mu, sigma, .. } => (mu - 4.0 * sigma, mu + 4.0 * sigma),
            ScalarModel::InverseGamma { shape, scale } => {
                let hi = if *shape > 2.0 {
                    let mean = scale / (shape - 1.0);
                    let sd = (scale * scale / ((shape - 1.0) * (shape - 1.0) * (shape - 2.0)))
                        .sqrt();
                    mean + 4.0 * sd
                } else {
                    scale * 10.0
                };
                (0.0, hi)
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                let hi = if *beta > 2.0 {
                    let mean = alpha / (beta - 1.0);
                    let var = alpha * (alpha + beta - 1.0)
                        / ((beta - 2.0) * (beta - 1.0) * (beta - 1.0));
                    mean + 4.0 * var.sqrt()
                } else {
                    alpha / beta.max(0.5) * 20.0 + 10.0
                };
                (0.0, hi)
            }
            ScalarModel::PearsonIv { a, lambda, .. } => (lambda - 20.0 * a, lambda + 20.0 * a),
            ScalarModel::Empirical { bin_edges, .. } => {
                (bin_edges[0], bin_edges[bin_edges.len() - 1])
            }
            ScalarModel::Composite { sub_models, .. } => {
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                for m in sub_models {
                    let (l, h) = m.bounds();
                    lo = lo.min(l);
                    hi = hi.max(h);
                }
                (lo, hi)
            }
        }
    }

    /// Characteristic location used for deterministic component ordering:
    /// the mean where it is cheap and stable, the mode for shaped Betas,
    /// the location parameter for t / Pearson IV.
    pub fn location(&self) -> f64 {
        match self {
            ScalarModel::Normal { mean, .. } => *mean,
            ScalarModel::Uniform { lower, upper } => 0.5 * (lower + upper),
            ScalarModel::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => {
                let unit = if *alpha > 1.0 && *beta > 1.0 {
                    (alpha - 1.0) / (alpha + beta - 2.0)
                } else {
                    alpha / (alpha + beta)
                };
                lower + unit * (upper - lower)
            }
            ScalarModel::Gamma {
                shape,
                scale,
                location,
            } => location + shape * scale,
            ScalarModel::StudentT { mu, .. } => *mu,
            ScalarModel::InverseGamma { shape, scale } => {
                if *shape > 1.0 {
                    scale / (shape - 1.0)
                } else {
                    scale / shape
                }
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if *beta > 1.0 {
                    alpha / (beta - 1.0)
                } else {
                    alpha / beta
                }
            }
            ScalarModel::PearsonIv { lambda, .. } => *lambda,
            ScalarModel::Empirical { bin_edges, .. } => {
                0.5 * (bin_edges[0] + bin_edges[bin_edges.len() - 1])
            }
            ScalarModel::Composite {
                weights,
                sub_models,
            } => {
                let total: f64 = weights.iter().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                weights
                    .iter()
                    .zip(sub_models)
                    .map(|(w, m)| w * m.location())
                    .sum::<f64>()
                    / total
            }
        }
    }
}

/* =============================================================================
 * Density / CDF / quantile
 * ============================================================================= */

impl ScalarModel {
    pub fn pdf(&self, x: f64) -> f64 {
        match self {
            ScalarModel::Normal {
                mean,
                std_dev,
                lower_bound,
                upper_bound,
            } => match (lower_bound, upper_bound) {
                (Some(lo), Some(hi)) => {
                    if x < *lo || x > *hi {
                        return 0.0;
                    }
                    let mass = math::normal_cdf(*hi, *mean, *std_dev)
                        - math::normal_cdf(*lo, *mean, *std_dev);
                    if mass < 1e-15 {
                        // Truncation window holds essentially no mass; treat as flat.
                        return 1.0 / (hi - lo);
                    }
                    math::normal_pdf(x, *mean, *std_dev) / mass
                }
                _ => math::normal_pdf(x, *mean, *std_dev),
            },
            ScalarModel::Uniform { lower, upper } => {
                if upper <= lower {
                    // Point mass: density is not representable.
                    return 0.0;
                }
                if x < *lower || x > *upper {
                    0.0
                } else {
                    1.0 / (upper - lower)
                }
            }
            ScalarModel::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => {
                if x <= *lower || x >= *upper {
                    return 0.0;
                }
                let range = upper - lower;
                let z = (x - lower) / range;
                let ln_b =
                    math::ln_gamma(*alpha) + math::ln_gamma(*beta) - math::ln_gamma(alpha + beta);
                ((alpha - 1.0) * z.ln() + (beta - 1.0) * (1.0 - z).ln() - ln_b).exp() / range
            }
            ScalarModel::Gamma {
                shape,
                scale,
                location,
            } => {
                if x <= *location {
                    return 0.0;
                }
                let y = (x - location) / scale;
                ((shape - 1.0) * y.ln() - y - math::ln_gamma(*shape)).exp() / scale
            }
            ScalarModel::StudentT { nu, mu, sigma } => {
                let t = (x - mu) / sigma;
                let ln_c = math::ln_gamma((nu + 1.0) / 2.0)
                    - math::ln_gamma(nu / 2.0)
                    - 0.5 * (nu * std::f64::consts::PI).ln();
                (ln_c - (nu + 1.0) / 2.0 * (1.0 + t * t / nu).ln()).exp() / sigma
            }
            ScalarModel::InverseGamma { shape, scale } => {
                if x <= 0.0 {
                    return 0.0;
                }
                (shape * scale.ln() - math::ln_gamma(*shape) - (shape + 1.0) * x.ln() - scale / x)
                    .exp()
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if x <= 0.0 {
                    return 0.0;
                }
                let ln_b =
                    math::ln_gamma(*alpha) + math::ln_gamma(*beta) - math::ln_gamma(alpha + beta);
                ((alpha - 1.0) * x.ln() - (alpha + beta) * (1.0 + x).ln() - ln_b).exp()
            }
            ScalarModel::PearsonIv { m, nu, a, lambda } => {
                let norm = pearson_iv_norm(*m, *nu, *a);
                let z = (x - lambda) / a;
                norm * (-(*m) * (1.0 + z * z).ln() - nu * z.atan()).exp()
            }
            ScalarModel::Empirical { bin_edges, cdf } => {
                let n = bin_edges.len();
                if x < bin_edges[0] || x > bin_edges[n - 1] {
                    return 0.0;
                }
                let i = match bin_edges
                    .binary_search_by(|e| e.partial_cmp(&x).expect("finite edge"))
                {
                    Ok(i) => i.min(n - 2),
                    Err(i) => i.saturating_sub(1).min(n - 2),
                };
                let width = bin_edges[i + 1] - bin_edges[i];
                (cdf[i + 1] - cdf[i]) / width
            }
            ScalarModel::Composite {
                weights,
                sub_models,
            } => weights
                .iter()
                .zip(sub_models)
                .map(|(w, m)| w * m.pdf(x))
                .sum(),
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            ScalarModel::Normal {
                mean,
                std_dev,
                lower_bound,
                upper_bound,
            } => match (lower_bound, upper_bound) {
                (Some(lo), Some(hi)) => {
                    if x <= *lo {
                        return 0.0;
                    }
                    if x >= *hi {
                        return 1.0;
                    }
                    let cdf_lo = math::normal_cdf(*lo, *mean, *std_dev);
                    let cdf_hi = math::normal_cdf(*hi, *mean, *std_dev);
                    let mass = cdf_hi - cdf_lo;
                    if mass < 1e-15 {
                        // Truncation window holds essentially no mass.
                        return (x - lo) / (hi - lo);
                    }
                    ((math::normal_cdf(x, *mean, *std_dev) - cdf_lo) / mass).clamp(0.0, 1.0)
                }
                _ => math::normal_cdf(x, *mean, *std_dev),
            },
            ScalarModel::Uniform { lower, upper } => {
                if x < *lower {
                    0.0
                } else if x >= *upper {
                    1.0
                } else {
                    (x - lower) / (upper - lower)
                }
            }
            ScalarModel::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => {
                if x <= *lower {
                    0.0
                } else if x >= *upper {
                    1.0
                } else {
                    math::inc_beta((x - lower) / (upper - lower), *alpha, *beta)
                }
            }
            ScalarModel::Gamma {
                shape,
                scale,
                location,
            } => {
                if x <= *location {
                    0.0
                } else {
                    math::inc_gamma_lower(*shape, (x - location) / scale)
                }
            }
            ScalarModel::StudentT { nu, mu, sigma } => {
                let t = (x - mu) / sigma;
                let w = nu / (nu + t * t);
                let tail = 0.5 * math::inc_beta(w, nu / 2.0, 0.5);
                if t >= 0.0 {
                    1.0 - tail
                } else {
                    tail
                }
            }
            ScalarModel::InverseGamma { shape, scale } => {
                if x <= 0.0 {
                    0.0
                } else {
                    1.0 - math::inc_gamma_lower(*shape, scale / x)
                }
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if x <= 0.0 {
                    0.0
                } else {
                    math::inc_beta(x / (1.0 + x), *alpha, *beta)
                }
            }
            ScalarModel::PearsonIv { m, nu, a, lambda } => {
                let z = (x - lambda) / a;
                pearson_iv_cdf_angle(*m, *nu, z.atan())
            }
            ScalarModel::Empirical { bin_edges, cdf } => {
                let n = bin_edges.len();
                if x <= bin_edges[0] {
                    return 0.0;
                }
                if x >= bin_edges[n - 1] {
                    return 1.0;
                }
                let i = match bin_edges
                    .binary_search_by(|e| e.partial_cmp(&x).expect("finite edge"))
                {
                    Ok(i) => return cdf[i],
                    Err(i) => i - 1,
                };
                let frac = (x - bin_edges[i]) / (bin_edges[i + 1] - bin_edges[i]);
                cdf[i] + frac * (cdf[i + 1] - cdf[i])
            }
            ScalarModel::Composite {
                weights,
                sub_models,
            } => weights
                .iter()
                .zip(sub_models)
                .map(|(w, m)| w * m.cdf(x))
                .sum::<f64>()
                .clamp(0.0, 1.0),
        }
    }

    /// Inverse CDF. Closed-form where cheap, monotone bisection elsewhere.
    ///
    /// `p` outside (0, 1) clamps to the support edge.
    pub fn quantile(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        match self {
            ScalarModel::Normal {
                mean,
                std_dev,
                lower_bound,
                upper_bound,
            } => match (lower_bound, upper_bound) {
                (Some(lo), Some(hi)) => {
                    let cdf_lo = math::normal_cdf(*lo, *mean, *std_dev);
                    let cdf_hi = math::normal_cdf(*hi, *mean, *std_dev);
                    let mass = cdf_hi - cdf_lo;
                    if mass < 1e-15 {
                        return lo + p * (hi - lo);
                    }
                    let q = mean + std_dev * math::normal_quantile(cdf_lo + p * mass);
                    q.clamp(*lo, *hi)
                }
                _ => mean + std_dev * math::normal_quantile(p),
            },
            ScalarModel::Uniform { lower, upper } => lower + p * (upper - lower),
            ScalarModel::Empirical { bin_edges, cdf } => {
                let n = cdf.len();
                if p <= 0.0 {
                    return bin_edges[0];
                }
                if p >= 1.0 {
                    return bin_edges[n - 1];
                }
                let i = cdf.partition_point(|&c| c < p).clamp(1, n - 1);
                let span = cdf[i] - cdf[i - 1];
                let frac = if span > 0.0 { (p - cdf[i - 1]) / span } else { 0.0 };
                bin_edges[i - 1] + frac * (bin_edges[i] - bin_edges[i - 1])
            }
            _ => self.quantile_by_bisection(p),
        }
    }

    fn quantile_by_bisection(&self, p: f64) -> f64 {
        let (mut lo, mut hi) = self.bounds();
        if p <= 0.0 {
            return lo;
        }
        if p >= 1.0 {
            return hi;
        }

        // Widen the bracket until it encloses p (heavy tails can escape the
        // nominal 4σ window).
        let mut span = (hi - lo).max(1e-12);
        for _ in 0..64 {
            if self.cdf(lo) <= p {
                break;
            }
            lo -= span;
            span *= 2.0;
        }
        span = (hi - lo).max(1e-12);
        for _ in 0..64 {
            if self.cdf(hi) >= p {
                break;
            }
            hi += span;
            span *= 2.0;
        }

        for _ in 0..100 {
            let mid = 0.5 * (lo + hi);
            if self.cdf(mid) < p {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

/* =============================================================================
 * Analytic moments
 * ============================================================================= */

impl ScalarModel {
    pub fn mean(&self) -> f64 {
        match self {
            ScalarModel::Normal {
                mean,
                std_dev,
                lower_bound,
                upper_bound,
            } => match (lower_bound, upper_bound) {
                (Some(lo), Some(hi)) => truncated_normal_mean_var(*mean, *std_dev, *lo, *hi).0,
                _ => *mean,
            },
            ScalarModel::Uniform { lower, upper } => 0.5 * (lower + upper),
            ScalarModel::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => lower + alpha / (alpha + beta) * (upper - lower),
            ScalarModel::Gamma {
                shape,
                scale,
                location,
            } => location + shape * scale,
            ScalarModel::StudentT { nu, mu, .. } => {
                if *nu > 1.0 {
                    *mu
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::InverseGamma { shape, scale } => {
                if *shape > 1.0 {
                    scale / (shape - 1.0)
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if *beta > 1.0 {
                    alpha / (beta - 1.0)
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::PearsonIv { m, nu, a, lambda } => {
                let r = 2.0 * (m - 1.0);
                if r > 1.0 {
                    lambda - a * nu / r
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::Empirical { .. } => self.binned_central_moments().0,
            ScalarModel::Composite { .. } => self.mixture_moments().0,
        }
    }

    pub fn variance(&self) -> f64 {
        match self {
            ScalarModel::Normal {
                mean,
                std_dev,
                lower_bound,
                upper_bound,
            } => match (lower_bound, upper_bound) {
                (Some(lo), Some(hi)) => truncated_normal_mean_var(*mean, *std_dev, *lo, *hi).1,
                _ => std_dev * std_dev,
            },
            ScalarModel::Uniform { lower, upper } => {
                let w = upper - lower;
                w * w / 12.0
            }
            ScalarModel::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => {
                let s = alpha + beta;
                let unit = alpha * beta / (s * s * (s + 1.0));
                let range = upper - lower;
                unit * range * range
            }
            ScalarModel::Gamma { shape, scale, .. } => shape * scale * scale,
            ScalarModel::StudentT { nu, sigma, .. } => {
                if *nu > 2.0 {
                    sigma * sigma * nu / (nu - 2.0)
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::InverseGamma { shape, scale } => {
                if *shape > 2.0 {
                    scale * scale / ((shape - 1.0) * (shape - 1.0) * (shape - 2.0))
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if *beta > 2.0 {
                    alpha * (alpha + beta - 1.0) / ((beta - 2.0) * (beta - 1.0) * (beta - 1.0))
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::PearsonIv { m, nu, a, .. } => {
                let r = 2.0 * (m - 1.0);
                if r > 2.0 {
                    a * a * (r * r + nu * nu) / (r * r * (r - 1.0))
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::Empirical { .. } => self.binned_central_moments().1,
            ScalarModel::Composite { .. } => self.mixture_moments().1,
        }
    }

    #[inline]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn skewness(&self) -> f64 {
        match self {
            // Truncated-normal third moment is near zero for the symmetric
            // truncations this library produces; approximate as symmetric.
            ScalarModel::Normal { .. } => 0.0,
            ScalarModel::Uniform { .. } => 0.0,
            ScalarModel::Beta { alpha, beta, .. } => {
                let s = alpha + beta;
                2.0 * (beta - alpha) * (s + 1.0).sqrt() / ((s + 2.0) * (alpha * beta).sqrt())
            }
            ScalarModel::Gamma { shape, .. } => 2.0 / shape.sqrt(),
            ScalarModel::StudentT { nu, .. } => {
                if *nu > 3.0 {
                    0.0
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::InverseGamma { shape, .. } => {
                if *shape > 3.0 {
                    4.0 * (shape - 2.0).sqrt() / (shape - 3.0)
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if *beta > 3.0 {
                    2.0 * (2.0 * alpha + beta - 1.0) / (beta - 3.0)
                        * ((beta - 2.0) / (alpha * (alpha + beta - 1.0))).sqrt()
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::PearsonIv { m, nu, .. } => {
                let r = 2.0 * (m - 1.0);
                if r > 2.0 {
                    -4.0 * nu / (r - 2.0) * ((r - 1.0) / (r * r + nu * nu)).sqrt()
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::Empirical { .. } => self.binned_central_moments().2,
            ScalarModel::Composite { .. } => self.mixture_moments().2,
        }
    }

    /// Raw (not excess) kurtosis; 3 is the normal reference.
    pub fn kurtosis(&self) -> f64 {
        match self {
            ScalarModel::Normal { .. } => 3.0,
            ScalarModel::Uniform { .. } => 1.8,
            ScalarModel::Beta { alpha, beta, .. } => {
                let s = alpha + beta;
                let num = 6.0
                    * ((alpha - beta) * (alpha - beta) * (s + 1.0) - alpha * beta * (s + 2.0));
                let den = alpha * beta * (s + 2.0) * (s + 3.0);
                3.0 + num / den
            }
            ScalarModel::Gamma { shape, .. } => 3.0 + 6.0 / shape,
            ScalarModel::StudentT { nu, .. } => {
                if *nu > 4.0 {
                    3.0 + 6.0 / (nu - 4.0)
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::InverseGamma { shape, .. } => {
                if *shape > 4.0 {
                    3.0 + 6.0 * (5.0 * shape - 11.0) / ((shape - 3.0) * (shape - 4.0))
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::BetaPrime { alpha, beta } => {
                if *beta > 4.0 {
                    let a = *alpha;
                    let b = *beta;
                    let num = 6.0 * (a * (a + b - 1.0) * (5.0 * b - 11.0)
                        + (b - 1.0) * (b - 1.0) * (b - 2.0));
                    let den = a * (a + b - 1.0) * (b - 3.0) * (b - 4.0);
                    3.0 + num / den
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::PearsonIv { m, nu, .. } => {
                let r = 2.0 * (m - 1.0);
                if r > 3.0 {
                    let rn = r * r + nu * nu;
                    3.0 * (r - 1.0) * ((r + 6.0) * rn - 8.0 * r * r)
                        / ((r - 2.0) * (r - 3.0) * rn)
                } else {
                    f64::INFINITY
                }
            }
            ScalarModel::Empirical { .. } => self.binned_central_moments().3,
            ScalarModel::Composite { .. } => self.mixture_moments().3,
        }
    }

    /// (mean, variance, skewness, kurtosis) for composites via the standard
    /// mixture identities on central moments.
    fn mixture_moments(&self) -> (f64, f64, f64, f64) {
        let (weights, sub_models) = match self {
            ScalarModel::Composite {
                weights,
                sub_models,
            } => (weights, sub_models),
            _ => unreachable!("mixture_moments on non-composite"),
        };

        let mean: f64 = weights
            .iter()
            .zip(sub_models)
            .map(|(w, m)| w * m.mean())
            .sum();

        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for (w, model) in weights.iter().zip(sub_models) {
            let mu = model.mean();
            let var = model.variance();
            let sd = var.sqrt();
            let skew = model.skewness();
            let kurt = model.kurtosis();
            if !mu.is_finite() || !var.is_finite() || !skew.is_finite() || !kurt.is_finite() {
                return (mean, f64::INFINITY, f64::INFINITY, f64::INFINITY);
            }
            let c3 = skew * sd * var; // third central moment
            let c4 = kurt * var * var; // fourth central moment
            let d = mu - mean;
            m2 += w * (var + d * d);
            m3 += w * (c3 + 3.0 * var * d + d * d * d);
            m4 += w * (c4 + 4.0 * c3 * d + 6.0 * var * d * d + d * d * d * d);
        }

        if m2 <= 0.0 {
            return (mean, 0.0, 0.0, 3.0);
        }
        let sd = m2.sqrt();
        (mean, m2, m3 / (sd * m2), m4 / (m2 * m2))
    }

    /// Moments of the binned empirical table, mass concentrated at bin centers.
    fn binned_central_moments(&self) -> (f64, f64, f64, f64) {
        let (bin_edges, cdf) = match self {
            ScalarModel::Empirical { bin_edges, cdf } => (bin_edges, cdf),
            _ => unreachable!("binned_central_moments on non-empirical"),
        };

        let mut mean = 0.0;
        for i in 0..bin_edges.len() - 1 {
            let p = cdf[i + 1] - cdf[i];
            mean += p * 0.5 * (bin_edges[i] + bin_edges[i + 1]);
        }

        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for i in 0..bin_edges.len() - 1 {
            let p = cdf[i + 1] - cdf[i];
            let d = 0.5 * (bin_edges[i] + bin_edges[i + 1]) - mean;
            m2 += p * d * d;
            m3 += p * d * d * d;
            m4 += p * d * d * d * d;
        }

        if m2 <= 0.0 {
            return (mean, 0.0, 0.0, 3.0);
        }
        let sd = m2.sqrt();
        (mean, m2, m3 / (sd * m2), m4 / (m2 * m2))
    }
}

/* =============================================================================
 * Pearson IV normalization
 * ============================================================================= */

/// ∫ pdf dx with the substitution θ = atan((x−λ)/a) turns the Pearson IV
/// density into a·∫cos^{2m−2}θ·e^{−νθ} dθ over (−π/2, π/2), which Simpson
/// handles comfortably.
fn pearson_iv_angle_integral(m: f64, nu: f64, theta_hi: f64) -> f64 {
    const STEPS: usize = 256;
    let lo = -std::f64::consts::FRAC_PI_2;
    let hi = theta_hi.clamp(lo, std::f64::consts::FRAC_PI_2);
    if hi <= lo {
        return 0.0;
    }
    let h = (hi - lo) / STEPS as f64;
    let f = |theta: f64| -> f64 {
        let c = theta.cos();
        if c <= 0.0 {
            return 0.0;
        }
        ((2.0 * m - 2.0) * c.ln() - nu * theta).exp()
    };
    let mut sum = f(lo) + f(hi);
    for i in 1..STEPS {
        let theta = lo + i as f64 * h;
        sum += f(theta) * if i % 2 == 1 { 4.0 } else { 2.0 };
    }
    sum * h / 3.0
}

fn pearson_iv_norm(m: f64, nu: f64, a: f64) -> f64 {
    let total = pearson_iv_angle_integral(m, nu, std::f64::consts::FRAC_PI_2);
    if total <= 0.0 {
        return 0.0;
    }
    1.0 / (a * total)
}

fn pearson_iv_cdf_angle(m: f64, nu: f64, theta: f64) -> f64 {
    let total = pearson_iv_angle_integral(m, nu, std::f64::consts::FRAC_PI_2);
    if total <= 0.0 {
        return 0.0;
    }
    (pearson_iv_angle_integral(m, nu, theta) / total).clamp(0.0, 1.0)
}

/// Mean and variance of a truncated normal on [lo, hi].
fn truncated_normal_mean_var(mean: f64, std_dev: f64, lo: f64, hi: f64) -> (f64, f64) {
    let alpha = (lo - mean) / std_dev;
    let beta = (hi - mean) / std_dev;
    let z = math::normal_cdf(beta, 0.0, 1.0) - math::normal_cdf(alpha, 0.0, 1.0);
    if z < 1e-15 {
        let mid = 0.5 * (lo + hi);
        let w = hi - lo;
        return (mid, w * w / 12.0);
    }
    let phi_a = math::normal_pdf(alpha, 0.0, 1.0);
    let phi_b = math::normal_pdf(beta, 0.0, 1.0);
    let m = mean + std_dev * (phi_a - phi_b) / z;
    let v = std_dev
        * std_dev
        * (1.0 + (alpha * phi_a - beta * phi_b) / z - ((phi_a - phi_b) / z).powi(2));
    (m, v.max(0.0))
}
