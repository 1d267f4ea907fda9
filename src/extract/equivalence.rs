//! Statistical equivalence between distribution models.
//!
//! Some model pairs are statistically indistinguishable within measurement
//! precision — a high-ν Student-t and a Normal, a Beta(1,1) and a Uniform,
//! a mixture of heavily overlapping components and one wider unimodal
//! shape. Round-trip verification needs to treat those as matches, so the
//! checker works through a ladder, most specific first:
//!
//! 1. identical models;
//! 2. known family equivalences (Normal↔StudentT at ν ≥ 30,
//!    Beta(≈1,≈1)↔Uniform, Normal↔Beta by CDF proximity);
//! 3. composite↔simple CDF proximity (CLT convergence) and
//!    composite↔composite structure matching;
//! 4. moment equivalence (mean, variance, skewness, kurtosis) with an
//!    adaptive kurtosis tolerance — the most general fallback.
//!
//! Every check is evaluated order-independently, so
//! `are_equivalent(a, b) == are_equivalent(b, a)` holds by construction.

use crate::model::ScalarModel;

/// Minimum Student-t degrees of freedom to be considered Normal-equivalent.
pub const STUDENT_T_NORMAL_THRESHOLD_DF: f64 = 30.0;

/// Beta parameters within this distance of 1 count as Uniform-equivalent.
pub const BETA_UNIFORM_PARAM_TOLERANCE: f64 = 0.15;

/// Max CDF difference for Normal↔Beta equivalence. Peaked Betas (α=β≫1)
/// track a Normal closely except in the far tails, hence the slack.
pub const NORMAL_BETA_CDF_TOLERANCE: f64 = 0.08;

/// Max CDF difference for Composite↔Simple equivalence; looser than the
/// family checks since a mixture of narrow components can legitimately
/// resemble one wider distribution.
pub const COMPOSITE_SIMPLE_CDF_TOLERANCE: f64 = 0.08;

/// Relative tolerance for mean/variance in the moment fallback.
pub const DEFAULT_MOMENT_TOLERANCE: f64 = 0.20;

pub const MIN_KURTOSIS_TOLERANCE: f64 = 0.30;
pub const MAX_KURTOSIS_TOLERANCE: f64 = 0.60;
const EXTREME_KURTOSIS_THRESHOLD: f64 = 3.0;

const CDF_CHECK_POINTS: usize = 20;

/// Decides statistical equivalence between models.
#[derive(Debug, Clone, Copy)]
pub struct EquivalenceChecker {
    moment_tolerance: f64,
}

impl Default for EquivalenceChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl EquivalenceChecker {
    pub fn new() -> Self {
        Self {
            moment_tolerance: DEFAULT_MOMENT_TOLERANCE,
        }
    }

    /// A checker with a custom base moment tolerance (relative).
    pub fn with_moment_tolerance(moment_tolerance: f64) -> Self {
        Self { moment_tolerance }
    }

    /// Whether `a` and `b` describe the same distribution within tolerance.
    /// Symmetric in its arguments.
    pub fn are_equivalent(&self, a: &ScalarModel, b: &ScalarModel) -> bool {
        self.equivalence_reason(a, b).is_some()
    }

    /// The first rung of the ladder that accepts the pair, or `None`.
    pub fn equivalence_reason(&self, a: &ScalarModel, b: &ScalarModel) -> Option<&'static str> {
        let a = unwrap_simple(a);
        let b = unwrap_simple(b);

        if a == b {
            return Some("identical models");
        }

        if is_normal_student_t_equivalent(a, b) {
            return Some("Normal ↔ StudentT(high ν)");
        }
        if is_beta_uniform_equivalent(a, b) {
            return Some("Beta(≈1,≈1) ↔ Uniform");
        }
        if is_normal_beta_equivalent(a, b) {
            return Some("Normal ↔ Beta (CDF proximity)");
        }
        if let Some(reason) = composite_equivalence(a, b) {
            return Some(reason);
        }
        if self.moments_equivalent(a, b) {
            return Some("moment equivalence (μ, σ², γ, κ)");
        }
        None
    }

    /// Moment-based equivalence: mean and variance within the base
    /// tolerance, skewness within twice that, kurtosis within an adaptive
    /// tolerance (see module docs).
    pub fn moments_equivalent(&self, a: &ScalarModel, b: &ScalarModel) -> bool {
        let tolerance = self.moment_tolerance;
        let kurt_a = a.kurtosis();
        let kurt_b = b.kurtosis();
        let kurt_tolerance = adaptive_kurtosis_tolerance(a, b, kurt_a, kurt_b, tolerance);

        moment_close(a.mean(), b.mean(), tolerance)
            && moment_close(a.variance(), b.variance(), tolerance)
            && moment_close(a.skewness(), b.skewness(), tolerance * 2.0)
            && moment_close(kurt_a, kurt_b, kurt_tolerance)
    }
}

/// Kurtosis is the least stable moment: widen its tolerance for extreme
/// values, higher mode counts, structural mismatch, and tail-sign
/// disagreement, clamped to a sane band.
fn adaptive_kurtosis_tolerance(
    a: &ScalarModel,
    b: &ScalarModel,
    kurt_a: f64,
    kurt_b: f64,
    base: f64,
) -> f64 {
    let mut tolerance = base * 2.0;

    let max_abs = kurt_a.abs().max(kurt_b.abs());
    if max_abs.is_finite() && max_abs > EXTREME_KURTOSIS_THRESHOLD {
        let scale = 1.0 + (max_abs - EXTREME_KURTOSIS_THRESHOLD) * 0.1;
        tolerance *= scale.min(2.0);
    }

    let modes_a = a.component_count();
    let modes_b = b.component_count();
    let max_modes = modes_a.max(modes_b);
    if max_modes > 2 {
        tolerance *= 1.0 + (max_modes - 2) as f64 * 0.10;
    }
    if modes_a != modes_b {
        tolerance *= 1.2;
    }
    let excess_a = kurt_a - 3.0;
    let excess_b = kurt_b - 3.0;
    if excess_a * excess_b < 0.0 {
        // One platykurtic, one leptokurtic.
        tolerance *= 1.3;
    }

    tolerance.clamp(MIN_KURTOSIS_TOLERANCE, MAX_KURTOSIS_TOLERANCE)
}

fn moment_close(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    if scale < 0.1 {
        diff < tolerance
    } else {
        diff / scale < tolerance
    }
}

/// A single-component composite stands for its component.
fn unwrap_simple(model: &ScalarModel) -> &ScalarModel {
    match model {
        ScalarModel::Composite { sub_models, .. } if sub_models.len() == 1 => &sub_models[0],
        other => other,
    }
}

fn is_normal_student_t_equivalent(a: &ScalarModel, b: &ScalarModel) -> bool {
    let (normal, student) = match (a, b) {
        (n @ ScalarModel::Normal { .. }, t @ ScalarModel::StudentT { .. }) => (n, t),
        (t @ ScalarModel::StudentT { .. }, n @ ScalarModel::Normal { .. }) => (n, t),
        _ => return false,
    };
    let (mean, std_dev) = match normal {
        ScalarModel::Normal { mean, std_dev, .. } => (*mean, *std_dev),
        _ => unreachable!(),
    };
    let (nu, mu, sigma) = match student {
        ScalarModel::StudentT { nu, mu, sigma } => (*nu, *mu, *sigma),
        _ => unreachable!(),
    };

    nu >= STUDENT_T_NORMAL_THRESHOLD_DF
        && (mean - mu).abs() <= 0.1
        && (std_dev - sigma).abs() / std_dev.max(0.01) <= 0.1
}

fn is_beta_uniform_equivalent(a: &ScalarModel, b: &ScalarModel) -> bool {
    let (beta, uniform) = match (a, b) {
        (bm @ ScalarModel::Beta { .. }, u @ ScalarModel::Uniform { .. }) => (bm, u),
        (u @ ScalarModel::Uniform { .. }, bm @ ScalarModel::Beta { .. }) => (bm, u),
        _ => return false,
    };
    let (alpha, bb, b_lo, b_hi) = match beta {
        ScalarModel::Beta {
            alpha,
            beta,
            lower,
            upper,
        } => (*alpha, *beta, *lower, *upper),
        _ => unreachable!(),
    };
    let (u_lo, u_hi) = match uniform {
        ScalarModel::Uniform { lower, upper } => (*lower, *upper),
        _ => unreachable!(),
    };

    if (alpha - 1.0).abs() > BETA_UNIFORM_PARAM_TOLERANCE
        || (bb - 1.0).abs() > BETA_UNIFORM_PARAM_TOLERANCE
    {
        return false;
    }
    interval_overlap_ratio(b_lo, b_hi, u_lo, u_hi) > 0.8
}

fn interval_overlap_ratio(a_lo: f64, a_hi: f64, b_lo: f64, b_hi: f64) -> f64 {
    let overlap = (a_hi.min(b_hi) - a_lo.max(b_lo)).max(0.0);
    let smaller = (a_hi - a_lo).min(b_hi - b_lo);
    if smaller <= 0.0 {
        return 0.0;
    }
    overlap / smaller
}

/// A truncated Normal over an interval (or an unbounded Normal evaluated on
/// the Beta's domain) can track a Beta CDF point-for-point.
fn is_normal_beta_equivalent(a: &ScalarModel, b: &ScalarModel) -> bool {
    let (normal, beta) = match (a, b) {
        (n @ ScalarModel::Normal { .. }, bm @ ScalarModel::Beta { .. }) => (n, bm),
        (bm @ ScalarModel::Beta { .. }, n @ ScalarModel::Normal { .. }) => (n, bm),
        _ => return false,
    };
    let (b_lo, b_hi) = beta.bounds();

    let (lo, hi) = match normal {
        ScalarModel::Normal {
            lower_bound: Some(n_lo),
            upper_bound: Some(n_hi),
            ..
        } => {
            if interval_overlap_ratio(*n_lo, *n_hi, b_lo, b_hi) < 0.8 {
                return false;
            }
            (n_lo.max(b_lo), n_hi.min(b_hi))
        }
        // Unbounded: compare on the Beta's domain, which handles peaked
        // Betas that look Normal.
        _ => (b_lo, b_hi),
    };
    cdfs_close(normal, beta, lo, hi, NORMAL_BETA_CDF_TOLERANCE)
}

fn cdfs_close(a: &ScalarModel, b: &ScalarModel, lo: f64, hi: f64, tolerance: f64) -> bool {
    let range = hi - lo;
    if range <= 0.0 {
        return false;
    }
    let mut max_diff = 0.0f64;
    for i in 1..CDF_CHECK_POINTS {
        let x = lo + range * i as f64 / CDF_CHECK_POINTS as f64;
        max_diff = max_diff.max((a.cdf(x) - b.cdf(x)).abs());
        if max_diff > tolerance * 2.0 {
            return false;
        }
    }
    max_diff <= tolerance
}

fn composite_equivalence(a: &ScalarModel, b: &ScalarModel) -> Option<&'static str> {
    match (a.is_composite(), b.is_composite()) {
        (true, false) => composite_simple_cdf(a, b).then_some("Composite ↔ Simple (CLT)"),
        (false, true) => composite_simple_cdf(b, a).then_some("Composite ↔ Simple (CLT)"),
        (true, true) => composite_pair_equivalent(a, b).then_some("composite structure match"),
        (false, false) => None,
    }
}

fn composite_simple_cdf(composite: &ScalarModel, simple: &ScalarModel) -> bool {
    let (c_lo, c_hi) = composite.bounds();
    let (s_lo, s_hi) = simple.bounds();
    let lo = c_lo.max(s_lo);
    let hi = c_hi.min(s_hi);
    cdfs_close(composite, simple, lo, hi, COMPOSITE_SIMPLE_CDF_TOLERANCE)
}

fn composite_pair_equivalent(a: &ScalarModel, b: &ScalarModel) -> bool {
    let (count_a, models_a) = match a {
        ScalarModel::Composite { sub_models, .. } => (sub_models.len(), sub_models),
        _ => return false,
    };
    let (count_b, models_b) = match b {
        ScalarModel::Composite { sub_models, .. } => (sub_models.len(), sub_models),
        _ => return false,
    };

    // High-mode composites tolerate a little mode merging/splitting.
    if count_a.abs_diff(count_b) <= 2 && count_a.max(count_b) >= 4 {
        return true;
    }
    if count_a != count_b {
        return false;
    }

    type_census(models_a) == type_census(models_b)
}

/// Component type counts with Normal-equivalent families folded together.
fn type_census(models: &[ScalarModel]) -> Vec<(&'static str, usize)> {
    let mut census: Vec<(&'static str, usize)> = Vec::new();
    for m in models {
        let mut tag = m.model_type();
        if tag == "student_t" {
            tag = "normal";
        }
        match census.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, n)) => *n += 1,
            None => census.push((tag, 1)),
        }
    }
    census.sort_by_key(|(t, _)| *t);
    census
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> EquivalenceChecker {
        EquivalenceChecker::new()
    }

    fn assert_symmetric(a: &ScalarModel, b: &ScalarModel, expected: bool) {
        let c = checker();
        assert_eq!(c.are_equivalent(a, b), expected, "a vs b");
        assert_eq!(c.are_equivalent(b, a), expected, "b vs a");
    }

    #[test]
    fn normal_matches_high_df_student_t() {
        let n = ScalarModel::normal(0.0, 1.0).unwrap();
        let t = ScalarModel::student_t(100.0, 0.0, 1.0).unwrap();
        assert_symmetric(&n, &t, true);
        assert_eq!(
            checker().equivalence_reason(&n, &t),
            Some("Normal ↔ StudentT(high ν)")
        );
    }

    #[test]
    fn normal_rejects_low_df_student_t() {
        let n = ScalarModel::normal(0.0, 1.0).unwrap();
        let t = ScalarModel::student_t(5.0, 0.0, 1.0).unwrap();
        assert_symmetric(&n, &t, false);
    }

    #[test]
    fn unit_beta_matches_uniform() {
        let b = ScalarModel::beta(1.0, 1.0, 0.0, 1.0).unwrap();
        let u = ScalarModel::uniform(0.0, 1.0).unwrap();
        assert_symmetric(&b, &u, true);
    }

    #[test]
    fn shaped_beta_rejects_uniform() {
        let b = ScalarModel::beta(5.0, 2.0, 0.0, 1.0).unwrap();
        let u = ScalarModel::uniform(0.0, 1.0).unwrap();
        assert_symmetric(&b, &u, false);
    }

    #[test]
    fn peaked_beta_matches_matching_normal() {
        // Beta(10, 10) on [0, 1]: mean 0.5, σ ≈ 0.109 — a near-Gaussian bump.
        let b = ScalarModel::beta(10.0, 10.0, 0.0, 1.0).unwrap();
        let n = ScalarModel::normal(0.5, 0.109).unwrap();
        assert_symmetric(&b, &n, true);
    }

    #[test]
    fn overlapping_composite_matches_single_normal() {
        let mix = ScalarModel::composite(
            vec![0.5, 0.5],
            vec![
                ScalarModel::normal(-0.3, 1.0).unwrap(),
                ScalarModel::normal(0.3, 1.0).unwrap(),
            ],
        )
        .unwrap();
        // Matching aggregate: mean 0, var = 1 + 0.09.
        let single = ScalarModel::normal(0.0, 1.044).unwrap();
        assert_symmetric(&mix, &single, true);
    }

    #[test]
    fn separated_composite_rejects_single_normal() {
        let mix = ScalarModel::composite(
            vec![0.5, 0.5],
            vec![
                ScalarModel::normal(-4.0, 0.3).unwrap(),
                ScalarModel::normal(4.0, 0.3).unwrap(),
            ],
        )
        .unwrap();
        let single = ScalarModel::normal(0.0, 4.0).unwrap();
        assert_symmetric(&mix, &single, false);
    }

    #[test]
    fn composites_match_by_structure() {
        let a = ScalarModel::composite(
            vec![0.5, 0.5],
            vec![
                ScalarModel::normal(-2.0, 0.5).unwrap(),
                ScalarModel::normal(2.0, 0.5).unwrap(),
            ],
        )
        .unwrap();
        let b = ScalarModel::composite(
            vec![0.48, 0.52],
            vec![
                ScalarModel::normal(-2.05, 0.52).unwrap(),
                ScalarModel::normal(1.97, 0.49).unwrap(),
            ],
        )
        .unwrap();
        assert_symmetric(&a, &b, true);
    }

    #[test]
    fn same_type_different_parameters_not_equivalent() {
        let a = ScalarModel::normal(0.0, 1.0).unwrap();
        let b = ScalarModel::normal(10.0, 1.0).unwrap();
        assert_symmetric(&a, &b, false);
    }

    #[test]
    fn same_type_close_parameters_equivalent() {
        let a = ScalarModel::normal(5.0, 2.0).unwrap();
        let b = ScalarModel::normal(5.05, 1.97).unwrap();
        assert_symmetric(&a, &b, true);
        assert!(checker().equivalence_reason(&a, &b).is_some());
    }

    #[test]
    fn single_component_composite_unwraps() {
        // Hand-built (the checked constructor would unwrap it already).
        let n = ScalarModel::normal(1.0, 2.0).unwrap();
        let wrapped = ScalarModel::Composite {
            weights: vec![1.0],
            sub_models: vec![n.clone()],
        };
        assert_symmetric(&wrapped, &n, true);
    }

    #[test]
    fn gamma_not_equivalent_to_mismatched_normal() {
        // Strongly skewed gamma vs any symmetric normal: moments disagree.
        let g = ScalarModel::gamma(1.0, 2.0, 0.0).unwrap();
        let n = ScalarModel::normal(2.0, 2.0).unwrap();
        assert_symmetric(&g, &n, false);
    }
}
