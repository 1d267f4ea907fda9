//! Pearson-system classification from sample moments.
//!
//! The Pearson system assigns a distribution family from the moment pair
//! (β₁ = skewness², β₂ = kurtosis) via the discriminant
//!
//! ```text
//! κ = β₁(β₂ + 3)² / [4(2β₂ − 3β₁ − 6)(4β₂ − 3β₁)]
//! ```
//!
//! Symmetric cases (β₁ ≈ 0) short-circuit before κ is evaluated, and a
//! near-zero denominator lands exactly on the Type III (Gamma) line as an
//! explicit boundary check — never as floating-point equality on the
//! general formula.
//!
//! Classification is advisory: it orders which fitters the selector tries
//! first, it never rejects a fit by itself.

use crate::extract::fitters::FitterKind;

/// Tolerance for treating skewness as zero.
pub const SKEWNESS_TOLERANCE: f64 = 0.1;

/// Tolerance for treating kurtosis as the normal reference 3.
pub const KURTOSIS_TOLERANCE: f64 = 0.2;

/// Tolerance for κ comparisons against its boundary values.
pub const KAPPA_TOLERANCE: f64 = 0.05;

/// Pearson distribution types distinguished by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PearsonType {
    /// Type 0: Normal (β₁ ≈ 0, β₂ ≈ 3).
    Normal,
    /// Type I: Beta (κ < 0).
    Beta,
    /// Type II: symmetric Beta (β₁ ≈ 0, β₂ < 3).
    SymmetricBeta,
    /// Type III: Gamma (κ ≈ 0 or on the boundary line).
    Gamma,
    /// Type IV: no simpler reduction (0 < κ < 1).
    TypeIv,
    /// Type V: Inverse-Gamma (κ ≈ 1).
    InverseGamma,
    /// Type VI: Beta-prime (κ > 1).
    BetaPrime,
    /// Type VII: Student-t (β₁ ≈ 0, β₂ > 3).
    StudentT,
}

impl PearsonType {
    /// The fitters worth trying first for this type, most specific first.
    /// The selector appends its remaining configured fitters after these.
    pub fn suggested_fitters(&self) -> &'static [FitterKind] {
        match self {
            PearsonType::Normal => &[FitterKind::Normal],
            PearsonType::Beta | PearsonType::SymmetricBeta => {
                &[FitterKind::Beta, FitterKind::Normal]
            }
            PearsonType::Gamma => &[FitterKind::Gamma, FitterKind::Normal],
            PearsonType::TypeIv => &[FitterKind::PearsonIv, FitterKind::StudentT],
            PearsonType::InverseGamma => &[FitterKind::InverseGamma, FitterKind::Gamma],
            PearsonType::BetaPrime => &[FitterKind::BetaPrime, FitterKind::InverseGamma],
            PearsonType::StudentT => &[FitterKind::StudentT, FitterKind::Normal],
        }
    }
}

/// Classifies from skewness and **standard** (not excess) kurtosis.
pub fn classify(skewness: f64, kurtosis: f64) -> PearsonType {
    let beta1 = skewness * skewness;
    let beta2 = kurtosis;

    if beta1 < SKEWNESS_TOLERANCE * SKEWNESS_TOLERANCE {
        return classify_symmetric(beta2);
    }
    classify_asymmetric(beta1, beta2)
}

/// Convenience: classify from excess kurtosis.
pub fn classify_excess(skewness: f64, excess_kurtosis: f64) -> PearsonType {
    classify(skewness, excess_kurtosis + 3.0)
}

fn classify_symmetric(beta2: f64) -> PearsonType {
    if (beta2 - 3.0).abs() < KURTOSIS_TOLERANCE {
        PearsonType::Normal
    } else if beta2 < 3.0 {
        PearsonType::SymmetricBeta
    } else {
        PearsonType::StudentT
    }
}

fn classify_asymmetric(beta1: f64, beta2: f64) -> PearsonType {
    let numerator = beta1 * (beta2 + 3.0) * (beta2 + 3.0);
    let denom1 = 2.0 * beta2 - 3.0 * beta1 - 6.0;
    let denom2 = 4.0 * beta2 - 3.0 * beta1;
    let denominator = 4.0 * denom1 * denom2;

    // Boundary check before the formula: on (or vanishingly near) the
    // Type III line the general κ is undefined.
    if denominator.abs() < 1e-10 {
        return PearsonType::Gamma;
    }

    let kappa = numerator / denominator;

    if kappa < -KAPPA_TOLERANCE {
        PearsonType::Beta
    } else if kappa.abs() <= KAPPA_TOLERANCE {
        PearsonType::Gamma
    } else if kappa < 1.0 - KAPPA_TOLERANCE {
        PearsonType::TypeIv
    } else if (kappa - 1.0).abs() <= KAPPA_TOLERANCE {
        PearsonType::InverseGamma
    } else {
        PearsonType::BetaPrime
    }
}

/// The Pearson criterion κ, or NaN where undefined.
pub fn kappa(skewness: f64, kurtosis: f64) -> f64 {
    let beta1 = skewness * skewness;
    let beta2 = kurtosis;

    let numerator = beta1 * (beta2 + 3.0) * (beta2 + 3.0);
    if numerator.abs() < 1e-10 {
        return 0.0;
    }

    let denominator = 4.0 * (2.0 * beta2 - 3.0 * beta1 - 6.0) * (4.0 * beta2 - 3.0 * beta1);
    if denominator.abs() < 1e-10 {
        return f64::NAN;
    }
    numerator / denominator
}

/// Classification with the intermediate moment quantities attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub pearson_type: PearsonType,
    /// β₁ = skewness².
    pub beta1: f64,
    /// β₂ = standard kurtosis.
    pub beta2: f64,
    /// κ, NaN where undefined.
    pub kappa: f64,
}

impl Classification {
    pub fn is_symmetric(&self) -> bool {
        self.beta1 < SKEWNESS_TOLERANCE * SKEWNESS_TOLERANCE
    }

    pub fn is_platykurtic(&self) -> bool {
        self.beta2 < 3.0 - KURTOSIS_TOLERANCE
    }

    pub fn is_leptokurtic(&self) -> bool {
        self.beta2 > 3.0 + KURTOSIS_TOLERANCE
    }

    pub fn is_mesokurtic(&self) -> bool {
        (self.beta2 - 3.0).abs() <= KURTOSIS_TOLERANCE
    }
}

/// Classifies and returns the details used for the decision.
pub fn classify_detailed(skewness: f64, kurtosis: f64) -> Classification {
    Classification {
        pearson_type: classify(skewness, kurtosis),
        beta1: skewness * skewness,
        beta2: kurtosis,
        kappa: kappa(skewness, kurtosis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_regimes() {
        assert_eq!(classify(0.0, 3.0), PearsonType::Normal);
        assert_eq!(classify(0.02, 2.95), PearsonType::Normal);
        assert_eq!(classify(0.0, 1.8), PearsonType::SymmetricBeta);
        assert_eq!(classify(0.0, 6.0), PearsonType::StudentT);
    }

    #[test]
    fn gamma_line_hits_type_iii() {
        // Gamma(shape k): skew = 2/√k, kurt = 3 + 6/k sit exactly on the
        // Type III line; the explicit boundary/κ≈0 checks must catch them.
        for &k in &[1.0f64, 2.0, 4.0, 9.0] {
            let skew = 2.0 / k.sqrt();
            let kurt = 3.0 + 6.0 / k;
            assert_eq!(classify(skew, kurt), PearsonType::Gamma, "shape={k}");
        }
    }

    #[test]
    fn skewed_platykurtic_is_beta() {
        // Beta(2, 5): skew ≈ 0.60, kurt ≈ 2.88 → κ < 0.
        assert_eq!(classify(0.596, 2.88), PearsonType::Beta);
    }

    #[test]
    fn heavy_tailed_skewed_is_type_iv_region() {
        // Moderate skew with kurtosis above the Type III line.
        let t = classify(0.8, 6.0);
        assert!(
            matches!(t, PearsonType::TypeIv | PearsonType::InverseGamma),
            "{t:?}"
        );
    }

    #[test]
    fn kappa_zero_for_symmetric() {
        assert_eq!(kappa(0.0, 3.0), 0.0);
        assert_eq!(kappa(0.0, 10.0), 0.0);
    }

    #[test]
    fn kappa_nan_on_degenerate_denominator() {
        // 2β₂ − 3β₁ − 6 = 0 with non-zero β₁: pick β₁ = 1, β₂ = 4.5.
        let k = kappa(1.0, 4.5);
        assert!(k.is_nan());
        // The classifier still gives a definite answer.
        assert_eq!(classify(1.0, 4.5), PearsonType::Gamma);
    }

    #[test]
    fn detailed_flags() {
        let c = classify_detailed(0.0, 2.0);
        assert!(c.is_symmetric());
        assert!(c.is_platykurtic());
        assert!(!c.is_leptokurtic());
        let c = classify_detailed(0.5, 3.05);
        assert!(!c.is_symmetric());
        assert!(c.is_mesokurtic());
    }

    #[test]
    fn suggestions_lead_with_the_matching_family() {
        assert_eq!(
            PearsonType::Gamma.suggested_fitters()[0],
            FitterKind::Gamma
        );
        assert_eq!(
            PearsonType::StudentT.suggested_fitters()[0],
            FitterKind::StudentT
        );
    }
}
