//! Sample moments: single-pass accumulation and associative combination.
//!
//! # Semantics
//! - Population formulas throughout (divide by n), matching what the
//!   fitters expect from method-of-moments estimation.
//! - Degenerate samples (zero variance) report skewness 0 and kurtosis 3 —
//!   the normal reference — never NaN.
//! - [`MomentAccumulator::merge`] is associative up to floating-point
//!   tolerance: accumulating two disjoint partitions and merging equals
//!   accumulating the union. Parallel callers rely on this; it is a
//!   contract, not an implementation detail.

use crate::error::{ExtractError, ExtractResult};

/// Descriptive statistics for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentProfile {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    /// Raw kurtosis (normal = 3), not excess.
    pub kurtosis: f64,
}

impl MomentProfile {
    /// Computes the profile of a sample in one pass.
    pub fn from_values(values: &[f64]) -> ExtractResult<Self> {
        if values.is_empty() {
            return Err(ExtractError::InvalidInput {
                context: "empty sample",
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExtractError::InvalidInput {
                context: "sample value",
            });
        }
        let mut acc = MomentAccumulator::new();
        for &v in values {
            acc.push(v);
        }
        Ok(acc.profile())
    }

    #[inline]
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn excess_kurtosis(&self) -> f64 {
        self.kurtosis - 3.0
    }

    /// Heuristic: an untruncated normal sample of any realistic size spans
    /// more than 6σ, so a tighter observed range suggests bounded data.
    pub fn appears_bounded(&self) -> bool {
        self.range() < 6.0 * self.std_dev()
    }

    pub fn appears_normal(&self) -> bool {
        self.skewness.abs() < 0.5 && self.excess_kurtosis().abs() < 1.0
    }

    /// Uniform data sits near kurtosis 1.8 with no skew.
    pub fn appears_uniform(&self) -> bool {
        self.skewness.abs() < 0.3 && self.kurtosis < 2.5 && self.kurtosis > 1.2
    }
}

/// Single-pass accumulator for count/min/max and the first four central
/// moments (extended Welford updates), mergeable across partitions.
#[derive(Debug, Clone, Copy)]
pub struct MomentAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: f64,
    max: f64,
}

impl Default for MomentAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MomentAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Accepts one value. Update order matters: m4 before m3 before m2.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let n = self.count as f64;
        let delta = value - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * (n - 1.0);

        self.mean += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;

        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Combines two accumulators over disjoint partitions into one over
    /// their union (pairwise update formulas for central moments).
    pub fn merge(&self, other: &Self) -> Self {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }

        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;
        let delta2 = delta * delta;
        let delta3 = delta2 * delta;
        let delta4 = delta2 * delta2;

        let mean = self.mean + delta * nb / n;
        let m2 = self.m2 + other.m2 + delta2 * na * nb / n;
        let m3 = self.m3
            + other.m3
            + delta3 * na * nb * (na - nb) / (n * n)
            + 3.0 * delta * (na * other.m2 - nb * self.m2) / n;
        let m4 = self.m4
            + other.m4
            + delta4 * na * nb * (na * na - na * nb + nb * nb) / (n * n * n)
            + 6.0 * delta2 * (na * na * other.m2 + nb * nb * self.m2) / (n * n)
            + 4.0 * delta * (na * other.m3 - nb * self.m3) / n;

        Self {
            count: self.count + other.count,
            mean,
            m2,
            m3,
            m4,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Finalizes into a [`MomentProfile`]. An empty accumulator reports the
    /// degenerate conventions (kurtosis 3).
    pub fn profile(&self) -> MomentProfile {
        if self.count == 0 {
            return MomentProfile {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                variance: 0.0,
                skewness: 0.0,
                kurtosis: 3.0,
            };
        }
        let n = self.count as f64;
        let variance = self.m2 / n;
        let std_dev = variance.sqrt();

        let (skewness, kurtosis) = if std_dev > 0.0 {
            (
                (self.m3 / n) / (std_dev * std_dev * std_dev),
                (self.m4 / n) / (variance * variance),
            )
        } else {
            (0.0, 3.0)
        };

        MomentProfile {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.mean,
            variance,
            skewness,
            kurtosis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(matches!(
            MomentProfile::from_values(&[]),
            Err(ExtractError::InvalidInput { .. })
        ));
        assert!(matches!(
            MomentProfile::from_values(&[1.0, f64::NAN]),
            Err(ExtractError::InvalidInput { .. })
        ));
        assert!(matches!(
            MomentProfile::from_values(&[1.0, f64::INFINITY]),
            Err(ExtractError::InvalidInput { .. })
        ));
    }

    #[test]
    fn known_moments_of_small_sample() {
        let p = MomentProfile::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(p.count, 8);
        assert_eq!(p.min, 2.0);
        assert_eq!(p.max, 9.0);
        assert!((p.mean - 5.0).abs() < 1e-12);
        assert!((p.variance - 4.0).abs() < 1e-12);
        assert!((p.std_dev() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_sample_uses_conventions() {
        let p = MomentProfile::from_values(&[3.0; 100]).unwrap();
        assert_eq!(p.variance, 0.0);
        assert_eq!(p.skewness, 0.0);
        assert_eq!(p.kurtosis, 3.0);
    }

    #[test]
    fn merge_equals_union() {
        let all: Vec<f64> = (0..1000)
            .map(|i| ((i * 37 % 101) as f64) * 0.173 - 5.0)
            .collect();
        let (left, right) = all.split_at(400);

        let mut a = MomentAccumulator::new();
        for &v in left {
            a.push(v);
        }
        let mut b = MomentAccumulator::new();
        for &v in right {
            b.push(v);
        }

        let merged = a.merge(&b).profile();
        let direct = MomentProfile::from_values(&all).unwrap();

        assert_eq!(merged.count, direct.count);
        assert!((merged.mean - direct.mean).abs() < 1e-9);
        assert!((merged.variance - direct.variance).abs() < 1e-9);
        assert!((merged.skewness - direct.skewness).abs() < 1e-9);
        assert!((merged.kurtosis - direct.kurtosis).abs() < 1e-9);
        assert_eq!(merged.min, direct.min);
        assert_eq!(merged.max, direct.max);
    }

    #[test]
    fn merge_is_associative_across_three_partitions() {
        let all: Vec<f64> = (0..900).map(|i| (i as f64 * 0.711).sin() * 3.0).collect();
        let mut parts = Vec::new();
        for chunk in all.chunks(300) {
            let mut acc = MomentAccumulator::new();
            for &v in chunk {
                acc.push(v);
            }
            parts.push(acc);
        }
        let left_assoc = parts[0].merge(&parts[1]).merge(&parts[2]).profile();
        let right_assoc = parts[0].merge(&parts[1].merge(&parts[2])).profile();
        assert!((left_assoc.mean - right_assoc.mean).abs() < 1e-10);
        assert!((left_assoc.variance - right_assoc.variance).abs() < 1e-10);
        assert!((left_assoc.kurtosis - right_assoc.kurtosis).abs() < 1e-9);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut a = MomentAccumulator::new();
        for v in [1.0, 2.0, 3.0] {
            a.push(v);
        }
        let empty = MomentAccumulator::new();
        assert_eq!(a.merge(&empty).profile(), a.profile());
        assert_eq!(empty.merge(&a).profile(), a.profile());
    }

    #[test]
    fn shape_predicates() {
        // Uniform-ish grid.
        let uniform: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let p = MomentProfile::from_values(&uniform).unwrap();
        assert!(p.appears_uniform());
        assert!(p.appears_bounded());
        assert!(!p.appears_normal());
    }
}
