//! Canonical form and deterministic ordering for [`ScalarModel`].
//!
//! Round-trip verification compares models structurally, so composites need
//! a unique component order. Canonicalization sorts components by their
//! characteristic location (weights carried along) and applies the cheap
//! reductions that never change the distribution:
//! Beta(≈1,≈1) → Uniform, single-component unwrap.
//!
//! Canonical form is **not** applied automatically by the fitters — callers
//! that need deterministic comparison request it explicitly.

use std::cmp::Ordering;

use crate::model::ScalarModel;

/// Tolerance under which two parameter values compare as equal.
const PARAM_EPSILON: f64 = 1e-10;

/// Beta parameters within this distance of 1 are rewritten to Uniform.
const BETA_UNIFORM_TOLERANCE: f64 = 0.15;

/// Returns the canonical form of a model.
///
/// Composites come back with components sorted ascending by
/// [`ScalarModel::location`] and reduced; non-composites are returned
/// unchanged (apart from the Beta(≈1,≈1) rewrite).
pub fn to_canonical_form(model: &ScalarModel) -> ScalarModel {
    match model {
        ScalarModel::Composite {
            weights,
            sub_models,
        } => {
            let mut pairs: Vec<(f64, ScalarModel)> = weights
                .iter()
                .zip(sub_models)
                .map(|(w, m)| (*w, to_canonical_form(m)))
                .collect();
            pairs.sort_by(|a, b| {
                a.1.location()
                    .partial_cmp(&b.1.location())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| compare_models(&a.1, &b.1))
            });
            let (weights, sub_models): (Vec<f64>, Vec<ScalarModel>) = pairs.into_iter().unzip();
            // The constructor re-runs flattening and single-component unwrap.
            ScalarModel::composite(weights, sub_models)
                .expect("canonicalization preserves validity")
        }
        other => reduce_simple(other),
    }
}

/// Rewrites a non-composite model into its simplest equivalent family.
fn reduce_simple(model: &ScalarModel) -> ScalarModel {
    if let ScalarModel::Beta {
        alpha,
        beta,
        lower,
        upper,
    } = model
    {
        if (alpha - 1.0).abs() <= BETA_UNIFORM_TOLERANCE
            && (beta - 1.0).abs() <= BETA_UNIFORM_TOLERANCE
        {
            return ScalarModel::Uniform {
                lower: *lower,
                upper: *upper,
            };
        }
    }
    model.clone()
}

/// Total deterministic order over models: type tag first, then parameters
/// in type-specific order with a small epsilon.
pub fn compare_models(a: &ScalarModel, b: &ScalarModel) -> Ordering {
    let type_cmp = a.model_type().cmp(b.model_type());
    if type_cmp != Ordering::Equal {
        return type_cmp;
    }

    use ScalarModel::*;
    match (a, b) {
        (
            Normal {
                mean: m1,
                std_dev: s1,
                lower_bound: l1,
                upper_bound: u1,
            },
            Normal {
                mean: m2,
                std_dev: s2,
                lower_bound: l2,
                upper_bound: u2,
            },
        ) => cmp_f64(*m1, *m2)
            .then(cmp_f64(*s1, *s2))
            .then(cmp_opt(*l1, *l2))
            .then(cmp_opt(*u1, *u2)),
        (Uniform { lower: l1, upper: u1 }, Uniform { lower: l2, upper: u2 }) => {
            cmp_f64(*l1, *l2).then(cmp_f64(*u1, *u2))
        }
        (
            Beta {
                alpha: a1,
                beta: b1,
                lower: l1,
                upper: u1,
            },
            Beta {
                alpha: a2,
                beta: b2,
                lower: l2,
                upper: u2,
            },
        ) => cmp_f64(*a1, *a2)
            .then(cmp_f64(*b1, *b2))
            .then(cmp_f64(*l1, *l2))
            .then(cmp_f64(*u1, *u2)),
        (
            Gamma {
                shape: k1,
                scale: s1,
                location: o1,
            },
            Gamma {
                shape: k2,
                scale: s2,
                location: o2,
            },
        ) => cmp_f64(*k1, *k2).then(cmp_f64(*s1, *s2)).then(cmp_f64(*o1, *o2)),
        (
            StudentT {
                nu: n1,
                mu: m1,
                sigma: s1,
            },
            StudentT {
                nu: n2,
                mu: m2,
                sigma: s2,
            },
        ) => cmp_f64(*n1, *n2).then(cmp_f64(*m1, *m2)).then(cmp_f64(*s1, *s2)),
        (
            InverseGamma {
                shape: k1,
                scale: s1,
            },
            InverseGamma {
                shape: k2,
                scale: s2,
            },
        ) => cmp_f64(*k1, *k2).then(cmp_f64(*s1, *s2)),
        (
            BetaPrime {
                alpha: a1,
                beta: b1,
            },
            BetaPrime {
                alpha: a2,
                beta: b2,
            },
        ) => cmp_f64(*a1, *a2).then(cmp_f64(*b1, *b2)),
        (
            PearsonIv {
                m: m1,
                nu: n1,
                a: a1,
                lambda: g1,
            },
            PearsonIv {
                m: m2,
                nu: n2,
                a: a2,
                lambda: g2,
            },
        ) => cmp_f64(*m1, *m2)
            .then(cmp_f64(*n1, *n2))
            .then(cmp_f64(*a1, *a2))
            .then(cmp_f64(*g1, *g2)),
        (
            Empirical {
                bin_edges: e1, ..
            },
            Empirical {
                bin_edges: e2, ..
            },
        ) => cmp_f64(e1[0], e2[0]).then(cmp_f64(e1[e1.len() - 1], e2[e2.len() - 1])),
        (
            Composite {
                weights: w1,
                sub_models: m1,
            },
            Composite {
                weights: w2,
                sub_models: m2,
            },
        ) => {
            let count_cmp = m1.len().cmp(&m2.len());
            if count_cmp != Ordering::Equal {
                return count_cmp;
            }
            for (a, b) in w1.iter().zip(w2) {
                let c = cmp_f64(*a, *b);
                if c != Ordering::Equal {
                    return c;
                }
            }
            for (a, b) in m1.iter().zip(m2) {
                let c = compare_models(a, b);
                if c != Ordering::Equal {
                    return c;
                }
            }
            Ordering::Equal
        }
        _ => Ordering::Equal,
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    if a.is_nan() && b.is_nan() {
        return Ordering::Equal;
    }
    if a.is_nan() {
        return Ordering::Greater; // NaN sorts last
    }
    if b.is_nan() {
        return Ordering::Less;
    }
    if (a - b).abs() < PARAM_EPSILON {
        return Ordering::Equal;
    }
    a.partial_cmp(&b).expect("non-NaN")
}

fn cmp_opt(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => cmp_f64(x, y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal(mean: f64) -> ScalarModel {
        ScalarModel::normal(mean, 1.0).unwrap()
    }

    #[test]
    fn canonical_sorts_components_by_location() {
        let mix = ScalarModel::composite(
            vec![0.2, 0.5, 0.3],
            vec![normal(5.0), normal(-3.0), normal(1.0)],
        )
        .unwrap();
        let canon = to_canonical_form(&mix);
        match canon {
            ScalarModel::Composite {
                weights,
                sub_models,
            } => {
                let locs: Vec<f64> = sub_models.iter().map(|m| m.location()).collect();
                assert!(locs.windows(2).all(|w| w[0] <= w[1]));
                // Weights travel with their components.
                assert!((weights[0] - 0.5).abs() < 1e-12);
                assert!((weights[1] - 0.3).abs() < 1e-12);
                assert!((weights[2] - 0.2).abs() < 1e-12);
            }
            _ => panic!("expected composite"),
        }
    }

    #[test]
    fn canonical_is_shuffle_invariant() {
        let a = ScalarModel::composite(vec![0.4, 0.6], vec![normal(2.0), normal(-2.0)]).unwrap();
        let b = ScalarModel::composite(vec![0.6, 0.4], vec![normal(-2.0), normal(2.0)]).unwrap();
        assert_eq!(to_canonical_form(&a), to_canonical_form(&b));
    }

    #[test]
    fn non_composite_passes_through() {
        let n = normal(3.0);
        assert_eq!(to_canonical_form(&n), n);
    }

    #[test]
    fn near_unit_beta_reduces_to_uniform() {
        let b = ScalarModel::beta(1.05, 0.95, 0.0, 2.0).unwrap();
        match to_canonical_form(&b) {
            ScalarModel::Uniform { lower, upper } => {
                assert_eq!(lower, 0.0);
                assert_eq!(upper, 2.0);
            }
            other => panic!("expected uniform, got {}", other.model_type()),
        }
    }

    #[test]
    fn ordering_is_total_and_type_first() {
        let b = ScalarModel::beta(2.0, 3.0, 0.0, 1.0).unwrap();
        let n = normal(0.0);
        let u = ScalarModel::uniform(0.0, 1.0).unwrap();
        // "beta" < "normal" < "uniform"
        assert_eq!(compare_models(&b, &n), Ordering::Less);
        assert_eq!(compare_models(&n, &u), Ordering::Less);
        assert_eq!(compare_models(&n, &normal(0.0)), Ordering::Equal);
        assert_eq!(compare_models(&normal(-1.0), &normal(1.0)), Ordering::Less);
    }
}
