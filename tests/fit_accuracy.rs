//! End-to-end accuracy scenarios: parameter recovery, mode detection,
//! composite acceptance invariants, and the recognized equivalence classes.

use shapefit::extract::{
    detect, detect_adaptive, BestFitSelector, CompositeModelFitter, EquivalenceChecker,
    FitterKind,
};
use shapefit::model::ScalarModel;
use shapefit::ExtractError;
use shapefit_testdata::{gen_dataset, DistKind};

#[test]
fn normal_end_to_end_scenario() {
    // 10_000 draws from N(5, 2): mean/stdDev within 0.1, goodness < 2.
    let values = gen_dataset(
        DistKind::Normal {
            mean: 5.0,
            std_dev: 2.0,
        },
        10_000,
        501,
    );
    let fit = FitterKind::Normal.fit(&values).expect("fit");
    match &fit.model {
        ScalarModel::Normal { mean, std_dev, .. } => {
            assert!((mean - 5.0).abs() < 0.1, "mean={mean}");
            assert!((std_dev - 2.0).abs() < 0.1, "std_dev={std_dev}");
        }
        other => panic!("expected normal, got {}", other.model_type()),
    }
    assert!(fit.goodness_of_fit < 2.0, "gof={}", fit.goodness_of_fit);

    // And normal data must fit normal better than a clearly-wrong family.
    let uniform = FitterKind::uniform().fit(&values).expect("fit");
    assert!(fit.goodness_of_fit < uniform.goodness_of_fit);
}

#[test]
fn bimodal_mode_detection_scenario() {
    // 10_000 draws split 50/50 between N(-2, 0.5) and N(2, 0.5).
    let values = gen_dataset(
        DistKind::Bimodal {
            centers: (-2.0, 2.0),
            std_dev: 0.5,
        },
        10_000,
        502,
    );
    let result = detect(&values, 3).expect("detect");
    assert!(result.is_multimodal);
    assert_eq!(result.mode_count, 2);
    assert!((result.peak_locations[0] + 2.0).abs() < 0.5);
    assert!((result.peak_locations[1] - 2.0).abs() < 0.5);
}

#[test]
fn detect_and_detect_adaptive_never_contradict_on_clear_modes() {
    // ≥ 3 well-separated equal-weight modes: the two entry points must
    // agree qualitatively.
    for seed in [510u64, 511, 512] {
        let values = gen_dataset(DistKind::TriModal { spread: 6.0 }, 15_000, seed);
        let plain = detect(&values, 5).expect("detect");
        let adaptive = detect_adaptive(&values, 5).expect("detect_adaptive");
        assert_eq!(
            plain.is_multimodal, adaptive.is_multimodal,
            "seed {seed}: verdicts diverged (plain dip={}, adaptive dip={})",
            plain.dip_statistic, adaptive.dip_statistic
        );
        assert!(plain.is_multimodal, "seed {seed}: missed obvious modes");
    }
}

#[test]
fn accepted_composites_respect_their_own_threshold() {
    let fitter = CompositeModelFitter::new();
    for seed in [520u64, 521, 522] {
        let values = gen_dataset(
            DistKind::Bimodal {
                centers: (-2.0, 2.0),
                std_dev: 0.5,
            },
            10_000,
            seed,
        );
        let fit = fitter.fit(&values).expect("accept");
        assert!(
            fit.validation.max_deviation <= fit.validation.threshold,
            "seed {seed}: {}",
            fit.validation.format_summary()
        );

        // Composite weights sum to 1 within 1e-3.
        if let ScalarModel::Composite { weights, .. } = &fit.result.model {
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() <= 1e-3, "weights sum {sum}");
        } else {
            panic!("expected composite");
        }
    }
}

#[test]
fn composite_rejects_structureless_data_rather_than_fabricating() {
    let fitter = CompositeModelFitter::new();
    for (kind, seed) in [
        (
            DistKind::Normal {
                mean: 0.0,
                std_dev: 1.0,
            },
            530u64,
        ),
        (
            DistKind::Uniform {
                lower: 0.0,
                upper: 1.0,
            },
            531,
        ),
    ] {
        let values = gen_dataset(kind, 8_000, seed);
        match fitter.fit(&values) {
            Err(ExtractError::NotMultimodal { .. }) => {}
            Err(other) => panic!("{kind:?}: unexpected error {other:?}"),
            Ok(fit) => panic!(
                "{kind:?}: fabricated a composite ({})",
                fit.validation.format_summary()
            ),
        }
    }
}

#[test]
fn equivalence_spec_scenarios() {
    let checker = EquivalenceChecker::new();

    let normal = ScalarModel::normal(0.0, 1.0).unwrap();
    let student = ScalarModel::student_t(100.0, 0.0, 1.0).unwrap();
    assert!(checker.are_equivalent(&normal, &student));
    assert!(checker.are_equivalent(&student, &normal));

    let beta = ScalarModel::beta(1.0, 1.0, 0.0, 1.0).unwrap();
    let uniform = ScalarModel::uniform(0.0, 1.0).unwrap();
    assert!(checker.are_equivalent(&beta, &uniform));
    assert!(checker.are_equivalent(&uniform, &beta));

    // And a clear negative stays negative both ways.
    let shifted = ScalarModel::normal(4.0, 1.0).unwrap();
    assert!(!checker.are_equivalent(&normal, &shifted));
    assert!(!checker.are_equivalent(&shifted, &normal));
}

#[test]
fn selector_ranks_all_families_for_diagnostics() {
    let values = gen_dataset(
        DistKind::Gamma {
            shape: 2.0,
            scale: 1.0,
        },
        10_000,
        540,
    );
    let selector = BestFitSelector::pearson_system();
    let all = selector.fit_all(&values).expect("fit_all");
    assert_eq!(all.len(), selector.fitters().len());

    let best = selector.select_best_result(&values).expect("select");
    let min = all
        .iter()
        .map(|r| r.goodness_of_fit)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(best.goodness_of_fit, min);
}

#[test]
fn moment_profile_merge_matches_whole_sample() {
    use shapefit::extract::MomentAccumulator;

    let values = gen_dataset(
        DistKind::Gamma {
            shape: 2.5,
            scale: 0.8,
        },
        10_000,
        550,
    );
    let whole = shapefit::MomentProfile::from_values(&values).expect("profile");

    let mut left = MomentAccumulator::new();
    let mut right = MomentAccumulator::new();
    for (i, &v) in values.iter().enumerate() {
        if i % 2 == 0 {
            left.push(v);
        } else {
            right.push(v);
        }
    }
    let merged = left.merge(&right).profile();

    assert_eq!(merged.count, whole.count);
    assert!((merged.mean - whole.mean).abs() < 1e-9);
    assert!((merged.variance - whole.variance).abs() < 1e-9);
    assert!((merged.skewness - whole.skewness).abs() < 1e-8);
    assert!((merged.kurtosis - whole.kurtosis).abs() < 1e-8);
}
