//! Quality checks for extracted models: fit a synthetic dataset, then
//! score the model CDF against the empirical CDF on a dense grid.

use shapefit_testdata::{gen_dataset, DistKind};

use super::QualityReport;
use crate::extract::BestFitSelector;
use crate::model::ScalarModel;

/// (ks, mae) between the model CDF and the empirical CDF on a 1000-point
/// grid spanning the sample range.
fn cdf_grid_errors(model: &ScalarModel, sorted: &[f64]) -> (f64, f64) {
    let steps = 1000usize;
    let n = sorted.len() as f64;
    let lo = sorted[0];
    let hi = sorted[sorted.len() - 1];
    let range = hi - lo;

    let mut ks: f64 = 0.0;
    let mut mae = 0.0;
    for i in 0..=steps {
        let x = lo + range * i as f64 / steps as f64;
        let empirical = sorted.partition_point(|&v| v <= x) as f64 / n;
        let err = (model.cdf(x) - empirical).abs();
        mae += err;
        ks = ks.max(err);
    }
    mae /= (steps + 1) as f64;
    (ks, mae)
}

/// Build, fit with the given selector, and score as a [`QualityReport`].
pub fn assess_fit_with(
    kind: DistKind,
    n: usize,
    seed: u64,
    selector: &BestFitSelector,
) -> QualityReport {
    let mut data = gen_dataset(kind, n, seed);
    data.sort_by(|a, b| a.total_cmp(b));

    let model = selector.select_best(&data).expect("synthetic data is clean");
    let (ks, mae) = cdf_grid_errors(&model, &data);
    QualityReport::from_metrics(n, ks, mae)
}

/// Simple entry: the default selector.
pub fn assess_fit(kind: DistKind, n: usize, seed: u64) -> QualityReport {
    assess_fit_with(kind, n, seed, &BestFitSelector::default())
}
