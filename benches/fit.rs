use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use shapefit::extract::{detect, BestFitSelector, CompositeModelFitter, FitterKind};
use shapefit_testdata::{gen_dataset, DistKind};

fn bench_single_fitters(c: &mut Criterion) {
    let values = gen_dataset(
        DistKind::Normal {
            mean: 0.0,
            std_dev: 1.0,
        },
        100_000,
        7,
    );

    let mut group = c.benchmark_group("single_fit");
    for (name, fitter) in [
        ("normal", FitterKind::Normal),
        ("uniform", FitterKind::uniform()),
        ("beta", FitterKind::Beta),
        ("empirical", FitterKind::empirical()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &fitter, |b, f| {
            b.iter(|| f.fit(&values).unwrap())
        });
    }
    group.finish();
}

fn bench_selector(c: &mut Criterion) {
    let normal = gen_dataset(
        DistKind::Normal {
            mean: 0.0,
            std_dev: 1.0,
        },
        50_000,
        11,
    );
    let selector = BestFitSelector::pearson_system();
    c.bench_function("selector/pearson_system_50k", |b| {
        b.iter(|| selector.select_best_result(&normal).unwrap())
    });
}

fn bench_mode_detection(c: &mut Criterion) {
    let bimodal = gen_dataset(
        DistKind::Bimodal {
            centers: (-2.0, 2.0),
            std_dev: 0.5,
        },
        50_000,
        13,
    );
    c.bench_function("modes/detect_50k", |b| {
        b.iter(|| detect(&bimodal, 5).unwrap())
    });
}

fn bench_composite(c: &mut Criterion) {
    let bimodal = gen_dataset(
        DistKind::Bimodal {
            centers: (-2.0, 2.0),
            std_dev: 0.5,
        },
        50_000,
        17,
    );
    let fitter = CompositeModelFitter::new();
    c.bench_function("composite/fit_bimodal_50k", |b| {
        b.iter(|| fitter.fit(&bimodal).unwrap())
    });
}

criterion_group!(
    benches,
    bench_single_fitters,
    bench_selector,
    bench_mode_detection,
    bench_composite
);
criterion_main!(benches);
