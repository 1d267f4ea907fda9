pub mod fit_quality;

pub use fit_quality::{assess_fit, assess_fit_with};

/// A single comparable quality figure for a fitted model.
#[derive(Debug, Clone, Copy)]
pub struct QualityReport {
    pub n: usize,
    /// KS-like error (max absolute CDF error on the evaluation grid).
    pub ks: f64,
    /// Mean absolute CDF error on the grid.
    pub mae: f64,
    /// A single scalar for rough comparison (higher is better).
    pub score: f64,
}

impl QualityReport {
    #[inline]
    pub fn from_metrics(n: usize, ks: f64, mae: f64) -> Self {
        // Same heuristic everywhere so numbers are comparable.
        let score = (-((60.0 * mae) + (6.0 * ks))).exp();
        QualityReport { n, ks, mae, score }
    }
}

/// Pretty banner for section headings in story-style tests.
pub fn print_banner(title: &str) {
    println!();
    println!("═══════════════════════════════════════════════════════════════════════════");
    println!("{title}");
    println!("═══════════════════════════════════════════════════════════════════════════");
    println!();
}

/// Small, shared print helper used in tests/benches.
pub fn print_report(tag: &str, r: QualityReport) {
    println!(
        "{} -> QualityReport(n={}, KS={:.6e}, MAE={:.6e}, score={:.3})",
        tag, r.n, r.ks, r.mae, r.score
    );
}
