//! shapefit-testdata
//! Synthetic sample generators shared by tests, benches and the quality
//! module. Every generator is deterministic for a given seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal};

/// Available synthetic distributions.
#[derive(Clone, Copy, Debug)]
pub enum DistKind {
    /// Gaussian with the given parameters.
    Normal { mean: f64, std_dev: f64 },
    /// Uniform on [lower, upper).
    Uniform { lower: f64, upper: f64 },
    /// Gamma with the given shape and scale, support (0, ∞).
    Gamma { shape: f64, scale: f64 },
    /// 50/50 mix of two equal-σ Gaussians.
    Bimodal { centers: (f64, f64), std_dev: f64 },
    /// Three equal-weight σ=0.5 Gaussians at −spread, 0, +spread.
    TriModal { spread: f64 },
    /// Clumps, a broad uniform region, and heavy tails in [0, 1].
    Mixture,
}

/// Generate `n` samples for the chosen distribution.
pub fn gen_dataset(kind: DistKind, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);

    match kind {
        DistKind::Normal { mean, std_dev } => {
            let normal = Normal::new(mean, std_dev).expect("valid normal parameters");
            for _ in 0..n {
                out.push(normal.sample(&mut rng));
            }
        }
        DistKind::Uniform { lower, upper } => {
            for _ in 0..n {
                out.push(lower + rng.random::<f64>() * (upper - lower));
            }
        }
        DistKind::Gamma { shape, scale } => {
            let gamma = Gamma::new(shape, scale).expect("valid gamma parameters");
            for _ in 0..n {
                out.push(gamma.sample(&mut rng));
            }
        }
        DistKind::Bimodal { centers, std_dev } => {
            let a = Normal::new(centers.0, std_dev).expect("valid normal parameters");
            let b = Normal::new(centers.1, std_dev).expect("valid normal parameters");
            for _ in 0..n {
                if rng.random_bool(0.5) {
                    out.push(a.sample(&mut rng));
                } else {
                    out.push(b.sample(&mut rng));
                }
            }
        }
        DistKind::TriModal { spread } => {
            let comps = [
                Normal::new(-spread, 0.5).expect("valid normal parameters"),
                Normal::new(0.0, 0.5).expect("valid normal parameters"),
                Normal::new(spread, 0.5).expect("valid normal parameters"),
            ];
            for _ in 0..n {
                let k = rng.random_range(0..3);
                out.push(comps[k].sample(&mut rng));
            }
        }
        DistKind::Mixture => {
            for _ in 0..n {
                let bucket: u32 = rng.random_range(0..100);
                let v = match bucket {
                    // Clumps around 0.1, 0.5, 0.9 with micro-noise.
                    0..=29 => {
                        let center = match rng.random_range(0..3) {
                            0 => 0.10,
                            1 => 0.50,
                            _ => 0.90,
                        };
                        center + rng.random_range(-1.0..1.0) * 1e-3
                    }
                    // Broad uniform region.
                    30..=69 => rng.random::<f64>(),
                    // Heavier tails near 0 and 1.
                    _ => {
                        let exp = rng.random_range(3.0..9.0);
                        if rng.random_bool(0.5) {
                            rng.random::<f64>().clamp(1e-12, 1.0).powf(exp)
                        } else {
                            1.0 - rng.random::<f64>().clamp(1e-12, 1.0).powf(exp)
                        }
                    }
                };
                out.push(v.clamp(0.0, 1.0));
            }
        }
    }
    out
}
