//! Fixed-bin-count density histogram with smoothing, peak/valley
//! enumeration, and gap detection.
//!
//! Resolution is a caller decision (a fixed count, not a function of sample
//! size) — mode detection picks the count from its own adaptive rules and
//! the histogram stays a dumb, predictable container.

use ordered_float::OrderedFloat;

use crate::error::{ExtractError, ExtractResult};

/// A local maximum of a (smoothed) bin sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Bin-center position in data space.
    pub location: f64,
    /// Height in the sequence the peak was found in.
    pub height: f64,
    /// Index of the bin holding the peak.
    pub bin: usize,
}

/// Result of scanning the raw histogram for low-density regions.
///
/// Gaps are evidence of multimodality that smoothing would hide: a gap bin
/// holds under 10% of the uniform expectation, and a sparse bin under 30%
/// while sitting below half of both neighbors (a sharp valley).
#[derive(Debug, Clone)]
pub struct GapAnalysis {
    pub has_significant_gaps: bool,
    /// Gap regions (runs of ≥ 2 gap bins) plus sharp sparse valleys.
    pub gap_count: usize,
    /// Rough mode count implied by the gap structure.
    pub estimated_modes: usize,
    pub gap_bins: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    min: f64,
    bin_width: f64,
    counts: Vec<u32>,
    total: usize,
}

impl Histogram {
    /// Bins `values` into `bin_count` equal-width bins over [min, max].
    ///
    /// A zero-width range is allowed: everything lands in bin 0 and
    /// `bin_width` is 0 (callers treat that as degenerate).
    pub fn from_sample(values: &[f64], bin_count: usize) -> ExtractResult<Self> {
        if values.is_empty() {
            return Err(ExtractError::InvalidInput {
                context: "empty histogram sample",
            });
        }
        if bin_count == 0 {
            return Err(ExtractError::InvalidConfig {
                context: "histogram needs at least 1 bin",
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExtractError::InvalidInput {
                context: "sample value",
            });
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
        }
        let bin_width = (max - min) / bin_count as f64;

        let mut counts = vec![0u32; bin_count];
        if bin_width > 0.0 {
            for &v in values {
                let bin = (((v - min) / bin_width) as usize).min(bin_count - 1);
                counts[bin] += 1;
            }
        } else {
            counts[0] = values.len() as u32;
        }

        Ok(Self {
            min,
            bin_width,
            counts,
            total: values.len(),
        })
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn centers(&self) -> Vec<f64> {
        (0..self.counts.len())
            .map(|i| self.min + (i as f64 + 0.5) * self.bin_width)
            .collect()
    }

    /// Normalized density per bin: counts / (total × bin width), so the
    /// histogram integrates to 1. Degenerate width yields an empty vector.
    pub fn density(&self) -> Vec<f64> {
        if self.bin_width <= 0.0 {
            return Vec::new();
        }
        let norm = self.total as f64 * self.bin_width;
        self.counts.iter().map(|&c| c as f64 / norm).collect()
    }

    /// Gaussian-kernel smoothing with the given bandwidth (in bins).
    /// Kernel radius is 3 bandwidths; edge bins renormalize over the
    /// truncated kernel so mass is preserved.
    pub fn smoothed(&self, bandwidth: f64) -> Vec<f64> {
        let n = self.counts.len();
        let radius = (3.0 * bandwidth).ceil() as usize;
        let mut kernel = Vec::with_capacity(2 * radius + 1);
        let mut kernel_sum = 0.0;
        for i in 0..(2 * radius + 1) {
            let x = i as f64 - radius as f64;
            let w = (-0.5 * (x / bandwidth) * (x / bandwidth)).exp();
            kernel.push(w);
            kernel_sum += w;
        }
        for w in &mut kernel {
            *w /= kernel_sum;
        }

        let mut smoothed = vec![0.0; n];
        for (i, out) in smoothed.iter_mut().enumerate() {
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for (j, &w) in kernel.iter().enumerate() {
                let idx = i as isize + j as isize - radius as isize;
                if idx >= 0 && (idx as usize) < n {
                    sum += self.counts[idx as usize] as f64 * w;
                    weight_sum += w;
                }
            }
            *out = sum / weight_sum;
        }
        smoothed
    }

    /// Scans the **raw** counts for gap structure (see [`GapAnalysis`]).
    pub fn analyze_gaps(&self) -> GapAnalysis {
        let bin_count = self.counts.len();
        let expected_per_bin = self.total as f64 / bin_count as f64;
        let gap_threshold = (expected_per_bin * 0.10).max(1.0);
        let sparse_threshold = expected_per_bin * 0.30;

        let mut gap_bins = Vec::new();
        let mut consecutive = 0usize;
        let mut gap_regions = 0usize;

        for (i, &c) in self.counts.iter().enumerate() {
            if (c as f64) < gap_threshold {
                gap_bins.push(i);
                consecutive += 1;
            } else {
                if consecutive >= 2 {
                    gap_regions += 1;
                }
                consecutive = 0;
            }
        }
        if consecutive >= 2 {
            gap_regions += 1;
        }

        let mut sparse_bins = 0usize;
        for i in 1..bin_count.saturating_sub(1) {
            let c = self.counts[i] as f64;
            if c < sparse_threshold
                && c < self.counts[i - 1] as f64 * 0.5
                && c < self.counts[i + 1] as f64 * 0.5
            {
                sparse_bins += 1;
            }
        }

        GapAnalysis {
            has_significant_gaps: gap_regions > 0 || sparse_bins >= 2,
            gap_count: gap_regions + sparse_bins,
            estimated_modes: (gap_regions + sparse_bins / 2 + 1).max(1),
            gap_bins,
        }
    }
}

/// Finds local maxima of `sequence` at or above
/// `prominence_threshold × max(sequence)`, endpoints included.
pub fn find_peaks(sequence: &[f64], centers: &[f64], prominence_threshold: f64) -> Vec<Peak> {
    let mut peaks = Vec::new();
    if sequence.len() < 2 {
        return peaks;
    }
    let max_value = sequence
        .iter()
        .copied()
        .max_by_key(|&v| OrderedFloat(v))
        .unwrap_or(1.0);
    let threshold = max_value * prominence_threshold;

    for i in 1..sequence.len() - 1 {
        if sequence[i] > sequence[i - 1] && sequence[i] > sequence[i + 1] && sequence[i] >= threshold
        {
            peaks.push(Peak {
                location: centers[i],
                height: sequence[i],
                bin: i,
            });
        }
    }

    if sequence[0] > sequence[1] && sequence[0] >= threshold {
        peaks.push(Peak {
            location: centers[0],
            height: sequence[0],
            bin: 0,
        });
    }
    let last = sequence.len() - 1;
    if sequence[last] > sequence[last - 1] && sequence[last] >= threshold {
        peaks.push(Peak {
            location: centers[last],
            height: sequence[last],
            bin: last,
        });
    }

    peaks
}

/// Finds interior local minima (valleys) of `sequence`.
pub fn find_valleys(sequence: &[f64]) -> Vec<usize> {
    let mut valleys = Vec::new();
    for i in 1..sequence.len().saturating_sub(1) {
        if sequence[i] < sequence[i - 1] && sequence[i] < sequence[i + 1] {
            valleys.push(i);
        }
    }
    valleys
}
