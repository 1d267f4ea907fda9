//! Multimodality detection over one-dimensional samples.
//!
//! # Algorithm
//! 1. Histogram at an adaptive fixed bin count (max of Scott's and
//!    Freedman–Diaconis rules, at least 5 bins per expected mode, clamped
//!    to [15, 200]).
//! 2. Gaussian-kernel smoothing, bandwidth scaled down as the expected mode
//!    count grows.
//! 3. Local-maximum search filtered by prominence, minimum separation
//!    (range / 3·max_modes) and a valley-depth test between neighbors.
//! 4. A dip statistic — the largest deviation of the empirical CDF from the
//!    straight-line (uniform) CDF over the sample range — arbitrates:
//!    dip > 0.05 confirms multimodality outright, and a prominent secondary
//!    peak with dip > 0.03 confirms it structurally.
//!
//! [`detect_adaptive`] reruns detection at increasing resolution while the
//! result looks like merged peaks (high dip, few modes), additionally using
//! raw-histogram gap structure as evidence. Both entry points share the
//! same core, so their multimodal/unimodal verdicts agree on unambiguous
//! inputs.
//!
//! # Edge cases
//! - Samples shorter than 10 are invalid input.
//! - Zero range or coefficient of variation below 1% → unimodal.

use ordered_float::OrderedFloat;

use crate::error::{ExtractError, ExtractResult};
use crate::extract::histogram::{find_peaks, GapAnalysis, Histogram, Peak};
use crate::strace;

/// Hard cap on detectable modes.
pub const MAX_MODES: usize = 10;

/// Dip statistic above which multimodality is confirmed outright.
pub const DIP_MULTIMODAL_THRESHOLD: f64 = 0.05;

const DEFAULT_PROMINENCE: f64 = 0.05;
const DEFAULT_BANDWIDTH: f64 = 2.0;
const MIN_BINS_PER_MODE: usize = 5;
const MIN_SAMPLE: usize = 10;

/// Result of mode detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDetection {
    /// Number of retained modes; equals `peak_locations.len()`.
    pub mode_count: usize,
    /// Peak positions in data space, ascending.
    pub peak_locations: Vec<f64>,
    /// Peak heights normalized so the tallest is 1.
    pub peak_heights: Vec<f64>,
    /// Fraction of the sample nearest to each peak; sums to 1.
    pub mode_weights: Vec<f64>,
    /// Dip statistic in [0, 1]; larger = stronger multimodality evidence.
    pub dip_statistic: f64,
    pub is_multimodal: bool,
}

impl ModeDetection {
    fn unimodal(location: f64, dip: f64) -> Self {
        Self {
            mode_count: 1,
            peak_locations: vec![location],
            peak_heights: vec![1.0],
            mode_weights: vec![1.0],
            dip_statistic: dip,
            is_multimodal: false,
        }
    }
}

/// Detects modes with default prominence and smoothing.
pub fn detect(values: &[f64], max_modes: usize) -> ExtractResult<ModeDetection> {
    detect_with(values, max_modes, DEFAULT_PROMINENCE, DEFAULT_BANDWIDTH)
}

/// Detects modes with explicit prominence threshold and smoothing bandwidth
/// (in bins).
pub fn detect_with(
    values: &[f64],
    max_modes: usize,
    prominence: f64,
    bandwidth: f64,
) -> ExtractResult<ModeDetection> {
    let sorted = validated_sorted(values)?;
    let max_modes = max_modes.clamp(1, MAX_MODES);
    let bins = adaptive_bin_count(values.len(), max_modes, &sorted);
    detect_core(values, &sorted, max_modes, bins, prominence, bandwidth, false)
}

/// Detects modes with resolution refinement.
///
/// Starts at the base adaptive bin count and raises resolution by 50% while
/// the current result looks like merged peaks, accepting early when the
/// mode count stabilizes. Gap structure in the raw histogram contributes
/// evidence at every resolution, which keeps narrow, tightly-packed modes
/// from being washed out.
pub fn detect_adaptive(values: &[f64], max_modes: usize) -> ExtractResult<ModeDetection> {
    let sorted = validated_sorted(values)?;
    let max_modes = max_modes.clamp(1, MAX_MODES);

    let base_bins = adaptive_bin_count(values.len(), max_modes, &sorted);
    let max_bins = 500.min((base_bins * 4).max(values.len() / 10));

    let mut best: Option<ModeDetection> = None;
    let mut best_count = 0usize;
    let mut current_bins = base_bins;
    let mut stalled = 0u32;
    let mut previous_count: Option<usize> = None;
    let mut stable = 0u32;

    while current_bins <= max_bins && stalled < 3 {
        let result = detect_core(
            values,
            &sorted,
            max_modes,
            current_bins,
            DEFAULT_PROMINENCE,
            DEFAULT_BANDWIDTH,
            true,
        )?;
        strace!(
            "detect_adaptive: bins={} modes={} dip={:.4}",
            current_bins,
            result.mode_count,
            result.dip_statistic
        );

        if previous_count == Some(result.mode_count) {
            stable += 1;
            if stable >= 2 && result.mode_count >= 2 {
                return Ok(result);
            }
        } else {
            stable = 0;
            previous_count = Some(result.mode_count);
        }

        if result.mode_count > best_count {
            best_count = result.mode_count;
            best = Some(result.clone());
            stalled = 0;
        } else {
            stalled += 1;
        }

        if best_count >= max_modes || !might_have_merged_peaks(&result, max_modes) {
            break;
        }

        current_bins = (current_bins as f64 * 1.5) as usize;
    }

    Ok(best.unwrap_or_else(|| {
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        ModeDetection::unimodal(mean, dip_statistic(&sorted))
    }))
}

/// Dip statistic of a sorted sample: the largest deviation between the
/// empirical CDF and the straight-line CDF over [min, max]. A numerically
/// light stand-in for the classical Hartigan dip; uniform data scores
/// around 1/(2√n), clearly separated modes score far higher.
pub fn dip_statistic(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n < 4 {
        return 0.0;
    }
    let min = sorted[0];
    let max = sorted[n - 1];
    let range = max - min;
    if range <= 0.0 {
        return 0.0;
    }

    let mut max_dip = 0.0f64;
    for (i, &x) in sorted.iter().enumerate() {
        let ecdf = (i + 1) as f64 / n as f64;
        let straight = (x - min) / range;
        max_dip = max_dip.max((ecdf - straight).abs());
    }
    max_dip
}

/* =============================================================================
 * Core detection at one resolution
 * ============================================================================= */

fn validated_sorted(values: &[f64]) -> ExtractResult<Vec<f64>> {
    if values.len() < MIN_SAMPLE {
        return Err(ExtractError::InvalidInput {
            context: "mode detection needs at least 10 points",
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ExtractError::InvalidInput {
            context: "sample value",
        });
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

fn detect_core(
    values: &[f64],
    sorted: &[f64],
    max_modes: usize,
    bin_count: usize,
    prominence: f64,
    bandwidth: f64,
    gap_evidence: bool,
) -> ExtractResult<ModeDetection> {
    let n = sorted.len();
    let dip = dip_statistic(sorted);
    let min = sorted[0];
    let max = sorted[n - 1];
    let range = max - min;

    if range <= 0.0 {
        return Ok(ModeDetection::unimodal(min, dip));
    }

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let cov = if mean != 0.0 { range / mean.abs() } else { range };
    if cov < 0.01 {
        // Effectively constant data.
        return Ok(ModeDetection::unimodal(mean, dip));
    }

    let hist = Histogram::from_sample(values, bin_count)?;
    let centers = hist.centers();
    let gaps = gap_evidence.then(|| hist.analyze_gaps());

    let mut bw = adaptive_bandwidth(bandwidth, max_modes, bin_count);
    if let Some(g) = &gaps {
        if bin_count > 100 {
            bw *= 0.7;
        }
        // Gaps are structure that smoothing would erase.
        if g.has_significant_gaps {
            bw = bw.min(0.5);
        }
        bw = bw.max(0.3);
    }
    let smoothed = hist.smoothed(bw);

    let adaptive_prom = adaptive_prominence(prominence, max_modes);
    let mut peaks = find_peaks(&smoothed, &centers, adaptive_prom);
    if peaks.is_empty() {
        return Ok(ModeDetection::unimodal(mean, dip));
    }

    let min_separation = range / (max_modes as f64 * 3.0);
    peaks = filter_peaks_by_separation(peaks, &smoothed, min_separation, max_modes);
    if peaks.is_empty() {
        return Ok(ModeDetection::unimodal(mean, dip));
    }

    peaks.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.height)));
    let mode_count = peaks.len().min(max_modes);

    let dip_confirms = dip > DIP_MULTIMODAL_THRESHOLD;
    let secondary = secondary_peak_threshold(max_modes);
    let peaks_prominent =
        peaks.len() >= 2 && peaks[1].height >= peaks[0].height * secondary;
    let gaps_confirm = gaps
        .as_ref()
        .map(|g| g.has_significant_gaps && g.gap_count >= 2)
        .unwrap_or(false);

    // The dip > 0.03 floor keeps uniform data (low dip, random bin wiggle)
    // from being classified as multimodal.
    let structural = peaks_prominent && dip > 0.03 && (!gap_evidence || gaps_confirm);
    let confirmed = dip_confirms || structural;

    if mode_count == 1 || !confirmed {
        if let Some(g) = &gaps {
            let strong_gap_evidence = gaps_confirm && g.gap_count >= 3 && dip > 0.03;
            if strong_gap_evidence && g.estimated_modes > 1 {
                strace!("detect: falling back to gap-based mode estimate");
                return Ok(estimate_modes_from_gaps(
                    &hist,
                    &centers,
                    g,
                    values,
                    dip.max(0.1),
                ));
            }
        }
        return Ok(ModeDetection::unimodal(peaks[0].location, dip));
    }

    let mut top: Vec<Peak> = peaks[..mode_count].to_vec();
    top.sort_by_key(|p| OrderedFloat(p.location));

    let peak_locations: Vec<f64> = top.iter().map(|p| p.location).collect();
    let max_height = top
        .iter()
        .map(|p| p.height)
        .max_by_key(|&h| OrderedFloat(h))
        .unwrap_or(1.0);
    let peak_heights: Vec<f64> = top.iter().map(|p| p.height / max_height).collect();
    let mode_weights = estimate_mode_weights(values, &peak_locations);

    Ok(ModeDetection {
        mode_count,
        peak_locations,
        peak_heights,
        mode_weights,
        dip_statistic: dip,
        is_multimodal: true,
    })
}

/// Whether the current result might hide merged peaks that higher
/// resolution could split.
fn might_have_merged_peaks(result: &ModeDetection, max_modes: usize) -> bool {
    // Two or more modes with moderate dip: the data is adequately explained.
    if result.mode_count >= 2 && result.dip_statistic < 0.12 {
        return false;
    }
    let split_threshold = 3.min((max_modes / 4).max(2));

    // A lone mode with a moderate dip is the most likely merge.
    if result.mode_count == 1 && result.dip_statistic > 0.06 {
        return true;
    }
    result.mode_count < split_threshold && result.dip_statistic > 0.10
}

/// Merges peaks closer than `min_separation` and requires a real valley
/// between survivors, keeping the taller peak on every merge.
fn filter_peaks_by_separation(
    peaks: Vec<Peak>,
    smoothed: &[f64],
    min_separation: f64,
    max_modes: usize,
) -> Vec<Peak> {
    if peaks.len() <= 1 {
        return peaks;
    }

    let mut sorted = peaks;
    sorted.sort_by_key(|p| OrderedFloat(p.location));

    let mut filtered = Vec::new();
    let mut current = sorted[0];

    for &next in &sorted[1..] {
        let separation = next.location - current.location;
        if separation < min_separation {
            if next.height > current.height {
                current = next;
            }
        } else if has_significant_valley(&current, &next, smoothed, max_modes) {
            filtered.push(current);
            current = next;
        } else if next.height > current.height {
            current = next;
        }
    }
    filtered.push(current);
    filtered
}

fn has_significant_valley(p1: &Peak, p2: &Peak, smoothed: &[f64], max_modes: usize) -> bool {
    let start = p1.bin;
    let end = p2.bin;
    if end <= start + 1 {
        return false; // Adjacent bins, no room for a valley.
    }

    let mut min_valley = f64::MAX;
    for &v in smoothed.iter().take(end.min(smoothed.len())).skip(start + 1) {
        min_valley = min_valley.min(v);
    }

    let valley_ratio = if max_modes <= 3 { 0.90 } else { 0.92 };
    min_valley < p1.height.min(p2.height) * valley_ratio
}

/// Scott's and Freedman–Diaconis rules, whichever is finer, with a floor of
/// 5 bins per expected mode.
fn adaptive_bin_count(n: usize, max_modes: usize, sorted: &[f64]) -> usize {
    let nf = n as f64;
    let mean = sorted.iter().sum::<f64>() / nf;
    let variance = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / nf;
    let std_dev = variance.sqrt();
    let range = sorted[n - 1] - sorted[0];

    if range <= 0.0 || std_dev <= 0.0 {
        return 20;
    }

    let scott_width = 3.49 * std_dev * nf.powf(-1.0 / 3.0);
    let scott_bins = (range / scott_width).ceil() as usize;

    let iqr = sorted[3 * n / 4] - sorted[n / 4];
    let fd_bins = if iqr > 0.0 {
        let fd_width = 2.0 * iqr * nf.powf(-1.0 / 3.0);
        (range / fd_width).ceil() as usize
    } else {
        scott_bins
    };

    let base = scott_bins.max(fd_bins);
    base.max(max_modes * MIN_BINS_PER_MODE).clamp(15, 200)
}

/// Less smoothing as the expected mode count grows, so closely-spaced
/// peaks survive.
fn adaptive_bandwidth(base: f64, max_modes: usize, bin_count: usize) -> f64 {
    if max_modes <= 3 {
        return base;
    }
    let mut reduction = (1.0 - (max_modes as f64 - 3.0) * 0.10).max(0.30);
    if (bin_count as f64 / max_modes as f64) < 5.0 {
        reduction *= 0.5;
    }
    (base * reduction).max(0.3)
}

/// Lower prominence as mode count grows: ten equal modes leave each peak at
/// ~10% of the maximum. Floor of 3% keeps noise out.
fn adaptive_prominence(base: f64, max_modes: usize) -> f64 {
    if max_modes <= 3 {
        return base;
    }
    (base * 3.0 / max_modes as f64).max(0.03)
}

fn secondary_peak_threshold(max_modes: usize) -> f64 {
    match max_modes {
        0..=2 => 0.20,
        3..=4 => 0.15,
        5..=6 => 0.10,
        _ => 0.05,
    }
}

/// Nearest-peak assignment; ties go to the lower peak index.
fn estimate_mode_weights(values: &[f64], peak_locations: &[f64]) -> Vec<f64> {
    let mut counts = vec![0usize; peak_locations.len()];
    for &v in values {
        let mut nearest = 0;
        let mut min_dist = (v - peak_locations[0]).abs();
        for (i, &loc) in peak_locations.iter().enumerate().skip(1) {
            let dist = (v - loc).abs();
            if dist < min_dist {
                min_dist = dist;
                nearest = i;
            }
        }
        counts[nearest] += 1;
    }
    counts
        .iter()
        .map(|&c| c as f64 / values.len() as f64)
        .collect()
}

/// Builds a mode estimate from contiguous non-gap regions when the smoothed
/// histogram shows no distinct peaks but the raw one has clear holes.
fn estimate_modes_from_gaps(
    hist: &Histogram,
    centers: &[f64],
    gaps: &GapAnalysis,
    values: &[f64],
    dip: f64,
) -> ModeDetection {
    let counts = hist.counts();
    let bin_count = counts.len();

    // (peak location, total mass) per contiguous non-gap region.
    let mut regions: Vec<(f64, f64)> = Vec::new();
    let mut region_start: Option<usize> = None;
    let mut region_max_bin = 0usize;
    let mut region_max_count = 0u32;
    let mut region_total = 0u64;

    for i in 0..bin_count {
        let is_gap = counts[i] == 0 || gaps.gap_bins.contains(&i);
        if !is_gap {
            if region_start.is_none() {
                region_start = Some(i);
                region_max_bin = i;
                region_max_count = counts[i];
                region_total = counts[i] as u64;
            } else {
                region_total += counts[i] as u64;
                if counts[i] > region_max_count {
                    region_max_count = counts[i];
                    region_max_bin = i;
                }
            }
        } else if region_start.is_some() {
            regions.push((centers[region_max_bin], region_total as f64));
            region_start = None;
            region_total = 0;
            region_max_count = 0;
        }
    }
    if region_start.is_some() {
        regions.push((centers[region_max_bin], region_total as f64));
    }

    if regions.is_empty() {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        return ModeDetection::unimodal(mean, dip);
    }

    let total: f64 = regions.iter().map(|r| r.1).sum();
    let max_mass = regions
        .iter()
        .map(|r| r.1)
        .max_by_key(|&m| OrderedFloat(m))
        .unwrap_or(1.0);

    let mode_count = regions.len();
    ModeDetection {
        mode_count,
        peak_locations: regions.iter().map(|r| r.0).collect(),
        peak_heights: regions.iter().map(|r| r.1 / max_mass).collect(),
        mode_weights: regions.iter().map(|r| r.1 / total).collect(),
        dip_statistic: dip,
        is_multimodal: mode_count > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefit_testdata::{gen_dataset, DistKind};

    #[test]
    fn rejects_small_samples() {
        let v = vec![1.0; 9];
        assert!(matches!(
            detect(&v, 3),
            Err(ExtractError::InvalidInput { .. })
        ));
    }

    #[test]
    fn unimodal_normal_is_unimodal() {
        let values = gen_dataset(DistKind::Normal { mean: 0.0, std_dev: 1.0 }, 5_000, 7);
        let r = detect(&values, 5).unwrap();
        assert!(!r.is_multimodal, "dip={}", r.dip_statistic);
        assert_eq!(r.mode_count, 1);
    }

    #[test]
    fn uniform_is_unimodal_despite_flatness() {
        let values = gen_dataset(DistKind::Uniform { lower: 0.0, upper: 1.0 }, 5_000, 7);
        let r = detect(&values, 5).unwrap();
        assert!(!r.is_multimodal, "dip={}", r.dip_statistic);
    }

    #[test]
    fn constant_sample_is_unimodal() {
        let values = vec![4.2; 200];
        let r = detect(&values, 5).unwrap();
        assert!(!r.is_multimodal);
        assert!((r.peak_locations[0] - 4.2).abs() < 1e-9);
        assert_eq!(r.dip_statistic, 0.0);
    }

    #[test]
    fn bimodal_split_detected_with_locations() {
        // Spec scenario: 50/50 N(-2, 0.5) and N(2, 0.5).
        let values = gen_dataset(
            DistKind::Bimodal {
                centers: (-2.0, 2.0),
                std_dev: 0.5,
            },
            10_000,
            42,
        );
        let r = detect(&values, 3).unwrap();
        assert!(r.is_multimodal, "dip={}", r.dip_statistic);
        assert_eq!(r.mode_count, 2);
        assert!((r.peak_locations[0] + 2.0).abs() < 0.5, "{:?}", r.peak_locations);
        assert!((r.peak_locations[1] - 2.0).abs() < 0.5, "{:?}", r.peak_locations);
        // Roughly even split.
        assert!((r.mode_weights[0] - 0.5).abs() < 0.1);
        let sum: f64 = r.mode_weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn adaptive_and_plain_agree_on_three_separated_modes() {
        // ≥ 3σ-combined separation, equal weights: unambiguous.
        let values = gen_dataset(DistKind::TriModal { spread: 5.0 }, 12_000, 11);
        let plain = detect(&values, 5).unwrap();
        let adaptive = detect_adaptive(&values, 5).unwrap();
        assert!(plain.is_multimodal, "plain dip={}", plain.dip_statistic);
        assert!(adaptive.is_multimodal, "adaptive dip={}", adaptive.dip_statistic);
        assert_eq!(plain.is_multimodal, adaptive.is_multimodal);
        assert!(plain.mode_count >= 3);
        assert!(adaptive.mode_count >= 3);
    }

    #[test]
    fn dip_statistic_ranks_structure() {
        let uniform = gen_dataset(DistKind::Uniform { lower: 0.0, upper: 1.0 }, 4_000, 3);
        let bimodal = gen_dataset(
            DistKind::Bimodal {
                centers: (0.0, 8.0),
                std_dev: 0.5,
            },
            4_000,
            3,
        );
        let mut u = uniform.clone();
        u.sort_by(|a, b| a.total_cmp(b));
        let mut b = bimodal.clone();
        b.sort_by(|a, b| a.total_cmp(b));
        assert!(dip_statistic(&b) > dip_statistic(&u) * 3.0);
        assert!((0.0..=1.0).contains(&dip_statistic(&b)));
    }

    #[test]
    fn max_modes_caps_the_result() {
        let values = gen_dataset(DistKind::TriModal { spread: 5.0 }, 9_000, 5);
        let r = detect(&values, 2).unwrap();
        assert!(r.mode_count <= 2);
        assert_eq!(r.mode_count, r.peak_locations.len());
    }

    #[test]
    fn weights_use_lower_index_on_ties() {
        let weights = estimate_mode_weights(&[0.5], &[0.0, 1.0]);
        // 0.5 is equidistant; lower index wins.
        assert_eq!(weights, vec![1.0, 0.0]);
    }
}
