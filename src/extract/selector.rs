//! Best-fit selection over an ordered set of single-distribution fitters.
//!
//! A selector is a plain immutable value: an ordered fitter list plus two
//! policy switches. Named constructors cover the common presets; there is
//! no builder state to carry around.
//!
//! Ranking is deterministic: every fitter runs, results are compared by
//! goodness-of-fit, and ties keep the earlier (more parsimonious) fitter in
//! the configured order. Pearson classification, when enabled, only
//! *reorders* the candidate list — it never rejects a fit.

use crate::error::{ExtractError, ExtractResult};
use crate::extract::composite::{CompositeConfig, CompositeModelFitter};
use crate::extract::fitters::{FitResult, FitterKind};
use crate::extract::modes;
use crate::extract::pearson;
use crate::extract::stats::MomentProfile;
use crate::model::ScalarModel;
use crate::strace;

/// Ordered, immutable fitter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BestFitSelector {
    fitters: Vec<FitterKind>,
    pearson_ordering: bool,
    /// When set, mode detection runs first and multimodal samples delegate
    /// wholly to composite fitting with this many components.
    multimodal_components: Option<usize>,
}

impl Default for BestFitSelector {
    /// General-purpose preset: the common families plus the empirical
    /// fallback, parsimonious first.
    fn default() -> Self {
        Self {
            fitters: vec![
                FitterKind::Normal,
                FitterKind::uniform(),
                FitterKind::Beta,
                FitterKind::Gamma,
                FitterKind::StudentT,
                FitterKind::empirical(),
            ],
            pearson_ordering: false,
            multimodal_components: None,
        }
    }
}

impl BestFitSelector {
    /// Families with bounded (or boundable) support, for data known to live
    /// in a finite range — the component selector of choice for composite
    /// fitting.
    pub fn bounded_data() -> Self {
        Self {
            fitters: vec![
                FitterKind::Normal,
                FitterKind::uniform(),
                FitterKind::Beta,
                FitterKind::empirical(),
            ],
            pearson_ordering: false,
            multimodal_components: None,
        }
    }

    /// Parametric families only — no empirical fallback, so the best
    /// parametric fit wins even when it is mediocre.
    pub fn parametric_only() -> Self {
        Self {
            fitters: vec![
                FitterKind::Normal,
                FitterKind::uniform(),
                FitterKind::Beta,
                FitterKind::Gamma,
                FitterKind::StudentT,
            ],
            pearson_ordering: false,
            multimodal_components: None,
        }
    }

    /// Every Pearson-system family, tried in the order the moment-ratio
    /// classification suggests.
    pub fn pearson_system() -> Self {
        Self {
            fitters: vec![
                FitterKind::Normal,
                FitterKind::uniform(),
                FitterKind::Beta,
                FitterKind::Gamma,
                FitterKind::StudentT,
                FitterKind::InverseGamma,
                FitterKind::BetaPrime,
                FitterKind::PearsonIv,
                FitterKind::empirical(),
            ],
            pearson_ordering: true,
            multimodal_components: None,
        }
    }

    /// Default preset with multimodality awareness: multimodal samples
    /// delegate to [`CompositeModelFitter`] with up to `max_modes`
    /// components, falling back to single-distribution selection when the
    /// composite fitter declines.
    pub fn multimodal(max_modes: usize) -> Self {
        Self {
            multimodal_components: Some(max_modes),
            ..Self::default()
        }
    }

    /// A selector over an explicit fitter list.
    pub fn with_fitters(fitters: Vec<FitterKind>) -> ExtractResult<Self> {
        if fitters.is_empty() {
            return Err(ExtractError::InvalidConfig {
                context: "selector needs at least one fitter",
            });
        }
        Ok(Self {
            fitters,
            pearson_ordering: false,
            multimodal_components: None,
        })
    }

    #[inline]
    pub fn fitters(&self) -> &[FitterKind] {
        &self.fitters
    }

    /// Runs every configured fitter and returns all results in execution
    /// order, including penalized ones — diagnostics see the whole field.
    pub fn fit_all(&self, values: &[f64]) -> ExtractResult<Vec<FitResult>> {
        let profile = MomentProfile::from_values(values)?;
        let order = self.execution_order(&profile);

        let mut results = Vec::with_capacity(order.len());
        for fitter in order {
            results.push(fitter.fit_with(&profile, values)?);
        }
        Ok(results)
    }

    /// Returns the single best fit (see module docs for tie-breaking).
    pub fn select_best_result(&self, values: &[f64]) -> ExtractResult<FitResult> {
        if let Some(max_modes) = self.multimodal_components {
            if let Some(result) = self.try_composite(values, max_modes)? {
                return Ok(result);
            }
        }

        let results = self.fit_all(values)?;
        let best = results
            .into_iter()
            .reduce(|best, candidate| {
                // Strict comparison keeps the earlier fitter on ties.
                if candidate.goodness_of_fit < best.goodness_of_fit {
                    candidate
                } else {
                    best
                }
            })
            .expect("selector always has fitters");
        Ok(best)
    }

    /// Convenience over [`Self::select_best_result`].
    pub fn select_best(&self, values: &[f64]) -> ExtractResult<ScalarModel> {
        Ok(self.select_best_result(values)?.model)
    }

    /// Composite delegation for the multimodal-aware preset. `Ok(None)`
    /// means "fall back to single-distribution fitting".
    fn try_composite(
        &self,
        values: &[f64],
        max_modes: usize,
    ) -> ExtractResult<Option<FitResult>> {
        // A cheap pre-check avoids composite work on obviously unimodal data.
        let detection = modes::detect(values, max_modes)?;
        if !detection.is_multimodal {
            return Ok(None);
        }

        let config = CompositeConfig {
            max_components: max_modes,
            ..CompositeConfig::default()
        };
        let fitter = CompositeModelFitter::with_config(Self::bounded_data(), config);
        match fitter.fit(values) {
            Ok(fit) => Ok(Some(fit.result)),
            Err(
                err @ (ExtractError::NotMultimodal { .. }
                | ExtractError::SparseMode { .. }
                | ExtractError::CdfValidationFailed { .. }),
            ) => {
                strace!("selector: composite declined ({err}), falling back");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// The fitter order actually executed: the configured order, or the
    /// Pearson-suggested families hoisted to the front when enabled.
    fn execution_order(&self, profile: &MomentProfile) -> Vec<FitterKind> {
        if !self.pearson_ordering {
            return self.fitters.clone();
        }

        let classification = pearson::classify_detailed(profile.skewness, profile.kurtosis);
        strace!(
            "selector: pearson type {:?} (κ={:.4})",
            classification.pearson_type,
            classification.kappa
        );

        let suggested = classification.pearson_type.suggested_fitters();
        let mut order: Vec<FitterKind> = Vec::with_capacity(self.fitters.len());
        for s in suggested {
            if let Some(k) = self.fitters.iter().find(|f| f.name() == s.name()) {
                order.push(*k);
            }
        }
        for f in &self.fitters {
            if !order.iter().any(|k| k.name() == f.name()) {
                order.push(*f);
            }
        }
        order
    }
}
