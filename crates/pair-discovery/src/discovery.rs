//! Pairwise cointegration scan over a price panel.
//!
//! Every unordered pair is tested once, with the earlier panel symbol as the
//! dependent leg. The scan is O(n²) Engle-Granger tests for n instruments,
//! each O(T) in series length; this quadratic growth is the scaling limit of
//! the whole pipeline. Parallel mode spreads the tests over the rayon pool
//! but does not change the asymptotics.

use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;
use statarb_core::config::{DiscoveryConfig, Strictness};
use statarb_core::{Error, PairCandidate, PairKey, PairMatrix, PricePanel, Result, Stage};
use tracing::{debug, info, warn};

use crate::coint::CointegrationTest;

/// A pair excluded because its test could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairFailure {
    pub pair: PairKey,
    pub message: String,
}

/// A pair with a significant residual test that failed the strictness level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredPair {
    pub candidate: PairCandidate,
    pub reason: String,
}

/// Output of [`PairDiscovery::find_cointegrated_pairs`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryResult {
    /// Panel symbols in panel order.
    pub symbols: Vec<String>,
    /// Engle-Granger statistic per tested pair.
    pub scores: PairMatrix,
    /// MacKinnon p-value per tested pair.
    pub pvalues: PairMatrix,
    /// Significant pairs, strongest first.
    pub pairs: Vec<PairCandidate>,
    pub failures: Vec<PairFailure>,
    pub filtered: Vec<FilteredPair>,
}

impl DiscoveryResult {
    pub fn best(&self) -> Option<&PairCandidate> {
        self.pairs.first()
    }

    pub fn tested(&self) -> usize {
        self.pvalues.len()
    }
}

enum PairOutcome {
    Tested(PairCandidate),
    Failed(PairFailure),
}

#[derive(Debug)]
pub struct PairDiscovery {
    config: DiscoveryConfig,
    test: CointegrationTest,
}

impl PairDiscovery {
    /// Validates the configuration before any computation.
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        config.validate()?;
        let test = CointegrationTest::new(config.lag_selection);
        Ok(Self { config, test })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn find_cointegrated_pairs(&self, panel: &PricePanel) -> Result<DiscoveryResult> {
        let symbols: Vec<String> = panel.symbols().into_iter().map(String::from).collect();

        if panel.len() < 2 {
            info!(instruments = panel.len(), "Fewer than two instruments, nothing to pair");
            return Ok(DiscoveryResult {
                symbols,
                ..Default::default()
            });
        }

        if let Some(constant) = panel.series().iter().find(|s| s.is_constant()) {
            return Err(Error::data_quality(
                Stage::PairDiscovery,
                format!("{} has zero variance", constant.symbol()),
            ));
        }

        let index_pairs: Vec<(usize, usize)> = (0..panel.len())
            .flat_map(|i| (i + 1..panel.len()).map(move |j| (i, j)))
            .collect();

        info!(
            instruments = panel.len(),
            pairs = index_pairs.len(),
            observations = panel.observations(),
            parallel = self.config.parallel,
            "Scanning for cointegrated pairs"
        );

        let outcomes: Vec<PairOutcome> = if self.config.parallel {
            index_pairs
                .par_iter()
                .map(|&(i, j)| self.evaluate(panel, i, j))
                .collect()
        } else {
            index_pairs
                .iter()
                .map(|&(i, j)| self.evaluate(panel, i, j))
                .collect()
        };

        let leg_pvalues = if self.config.strictness.requires_integrated_legs() {
            self.leg_unit_root_pvalues(panel)
        } else {
            HashMap::new()
        };

        let mut result = DiscoveryResult {
            symbols,
            ..Default::default()
        };

        for outcome in outcomes {
            let candidate = match outcome {
                PairOutcome::Tested(candidate) => candidate,
                PairOutcome::Failed(failure) => {
                    warn!(pair = %failure.pair, error = %failure.message, "Excluding pair");
                    result.failures.push(failure);
                    continue;
                }
            };

            let key = candidate.key();
            result.scores.insert(&key, candidate.test_statistic);
            result.pvalues.insert(&key, candidate.p_value);

            if !candidate.is_significant(self.config.significance) {
                continue;
            }
            match self.strictness_rejection(&candidate, &leg_pvalues) {
                Some(reason) => {
                    debug!(pair = %key, reason = %reason, "Filtered significant pair");
                    result.filtered.push(FilteredPair { candidate, reason });
                }
                None => result.pairs.push(candidate),
            }
        }

        result.pairs.sort_by(rank);
        result.filtered.sort_by(|a, b| rank(&a.candidate, &b.candidate));

        info!(
            tested = result.tested(),
            significant = result.pairs.len(),
            filtered = result.filtered.len(),
            failed = result.failures.len(),
            "Pair discovery complete"
        );

        Ok(result)
    }

    fn evaluate(&self, panel: &PricePanel, i: usize, j: usize) -> PairOutcome {
        let dependent = &panel.series()[i];
        let independent = &panel.series()[j];
        let key = PairKey::new(dependent.symbol(), independent.symbol());

        match self.test.engle_granger(dependent.prices(), independent.prices()) {
            Ok(eg) => {
                debug!(
                    pair = %key,
                    statistic = eg.statistic,
                    p_value = eg.p_value,
                    lags = eg.adf_lags,
                    "Tested pair"
                );
                PairOutcome::Tested(PairCandidate {
                    symbol_a: key.first,
                    symbol_b: key.second,
                    test_statistic: eg.statistic,
                    p_value: eg.p_value,
                    critical_values: eg.critical_values,
                    adf_lags: eg.adf_lags,
                    nobs: eg.nobs,
                    hedge_ratio: eg.hedge_ratio,
                })
            }
            Err(e) => PairOutcome::Failed(PairFailure {
                message: e.for_pair(key.clone()).to_string(),
                pair: key,
            }),
        }
    }

    fn leg_unit_root_pvalues(&self, panel: &PricePanel) -> HashMap<String, std::result::Result<f64, String>> {
        panel
            .series()
            .iter()
            .map(|s| {
                let p = self
                    .test
                    .unit_root_p_value(s.prices())
                    .map_err(|e| e.to_string());
                (s.symbol().to_string(), p)
            })
            .collect()
    }

    fn strictness_rejection(
        &self,
        candidate: &PairCandidate,
        leg_pvalues: &HashMap<String, std::result::Result<f64, String>>,
    ) -> Option<String> {
        if let Some(min_samples) = self.config.strictness.min_samples() {
            if candidate.nobs < min_samples {
                return Some(format!(
                    "{} observations below minimum {min_samples}",
                    candidate.nobs
                ));
            }
        }
        if let Strictness::Strict { .. } = self.config.strictness {
            for symbol in [&candidate.symbol_a, &candidate.symbol_b] {
                match leg_pvalues.get(symbol.as_str()) {
                    Some(Ok(p)) if *p < self.config.significance => {
                        return Some(format!(
                            "{symbol} is stationary on its own (unit-root p-value {p:.4})"
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(message)) => {
                        return Some(format!("{symbol} unit-root test failed: {message}"));
                    }
                    None => return Some(format!("{symbol} missing unit-root test")),
                }
            }
        }
        None
    }
}

fn rank(a: &PairCandidate, b: &PairCandidate) -> Ordering {
    a.p_value
        .total_cmp(&b.p_value)
        .then_with(|| a.key().cmp(&b.key()))
}

/// Scan `panel` with default settings at the given significance level.
pub fn find_cointegrated_pairs(panel: &PricePanel, significance: f64) -> Result<DiscoveryResult> {
    PairDiscovery::new(DiscoveryConfig {
        significance,
        ..Default::default()
    })?
    .find_cointegrated_pairs(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use statarb_core::PriceSeries;

    fn walk(rng: &mut StdRng, n: usize, start: f64) -> Vec<f64> {
        let mut level = start;
        (0..n)
            .map(|_| {
                level += rng.gen_range(-1.0..1.0);
                level
            })
            .collect()
    }

    /// A and B cointegrated, C an independent walk.
    fn panel(n: usize, seed: u64) -> PricePanel {
        let mut rng = StdRng::seed_from_u64(seed);
        let b = walk(&mut rng, n, 100.0);
        let a: Vec<f64> = b
            .iter()
            .map(|v| 2.0 * v + 5.0 + rng.gen_range(-1.0..1.0))
            .collect();
        let c = walk(&mut rng, n, 50.0);
        PricePanel::new(vec![
            PriceSeries::from_values("A", a).unwrap(),
            PriceSeries::from_values("B", b).unwrap(),
            PriceSeries::from_values("C", c).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_finds_cointegrated_pair_first() {
        let result = find_cointegrated_pairs(&panel(500, 21), 0.05).unwrap();
        let best = result.best().unwrap();
        assert_eq!((best.symbol_a.as_str(), best.symbol_b.as_str()), ("A", "B"));
        assert!(best.p_value < 0.01);
        assert_eq!(result.tested(), 3);
        assert!(result.pairs.windows(2).all(|w| w[0].p_value <= w[1].p_value));
    }

    #[test]
    fn test_matrices_are_keyed_symmetrically() {
        let result = find_cointegrated_pairs(&panel(300, 22), 0.05).unwrap();
        for (a, b) in [("A", "B"), ("A", "C"), ("B", "C")] {
            assert_eq!(result.pvalues.get(a, b), result.pvalues.get(b, a));
            assert!(result.scores.get(a, b).is_some());
        }
        assert_eq!(result.pvalues.get("A", "A"), None);
    }

    #[test]
    fn test_each_pair_reported_once() {
        let result = find_cointegrated_pairs(&panel(400, 23), 0.5).unwrap();
        let mut keys: Vec<PairKey> = result.pairs.iter().map(|p| p.key().unordered()).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_single_instrument_is_empty_not_error() {
        let series = PriceSeries::from_values("A", vec![1.0, 2.0, 3.0]).unwrap();
        let panel = PricePanel::new(vec![series]).unwrap();
        let result = find_cointegrated_pairs(&panel, 0.05).unwrap();
        assert!(result.pairs.is_empty());
        assert!(result.scores.is_empty());
        assert!(result.pvalues.is_empty());
        assert_eq!(result.symbols, vec!["A"]);
    }

    #[test]
    fn test_constant_series_is_data_quality_error() {
        let a = PriceSeries::from_values("A", vec![1.0, 2.0, 1.5, 2.5]).unwrap();
        let b = PriceSeries::from_values("B", vec![3.0; 4]).unwrap();
        let panel = PricePanel::new(vec![a, b]).unwrap();
        let err = find_cointegrated_pairs(&panel, 0.05).unwrap_err();
        assert!(err.is_data_quality());
    }

    #[test]
    fn test_model_fit_failure_does_not_abort_scan() {
        let mut rng = StdRng::seed_from_u64(24);
        let b = walk(&mut rng, 200, 100.0);
        let a: Vec<f64> = b.iter().map(|v| 3.0 * v + 1.0).collect();
        let c = walk(&mut rng, 200, 80.0);
        let panel = PricePanel::new(vec![
            PriceSeries::from_values("A", a).unwrap(),
            PriceSeries::from_values("B", b).unwrap(),
            PriceSeries::from_values("C", c).unwrap(),
        ])
        .unwrap();

        let result = find_cointegrated_pairs(&panel, 0.05).unwrap();
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].pair, PairKey::new("A", "B"));
        assert_eq!(result.pvalues.get("A", "B"), None);
        assert_eq!(result.tested(), 2);
    }

    #[test]
    fn test_result_serializes_keyed_matrices() {
        let result = find_cointegrated_pairs(&panel(200, 29), 0.05).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["symbols"], serde_json::json!(["A", "B", "C"]));
        assert_eq!(json["pvalues"].as_array().map(|m| m.len()), Some(3));
        assert!(json["pvalues"][0]["symbol_a"].is_string());
        assert_eq!(json["pairs"][0]["symbol_a"], "A");
    }

    #[test]
    fn test_invalid_significance_rejected() {
        let err = find_cointegrated_pairs(&panel(50, 25), 0.9).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let panel = panel(300, 26);
        let serial = PairDiscovery::new(DiscoveryConfig {
            parallel: false,
            ..Default::default()
        })
        .unwrap()
        .find_cointegrated_pairs(&panel)
        .unwrap();
        let parallel = PairDiscovery::new(DiscoveryConfig::default())
            .unwrap()
            .find_cointegrated_pairs(&panel)
            .unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_min_samples_filters_short_panels() {
        let discovery = PairDiscovery::new(DiscoveryConfig {
            strictness: Strictness::MinSamples { min_samples: 1000 },
            ..Default::default()
        })
        .unwrap();
        let result = discovery.find_cointegrated_pairs(&panel(300, 27)).unwrap();
        assert!(result.pairs.is_empty());
        assert!(result
            .filtered
            .iter()
            .any(|f| f.candidate.key() == PairKey::new("A", "B")));
    }

    #[test]
    fn test_strict_mode_rejects_stationary_legs() {
        let mut rng = StdRng::seed_from_u64(28);
        let b: Vec<f64> = (0..300).map(|_| 100.0 + rng.gen_range(-1.0..1.0)).collect();
        let a: Vec<f64> = b
            .iter()
            .map(|v| 2.0 * v + rng.gen_range(-1.0..1.0))
            .collect();
        let panel = PricePanel::new(vec![
            PriceSeries::from_values("A", a).unwrap(),
            PriceSeries::from_values("B", b).unwrap(),
        ])
        .unwrap();

        let residual_only = find_cointegrated_pairs(&panel, 0.05).unwrap();
        assert_eq!(residual_only.pairs.len(), 1);

        let strict = PairDiscovery::new(DiscoveryConfig {
            strictness: Strictness::Strict { min_samples: 100 },
            ..Default::default()
        })
        .unwrap()
        .find_cointegrated_pairs(&panel)
        .unwrap();
        assert!(strict.pairs.is_empty());
        assert_eq!(strict.filtered.len(), 1);
        assert!(strict.filtered[0].reason.contains("stationary"));
    }
}
