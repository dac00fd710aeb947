//! Static OLS spread model for a single pair.
//!
//! The fit uses the whole window it is given. Avoiding look-ahead is the
//! caller's job: fit on a training panel and [`SpreadModelResult::apply`]
//! the coefficients to later data.

use serde::{Deserialize, Serialize};
use statarb_core::stats::{self, fit_with_intercept};
use statarb_core::{Error, PairKey, PriceSeries, Result, Stage};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadModelResult {
    pub dependent_symbol: String,
    pub independent_symbol: String,
    /// Units of the independent leg per unit of the dependent leg.
    pub hedge_ratio: f64,
    pub intercept: f64,
    /// `dependent[t] - (intercept + hedge_ratio * independent[t])`.
    pub spread: Vec<f64>,
    pub r_squared: f64,
    pub spread_mean: f64,
    /// Sample standard deviation of the spread.
    pub spread_std: f64,
    /// AR(1) half-life in periods; `None` if the spread is not mean-reverting.
    pub half_life: Option<f64>,
}

impl SpreadModelResult {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.dependent_symbol.clone(), self.independent_symbol.clone())
    }

    /// Spread of new observations under the fitted coefficients.
    pub fn apply(&self, dependent: &PriceSeries, independent: &PriceSeries) -> Result<Vec<f64>> {
        check_alignment(dependent, independent)?;
        Ok(dependent
            .prices()
            .iter()
            .zip(independent.prices())
            .map(|(y, x)| y - (self.intercept + self.hedge_ratio * x))
            .collect())
    }
}

fn check_alignment(dependent: &PriceSeries, independent: &PriceSeries) -> Result<()> {
    if dependent.len() != independent.len() {
        return Err(Error::data_quality(
            Stage::SpreadModel,
            format!(
                "{} has {} points but {} has {}",
                dependent.symbol(),
                dependent.len(),
                independent.symbol(),
                independent.len()
            ),
        ));
    }
    if dependent.timestamps() != independent.timestamps() {
        return Err(Error::data_quality(
            Stage::SpreadModel,
            format!(
                "{} and {} are not on the same timeline",
                dependent.symbol(),
                independent.symbol()
            ),
        ));
    }
    Ok(())
}

/// Fit `dependent = intercept + hedge_ratio * independent + spread`.
pub fn calculate_spread(
    dependent: &PriceSeries,
    independent: &PriceSeries,
) -> Result<SpreadModelResult> {
    check_alignment(dependent, independent)?;
    let key = PairKey::new(dependent.symbol(), independent.symbol());

    if independent.is_constant() {
        return Err(Error::model_fit(
            Stage::SpreadModel,
            format!("{} has zero variance; hedge ratio undefined", independent.symbol()),
        )
        .for_pair(key));
    }

    let fit = fit_with_intercept(dependent.prices(), independent.prices())
        .map_err(|e| e.at(Stage::SpreadModel).for_pair(key.clone()))?;

    let spread_mean = stats::mean(&fit.residuals).unwrap_or(0.0);
    let spread_std = stats::sample_std(&fit.residuals).unwrap_or(0.0);
    let half_life = stats::half_life(&fit.residuals);

    debug!(
        pair = %key,
        hedge_ratio = fit.slope,
        intercept = fit.intercept,
        r_squared = fit.r_squared,
        "Fitted spread model"
    );

    Ok(SpreadModelResult {
        dependent_symbol: dependent.symbol().to_string(),
        independent_symbol: independent.symbol().to_string(),
        hedge_ratio: fit.slope,
        intercept: fit.intercept,
        spread: fit.residuals,
        r_squared: fit.r_squared,
        spread_mean,
        spread_std,
        half_life,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(symbol: &str, values: &[f64]) -> PriceSeries {
        PriceSeries::from_values(symbol, values.to_vec()).unwrap()
    }

    #[test]
    fn test_spread_has_zero_mean() {
        let x = series("X", &[10.0, 11.5, 10.8, 12.2, 13.0, 12.4, 14.1, 13.7]);
        let y = series("Y", &[21.0, 23.9, 22.1, 25.0, 26.3, 25.2, 28.5, 27.2]);
        let model = calculate_spread(&y, &x).unwrap();

        assert_eq!(model.spread.len(), 8);
        assert!(model.spread_mean.abs() < 1e-10);
        let mean: f64 = model.spread.iter().sum::<f64>() / 8.0;
        assert!(mean.abs() < 1e-10);
        assert!(model.hedge_ratio > 1.5 && model.hedge_ratio < 2.5);
    }

    #[test]
    fn test_spread_definition() {
        let x = series("X", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = series("Y", &[3.1, 4.9, 7.2, 8.8, 11.1]);
        let model = calculate_spread(&y, &x).unwrap();
        for (t, s) in model.spread.iter().enumerate() {
            let expected = y.prices()[t] - (model.intercept + model.hedge_ratio * x.prices()[t]);
            assert!((s - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_independent_is_model_fit_error() {
        let x = series("X", &[5.0; 6]);
        let y = series("Y", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let err = calculate_spread(&y, &x).unwrap_err();
        assert!(err.is_model_fit());
        assert!(err.to_string().contains("Y/X"));
    }

    #[test]
    fn test_misaligned_series_rejected() {
        let x = series("X", &[1.0, 2.0, 3.0]);
        let y = series("Y", &[1.0, 2.0]);
        assert!(calculate_spread(&y, &x).unwrap_err().is_data_quality());
    }

    #[test]
    fn test_apply_reuses_coefficients() {
        let x = series("X", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = series("Y", &[3.1, 4.9, 7.2, 8.8, 11.1]);
        let model = calculate_spread(&y, &x).unwrap();
        let out = model.apply(&y, &x).unwrap();
        assert_eq!(out, model.spread);
    }
}
