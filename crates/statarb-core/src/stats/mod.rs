//! Statistical kernels shared by discovery, spread modeling and signals.
//!
//! Kernels report numerical degeneracy as [`FitError`]; stages attach their
//! own [`Stage`] and pair context via [`FitError::at`].

pub mod adf;
pub mod mackinnon;
pub mod ols;

use statrs::statistics::{Data, Distribution};
use thiserror::Error;

use crate::error::{Error, Stage};

pub use adf::{adf_test, AdfRegression, AdfResult, LagSelection};
pub use mackinnon::{mackinnon_critical_values, mackinnon_p_value};
pub use ols::{fit_ols, fit_with_intercept, OlsFit, SimpleFit};

/// Numerical failure inside a kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("sample too short: need at least {needed} observations, got {got}")]
    TooShort { needed: usize, got: usize },

    #[error("regressor has zero variance")]
    ZeroVariance,

    #[error("singular design matrix")]
    Singular,

    #[error("residuals are numerically zero (perfectly collinear series)")]
    Collinear,

    #[error("no MacKinnon table for {0} variables")]
    UnsupportedVariables(usize),
}

impl FitError {
    pub fn at(self, stage: Stage) -> Error {
        Error::model_fit(stage, self.to_string())
    }
}

/// Arithmetic mean as a plain sum over count, so symmetric integer-valued
/// data averages to exactly zero. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two points.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Data::new(values.to_vec()).std_dev()
}

/// Mean-reversion half-life from an AR(1) fit of spread changes on lagged
/// demeaned levels. `None` when the spread is not mean-reverting.
pub fn half_life(spread: &[f64]) -> Option<f64> {
    let m = mean(spread)?;
    if spread.len() < 3 {
        return None;
    }
    let lagged: Vec<f64> = spread[..spread.len() - 1].iter().map(|s| s - m).collect();
    let delta: Vec<f64> = spread.windows(2).map(|w| w[1] - w[0]).collect();
    let fit = fit_with_intercept(&delta, &lagged).ok()?;
    let phi = fit.slope;
    if phi >= 0.0 || phi <= -1.0 {
        return None;
    }
    let hl = -(2.0_f64.ln()) / (1.0 + phi).ln();
    hl.is_finite().then_some(hl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_std_uses_n_minus_one() {
        let std = sample_std(&[0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0, 0.0]).unwrap();
        assert!((std - 1.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_moments_on_short_input() {
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_half_life_of_ar1() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        // s_t = 0.5 * s_{t-1} + e_t has a half-life of one period
        let mut rng = StdRng::seed_from_u64(7);
        let mut s = vec![0.0];
        for i in 1..2000 {
            let prev = s[i - 1];
            s.push(0.5 * prev + rng.gen_range(-1.0..1.0));
        }
        let hl = half_life(&s).unwrap();
        assert!(hl > 0.7 && hl < 1.4, "half-life {hl}");
    }

    #[test]
    fn test_half_life_of_trend_is_none() {
        let s: Vec<f64> = (0..100).map(|i| (i * i) as f64).collect();
        assert_eq!(half_life(&s), None);
    }
}
