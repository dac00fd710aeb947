//! Augmented Dickey-Fuller regression with information-criterion lag choice.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::ols::{fit_ols, OlsFit};
use super::FitError;

/// Deterministic terms in the test regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdfRegression {
    /// No deterministic terms; used on regression residuals.
    NoConstant,
    /// Intercept only.
    Constant,
}

impl AdfRegression {
    fn trend_terms(self) -> usize {
        match self {
            Self::NoConstant => 0,
            Self::Constant => 1,
        }
    }
}

/// How many lagged differences to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LagSelection {
    /// Minimise AIC over `0..=max_lag`. The default cap is
    /// `ceil(12 * (nobs / 100)^(1/4))`.
    Aic {
        #[serde(default)]
        max_lag: Option<usize>,
    },
    /// Use exactly this many lags.
    Fixed { lags: usize },
}

impl Default for LagSelection {
    fn default() -> Self {
        Self::Aic { max_lag: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient.
    pub statistic: f64,
    /// Lagged differences in the final regression.
    pub lags: usize,
    /// Rows in the final regression.
    pub nobs: usize,
}

fn default_max_lag(nobs: usize) -> usize {
    (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Rows `[y_{t}, dy_{t-1} .. dy_{t-lags}, 1?]` with target `dy_t`, for every
/// `t` in `first..diff.len()`.
fn design(
    levels: &[f64],
    diff: &[f64],
    lags: usize,
    first: usize,
    regression: AdfRegression,
) -> (Vec<f64>, DMatrix<f64>) {
    let rows = diff.len() - first;
    let cols = 1 + lags + regression.trend_terms();
    let target = diff[first..].to_vec();
    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let t = first + r;
        match c {
            0 => levels[t],
            c if c <= lags => diff[t - c],
            _ => 1.0,
        }
    });
    (target, x)
}

/// Run the ADF regression on `series`.
pub fn adf_test(
    series: &[f64],
    regression: AdfRegression,
    selection: LagSelection,
) -> Result<AdfResult, FitError> {
    let nobs = series.len();
    let cap = (nobs / 2)
        .checked_sub(regression.trend_terms() + 1)
        .ok_or(FitError::TooShort {
            needed: 2 * (regression.trend_terms() + 1),
            got: nobs,
        })?;

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let lags = match selection {
        LagSelection::Fixed { lags } => {
            if lags > cap {
                return Err(FitError::TooShort {
                    needed: 2 * (lags + regression.trend_terms() + 1),
                    got: nobs,
                });
            }
            lags
        }
        LagSelection::Aic { max_lag } => {
            let max_lag = match max_lag {
                Some(m) if m > cap => {
                    return Err(FitError::TooShort {
                        needed: 2 * (m + regression.trend_terms() + 1),
                        got: nobs,
                    })
                }
                Some(m) => m,
                None => default_max_lag(nobs).min(cap),
            };
            select_lag_by_aic(series, &diff, max_lag, regression)?
        }
    };

    let (target, x) = design(series, &diff, lags, lags, regression);
    let fit = fit_ols(&target, &x)?;
    let statistic = level_t_value(&fit)?;

    Ok(AdfResult {
        statistic,
        lags,
        nobs: fit.nobs,
    })
}

// All candidates share the sample that the largest lag allows; ties keep the
// smaller lag.
fn select_lag_by_aic(
    levels: &[f64],
    diff: &[f64],
    max_lag: usize,
    regression: AdfRegression,
) -> Result<usize, FitError> {
    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=max_lag {
        let (target, x) = design(levels, diff, lags, max_lag, regression);
        let aic = match fit_ols(&target, &x) {
            Ok(fit) => fit.aic(),
            Err(_) => continue,
        };
        if aic.is_nan() {
            continue;
        }
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lags));
        }
    }
    best.map(|(_, lags)| lags).ok_or(FitError::Singular)
}

fn level_t_value(fit: &OlsFit) -> Result<f64, FitError> {
    if fit.std_errors[0] <= 0.0 {
        return Err(FitError::Collinear);
    }
    let t = fit.t_value(0);
    if t.is_finite() {
        Ok(t)
    } else {
        Err(FitError::Singular)
    }
}
