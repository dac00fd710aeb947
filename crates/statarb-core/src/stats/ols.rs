//! Ordinary least squares.

use nalgebra::{DMatrix, DVector};

use super::FitError;

/// Fit of `y = intercept + slope * x + residual`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleFit {
    pub intercept: f64,
    pub slope: f64,
    pub residuals: Vec<f64>,
    pub r_squared: f64,
}

/// Closed-form OLS with an intercept.
pub fn fit_with_intercept(y: &[f64], x: &[f64]) -> Result<SimpleFit, FitError> {
    let n = y.len().min(x.len());
    if n < 2 || y.len() != x.len() {
        return Err(FitError::TooShort { needed: 2, got: n });
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return Err(FitError::ZeroVariance);
    }
    let slope = sxy / sxx;
    if !slope.is_finite() {
        return Err(FitError::ZeroVariance);
    }
    let intercept = mean_y - slope * mean_x;

    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - (intercept + slope * xi))
        .collect();
    let ssr: f64 = residuals.iter().map(|r| r * r).sum();
    let r_squared = if syy > 0.0 { 1.0 - ssr / syy } else { 0.0 };

    Ok(SimpleFit {
        intercept,
        slope,
        residuals,
        r_squared,
    })
}

/// General OLS fit with coefficient standard errors.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    pub fn k(&self) -> usize {
        self.coefficients.len()
    }

    pub fn t_value(&self, i: usize) -> f64 {
        self.coefficients[i] / self.std_errors[i]
    }

    /// Gaussian log-likelihood at the OLS estimate.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, counting every column as a parameter.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.k() as f64
    }
}

/// OLS of `y` on the columns of `x` via the normal equations.
pub fn fit_ols(y: &[f64], x: &DMatrix<f64>) -> Result<OlsFit, FitError> {
    let n = y.len();
    let k = x.ncols();
    if x.nrows() != n || n <= k {
        return Err(FitError::TooShort {
            needed: k + 1,
            got: n.min(x.nrows()),
        });
    }

    let y_vec = DVector::from_column_slice(y);
    let xt = x.transpose();
    let xtx_inv = (&xt * x).try_inverse().ok_or(FitError::Singular)?;
    let beta = &xtx_inv * (&xt * &y_vec);

    let residuals = &y_vec - x * &beta;
    let ssr = residuals.dot(&residuals);
    let sigma2 = ssr / (n - k) as f64;

    let std_errors: Vec<f64> = (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).sqrt()).collect();
    if beta.iter().chain(std_errors.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::Singular);
    }

    Ok(OlsFit {
        coefficients: beta.iter().copied().collect(),
        std_errors,
        ssr,
        nobs: n,
    })
}
