//! MacKinnon response-surface approximations for unit-root statistics with a
//! constant term (MacKinnon 1994 p-values, MacKinnon 2010 critical values).

use statrs::function::erf::erfc;

use super::FitError;
use crate::types::CriticalValues;

struct PValueSurface {
    max_stat: f64,
    min_stat: f64,
    star: f64,
    small: [f64; 3],
    large: [f64; 4],
}

// Index 0 is a single series (plain ADF); index 1 is a two-variable
// cointegrating residual.
const P_SURFACES: [PValueSurface; 2] = [
    PValueSurface {
        max_stat: 2.74,
        min_stat: -18.83,
        star: -1.61,
        small: [2.1659, 1.4412, 0.038269],
        large: [1.7339, 0.93202, -0.12745, -0.010368],
    },
    PValueSurface {
        max_stat: 0.92,
        min_stat: -18.86,
        star: -2.62,
        small: [2.92, 1.5012, 0.039796],
        large: [2.1945, 0.64695, -0.29198, -0.042377],
    },
];

// Rows are 1%, 5%, 10%; columns are the 1/T expansion coefficients.
const CRIT_SURFACES: [[[f64; 4]; 3]; 2] = [
    [
        [-3.43035, -6.5393, -16.786, -79.433],
        [-2.86154, -2.8903, -4.234, -40.040],
        [-2.56677, -1.5384, -2.809, 0.0],
    ],
    [
        [-3.89644, -10.9519, -33.527, 0.0],
        [-3.33613, -6.1101, -6.823, 0.0],
        [-3.04445, -4.2412, -2.720, 0.0],
    ],
];

fn surface_index(n_vars: usize) -> Result<usize, FitError> {
    match n_vars {
        1 | 2 => Ok(n_vars - 1),
        other => Err(FitError::UnsupportedVariables(other)),
    }
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate p-value of a unit-root statistic for `n_vars` series.
pub fn mackinnon_p_value(statistic: f64, n_vars: usize) -> Result<f64, FitError> {
    let surface = &P_SURFACES[surface_index(n_vars)?];
    if statistic.is_nan() {
        return Ok(1.0);
    }
    if statistic > surface.max_stat {
        return Ok(1.0);
    }
    if statistic < surface.min_stat {
        return Ok(0.0);
    }

    let z = if statistic <= surface.star {
        polyval(&surface.small, statistic)
    } else {
        polyval(&surface.large, statistic)
    };
    Ok(standard_normal_cdf(z).clamp(0.0, 1.0))
}

/// Finite-sample critical values for `n_vars` series and `nobs` observations.
pub fn mackinnon_critical_values(n_vars: usize, nobs: usize) -> Result<CriticalValues, FitError> {
    let table = &CRIT_SURFACES[surface_index(n_vars)?];
    let inv = 1.0 / nobs.max(1) as f64;
    let at = |row: &[f64; 4]| polyval(row, inv);

    Ok(CriticalValues {
        one_pct: at(&table[0]),
        five_pct: at(&table[1]),
        ten_pct: at(&table[2]),
    })
}
