//! Augmented Dickey-Fuller unit-root test.
//!
//! Regression with a constant, lag length chosen by AIC over a common
//! sample, p-values from MacKinnon's response-surface approximation.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use super::{normal_cdf, ols};
use crate::error::{ModelError, ModelResult};

// MacKinnon (1994) coefficients, constant-only regression, one variable.
const TAU_MAX_C: f64 = 2.74;
const TAU_MIN_C: f64 = -18.83;
const TAU_STAR_C: f64 = -1.61;
const TAU_C_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_C_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) critical value surfaces: b0 + b1/T + b2/T^2 + b3/T^3
const TAU_C_CRIT: [(&str, [f64; 4]); 3] = [
    ("1%", [-3.43035, -6.5393, -16.786, -79.433]),
    ("5%", [-2.86154, -2.8903, -4.234, -40.040]),
    ("10%", [-2.56677, -1.5384, -2.809, 0.0]),
];

/// Outcome of an ADF test.
#[derive(Debug, Clone)]
pub struct AdfResult {
    /// t statistic of the lagged level.
    pub statistic: f64,
    /// MacKinnon approximate p-value.
    pub p_value: f64,
    /// Number of lagged differences in the final regression.
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
    /// Critical values at 1%, 5% and 10%.
    pub critical_values: Vec<(&'static str, f64)>,
    /// AIC of the selected lag length.
    pub ic_best: f64,
}

impl fmt::Display for AdfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ADF Statistic: {:.6}", self.statistic)?;
        writeln!(f, "p-value: {:.6}", self.p_value)?;
        writeln!(f, "Lags used: {} / Observations: {}", self.used_lag, self.nobs)?;
        for (level, value) in &self.critical_values {
            writeln!(f, "Critical value ({}): {:.3}", level, value)?;
        }
        Ok(())
    }
}

/// Approximate p-value of an ADF statistic (constant regression, N = 1).
pub fn mackinnon_p(statistic: f64) -> f64 {
    if statistic > TAU_MAX_C {
        return 1.0;
    }
    if statistic < TAU_MIN_C {
        return 0.0;
    }

    let coefs: &[f64] = if statistic <= TAU_STAR_C {
        &TAU_C_SMALLP
    } else {
        &TAU_C_LARGEP
    };
    let poly = coefs
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);
    normal_cdf(poly)
}

fn mackinnon_crit(nobs: usize) -> Vec<(&'static str, f64)> {
    let t = nobs as f64;
    TAU_C_CRIT
        .iter()
        .map(|(level, b)| (*level, b[0] + b[1] / t + b[2] / t.powi(2) + b[3] / t.powi(3)))
        .collect()
}

/// Regression design for `lags` lagged differences, starting at row `start`
/// of the differenced series. Columns: constant, lagged level, then lags.
fn design(x: &[f64], xdiff: &[f64], start: usize, lags: usize) -> (DVector<f64>, DMatrix<f64>) {
    let nobs = xdiff.len() - start;
    let y = DVector::from_iterator(nobs, xdiff[start..].iter().copied());
    let regressors = DMatrix::from_fn(nobs, lags + 2, |r, c| {
        let t = start + r;
        match c {
            0 => 1.0,
            1 => x[t],
            j => xdiff[t - (j - 1)],
        }
    });
    (y, regressors)
}

/// Run the ADF test on `x`.
pub fn adfuller(x: &[f64]) -> ModelResult<AdfResult> {
    let n = x.len();
    let ntrend = 1;
    let cap = (n / 2)
        .checked_sub(ntrend + 1)
        .ok_or_else(|| ModelError::InsufficientObservations {
            observations: n,
            required: 2 * (ntrend + 1),
            context: "ADF regression".to_string(),
        })?;
    let maxlag = ((12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize).min(cap);

    let xdiff: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // Lag search on a common sample so the AIC values are comparable.
    let (y_full, x_full) = design(x, &xdiff, maxlag, maxlag);
    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=maxlag {
        let exog = x_full.columns(0, lags + 2).into_owned();
        let aic = ols(&y_full, &exog)?.aic();
        match best {
            Some((best_aic, _)) if aic >= best_aic => {}
            _ => best = Some((aic, lags)),
        }
    }
    let (ic_best, used_lag) = best.unwrap_or((f64::NAN, 0));

    let (y, exog) = design(x, &xdiff, used_lag, used_lag);
    let fit = ols(&y, &exog)?;
    let statistic = fit.tvalue(1);

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p(statistic),
        used_lag,
        nobs: fit.nobs,
        critical_values: mackinnon_crit(fit.nobs),
        ic_best,
    })
}
