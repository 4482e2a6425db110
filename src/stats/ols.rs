use nalgebra::{DMatrix, DVector};

use super::inv_symm;
use crate::error::{ModelError, ModelResult};

/// Ordinary least squares estimate.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Coefficients, one per regressor column.
    pub params: DVector<f64>,
    /// Standard errors of the coefficients.
    pub bse: DVector<f64>,
    /// Residuals.
    pub residuals: DVector<f64>,
    /// Sum of squared residuals.
    pub ssr: f64,
    /// Number of observations.
    pub nobs: usize,
    /// Number of regressors, including any constant column.
    pub k: usize,
}

impl OlsFit {
    /// t statistic of coefficient `i`.
    pub fn tvalue(&self, i: usize) -> f64 {
        self.params[i] / self.bse[i]
    }

    /// Gaussian log-likelihood.
    pub fn llf(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.llf() + 2.0 * self.k as f64
    }
}

/// Regress `y` on the columns of `x`.
pub fn ols(y: &DVector<f64>, x: &DMatrix<f64>) -> ModelResult<OlsFit> {
    let nobs = x.nrows();
    let k = x.ncols();
    if nobs != y.len() {
        return Err(ModelError::InsufficientObservations {
            observations: y.len(),
            required: nobs,
            context: "OLS response length".to_string(),
        });
    }
    if nobs <= k {
        return Err(ModelError::InsufficientObservations {
            observations: nobs,
            required: k + 1,
            context: format!("OLS with {} regressors", k),
        });
    }

    let xtx_inv = inv_symm(&(x.transpose() * x), "OLS normal equations")?;
    let params = &xtx_inv * (x.transpose() * y);
    let residuals = y - x * &params;
    let ssr = residuals.dot(&residuals);
    let scale = ssr / (nobs - k) as f64;
    let bse = DVector::from_iterator(k, (0..k).map(|i| (scale * xtx_inv[(i, i)]).sqrt()));

    Ok(OlsFit {
        params,
        bse,
        residuals,
        ssr,
        nobs,
        k,
    })
}
