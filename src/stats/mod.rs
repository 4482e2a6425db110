//! Statistics backend for the VAR pipeline.
//!
//! Implements exactly the estimators the analysis needs, on dense
//! `nalgebra` matrices with `statrs` distributions:
//!
//! - **OLS**: least squares with coefficient standard errors and AIC
//! - **ADF**: augmented Dickey-Fuller unit-root test with MacKinnon p-values
//! - **VAR**: estimation, lag-order selection and information criteria
//! - **Diagnostics**: Portmanteau whiteness, Jarque-Bera normality and
//!   Wald Granger-causality tests
//! - **Structural**: impulse responses and forecast-error variance decomposition
//! - **Seasonal**: classical additive decomposition

mod adf;
mod diagnostics;
mod irf;
mod ols;
mod seasonal;
mod var;

pub use adf::{adfuller, mackinnon_p, AdfResult};
pub use diagnostics::{CausalityTest, Conclusion, HypothesisTest, NormalityTest, WhitenessTest};
pub use irf::{ImpulseResponse, VarianceDecomposition};
pub use ols::{ols, OlsFit};
pub use seasonal::{seasonal_decompose, SeasonalDecomposition};
pub use var::{InfoCriteria, InformationCriterion, LagOrderResults, VarResults};

use nalgebra::DMatrix;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::erf::erfc;

use crate::error::{ModelError, ModelResult};

/// Significance level used by every hypothesis test in the pipeline.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Standard normal CDF.
pub(crate) fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Upper tail probability and critical value of a chi-squared statistic.
pub(crate) fn chi2_test(statistic: f64, df: f64, signif: f64) -> ModelResult<(f64, f64)> {
    let dist = ChiSquared::new(df).map_err(|_| ModelError::Distribution {
        message: format!("chi-squared with {} degrees of freedom", df),
    })?;
    Ok((dist.sf(statistic), dist.inverse_cdf(1.0 - signif)))
}

/// Log-determinant of a symmetric positive definite matrix.
pub(crate) fn logdet_symm(m: &DMatrix<f64>, context: &str) -> ModelResult<f64> {
    let chol = m
        .clone()
        .cholesky()
        .ok_or_else(|| ModelError::NotPositiveDefinite {
            context: context.to_string(),
        })?;
    let l = chol.l();
    Ok(2.0 * (0..l.nrows()).map(|i| l[(i, i)].ln()).sum::<f64>())
}

/// Inverse of a symmetric positive definite matrix.
pub(crate) fn inv_symm(m: &DMatrix<f64>, context: &str) -> ModelResult<DMatrix<f64>> {
    m.clone()
        .cholesky()
        .map(|chol| chol.inverse())
        .ok_or_else(|| ModelError::SingularMatrix {
            context: context.to_string(),
        })
}
