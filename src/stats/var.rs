//! Vector autoregression estimated by equation-wise OLS.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::{inv_symm, logdet_symm, normal_cdf};
use crate::data::{Metric, TimeSeriesTable};
use crate::error::{ModelError, ModelResult};

/// Criterion used to pick the lag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    /// Akaike
    Aic,
    /// Schwarz / Bayesian
    Bic,
    /// Hannan-Quinn
    Hqic,
    /// Final prediction error
    Fpe,
}

impl InformationCriterion {
    /// Every criterion, in report column order.
    pub const ALL: [InformationCriterion; 4] = [
        InformationCriterion::Aic,
        InformationCriterion::Bic,
        InformationCriterion::Fpe,
        InformationCriterion::Hqic,
    ];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            InformationCriterion::Aic => "aic",
            InformationCriterion::Bic => "bic",
            InformationCriterion::Hqic => "hqic",
            InformationCriterion::Fpe => "fpe",
        }
    }
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InformationCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aic" => Ok(InformationCriterion::Aic),
            "bic" => Ok(InformationCriterion::Bic),
            "hqic" => Ok(InformationCriterion::Hqic),
            "fpe" => Ok(InformationCriterion::Fpe),
            other => Err(format!("unknown information criterion '{}'", other)),
        }
    }
}

/// Information criteria of one fitted model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfoCriteria {
    pub aic: f64,
    pub bic: f64,
    pub hqic: f64,
    pub fpe: f64,
}

impl InfoCriteria {
    /// Value of one criterion.
    pub fn get(&self, criterion: InformationCriterion) -> f64 {
        match criterion {
            InformationCriterion::Aic => self.aic,
            InformationCriterion::Bic => self.bic,
            InformationCriterion::Hqic => self.hqic,
            InformationCriterion::Fpe => self.fpe,
        }
    }
}

/// Lag-order selection diagnostics.
#[derive(Debug, Clone)]
pub struct LagOrderResults {
    /// Criteria per candidate order, index 0 is order 0.
    pub ics: Vec<InfoCriteria>,
    /// Order minimising each criterion.
    pub selected_orders: BTreeMap<InformationCriterion, usize>,
    /// Largest order considered.
    pub max_lags: usize,
}

impl LagOrderResults {
    /// Order selected by `criterion`.
    pub fn selected(&self, criterion: InformationCriterion) -> usize {
        self.selected_orders.get(&criterion).copied().unwrap_or(0)
    }
}

impl fmt::Display for LagOrderResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " VAR Order Selection (* highlights the minimums)")?;
        writeln!(f, "{}", "=".repeat(60))?;
        write!(f, "{:>4}", "")?;
        for criterion in InformationCriterion::ALL {
            write!(f, "{:>14}", criterion.as_str().to_uppercase())?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(60))?;
        for (order, ic) in self.ics.iter().enumerate() {
            write!(f, "{:<4}", order)?;
            for criterion in InformationCriterion::ALL {
                let marker = if self.selected(criterion) == order { "*" } else { " " };
                write!(f, "{:>13.4}{}", ic.get(criterion), marker)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{}", "-".repeat(60))
    }
}

/// A fitted VAR(p) with constant.
#[derive(Debug, Clone)]
pub struct VarResults {
    names: Vec<Metric>,
    k_ar: usize,
    nobs: usize,
    /// `(1 + k*p) x k`: rows const, L1.y1..L1.yk, L2.y1.., columns equations.
    params: DMatrix<f64>,
    resid: DMatrix<f64>,
    sigma_u: DMatrix<f64>,
    z_inv: DMatrix<f64>,
    df_resid: usize,
}

impl VarResults {
    /// Fit a VAR of order `lags` on every row of `data`.
    pub fn fit(data: &TimeSeriesTable, lags: usize) -> ModelResult<Self> {
        Self::fit_with_offset(data, lags, 0)
    }

    /// Fit skipping the first `offset` rows, so different orders can share a sample.
    pub fn fit_with_offset(data: &TimeSeriesTable, lags: usize, offset: usize) -> ModelResult<Self> {
        let names = data.columns().to_vec();
        let k = names.len();
        let y_all = data.to_matrix();
        let total = y_all.nrows().saturating_sub(offset);
        let n_params = 1 + k * lags;

        if k == 0 || total <= lags + n_params {
            return Err(ModelError::InsufficientObservations {
                observations: total.saturating_sub(lags),
                required: n_params + 1,
                context: format!("VAR({})", lags),
            });
        }

        let nobs = total - lags;
        let y = y_all.rows(offset + lags, nobs).into_owned();
        let z = DMatrix::from_fn(nobs, n_params, |r, c| {
            if c == 0 {
                return 1.0;
            }
            let lag = (c - 1) / k + 1;
            let var = (c - 1) % k;
            y_all[(offset + lags + r - lag, var)]
        });

        let z_inv = inv_symm(&(z.transpose() * &z), &format!("VAR({}) normal equations", lags))?;
        let params = &z_inv * (z.transpose() * &y);
        let resid = &y - &z * &params;
        let df_resid = nobs - n_params;
        let sigma_u = (resid.transpose() * &resid) / df_resid as f64;

        Ok(Self {
            names,
            k_ar: lags,
            nobs,
            params,
            resid,
            sigma_u,
            z_inv,
            df_resid,
        })
    }

    /// Estimate every order up to `max_lags` on a common sample and pick the
    /// minimum of each criterion.
    pub fn select_order(data: &TimeSeriesTable, max_lags: Option<usize>) -> ModelResult<LagOrderResults> {
        let k = data.columns().len();
        let n = data.len();
        let max_estimable = n.saturating_sub(k + 1) / (1 + k);

        let max_lags = match max_lags {
            Some(requested) if requested > max_estimable => {
                return Err(ModelError::InsufficientObservations {
                    observations: n,
                    required: (requested * (1 + k)) + k + 1,
                    context: format!("lag order selection up to {}", requested),
                })
            }
            Some(requested) => requested,
            None => {
                let default = (12.0 * (n as f64 / 100.0).powf(0.25)).round() as usize;
                default.min(max_estimable)
            }
        };

        let mut ics = Vec::with_capacity(max_lags + 1);
        for p in 0..=max_lags {
            let fit = Self::fit_with_offset(data, p, max_lags - p)?;
            ics.push(fit.info_criteria()?);
        }

        let selected_orders = InformationCriterion::ALL
            .iter()
            .map(|criterion| {
                let mut best = 0;
                for (order, ic) in ics.iter().enumerate() {
                    if ic.get(*criterion) < ics[best].get(*criterion) {
                        best = order;
                    }
                }
                (*criterion, best)
            })
            .collect();

        Ok(LagOrderResults {
            ics,
            selected_orders,
            max_lags,
        })
    }

    /// Variable names, in equation order.
    pub fn names(&self) -> &[Metric] {
        &self.names
    }

    /// Number of equations.
    pub fn neqs(&self) -> usize {
        self.names.len()
    }

    /// Lag order.
    pub fn k_ar(&self) -> usize {
        self.k_ar
    }

    /// Observations used in estimation.
    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// Residual degrees of freedom per equation.
    pub fn df_resid(&self) -> usize {
        self.df_resid
    }

    /// Coefficient matrix.
    pub fn params(&self) -> &DMatrix<f64> {
        &self.params
    }

    /// Residuals, `nobs x k`.
    pub fn resid(&self) -> &DMatrix<f64> {
        &self.resid
    }

    /// Residual covariance with degrees-of-freedom correction.
    pub fn sigma_u(&self) -> &DMatrix<f64> {
        &self.sigma_u
    }

    /// Maximum-likelihood residual covariance.
    pub fn sigma_u_mle(&self) -> DMatrix<f64> {
        &self.sigma_u * (self.df_resid as f64 / self.nobs as f64)
    }

    pub(crate) fn z_inv(&self) -> &DMatrix<f64> {
        &self.z_inv
    }

    /// Position of `metric` among the equations.
    pub fn position(&self, metric: Metric) -> ModelResult<usize> {
        self.names
            .iter()
            .position(|m| *m == metric)
            .ok_or_else(|| ModelError::UnknownVariable {
                name: metric.to_string(),
            })
    }

    /// Lag coefficient matrix `A_lag` (1-based), `A[i, j]` is the effect of
    /// variable `j` on equation `i`.
    pub fn coefs(&self, lag: usize) -> DMatrix<f64> {
        let k = self.neqs();
        DMatrix::from_fn(k, k, |eq, var| self.params[(1 + (lag - 1) * k + var, eq)])
    }

    /// Standard error of coefficient `(row, eq)`.
    pub fn stderr(&self, row: usize, eq: usize) -> f64 {
        (self.z_inv[(row, row)] * self.sigma_u[(eq, eq)]).sqrt()
    }

    /// Gaussian log-likelihood.
    pub fn llf(&self) -> ModelResult<f64> {
        let k = self.neqs() as f64;
        let n = self.nobs as f64;
        let ld = logdet_symm(&self.sigma_u_mle(), "VAR residual covariance")?;
        Ok(-(n * k / 2.0) * (2.0 * std::f64::consts::PI).ln() - (n / 2.0) * (ld + k))
    }

    /// AIC, BIC, HQIC and FPE on the maximum-likelihood covariance.
    pub fn info_criteria(&self) -> ModelResult<InfoCriteria> {
        let nobs = self.nobs as f64;
        let neqs = self.neqs() as f64;
        let free_params = (self.k_ar * self.neqs() * self.neqs()) as f64 + neqs;
        let df_model = (1 + self.k_ar * self.neqs()) as f64;
        let ld = logdet_symm(&self.sigma_u_mle(), "VAR residual covariance")?;

        Ok(InfoCriteria {
            aic: ld + (2.0 / nobs) * free_params,
            bic: ld + (nobs.ln() / nobs) * free_params,
            hqic: ld + (2.0 * nobs.ln().ln() / nobs) * free_params,
            fpe: ((nobs + df_model) / self.df_resid as f64).powf(neqs) * ld.exp(),
        })
    }

    fn coefficient_name(&self, row: usize) -> String {
        if row == 0 {
            return "const".to_string();
        }
        let k = self.neqs();
        format!("L{}.{}", (row - 1) / k + 1, self.names[(row - 1) % k])
    }
}

impl fmt::Display for VarResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Summary of Regression Results")?;
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f, "Model:                         VAR")?;
        writeln!(f, "Method:                        OLS")?;
        writeln!(f, "{}", "-".repeat(70))?;
        writeln!(f, "No. of Equations: {:>12}", self.neqs())?;
        writeln!(f, "Lag order:        {:>12}", self.k_ar)?;
        writeln!(f, "Nobs:             {:>12}", self.nobs)?;
        match (self.llf(), self.info_criteria()) {
            (Ok(llf), Ok(ic)) => {
                writeln!(f, "Log likelihood:   {:>12.4}", llf)?;
                writeln!(f, "AIC:              {:>12.4}", ic.aic)?;
                writeln!(f, "BIC:              {:>12.4}", ic.bic)?;
                writeln!(f, "HQIC:             {:>12.4}", ic.hqic)?;
                writeln!(f, "FPE:              {:>12.4e}", ic.fpe)?;
            }
            _ => writeln!(f, "Log likelihood:   {:>12}", "n/a")?,
        }

        for (eq, name) in self.names.iter().enumerate() {
            writeln!(f, "Results for equation {}", name)?;
            writeln!(f, "{}", "=".repeat(70))?;
            writeln!(
                f,
                "{:<28}{:>12}{:>12}{:>10}{:>8}",
                "", "coefficient", "std. error", "t-stat", "prob"
            )?;
            writeln!(f, "{}", "-".repeat(70))?;
            for row in 0..self.params.nrows() {
                let coef = self.params[(row, eq)];
                let se = self.stderr(row, eq);
                let t = coef / se;
                let prob = 2.0 * (1.0 - normal_cdf(t.abs()));
                writeln!(
                    f,
                    "{:<28}{:>12.6}{:>12.6}{:>10.3}{:>8.3}",
                    self.coefficient_name(row),
                    coef,
                    se,
                    t,
                    prob
                )?;
            }
            writeln!(f, "{}", "=".repeat(70))?;
            writeln!(f)?;
        }

        writeln!(f, "Correlation matrix of residuals")?;
        let k = self.neqs();
        for i in 0..k {
            write!(f, "{:<22}", self.names[i].as_str())?;
            for j in 0..k {
                let denom = (self.sigma_u[(i, i)] * self.sigma_u[(j, j)]).sqrt();
                write!(f, "{:>12.6}", self.sigma_u[(i, j)] / denom)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
