//! Residual diagnostics and Granger causality for fitted VAR models.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use super::{chi2_test, inv_symm, VarResults};
use crate::data::Metric;
use crate::error::{ModelError, ModelResult};

/// Outcome of a hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    /// Null hypothesis rejected.
    Reject,
    /// Null hypothesis retained.
    FailToReject,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conclusion::Reject => write!(f, "reject"),
            Conclusion::FailToReject => write!(f, "fail to reject"),
        }
    }
}

/// Chi-squared test statistic with its decision inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypothesisTest {
    pub statistic: f64,
    pub critical_value: f64,
    pub p_value: f64,
    pub df: usize,
    pub signif: f64,
}

impl HypothesisTest {
    fn chi2(statistic: f64, df: usize, signif: f64) -> ModelResult<Self> {
        let (p_value, critical_value) = chi2_test(statistic, df as f64, signif)?;
        Ok(Self {
            statistic,
            critical_value,
            p_value,
            df,
            signif,
        })
    }

    /// Reject when the statistic reaches the critical value.
    pub fn conclusion(&self) -> Conclusion {
        if self.statistic >= self.critical_value {
            Conclusion::Reject
        } else {
            Conclusion::FailToReject
        }
    }

    /// True when the null hypothesis is rejected.
    pub fn rejects(&self) -> bool {
        self.conclusion() == Conclusion::Reject
    }

    fn write_table(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(48))?;
        writeln!(
            f,
            "{:>15}{:>15}{:>10}{:>8}",
            "Test statistic", "Critical value", "p-value", "df"
        )?;
        writeln!(f, "{}", "-".repeat(48))?;
        writeln!(
            f,
            "{:>15.3}{:>15.3}{:>10.3}{:>8}",
            self.statistic, self.critical_value, self.p_value, self.df
        )?;
        writeln!(f, "{}", "-".repeat(48))
    }

    fn signif_percent(&self) -> String {
        format!("{}%", (self.signif * 100.0).round())
    }
}

/// Portmanteau test for residual autocorrelation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhitenessTest {
    pub test: HypothesisTest,
    pub nlags: usize,
}

impl WhitenessTest {
    /// True when residual autocorrelation is detected.
    pub fn rejects(&self) -> bool {
        self.test.rejects()
    }
}

impl fmt::Display for WhitenessTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Portmanteau-test for residual autocorrelation. H_0: residual autocorrelation up to lag {} is zero. Conclusion: {} H_0 at {} significance level.",
            self.nlags,
            self.test.conclusion(),
            self.test.signif_percent()
        )?;
        self.test.write_table(f)
    }
}

/// Jarque-Bera style test for multivariate residual normality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalityTest {
    pub test: HypothesisTest,
}

impl NormalityTest {
    /// True when the residuals are not Gaussian.
    pub fn rejects(&self) -> bool {
        self.test.rejects()
    }
}

impl fmt::Display for NormalityTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "normality (skew and kurtosis) test. H_0: data generated by normally-distributed process. Conclusion: {} H_0 at {} significance level.",
            self.test.conclusion(),
            self.test.signif_percent()
        )?;
        self.test.write_table(f)
    }
}

/// Wald test that `cause` does not Granger-cause `effect`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausalityTest {
    pub cause: Metric,
    pub effect: Metric,
    pub test: HypothesisTest,
}

impl CausalityTest {
    /// True when `cause` Granger-causes `effect`.
    pub fn rejects(&self) -> bool {
        self.test.rejects()
    }
}

impl fmt::Display for CausalityTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Granger causality Wald-test. H_0: {} does not Granger-cause {}. Conclusion: {} H_0 at {} significance level.",
            self.cause,
            self.effect,
            self.test.conclusion(),
            self.test.signif_percent()
        )?;
        self.test.write_table(f)
    }
}

/// Residuals with column means removed.
fn demeaned(resid: &DMatrix<f64>) -> DMatrix<f64> {
    let n = resid.nrows() as f64;
    let mut centered = resid.clone();
    for mut column in centered.column_iter_mut() {
        let mean = column.sum() / n;
        column.add_scalar_mut(-mean);
    }
    centered
}

/// Sample autocovariance `C_h = sum_t u_t u_{t-h}' / n` for h in 0..=nlags.
fn autocovariances(u: &DMatrix<f64>, nlags: usize) -> Vec<DMatrix<f64>> {
    let n = u.nrows();
    let k = u.ncols();
    (0..=nlags)
        .map(|h| {
            if h >= n {
                return DMatrix::zeros(k, k);
            }
            let lead = u.rows(h, n - h);
            let lag = u.rows(0, n - h);
            (lead.transpose() * lag) / n as f64
        })
        .collect()
}

impl VarResults {
    /// Portmanteau test of residual autocorrelation up to `nlags`.
    pub fn test_whiteness(&self, nlags: usize, signif: f64) -> ModelResult<WhitenessTest> {
        if nlags <= self.k_ar() {
            return Err(ModelError::InsufficientObservations {
                observations: nlags,
                required: self.k_ar() + 1,
                context: "Portmanteau lags must exceed the VAR order".to_string(),
            });
        }

        let u = demeaned(self.resid());
        let acov = autocovariances(&u, nlags);
        let c0_inv = inv_symm(&acov[0], "residual autocovariance at lag 0")?;

        let statistic = self.nobs() as f64
            * acov[1..]
                .iter()
                .map(|ct| (ct.transpose() * &c0_inv * ct * &c0_inv).trace())
                .sum::<f64>();
        let df = self.neqs() * self.neqs() * (nlags - self.k_ar());

        Ok(WhitenessTest {
            test: HypothesisTest::chi2(statistic, df, signif)?,
            nlags,
        })
    }

    /// Multivariate skewness/kurtosis test on Cholesky-standardised residuals.
    pub fn test_normality(&self, signif: f64) -> ModelResult<NormalityTest> {
        let n = self.nobs() as f64;
        let k = self.neqs();
        let resid_c = demeaned(self.resid());
        let sig = (resid_c.transpose() * &resid_c) / n;
        let chol = sig.cholesky().ok_or_else(|| ModelError::NotPositiveDefinite {
            context: "residual covariance for normality test".to_string(),
        })?;
        let p_inv = chol
            .l()
            .try_inverse()
            .ok_or_else(|| ModelError::SingularMatrix {
                context: "Cholesky factor of residual covariance".to_string(),
            })?;

        let w = p_inv * resid_c.transpose();
        let b1 = DVector::from_iterator(k, w.row_iter().map(|r| r.iter().map(|v| v.powi(3)).sum::<f64>() / n));
        let b2 = DVector::from_iterator(
            k,
            w.row_iter().map(|r| r.iter().map(|v| v.powi(4)).sum::<f64>() / n - 3.0),
        );

        let lam_skew = n * b1.dot(&b1) / 6.0;
        let lam_kurt = n * b2.dot(&b2) / 24.0;

        Ok(NormalityTest {
            test: HypothesisTest::chi2(lam_skew + lam_kurt, 2 * k, signif)?,
        })
    }

    /// Wald test of the null that `cause` does not Granger-cause `effect`.
    ///
    /// A VAR(0) has no lagged coefficients to restrict; the statistic is zero
    /// and the null is retained.
    pub fn test_causality(&self, cause: Metric, effect: Metric, signif: f64) -> ModelResult<CausalityTest> {
        let cause_idx = self.position(cause)?;
        let effect_idx = self.position(effect)?;
        let k = self.neqs();
        let p = self.k_ar();

        if p == 0 {
            return Ok(CausalityTest {
                cause,
                effect,
                test: HypothesisTest {
                    statistic: 0.0,
                    critical_value: f64::INFINITY,
                    p_value: 1.0,
                    df: 0,
                    signif,
                },
            });
        }

        let rows: Vec<usize> = (0..p).map(|j| 1 + j * k + cause_idx).collect();
        let beta = DVector::from_iterator(p, rows.iter().map(|r| self.params()[(*r, effect_idx)]));
        let sigma = self.sigma_u()[(effect_idx, effect_idx)];
        let cov = DMatrix::from_fn(p, p, |a, b| self.z_inv()[(rows[a], rows[b])] * sigma);
        let middle = inv_symm(&cov, "Wald restriction covariance")?;
        let statistic = (beta.transpose() * middle * &beta)[(0, 0)];

        Ok(CausalityTest {
            cause,
            effect,
            test: HypothesisTest::chi2(statistic, p, signif)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::var::tests::{noise, simulated_var1};
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_granger_detects_simulated_link() {
        // y2 drives y1 with coefficient 0.3, y1 never drives y2
        let data = simulated_var1(2000);
        let fit = VarResults::fit(&data, 1).unwrap();

        let forward = fit
            .test_causality(Metric::MergesRequested, Metric::MergesPerformed, 0.05)
            .unwrap();
        assert!(forward.rejects());
        assert_eq!(forward.test.df, 1);
        assert!(forward.test.p_value < 1e-6);

        assert!(forward.to_string().contains(
            "H_0: merges_requested does not Granger-cause merges_performed. Conclusion: reject H_0 at 5% significance level."
        ));
    }

    #[test]
    fn test_wald_statistic_matches_squared_t_for_one_lag() {
        let data = simulated_var1(300);
        let fit = VarResults::fit(&data, 1).unwrap();
        let test = fit
            .test_causality(Metric::MergesPerformed, Metric::MergesRequested, 0.05)
            .unwrap();

        // row of L1.merges_performed is 1, equation merges_requested is 1
        let t = fit.params()[(1, 1)] / fit.stderr(1, 1);
        assert_abs_diff_eq!(test.test.statistic, t * t, epsilon = 1e-9);
    }

    #[test]
    fn test_var0_causality_is_never_rejected() {
        let data = simulated_var1(60);
        let fit = VarResults::fit(&data, 0).unwrap();
        let test = fit
            .test_causality(Metric::MergesPerformed, Metric::MergesRequested, 0.05)
            .unwrap();
        assert!(!test.rejects());
        assert_eq!(test.test.df, 0);
    }

    #[test]
    fn test_causality_unknown_variable() {
        let data = simulated_var1(60);
        let fit = VarResults::fit(&data, 1).unwrap();
        assert!(matches!(
            fit.test_causality(Metric::MergesSuccessful, Metric::MergesPerformed, 0.05),
            Err(ModelError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_whiteness_passes_for_correct_order() {
        let data = simulated_var1(1000);
        let fit = VarResults::fit(&data, 1).unwrap();
        let test = fit.test_whiteness(10, 0.05).unwrap();

        assert_eq!(test.test.df, 2 * 2 * 9);
        assert!(test.test.p_value > 0.001, "p = {}", test.test.p_value);
    }

    #[test]
    fn test_whiteness_rejects_underfitted_model() {
        // Strongly autocorrelated data fitted without lags
        let e = noise(400, 17);
        let mut y = vec![0.0; 400];
        for t in 1..400 {
            y[t] = 0.9 * y[t - 1] + e[t];
        }
        let data = crate::data::TimeSeriesTable::new(
            simulated_var1(400).index().to_vec(),
            vec![(Metric::MergesPerformed, y), (Metric::MergesRequested, noise(400, 19))],
        )
        .unwrap();

        let fit = VarResults::fit(&data, 0).unwrap();
        assert!(fit.test_whiteness(5, 0.05).unwrap().rejects());
    }

    #[test]
    fn test_whiteness_requires_lags_beyond_order() {
        let data = simulated_var1(100);
        let fit = VarResults::fit(&data, 2).unwrap();
        assert!(fit.test_whiteness(2, 0.05).is_err());
    }

    #[test]
    fn test_normality_rejects_uniform_residuals() {
        // Uniform innovations have kurtosis 1.8, far from Gaussian
        let data = simulated_var1(3000);
        let fit = VarResults::fit(&data, 1).unwrap();
        let test = fit.test_normality(0.05).unwrap();

        assert_eq!(test.test.df, 4);
        assert!(test.rejects());
    }
}
