use std::fmt;

use nalgebra::DMatrix;

use super::VarResults;
use crate::data::Metric;
use crate::error::{ModelError, ModelResult};

/// Impulse responses of a fitted VAR.
///
/// `irfs[h][(i, j)]` is the response of variable `i` after `h` periods to a
/// unit shock in variable `j`.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    pub names: Vec<Metric>,
    pub periods: usize,
    /// MA coefficients, `periods + 1` matrices.
    pub irfs: Vec<DMatrix<f64>>,
    /// Running sums of `irfs`.
    pub cum_effects: Vec<DMatrix<f64>>,
    /// Responses to one-standard-deviation orthogonal shocks.
    pub orth_irfs: Vec<DMatrix<f64>>,
}

impl ImpulseResponse {
    /// Trajectory of `response` after a shock in `impulse`.
    pub fn path(&self, impulse: usize, response: usize, cumulative: bool) -> Vec<f64> {
        let source = if cumulative { &self.cum_effects } else { &self.irfs };
        source.iter().map(|m| m[(response, impulse)]).collect()
    }
}

/// Forecast-error variance decomposition.
///
/// `decomposition[i][(h, j)]` is the share of the `h + 1` step forecast error
/// variance of variable `i` due to shocks in variable `j`.
#[derive(Debug, Clone)]
pub struct VarianceDecomposition {
    pub names: Vec<Metric>,
    pub periods: usize,
    pub decomposition: Vec<DMatrix<f64>>,
}

impl fmt::Display for VarianceDecomposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            writeln!(f, "FEVD for {}", name)?;
            write!(f, "{:>6}", "")?;
            for shock in &self.names {
                write!(f, "{:>20}", shock.as_str())?;
            }
            writeln!(f)?;
            for h in 0..self.periods {
                write!(f, "{:>6}", h)?;
                for j in 0..self.names.len() {
                    write!(f, "{:>20.6}", self.decomposition[i][(h, j)])?;
                }
                writeln!(f)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl VarResults {
    /// Moving-average coefficients `Phi_0 .. Phi_periods`.
    pub fn ma_rep(&self, periods: usize) -> Vec<DMatrix<f64>> {
        let k = self.neqs();
        let p = self.k_ar();
        let coefs: Vec<DMatrix<f64>> = (1..=p).map(|lag| self.coefs(lag)).collect();

        let mut phis = Vec::with_capacity(periods + 1);
        phis.push(DMatrix::identity(k, k));
        for i in 1..=periods {
            let mut phi = DMatrix::zeros(k, k);
            for j in 1..=i.min(p) {
                phi += &coefs[j - 1] * &phis[i - j];
            }
            phis.push(phi);
        }
        phis
    }

    fn sigma_u_cholesky(&self) -> ModelResult<DMatrix<f64>> {
        self.sigma_u()
            .clone()
            .cholesky()
            .map(|chol| chol.l())
            .ok_or_else(|| ModelError::NotPositiveDefinite {
                context: "residual covariance for orthogonalised impulse responses".to_string(),
            })
    }

    /// Impulse responses over `periods` steps.
    pub fn irf(&self, periods: usize) -> ModelResult<ImpulseResponse> {
        let irfs = self.ma_rep(periods);
        let chol = self.sigma_u_cholesky()?;

        let mut running = DMatrix::zeros(self.neqs(), self.neqs());
        let cum_effects = irfs
            .iter()
            .map(|phi| {
                running += phi;
                running.clone()
            })
            .collect();
        let orth_irfs = irfs.iter().map(|phi| phi * &chol).collect();

        Ok(ImpulseResponse {
            names: self.names().to_vec(),
            periods,
            irfs,
            cum_effects,
            orth_irfs,
        })
    }

    /// Variance decomposition of the 1..=periods step forecast errors.
    pub fn fevd(&self, periods: usize) -> ModelResult<VarianceDecomposition> {
        let k = self.neqs();
        let irf = self.irf(periods)?;

        // Running forecast MSE diagonal and squared orthogonal responses.
        let mut mse = DMatrix::zeros(k, k);
        let mut cumulative = DMatrix::zeros(k, k);
        let mut decomposition = vec![DMatrix::zeros(periods, k); k];

        for h in 0..periods {
            let phi = &irf.irfs[h];
            mse += phi * self.sigma_u() * phi.transpose();
            cumulative += irf.orth_irfs[h].map(|v| v * v);

            for i in 0..k {
                let total = mse[(i, i)];
                if total <= 0.0 {
                    return Err(ModelError::SingularMatrix {
                        context: format!("forecast error variance of {}", self.names()[i]),
                    });
                }
                for j in 0..k {
                    decomposition[i][(h, j)] = cumulative[(i, j)] / total;
                }
            }
        }

        Ok(VarianceDecomposition {
            names: self.names().to_vec(),
            periods,
            decomposition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::var::tests::simulated_var1;
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ma_rep_of_var1_is_matrix_power() {
        let data = simulated_var1(200);
        let fit = VarResults::fit(&data, 1).unwrap();
        let a = fit.coefs(1);
        let phis = fit.ma_rep(3);

        assert_eq!(phis.len(), 4);
        assert_eq!(phis[0], DMatrix::identity(2, 2));
        let expected = &a * &a * &a;
        for (got, want) in phis[3].iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cumulative_effects_sum_responses() {
        let data = simulated_var1(200);
        let irf = VarResults::fit(&data, 2).unwrap().irf(5).unwrap();

        let direct: f64 = irf.path(1, 0, false).iter().sum();
        let cumulative = irf.path(1, 0, true);
        assert_eq!(cumulative.len(), 6);
        assert_abs_diff_eq!(cumulative[5], direct, epsilon = 1e-12);
    }

    #[test]
    fn test_fevd_rows_sum_to_one() {
        let data = simulated_var1(200);
        let fevd = VarResults::fit(&data, 1).unwrap().fevd(8).unwrap();

        assert_eq!(fevd.decomposition.len(), 2);
        for per_variable in &fevd.decomposition {
            assert_eq!(per_variable.nrows(), 8);
            for h in 0..8 {
                let total: f64 = per_variable.row(h).iter().sum();
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
            }
        }
        // First shock explains all first-step variance of the first variable.
        assert_abs_diff_eq!(fevd.decomposition[0][(0, 0)], 1.0, epsilon = 1e-9);
    }
}
