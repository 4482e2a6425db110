use tracing::{info, warn};

use crate::data::TimeSeriesTable;
use crate::error::ModelResult;
use crate::stats::{
    InformationCriterion, LagOrderResults, NormalityTest, VarResults, WhitenessTest,
    DEFAULT_SIGNIFICANCE,
};

/// Highest VAR order the refinement loop will try to exceed.
pub const DEFAULT_MAX_ORDER: usize = 12;

/// Estimation backend used by [`VarFitter`].
#[cfg_attr(test, mockall::automock)]
pub trait VarEstimator {
    /// Lag-order selection diagnostics for `data`.
    fn select_order(&self, data: &TimeSeriesTable) -> ModelResult<LagOrderResults>;

    /// Fit a VAR of order `lags`.
    fn fit(&self, data: &TimeSeriesTable, lags: usize) -> ModelResult<VarResults>;

    /// Portmanteau test on the residuals of `model`.
    fn test_whiteness(&self, model: &VarResults, nlags: usize) -> ModelResult<WhitenessTest>;

    /// Normality test on the residuals of `model`.
    fn test_normality(&self, model: &VarResults) -> ModelResult<NormalityTest>;
}

/// Least-squares VAR estimation.
#[derive(Debug, Clone, Copy)]
pub struct OlsVarEstimator {
    signif: f64,
}

impl OlsVarEstimator {
    pub fn new(signif: f64) -> Self {
        Self { signif }
    }
}

impl Default for OlsVarEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE)
    }
}

impl VarEstimator for OlsVarEstimator {
    fn select_order(&self, data: &TimeSeriesTable) -> ModelResult<LagOrderResults> {
        VarResults::select_order(data, None)
    }

    fn fit(&self, data: &TimeSeriesTable, lags: usize) -> ModelResult<VarResults> {
        VarResults::fit(data, lags)
    }

    fn test_whiteness(&self, model: &VarResults, nlags: usize) -> ModelResult<WhitenessTest> {
        model.test_whiteness(nlags, self.signif)
    }

    fn test_normality(&self, model: &VarResults) -> ModelResult<NormalityTest> {
        model.test_normality(self.signif)
    }
}

/// Fitted model for one variable ordering, with its diagnostics.
#[derive(Debug, Clone)]
pub struct VarFitOutcome {
    pub order: usize,
    pub model: VarResults,
    pub whiteness: WhitenessTest,
    pub normality: NormalityTest,
    pub lag_order: LagOrderResults,
    /// Number of refits performed after the initial fit.
    pub refits: usize,
}

/// Lags for the Portmanteau test: `max(round(sqrt(n)), order + 1)`.
pub fn whiteness_lags(user: &str, sample_size: usize, order: usize) -> usize {
    let lags = ((sample_size as f64).sqrt().round() as usize).max(order + 1);
    info!(
        user = %user,
        lags,
        order,
        sample_size,
        "Portmanteau test lags computed"
    );
    lags
}

/// Selects a VAR order and raises it until the residuals look white.
pub struct VarFitter<E: VarEstimator> {
    estimator: E,
    criterion: InformationCriterion,
    max_order: usize,
}

impl<E: VarEstimator> VarFitter<E> {
    /// Create a fitter using `criterion` for the initial order.
    pub fn new(estimator: E, criterion: InformationCriterion) -> Self {
        Self {
            estimator,
            criterion,
            max_order: DEFAULT_MAX_ORDER,
        }
    }

    /// Override the order ceiling of the refinement loop.
    pub fn with_max_order(mut self, max_order: usize) -> Self {
        self.max_order = max_order;
        self
    }

    /// Criterion used for the initial order.
    pub fn criterion(&self) -> InformationCriterion {
        self.criterion
    }

    /// Fit `data`, refining the order while the whiteness test rejects.
    pub fn fit(
        &self,
        data: &TimeSeriesTable,
        user: &str,
        sample_size: usize,
    ) -> ModelResult<VarFitOutcome> {
        let lag_order = self.estimator.select_order(data)?;
        let mut order = lag_order.selected(self.criterion);
        info!(user = %user, criterion = %self.criterion, order, "VAR order selected");

        let mut model = self.estimator.fit(data, order)?;
        let mut whiteness = self
            .estimator
            .test_whiteness(&model, whiteness_lags(user, sample_size, order))?;
        let mut normality = self.estimator.test_normality(&model)?;
        let mut refits = 0;

        while whiteness.rejects() && order <= self.max_order {
            let next = order + 1;
            warn!(
                user = %user,
                order = next,
                "ALERT! Serial correlation in residuals, increasing lag order"
            );

            let step = self.estimator.fit(data, next).and_then(|candidate| {
                let whiteness = self
                    .estimator
                    .test_whiteness(&candidate, whiteness_lags(user, sample_size, next))?;
                let normality = self.estimator.test_normality(&candidate)?;
                Ok((candidate, whiteness, normality))
            });

            match step {
                Ok((candidate, next_whiteness, next_normality)) => {
                    order = next;
                    refits += 1;
                    model = candidate;
                    whiteness = next_whiteness;
                    normality = next_normality;
                }
                Err(e) => {
                    warn!(
                        user = %user,
                        order = next,
                        error = %e,
                        "VAR order not estimable, keeping VAR({})",
                        order
                    );
                    break;
                }
            }
        }

        Ok(VarFitOutcome {
            order,
            model,
            whiteness,
            normality,
            lag_order,
            refits,
        })
    }
}
