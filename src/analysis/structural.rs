use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{error, info};

use crate::data::Metric;
use crate::error::{error_chain, AnalysisError, AnalysisResult};
use crate::report::{ArtifactLabels, PlotSink, ReportSink};
use crate::stats::{VarResults, DEFAULT_SIGNIFICANCE};

/// Default horizon for impulse responses and variance decomposition.
pub const DEFAULT_PERIODS: usize = 24;

/// Ordered (cause, effect) pair, rendered as `cause->effect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CausalPair {
    pub cause: Metric,
    pub effect: Metric,
}

impl CausalPair {
    pub fn new(cause: Metric, effect: Metric) -> Self {
        Self { cause, effect }
    }

    /// Every ordered pair of distinct variables, cause-major.
    pub fn all(variables: &[Metric]) -> Vec<CausalPair> {
        variables
            .iter()
            .flat_map(|cause| {
                variables
                    .iter()
                    .filter(move |effect| *effect != cause)
                    .map(move |effect| CausalPair::new(*cause, *effect))
            })
            .collect()
    }
}

impl fmt::Display for CausalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.cause, self.effect)
    }
}

impl Serialize for CausalPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Granger causality, impulse response and variance decomposition for one
/// fitted model.
pub struct StructuralAnalyzer<'a> {
    report: &'a dyn ReportSink,
    plots: &'a dyn PlotSink,
    periods: usize,
    signif: f64,
}

impl<'a> StructuralAnalyzer<'a> {
    pub fn new(report: &'a dyn ReportSink, plots: &'a dyn PlotSink, periods: usize) -> Self {
        Self {
            report,
            plots,
            periods,
            signif: DEFAULT_SIGNIFICANCE,
        }
    }

    /// Run the analysis. Failures are logged and the verdicts computed
    /// before the failure are returned.
    pub fn analyse(
        &self,
        variables: &[Metric],
        model: &VarResults,
        labels: &ArtifactLabels,
        permutation: usize,
    ) -> BTreeMap<CausalPair, bool> {
        let mut verdicts = BTreeMap::new();
        if let Err(e) = self.run(variables, model, labels, permutation, &mut verdicts) {
            let kind = match &e {
                AnalysisError::Model(_) => "numerical failure",
                AnalysisError::Render(_) => "rendering failure",
                AnalysisError::Report(_) => "report failure",
                _ => "failure",
            };
            error!(
                user = %labels.user,
                permutation,
                kind,
                error = %error_chain(&e),
                "Cannot do structural analysis"
            );
        }
        verdicts
    }

    fn run(
        &self,
        variables: &[Metric],
        model: &VarResults,
        labels: &ArtifactLabels,
        permutation: usize,
        verdicts: &mut BTreeMap<CausalPair, bool>,
    ) -> AnalysisResult<()> {
        for pair in CausalPair::all(variables) {
            let test = model.test_causality(pair.cause, pair.effect, self.signif)?;
            self.report
                .append(&labels.user, permutation, &test.to_string())?;

            let causal = test.rejects();
            info!(
                user = %labels.user,
                permutation,
                pair = %pair,
                p_value = test.test.p_value,
                causal,
                "Granger causality tested"
            );
            verdicts.insert(pair, causal);
        }

        let irf = model.irf(self.periods)?;
        self.plots
            .plot_impulse_response(labels, permutation, &irf)?;
        self.plots
            .plot_cumulative_response(labels, permutation, &irf)?;

        let fevd = model.fevd(self.periods)?;
        self.plots
            .plot_variance_decomposition(labels, permutation, &fevd)?;

        Ok(())
    }
}
