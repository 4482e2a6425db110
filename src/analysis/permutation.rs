use tracing::{error, info};

use super::fitter::{VarEstimator, VarFitter};
use super::structural::StructuralAnalyzer;
use super::summary::{join_values, PermutationOutcome, PermutationSummary};
use crate::data::{Metric, TimeSeriesTable};
use crate::error::AnalysisResult;
use crate::report::{ArtifactLabels, ReportSink};

/// Observations held out at the end of every training table.
pub const DEFAULT_TEST_OBSERVATIONS: usize = 6;

/// Every ordering of `items`, lexicographic by position.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }

    let mut result = Vec::new();
    for (i, first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first.clone());
            result.push(tail);
        }
    }
    result
}

/// Fits a VAR for every ordering of the variables and accumulates the results.
pub struct PermutationDriver<'a, E: VarEstimator> {
    fitter: &'a VarFitter<E>,
    structural: StructuralAnalyzer<'a>,
    report: &'a dyn ReportSink,
    test_observations: usize,
}

impl<'a, E: VarEstimator> PermutationDriver<'a, E> {
    pub fn new(
        fitter: &'a VarFitter<E>,
        structural: StructuralAnalyzer<'a>,
        report: &'a dyn ReportSink,
    ) -> Self {
        Self {
            fitter,
            structural,
            report,
            test_observations: DEFAULT_TEST_OBSERVATIONS,
        }
    }

    pub fn with_test_observations(mut self, test_observations: usize) -> Self {
        self.test_observations = test_observations;
        self
    }

    /// Run every permutation of `variables` over the differenced `data`.
    pub fn run(
        &self,
        data: &TimeSeriesTable,
        variables: &[Metric],
        labels: &ArtifactLabels,
    ) -> AnalysisResult<PermutationSummary> {
        let user = labels.user.as_str();
        let (train, test) = data.split_at(data.len().saturating_sub(self.test_observations));
        info!(
            user = %user,
            train = train.len(),
            test = test.len(),
            "Training and test data split"
        );

        let mut summary = PermutationSummary::new(train.len());
        for (index, ordering) in permutations(variables).into_iter().enumerate() {
            info!(user = %user, permutation = index, ordering = %join_values(&ordering), "Fitting permutation");

            let ordered = train.select(&ordering)?;
            let outcome = self.fitter.fit(&ordered, user, train.len())?;

            self.report.begin(user, index)?;
            for block in [
                outcome.lag_order.to_string(),
                outcome.model.to_string(),
                outcome.whiteness.to_string(),
                outcome.normality.to_string(),
            ] {
                self.report.append(user, index, &block)?;
            }

            let serial_correlation = outcome.whiteness.rejects();
            if serial_correlation {
                error!(user = %user, permutation = index, "ALERT! Serial correlation found in the residuals");
            }
            let residual_white_noise = !outcome.normality.rejects();
            if !residual_white_noise {
                error!(user = %user, permutation = index, "ALERT! Residuals are NOT Gaussian white noise");
            }

            let causality = self
                .structural
                .analyse(variables, &outcome.model, labels, index);

            summary.record(PermutationOutcome {
                index,
                ordering,
                order: outcome.model.k_ar(),
                serial_correlation,
                residual_white_noise,
                causality,
            });
        }

        Ok(summary)
    }
}
