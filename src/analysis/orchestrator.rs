use tracing::{error, info};

use super::fitter::{OlsVarEstimator, VarFitter};
use super::permutation::PermutationDriver;
use super::stationarity::check_stationarity;
use super::structural::StructuralAnalyzer;
use super::summary::{AnalysisSummary, ProjectAnalysis};
use crate::config::AnalysisConfig;
use crate::data::{consolidate_series, DataProvider, Metric, TimeSeriesTable};
use crate::error::{error_chain, AnalysisResult, ModelError, RenderError, RenderResult};
use crate::report::{ArtifactLabels, PlotSink, ReportSink};
use crate::stats::seasonal_decompose;

/// Runs the full analysis for every merger of a project.
pub struct ProjectAnalyzer<'a> {
    provider: &'a dyn DataProvider,
    report: &'a dyn ReportSink,
    plots: &'a dyn PlotSink,
    config: AnalysisConfig,
    fitter: VarFitter<OlsVarEstimator>,
}

impl<'a> ProjectAnalyzer<'a> {
    pub fn new(
        provider: &'a dyn DataProvider,
        report: &'a dyn ReportSink,
        plots: &'a dyn PlotSink,
        config: AnalysisConfig,
    ) -> Self {
        let fitter = VarFitter::new(OlsVarEstimator::new(config.significance), config.criterion)
            .with_max_order(config.max_order);
        Self {
            provider,
            report,
            plots,
            config,
            fitter,
        }
    }

    fn project(&self) -> &str {
        &self.config.pull_request_index
    }

    fn labels(&self, user: &str) -> ArtifactLabels {
        ArtifactLabels {
            user: user.to_string(),
            project: self.project().to_string(),
            interval: self.config.interval,
        }
    }

    /// Analyse every merger. Users that fail are logged and left out.
    pub fn analyse_project(&self) -> AnalysisResult<ProjectAnalysis> {
        let index = self.project();
        self.provider.refresh_index(index)?;
        let documents = self.provider.document_count(index)?;
        info!(index = %index, documents, "Documents on index");

        let mergers = self.provider.all_mergers(index)?;
        info!(index = %index, mergers = mergers.len(), "Mergers found");

        let mut summaries = Vec::new();
        for user in &mergers {
            match self.analyse_user(user) {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) => {
                    error!(user = %user, error = %error_chain(&e), "Cannot analyse user");
                }
            }
        }

        Ok(ProjectAnalysis {
            project: index.to_string(),
            documents,
            summaries,
        })
    }

    /// Analyse one user. `None` when the user has no usable data.
    pub fn analyse_user(&self, user: &str) -> AnalysisResult<Option<AnalysisSummary>> {
        let variables = &self.config.variables;
        let raw = consolidate_series(
            self.provider,
            self.project(),
            user,
            variables,
            self.config.interval,
        )?;
        if raw.is_empty() {
            info!(user = %user, index = %self.project(), "No data points for user");
            return Ok(None);
        }
        info!(
            user = %user,
            data_points = raw.len(),
            interval = %self.config.interval,
            "Data consolidated"
        );

        let totals = raw.totals();
        let differenced = raw.diff();
        info!(user = %user, "Applying 1st order differencing to the data");

        let mut stationary = Vec::with_capacity(variables.len());
        for metric in variables {
            let series = differenced
                .column(*metric)
                .ok_or_else(|| ModelError::UnknownVariable {
                    name: metric.to_string(),
                })?;
            let verdict = check_stationarity(
                *metric,
                series,
                self.config.significance,
                self.config.stationarity_policy,
            )?;
            if !verdict.stationary {
                error!(user = %user, variable = %metric, "ALERT! Variable is not stationary");
            }
            stationary.push((*metric, verdict.stationary));
        }

        let labels = self.labels(user);
        let structural = StructuralAnalyzer::new(self.report, self.plots, self.config.periods);
        let driver = PermutationDriver::new(&self.fitter, structural, self.report)
            .with_test_observations(self.config.test_observations);
        let permutations = driver.run(&differenced.select(variables)?, variables, &labels)?;

        if let Err(e) = self.plot_diagnostics(&raw, &differenced, &labels) {
            error!(
                user = %user,
                error = %error_chain(&e),
                "Error while building diagnosis plots"
            );
        }

        Ok(Some(AnalysisSummary::new(
            user,
            raw.len(),
            self.project(),
            totals,
            stationary,
            &permutations,
        )))
    }

    fn plot_diagnostics(
        &self,
        raw: &TimeSeriesTable,
        differenced: &TimeSeriesTable,
        labels: &ArtifactLabels,
    ) -> RenderResult<()> {
        let prefix = format!("{}_{}", labels.user, labels.project);
        self.plots
            .plot_table(raw, &format!("{}_before_differencing", prefix))?;
        self.plots
            .plot_table(differenced, &format!("{}_after_differencing", prefix))?;

        let column = Metric::MergesPerformed;
        let series = raw.column(column).ok_or_else(|| RenderError::InvalidFigure {
            title: format!("{}_seasonal_decomposition_{}", prefix, column),
            message: format!("{} is not part of the analysed variables", column),
        })?;
        let decomposition = seasonal_decompose(series, self.config.interval.seasonal_period())
            .map_err(|e| RenderError::InvalidFigure {
                title: format!("{}_seasonal_decomposition_{}", prefix, column),
                message: e.to_string(),
            })?;
        self.plots
            .plot_seasonal_decomposition(labels, column, raw.index(), &decomposition)?;
        Ok(())
    }
}
