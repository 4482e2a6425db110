//! Figure artifacts.
//!
//! Figures are described as data (titled panels of labelled series) and
//! persisted as JSON together with the rendering configuration, one file per
//! figure under `{output}/img/`. Rasterisation is left to an external renderer.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{CalendarInterval, Metric, TimeSeriesTable};
use crate::error::{RenderError, RenderResult};
use crate::stats::{ImpulseResponse, SeasonalDecomposition, VarianceDecomposition};

/// Process-wide rendering settings, built once from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Named plot style.
    pub style: String,
    /// Size of series and decomposition figures, in inches.
    pub figure_size: (f64, f64),
    /// Size of impulse response and variance decomposition figures.
    pub structural_figure_size: (f64, f64),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            style: "fivethirtyeight".to_string(),
            figure_size: (20.0, 10.0),
            structural_figure_size: (15.0, 15.0),
        }
    }
}

/// Identifies the user and project a figure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLabels {
    pub user: String,
    pub project: String,
    pub interval: CalendarInterval,
}

impl ArtifactLabels {
    fn stem(&self, figure: &str) -> String {
        format!("{}_{}_{}", self.user, self.project, figure)
    }

    fn structural_stem(&self, figure: &str, permutation: usize) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.user,
            self.project,
            figure,
            self.interval.as_str(),
            permutation
        )
    }
}

/// One labelled line inside a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub panel: String,
    pub label: String,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
}

/// A complete figure ready to be rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub style: String,
    pub size: (f64, f64),
    pub series: Vec<Series>,
}

/// Destination for analysis figures.
///
/// Each method returns the path of the artifact it wrote. PNG images are
/// produced by an external renderer; [`JsonFigureSink`] writes the figure
/// description that renderer consumes, under the same file stem.
#[cfg_attr(test, mockall::automock)]
pub trait PlotSink {
    /// Line plot of every column of `table`, saved under `title`.
    fn plot_table(&self, table: &TimeSeriesTable, title: &str) -> RenderResult<PathBuf>;

    /// Observed, trend, seasonal and residual panels for one column.
    fn plot_seasonal_decomposition(
        &self,
        labels: &ArtifactLabels,
        column: Metric,
        index: &[NaiveDate],
        decomposition: &SeasonalDecomposition,
    ) -> RenderResult<PathBuf>;

    /// Grid of impulse responses.
    fn plot_impulse_response(
        &self,
        labels: &ArtifactLabels,
        permutation: usize,
        irf: &ImpulseResponse,
    ) -> RenderResult<PathBuf>;

    /// Grid of cumulative impulse responses.
    fn plot_cumulative_response(
        &self,
        labels: &ArtifactLabels,
        permutation: usize,
        irf: &ImpulseResponse,
    ) -> RenderResult<PathBuf>;

    /// One panel of shock shares per variable.
    fn plot_variance_decomposition(
        &self,
        labels: &ArtifactLabels,
        permutation: usize,
        fevd: &VarianceDecomposition,
    ) -> RenderResult<PathBuf>;
}

/// Writes each figure as `{stem}.json`.
#[derive(Debug, Clone)]
pub struct JsonFigureSink {
    dir: PathBuf,
    config: RenderConfig,
}

fn dates(index: &[NaiveDate]) -> Vec<String> {
    index.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect()
}

fn steps(n: usize) -> Vec<String> {
    (0..n).map(|h| h.to_string()).collect()
}

impl JsonFigureSink {
    /// Create a sink rooted at `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>, config: RenderConfig) -> Self {
        Self {
            dir: output_dir.as_ref().join("img"),
            config,
        }
    }

    /// Path of the artifact for `stem`.
    pub fn artifact_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stem))
    }

    fn save(&self, stem: &str, size: (f64, f64), series: Vec<Series>) -> RenderResult<PathBuf> {
        if series.is_empty() {
            return Err(RenderError::InvalidFigure {
                title: stem.to_string(),
                message: "figure has no series".to_string(),
            });
        }
        if let Some(bad) = series.iter().find(|s| s.x.len() != s.y.len() || s.y.is_empty()) {
            return Err(RenderError::InvalidFigure {
                title: stem.to_string(),
                message: format!("series '{}' in panel '{}' is empty or ragged", bad.label, bad.panel),
            });
        }

        let figure = Figure {
            title: stem.to_string(),
            style: self.config.style.clone(),
            size,
            series,
        };

        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(stem);
        fs::write(&path, serde_json::to_string_pretty(&figure)?)?;
        debug!(path = %path.display(), "Figure saved");
        Ok(path)
    }

    fn response_grid(irf: &ImpulseResponse, cumulative: bool) -> Vec<Series> {
        let mut series = Vec::new();
        for (j, impulse) in irf.names.iter().enumerate() {
            for (i, response) in irf.names.iter().enumerate() {
                series.push(Series {
                    panel: format!("{} -> {}", impulse, response),
                    label: response.to_string(),
                    x: steps(irf.periods + 1),
                    y: irf.path(j, i, cumulative).into_iter().map(Some).collect(),
                });
            }
        }
        series
    }
}

impl PlotSink for JsonFigureSink {
    fn plot_table(&self, table: &TimeSeriesTable, title: &str) -> RenderResult<PathBuf> {
        let x = dates(table.index());
        let series = table
            .columns()
            .iter()
            .filter_map(|metric| {
                table.column(*metric).map(|values| Series {
                    panel: title.to_string(),
                    label: metric.to_string(),
                    x: x.clone(),
                    y: values.iter().copied().map(Some).collect(),
                })
            })
            .collect();
        self.save(title, self.config.figure_size, series)
    }

    fn plot_seasonal_decomposition(
        &self,
        labels: &ArtifactLabels,
        column: Metric,
        index: &[NaiveDate],
        decomposition: &SeasonalDecomposition,
    ) -> RenderResult<PathBuf> {
        let stem = labels.stem(&format!("seasonal_decomposition_{}", column));
        if index.len() != decomposition.observed.len() {
            return Err(RenderError::InvalidFigure {
                title: stem,
                message: format!(
                    "{} dates for {} observations",
                    index.len(),
                    decomposition.observed.len()
                ),
            });
        }

        let x = dates(index);
        let component = |panel: &str, y: Vec<Option<f64>>| Series {
            panel: panel.to_string(),
            label: column.to_string(),
            x: x.clone(),
            y,
        };
        let series = vec![
            component("observed", decomposition.observed.iter().copied().map(Some).collect()),
            component("trend", decomposition.trend.clone()),
            component("seasonal", decomposition.seasonal.iter().copied().map(Some).collect()),
            component("resid", decomposition.resid.clone()),
        ];
        self.save(&stem, self.config.figure_size, series)
    }

    fn plot_impulse_response(
        &self,
        labels: &ArtifactLabels,
        permutation: usize,
        irf: &ImpulseResponse,
    ) -> RenderResult<PathBuf> {
        let stem = labels.structural_stem("impulse_response", permutation);
        self.save(&stem, self.config.structural_figure_size, Self::response_grid(irf, false))
    }

    fn plot_cumulative_response(
        &self,
        labels: &ArtifactLabels,
        permutation: usize,
        irf: &ImpulseResponse,
    ) -> RenderResult<PathBuf> {
        let stem = labels.structural_stem("cumulative_response", permutation);
        self.save(&stem, self.config.structural_figure_size, Self::response_grid(irf, true))
    }

    fn plot_variance_decomposition(
        &self,
        labels: &ArtifactLabels,
        permutation: usize,
        fevd: &VarianceDecomposition,
    ) -> RenderResult<PathBuf> {
        let stem = labels.structural_stem("variance_decomposition", permutation);
        let mut series = Vec::new();
        for (i, variable) in fevd.names.iter().enumerate() {
            for (j, shock) in fevd.names.iter().enumerate() {
                series.push(Series {
                    panel: format!("FEVD for {}", variable),
                    label: shock.to_string(),
                    x: steps(fevd.periods),
                    y: (0..fevd.periods)
                        .map(|h| Some(fevd.decomposition[i][(h, j)]))
                        .collect(),
                });
            }
        }
        self.save(&stem, self.config.structural_figure_size, series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::seasonal_decompose;
    use tempfile::TempDir;

    fn labels() -> ArtifactLabels {
        ArtifactLabels {
            user: "octocat".to_string(),
            project: "pull-requests".to_string(),
            interval: CalendarInterval::Week,
        }
    }

    fn weekly(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n).map(|i| start + chrono::Duration::weeks(i as i64)).collect()
    }

    #[test]
    fn test_render_config_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.style, "fivethirtyeight");
        assert_eq!(config.figure_size, (20.0, 10.0));
        assert_eq!(config.structural_figure_size, (15.0, 15.0));
    }

    #[test]
    fn test_structural_stem_layout() {
        assert_eq!(
            labels().structural_stem("impulse_response", 4),
            "octocat_pull-requests_impulse_response_week_4"
        );
    }

    #[test]
    fn test_plot_table_writes_figure_with_config() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFigureSink::new(dir.path(), RenderConfig::default());
        let table = TimeSeriesTable::new(
            weekly(3),
            vec![(Metric::MergesPerformed, vec![1.0, 0.0, 2.0])],
        )
        .unwrap();

        let path = sink.plot_table(&table, "octocat before differencing").unwrap();
        assert_eq!(path, dir.path().join("img/octocat before differencing.json"));

        let figure: Figure = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(figure.style, "fivethirtyeight");
        assert_eq!(figure.series.len(), 1);
        assert_eq!(figure.series[0].x[0], "2023-01-02");
        assert_eq!(figure.series[0].y, vec![Some(1.0), Some(0.0), Some(2.0)]);
    }

    #[test]
    fn test_empty_table_is_invalid_figure() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFigureSink::new(dir.path(), RenderConfig::default());

        let err = sink.plot_table(&TimeSeriesTable::empty(), "empty").unwrap_err();
        assert!(matches!(err, RenderError::InvalidFigure { .. }));
    }

    #[test]
    fn test_seasonal_decomposition_artifact_name() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFigureSink::new(dir.path(), RenderConfig::default());
        let values: Vec<f64> = (0..8).map(|t| (t % 4) as f64).collect();
        let decomposition = seasonal_decompose(&values, 4).unwrap();

        let path = sink
            .plot_seasonal_decomposition(&labels(), Metric::MergesPerformed, &weekly(8), &decomposition)
            .unwrap();
        assert!(path.ends_with(
            "img/octocat_pull-requests_seasonal_decomposition_merges_performed.json"
        ));
    }

    #[test]
    fn test_seasonal_decomposition_rejects_mismatched_dates() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFigureSink::new(dir.path(), RenderConfig::default());
        let values: Vec<f64> = (0..8).map(|t| (t % 4) as f64).collect();
        let decomposition = seasonal_decompose(&values, 4).unwrap();

        let result =
            sink.plot_seasonal_decomposition(&labels(), Metric::MergesPerformed, &weekly(5), &decomposition);
        assert!(matches!(result, Err(RenderError::InvalidFigure { .. })));
    }
}
