//! # PR Causality
//!
//! Exploratory time-series causal analysis of pull-request collaboration.
//!
//! For every user who merges pull requests of other developers, the crate
//! builds a weekly (or daily, monthly...) multivariate count series of merges
//! performed, merge requests received and merges obtained, tests it for
//! stationarity, fits a Vector Autoregression for every ordering of the
//! variables and reports residual diagnostics, Granger causality, impulse
//! responses and forecast-error variance decompositions.
//!
//! ## Architecture
//!
//! ```text
//! DataProvider → consolidate → difference → ADF per variable
//!                                   ↓
//!                 for each permutation: VAR order selection + refinement
//!                                   ↓
//!            Granger causality, IRF, FEVD → ReportSink / PlotSink
//!                                   ↓
//!                       AnalysisSummary per user
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pr_causality::analysis::ProjectAnalyzer;
//! use pr_causality::data::JsonDatasetProvider;
//! use pr_causality::report::{JsonFigureSink, TextReportSink};
//! use pr_causality::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let provider = JsonDatasetProvider::from_path(&config.source.dataset_path)?;
//!     let report = TextReportSink::new(&config.output.dir);
//!     let plots = JsonFigureSink::new(&config.output.dir, config.output.render.clone());
//!     let analyzer = ProjectAnalyzer::new(&provider, &report, &plots, config.analysis.clone());
//!     println!("{}", analyzer.analyse_project()?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Per-user and per-project analysis pipeline.
pub mod analysis;
/// Configuration management.
pub mod config;
/// Time-series data model and data providers.
pub mod data;
/// Error types and result aliases for the application.
pub mod error;
/// Text report and figure sinks.
pub mod report;
/// Statistical estimators and tests.
pub mod stats;

pub use config::Config;
pub use error::{AnalysisError, AnalysisResult};
