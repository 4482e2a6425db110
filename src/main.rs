use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pr_causality::{
    analysis::ProjectAnalyzer,
    config::{parse_variables, Config, ConfigOverrides, LogFormat},
    data::{CalendarInterval, JsonDatasetProvider},
    report::{JsonFigureSink, TextReportSink},
    stats::InformationCriterion,
};

/// Output format of the project summary.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

/// VAR and Granger causality analysis of pull-request merges.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Pre-bucketed JSON dataset (overrides DATASET_PATH)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Index to analyse (overrides PULL_REQUEST_INDEX)
    #[arg(long)]
    index: Option<String>,

    /// Calendar interval: day, week, month, quarter or year
    #[arg(long)]
    interval: Option<String>,

    /// Comma-separated metrics, e.g. merges_performed,merges_requested
    #[arg(long)]
    variables: Option<String>,

    /// Lag-order criterion: aic, bic, hqic or fpe
    #[arg(long)]
    criterion: Option<String>,

    /// Directory receiving txt/ and img/ artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Summary output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

impl Cli {
    fn overrides(&self) -> anyhow::Result<ConfigOverrides> {
        Ok(ConfigOverrides {
            dataset_path: self.dataset.clone(),
            pull_request_index: self.index.clone(),
            interval: self
                .interval
                .as_deref()
                .map(str::parse::<CalendarInterval>)
                .transpose()?,
            variables: self.variables.as_deref().map(parse_variables).transpose()?,
            criterion: self
                .criterion
                .as_deref()
                .map(str::parse::<InformationCriterion>)
                .transpose()
                .map_err(anyhow::Error::msg)?,
            output_dir: self.output_dir.clone(),
            log_level: self.log_level.clone(),
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.overrides().and_then(|o| Ok(Config::load(&o)?)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        index = %config.analysis.pull_request_index,
        interval = %config.analysis.interval,
        criterion = %config.analysis.criterion,
        "PR causality analysis starting..."
    );

    let provider = match JsonDatasetProvider::from_path(&config.source.dataset_path) {
        Ok(p) => {
            info!(path = %config.source.dataset_path.display(), "Dataset loaded");
            p
        }
        Err(e) => {
            error!(error = %e, "Failed to load dataset");
            return Err(e.into());
        }
    };

    let report = TextReportSink::new(&config.output.dir);
    let plots = JsonFigureSink::new(&config.output.dir, config.output.render.clone());
    let analyzer = ProjectAnalyzer::new(&provider, &report, &plots, config.analysis.clone());

    let project = match analyzer.analyse_project() {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Project analysis failed");
            return Err(e.into());
        }
    };

    info!(
        users = project.summaries.len(),
        documents = project.documents,
        "Project analysis complete"
    );

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&project)?),
        OutputFormat::Table => println!("{}", project),
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
