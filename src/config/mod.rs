use std::env;
use std::path::PathBuf;

use crate::analysis::StationarityPolicy;
use crate::data::{CalendarInterval, Metric};
use crate::error::AnalysisError;
use crate::report::RenderConfig;
use crate::stats::{InformationCriterion, DEFAULT_SIGNIFICANCE};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Dataset location
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub dataset_path: PathBuf,
}

/// Analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Index holding the pull-request documents, also used as project label.
    pub pull_request_index: String,
    pub interval: CalendarInterval,
    pub variables: Vec<Metric>,
    pub criterion: InformationCriterion,
    /// Horizon of impulse responses and variance decomposition.
    pub periods: usize,
    pub test_observations: usize,
    pub max_order: usize,
    pub significance: f64,
    pub stationarity_policy: StationarityPolicy,
}

/// Output locations and rendering settings
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub render: RenderConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Values that take precedence over the environment, typically from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub dataset_path: Option<PathBuf>,
    pub pull_request_index: Option<String>,
    pub interval: Option<CalendarInterval>,
    pub variables: Option<Vec<Metric>>,
    pub criterion: Option<InformationCriterion>,
    pub output_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pull_request_index: String::new(),
            interval: CalendarInterval::Week,
            variables: Metric::ALL.to_vec(),
            criterion: InformationCriterion::Bic,
            periods: 24,
            test_observations: 6,
            max_order: 12,
            significance: DEFAULT_SIGNIFICANCE,
            stationarity_policy: StationarityPolicy::Strict,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AnalysisError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| AnalysisError::Config {
                message: format!("{} is invalid: {}", key, e),
            }),
        _ => Ok(None),
    }
}

/// Parse a comma-separated metric list.
pub fn parse_variables(raw: &str) -> Result<Vec<Metric>, AnalysisError> {
    let mut variables = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let metric: Metric = name.parse().map_err(|e| AnalysisError::Config {
            message: format!("VARIABLES is invalid: {}", e),
        })?;
        if !variables.contains(&metric) {
            variables.push(metric);
        }
    }
    if variables.len() < 2 {
        return Err(AnalysisError::Config {
            message: "VARIABLES needs at least two distinct metrics".to_string(),
        });
    }
    Ok(variables)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::load(&ConfigOverrides::default())
    }

    /// Load configuration from environment variables, then apply `overrides`
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, AnalysisError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let dataset_path = match &overrides.dataset_path {
            Some(path) => path.clone(),
            None => PathBuf::from(env::var("DATASET_PATH").map_err(|_| AnalysisError::Config {
                message: "DATASET_PATH is required".to_string(),
            })?),
        };

        let pull_request_index = match &overrides.pull_request_index {
            Some(index) => index.clone(),
            None => env::var("PULL_REQUEST_INDEX").map_err(|_| AnalysisError::Config {
                message: "PULL_REQUEST_INDEX is required".to_string(),
            })?,
        };

        let defaults = AnalysisConfig::default();
        let variables = match &overrides.variables {
            Some(variables) => variables.clone(),
            None => match env::var("VARIABLES") {
                Ok(raw) if !raw.trim().is_empty() => parse_variables(&raw)?,
                _ => defaults.variables.clone(),
            },
        };

        let significance = parse_env("SIGNIFICANCE")?.unwrap_or(defaults.significance);
        if !(0.0..1.0).contains(&significance) || significance == 0.0 {
            return Err(AnalysisError::Config {
                message: format!("SIGNIFICANCE must be in (0, 1), got {}", significance),
            });
        }

        let analysis = AnalysisConfig {
            pull_request_index,
            interval: match overrides.interval {
                Some(interval) => interval,
                None => parse_env("CALENDAR_INTERVAL")?.unwrap_or(defaults.interval),
            },
            variables,
            criterion: match overrides.criterion {
                Some(criterion) => criterion,
                None => parse_env("INFORMATION_CRITERION")?.unwrap_or(defaults.criterion),
            },
            periods: parse_env("STRUCTURAL_PERIODS")?.unwrap_or(defaults.periods),
            test_observations: parse_env("TEST_OBSERVATIONS")?
                .unwrap_or(defaults.test_observations),
            max_order: parse_env("MAX_VAR_ORDER")?.unwrap_or(defaults.max_order),
            significance,
            stationarity_policy: parse_env("STATIONARITY_POLICY")?
                .unwrap_or(defaults.stationarity_policy),
        };

        let output = OutputConfig {
            dir: overrides
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| ".".to_string()))),
            render: RenderConfig {
                style: env::var("PLOT_STYLE").unwrap_or_else(|_| RenderConfig::default().style),
                ..RenderConfig::default()
            },
        };

        let logging = LoggingConfig {
            level: overrides
                .log_level
                .clone()
                .unwrap_or_else(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            source: SourceConfig { dataset_path },
            analysis,
            output,
            logging,
        })
    }
}
