use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::Metric;
use crate::error::ModelResult;
use crate::stats::{adfuller, AdfResult};

/// How a non-significant ADF p-value is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationarityPolicy {
    /// Stationary only when the unit root is rejected.
    #[default]
    Strict,
    /// Every series is treated as stationary, whatever the p-value.
    AlwaysStationary,
}

impl StationarityPolicy {
    /// Classify a p-value against `threshold`.
    pub fn classify(&self, p_value: f64, threshold: f64) -> bool {
        match self {
            StationarityPolicy::Strict => p_value <= threshold,
            StationarityPolicy::AlwaysStationary => true,
        }
    }
}

impl fmt::Display for StationarityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationarityPolicy::Strict => write!(f, "strict"),
            StationarityPolicy::AlwaysStationary => write!(f, "always_stationary"),
        }
    }
}

impl FromStr for StationarityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(StationarityPolicy::Strict),
            "always_stationary" | "always" => Ok(StationarityPolicy::AlwaysStationary),
            other => Err(format!("unknown stationarity policy '{}'", other)),
        }
    }
}

/// Verdict for one variable.
#[derive(Debug, Clone)]
pub struct StationarityVerdict {
    pub metric: Metric,
    pub stationary: bool,
    pub test: AdfResult,
}

/// Run the ADF test on a differenced series and classify it.
pub fn check_stationarity(
    metric: Metric,
    series: &[f64],
    threshold: f64,
    policy: StationarityPolicy,
) -> ModelResult<StationarityVerdict> {
    let test = adfuller(series)?;
    let stationary = policy.classify(test.p_value, threshold);

    info!(
        variable = %metric,
        statistic = test.statistic,
        p_value = test.p_value,
        stationary,
        "ADF test completed"
    );

    Ok(StationarityVerdict {
        metric,
        stationary,
        test,
    })
}
