//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides, and that CLI overrides win over the
//! environment.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use pr_causality::analysis::StationarityPolicy;
use pr_causality::config::{Config, ConfigOverrides, LogFormat};
use pr_causality::data::{CalendarInterval, Metric};
use pr_causality::stats::InformationCriterion;
use pr_causality::AnalysisError;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

const OPTIONAL_KEYS: [&str; 12] = [
    "CALENDAR_INTERVAL",
    "VARIABLES",
    "INFORMATION_CRITERION",
    "OUTPUT_DIR",
    "STRUCTURAL_PERIODS",
    "TEST_OBSERVATIONS",
    "MAX_VAR_ORDER",
    "SIGNIFICANCE",
    "STATIONARITY_POLICY",
    "PLOT_STYLE",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

fn set_required() {
    env::set_var("DATASET_PATH", "/data/pull-requests.json");
    env::set_var("PULL_REQUEST_INDEX", "pull-requests");
}

fn clear_all() {
    env::remove_var("DATASET_PATH");
    env::remove_var("PULL_REQUEST_INDEX");
    for key in OPTIONAL_KEYS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_config_from_env_defaults() {
    clear_all();
    set_required();

    let config = Config::from_env().unwrap();
    assert_eq!(config.source.dataset_path, PathBuf::from("/data/pull-requests.json"));
    assert_eq!(config.analysis.pull_request_index, "pull-requests");
    assert_eq!(config.analysis.interval, CalendarInterval::Week);
    assert_eq!(config.analysis.variables, Metric::ALL.to_vec());
    assert_eq!(config.analysis.criterion, InformationCriterion::Bic);
    assert_eq!(config.analysis.periods, 24);
    assert_eq!(config.analysis.test_observations, 6);
    assert_eq!(config.analysis.max_order, 12);
    assert_eq!(config.analysis.stationarity_policy, StationarityPolicy::Strict);
    assert_eq!(config.output.dir, PathBuf::from("."));
    assert_eq!(config.output.render.style, "fivethirtyeight");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);

    clear_all();
}

#[test]
#[serial]
fn test_config_from_env_requires_dataset_path() {
    clear_all();
    env::set_var("PULL_REQUEST_INDEX", "pull-requests");

    let result = Config::from_env();
    assert!(matches!(result, Err(AnalysisError::Config { .. })));

    clear_all();
}

#[test]
#[serial]
fn test_config_from_env_requires_index() {
    clear_all();
    env::set_var("DATASET_PATH", "/data/pull-requests.json");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("PULL_REQUEST_INDEX"));

    clear_all();
}

#[test]
#[serial]
fn test_config_from_env_custom_analysis() {
    clear_all();
    set_required();
    env::set_var("CALENDAR_INTERVAL", "month");
    env::set_var("VARIABLES", "merges_successful,merges_performed");
    env::set_var("INFORMATION_CRITERION", "aic");
    env::set_var("STRUCTURAL_PERIODS", "12");
    env::set_var("TEST_OBSERVATIONS", "4");
    env::set_var("MAX_VAR_ORDER", "8");
    env::set_var("SIGNIFICANCE", "0.01");
    env::set_var("STATIONARITY_POLICY", "always_stationary");

    let config = Config::from_env().unwrap();
    assert_eq!(config.analysis.interval, CalendarInterval::Month);
    assert_eq!(
        config.analysis.variables,
        vec![Metric::MergesSuccessful, Metric::MergesPerformed]
    );
    assert_eq!(config.analysis.criterion, InformationCriterion::Aic);
    assert_eq!(config.analysis.periods, 12);
    assert_eq!(config.analysis.test_observations, 4);
    assert_eq!(config.analysis.max_order, 8);
    assert_eq!(config.analysis.significance, 0.01);
    assert_eq!(
        config.analysis.stationarity_policy,
        StationarityPolicy::AlwaysStationary
    );

    clear_all();
}

#[test]
#[serial]
fn test_config_from_env_rejects_invalid_values() {
    clear_all();
    set_required();

    env::set_var("INFORMATION_CRITERION", "r2");
    assert!(Config::from_env().is_err());
    env::remove_var("INFORMATION_CRITERION");

    env::set_var("STRUCTURAL_PERIODS", "many");
    assert!(Config::from_env().is_err());
    env::remove_var("STRUCTURAL_PERIODS");

    env::set_var("SIGNIFICANCE", "1.5");
    assert!(Config::from_env().is_err());

    clear_all();
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    clear_all();
    set_required();
    env::set_var("LOG_FORMAT", "json");
    env::set_var("PLOT_STYLE", "ggplot");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.output.render.style, "ggplot");

    clear_all();
}

#[test]
#[serial]
fn test_overrides_win_over_environment() {
    clear_all();
    set_required();
    env::set_var("CALENDAR_INTERVAL", "day");
    env::set_var("OUTPUT_DIR", "/from/env");

    let overrides = ConfigOverrides {
        pull_request_index: Some("other-index".to_string()),
        interval: Some(CalendarInterval::Quarter),
        output_dir: Some(PathBuf::from("/from/cli")),
        log_level: Some("debug".to_string()),
        ..ConfigOverrides::default()
    };
    let config = Config::load(&overrides).unwrap();

    assert_eq!(config.analysis.pull_request_index, "other-index");
    assert_eq!(config.analysis.interval, CalendarInterval::Quarter);
    assert_eq!(config.output.dir, PathBuf::from("/from/cli"));
    assert_eq!(config.logging.level, "debug");

    clear_all();
}

#[test]
#[serial]
fn test_overrides_satisfy_required_keys() {
    clear_all();

    let overrides = ConfigOverrides {
        dataset_path: Some(PathBuf::from("dataset.json")),
        pull_request_index: Some("pull-requests".to_string()),
        ..ConfigOverrides::default()
    };
    let config = Config::load(&overrides).unwrap();
    assert_eq!(config.source.dataset_path, PathBuf::from("dataset.json"));

    clear_all();
}
