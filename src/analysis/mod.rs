//! VAR causality pipeline.
//!
//! Per user: consolidate the activity series, difference them, test every
//! variable for stationarity, then fit a VAR for every ordering of the
//! variables and run Granger causality, impulse response and variance
//! decomposition on each fit. Per project: repeat for every merger and
//! collect one flat summary row per user.

mod fitter;
mod orchestrator;
mod permutation;
mod stationarity;
mod structural;
mod summary;

pub use fitter::{
    whiteness_lags, OlsVarEstimator, VarEstimator, VarFitOutcome, VarFitter, DEFAULT_MAX_ORDER,
};
pub use orchestrator::ProjectAnalyzer;
pub use permutation::{permutations, PermutationDriver, DEFAULT_TEST_OBSERVATIONS};
pub use stationarity::{check_stationarity, StationarityPolicy, StationarityVerdict};
pub use structural::{CausalPair, StructuralAnalyzer, DEFAULT_PERIODS};
pub use summary::{
    join_values, AnalysisSummary, PermutationOutcome, PermutationSummary, ProjectAnalysis,
};
