use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::CausalPair;
use crate::data::Metric;

/// Result of fitting one variable ordering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermutationOutcome {
    pub index: usize,
    pub ordering: Vec<Metric>,
    pub order: usize,
    pub serial_correlation: bool,
    pub residual_white_noise: bool,
    pub causality: BTreeMap<CausalPair, bool>,
}

/// Distinct values observed across every permutation of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PermutationSummary {
    pub train_sample_size: usize,
    pub var_orders: BTreeSet<usize>,
    pub serial_correlation: BTreeSet<bool>,
    pub residual_white_noise: BTreeSet<bool>,
    pub causality: BTreeMap<CausalPair, BTreeSet<bool>>,
    pub permutations: Vec<PermutationOutcome>,
}

impl PermutationSummary {
    pub fn new(train_sample_size: usize) -> Self {
        Self {
            train_sample_size,
            ..Self::default()
        }
    }

    /// Fold one permutation into the accumulated sets.
    pub fn record(&mut self, outcome: PermutationOutcome) {
        self.var_orders.insert(outcome.order);
        self.serial_correlation.insert(outcome.serial_correlation);
        self.residual_white_noise.insert(outcome.residual_white_noise);
        for (pair, causal) in &outcome.causality {
            self.causality.entry(*pair).or_default().insert(*causal);
        }
        self.permutations.push(outcome);
    }
}

/// Space-separated rendering of `values`.
pub fn join_values<T: Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flat per-user record of the analysis.
///
/// Serializes as a single JSON object whose keys follow [`AnalysisSummary::record`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub user_login: String,
    pub data_points: usize,
    pub index: String,
    pub totals: Vec<(Metric, u64)>,
    pub stationary: Vec<(Metric, bool)>,
    pub train_sample_size: String,
    pub var_order: String,
    pub serial_correlation: String,
    pub residual_white_noise: String,
    pub causality: BTreeMap<CausalPair, String>,
}

impl AnalysisSummary {
    /// Flatten the accumulated sets of `permutations` into strings.
    pub fn new(
        user_login: impl Into<String>,
        data_points: usize,
        index: impl Into<String>,
        totals: Vec<(Metric, u64)>,
        stationary: Vec<(Metric, bool)>,
        permutations: &PermutationSummary,
    ) -> Self {
        Self {
            user_login: user_login.into(),
            data_points,
            index: index.into(),
            totals,
            stationary,
            train_sample_size: permutations.train_sample_size.to_string(),
            var_order: join_values(&permutations.var_orders),
            serial_correlation: join_values(&permutations.serial_correlation),
            residual_white_noise: join_values(&permutations.residual_white_noise),
            causality: permutations
                .causality
                .iter()
                .map(|(pair, values)| (*pair, join_values(values)))
                .collect(),
        }
    }

    /// Column name and value of every field, in table order.
    pub fn record(&self) -> Vec<(String, Value)> {
        let mut record = vec![
            ("user_login".to_string(), Value::from(self.user_login.clone())),
            ("data_points".to_string(), Value::from(self.data_points)),
            ("index".to_string(), Value::from(self.index.clone())),
        ];
        record.extend(
            self.totals
                .iter()
                .map(|(metric, total)| (metric.to_string(), Value::from(*total))),
        );
        record.extend(
            self.stationary
                .iter()
                .map(|(metric, flag)| (format!("{}_stationary", metric), Value::from(*flag))),
        );
        record.extend([
            ("train_sample_size".to_string(), Value::from(self.train_sample_size.clone())),
            ("var_order".to_string(), Value::from(self.var_order.clone())),
            ("serial_correlation".to_string(), Value::from(self.serial_correlation.clone())),
            ("residual_white_noise".to_string(), Value::from(self.residual_white_noise.clone())),
        ]);
        record.extend(
            self.causality
                .iter()
                .map(|(pair, values)| (pair.to_string(), Value::from(values.clone()))),
        );
        record
    }
}

impl Serialize for AnalysisSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.record();
        let mut map = serializer.serialize_map(Some(record.len()))?;
        for (key, value) in &record {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Every analysable user of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAnalysis {
    pub project: String,
    pub documents: u64,
    pub summaries: Vec<AnalysisSummary>,
}

impl ProjectAnalysis {
    /// Plain-text table, one row per user. Columns missing for a user are blank.
    pub fn to_table(&self) -> String {
        let records: Vec<Vec<(String, Value)>> = self.summaries.iter().map(|s| s.record()).collect();

        let mut columns: Vec<String> = Vec::new();
        for (key, _) in records.iter().flatten() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }

        let cell = |value: &Value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| {
                        record
                            .iter()
                            .find(|(key, _)| key == column)
                            .map(|(_, value)| cell(value))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                rows.iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(column.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let format_row = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut table = format_row(&columns);
        for row in &rows {
            table.push('\n');
            table.push_str(&format_row(row));
        }
        table
    }
}

impl fmt::Display for ProjectAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Documents on index {}: {}", self.project, self.documents)?;
        write!(f, "{}", self.to_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(index: usize, order: usize, causal: bool) -> PermutationOutcome {
        let mut causality = BTreeMap::new();
        causality.insert(
            CausalPair::new(Metric::MergesPerformed, Metric::MergesRequested),
            causal,
        );
        PermutationOutcome {
            index,
            ordering: vec![Metric::MergesPerformed, Metric::MergesRequested],
            order,
            serial_correlation: false,
            residual_white_noise: true,
            causality,
        }
    }

    fn summary() -> AnalysisSummary {
        let mut permutations = PermutationSummary::new(23);
        permutations.record(outcome(0, 1, true));
        permutations.record(outcome(1, 2, false));
        AnalysisSummary::new(
            "octocat",
            30,
            "pull-requests",
            vec![(Metric::MergesPerformed, 12), (Metric::MergesRequested, 7)],
            vec![(Metric::MergesPerformed, true), (Metric::MergesRequested, false)],
            &permutations,
        )
    }

    #[test]
    fn test_conflicting_verdicts_accumulate_both_values() {
        let mut summary = PermutationSummary::new(23);
        summary.record(outcome(0, 1, true));
        summary.record(outcome(1, 1, false));

        let pair = CausalPair::new(Metric::MergesPerformed, Metric::MergesRequested);
        assert_eq!(summary.causality[&pair], BTreeSet::from([false, true]));
        assert_eq!(summary.var_orders, BTreeSet::from([1]));
        assert_eq!(summary.permutations.len(), 2);
    }

    #[test]
    fn test_join_values_renders_sets_in_order() {
        assert_eq!(join_values(&BTreeSet::from([true, false])), "false true");
        assert_eq!(join_values(&BTreeSet::from([3, 1])), "1 3");
        assert_eq!(join_values(Vec::<usize>::new()), "");
    }

    #[test]
    fn test_summary_record_keys_and_values() {
        let record = summary().record();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "user_login",
                "data_points",
                "index",
                "merges_performed",
                "merges_requested",
                "merges_performed_stationary",
                "merges_requested_stationary",
                "train_sample_size",
                "var_order",
                "serial_correlation",
                "residual_white_noise",
                "merges_performed->merges_requested",
            ]
        );

        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["var_order"], "1 2");
        assert_eq!(json["merges_performed->merges_requested"], "false true");
        assert_eq!(json["merges_requested_stationary"], false);
        assert_eq!(json["merges_performed"].to_string(), "12");
    }

    #[test]
    fn test_project_table_has_header_and_rows() {
        let project = ProjectAnalysis {
            project: "pull-requests".to_string(),
            documents: 120,
            summaries: vec![summary()],
        };
        let table = project.to_table();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("user_login"));
        assert!(lines[1].starts_with("octocat"));
        assert!(lines[1].contains("false true"));
        assert!(project.to_string().starts_with("Documents on index pull-requests: 120"));
    }
}
