//! Time-series data model and the data provider boundary.
//!
//! The search-index query layer lives outside this crate. It is reached
//! through the [`DataProvider`] trait, which hands back per-variable count
//! series already bucketed by calendar interval. [`consolidate_series`] aligns those
//! series into a single [`TimeSeriesTable`] on a gap-free calendar axis.

mod consolidate;
mod json_provider;

pub use consolidate::{align_series, consolidate_series};
pub use json_provider::{Dataset, IndexDataset, JsonDatasetProvider, UserSeries};

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult, ModelError, ModelResult};

/// A pull-request activity metric tracked per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Merges the user performed on pull requests opened by others.
    MergesPerformed,
    /// Merge requests addressed to the user.
    MergesRequested,
    /// Pull requests of the user merged by others.
    MergesSuccessful,
}

impl Metric {
    /// Every metric, in canonical order.
    pub const ALL: [Metric; 3] = [
        Metric::MergesPerformed,
        Metric::MergesRequested,
        Metric::MergesSuccessful,
    ];

    /// Column name used in reports, plots and summary keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::MergesPerformed => "merges_performed",
            Metric::MergesRequested => "merges_requested",
            Metric::MergesSuccessful => "merges_successful",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merges_performed" | "performed" => Ok(Metric::MergesPerformed),
            "merges_requested" | "requested" => Ok(Metric::MergesRequested),
            "merges_successful" | "successful" => Ok(Metric::MergesSuccessful),
            other => Err(DataError::InvalidDataset {
                message: format!("unknown metric '{}'", other),
            }),
        }
    }
}

/// Bucketing granularity of the count series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarInterval {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl CalendarInterval {
    /// Label used in artifact names.
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarInterval::Day => "day",
            CalendarInterval::Week => "week",
            CalendarInterval::Month => "month",
            CalendarInterval::Quarter => "quarter",
            CalendarInterval::Year => "year",
        }
    }

    /// Number of buckets in one seasonal cycle.
    pub fn seasonal_period(&self) -> usize {
        match self {
            CalendarInterval::Day => 7,
            CalendarInterval::Week => 52,
            CalendarInterval::Month => 12,
            CalendarInterval::Quarter => 4,
            CalendarInterval::Year => 1,
        }
    }

    /// First day of the bucket containing `date`. Weeks start on Monday.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            CalendarInterval::Day => date,
            CalendarInterval::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            CalendarInterval::Month => date.with_day(1).unwrap_or(date),
            CalendarInterval::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            CalendarInterval::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    /// Start of the bucket following the one containing `date`.
    ///
    /// Returns `None` past the end of the calendar.
    pub fn next_bucket(&self, date: NaiveDate) -> Option<NaiveDate> {
        let start = self.bucket_start(date);
        match self {
            CalendarInterval::Day => start.checked_add_signed(Duration::days(1)),
            CalendarInterval::Week => start.checked_add_signed(Duration::weeks(1)),
            CalendarInterval::Month => start.checked_add_months(Months::new(1)),
            CalendarInterval::Quarter => start.checked_add_months(Months::new(3)),
            CalendarInterval::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for CalendarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CalendarInterval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "day" | "1d" => Ok(CalendarInterval::Day),
            "week" | "1w" => Ok(CalendarInterval::Week),
            "month" | "1M" => Ok(CalendarInterval::Month),
            "quarter" | "1q" => Ok(CalendarInterval::Quarter),
            "year" | "1y" => Ok(CalendarInterval::Year),
            other => Err(DataError::InvalidDataset {
                message: format!("unknown calendar interval '{}'", other),
            }),
        }
    }
}

/// One bucketed observation as returned by a data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Start of the time bucket.
    pub bucket: NaiveDate,
    /// Observed count in the bucket.
    pub count: f64,
}

impl SeriesPoint {
    /// Create a new point.
    pub fn new(bucket: NaiveDate, count: f64) -> Self {
        Self { bucket, count }
    }
}

/// Source of per-user pull-request activity series.
///
/// Implementations block the calling thread for the duration of each query.
pub trait DataProvider {
    /// Make recently indexed documents visible to subsequent queries.
    fn refresh_index(&self, index: &str) -> DataResult<()>;

    /// Total number of documents in the index.
    fn document_count(&self, index: &str) -> DataResult<u64>;

    /// Merges performed by `user` on pull requests of other developers.
    fn merges_performed(
        &self,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>>;

    /// Merge requests addressed to `user`.
    fn merge_requests(
        &self,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>>;

    /// Pull requests of `user` merged by other developers.
    fn requests_merged(
        &self,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>>;

    /// Every user that performed at least one merge.
    fn all_mergers(&self, index: &str) -> DataResult<Vec<String>>;

    /// Fetch the series backing `metric`.
    fn fetch(
        &self,
        metric: Metric,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>> {
        match metric {
            Metric::MergesPerformed => self.merges_performed(index, user, interval),
            Metric::MergesRequested => self.merge_requests(index, user, interval),
            Metric::MergesSuccessful => self.requests_merged(index, user, interval),
        }
    }
}

/// Aligned multivariate count table.
///
/// Rows are ordered time buckets, columns are metrics. Every column has
/// exactly one value per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    index: Vec<NaiveDate>,
    columns: Vec<Metric>,
    values: Vec<Vec<f64>>,
}

impl TimeSeriesTable {
    /// Build a table, checking that every column matches the index length.
    pub fn new(index: Vec<NaiveDate>, columns: Vec<(Metric, Vec<f64>)>) -> DataResult<Self> {
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (metric, column) in columns {
            if column.len() != index.len() {
                return Err(DataError::InvalidDataset {
                    message: format!(
                        "column {} has {} values for {} buckets",
                        metric,
                        column.len(),
                        index.len()
                    ),
                });
            }
            if names.contains(&metric) {
                return Err(DataError::InvalidDataset {
                    message: format!("duplicate column {}", metric),
                });
            }
            names.push(metric);
            values.push(column);
        }

        Ok(Self {
            index,
            columns: names,
            values,
        })
    }

    /// Table without rows or columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Row labels.
    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    /// Column labels, in order.
    pub fn columns(&self) -> &[Metric] {
        &self.columns
    }

    /// Values of one column.
    pub fn column(&self, metric: Metric) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|m| *m == metric)
            .map(|i| self.values[i].as_slice())
    }

    /// Position of a column.
    pub fn position(&self, metric: Metric) -> Option<usize> {
        self.columns.iter().position(|m| *m == metric)
    }

    /// New table holding `metrics` in the given order.
    pub fn select(&self, metrics: &[Metric]) -> ModelResult<Self> {
        let mut values = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let column = self.column(*metric).ok_or_else(|| ModelError::UnknownVariable {
                name: metric.to_string(),
            })?;
            values.push(column.to_vec());
        }

        Ok(Self {
            index: self.index.clone(),
            columns: metrics.to_vec(),
            values,
        })
    }

    /// Split into the first `at` rows and the remainder.
    pub fn split_at(&self, at: usize) -> (Self, Self) {
        let at = at.min(self.len());
        let head = Self {
            index: self.index[..at].to_vec(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|v| v[..at].to_vec()).collect(),
        };
        let tail = Self {
            index: self.index[at..].to_vec(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|v| v[at..].to_vec()).collect(),
        };
        (head, tail)
    }

    /// First differences. The first row is dropped.
    pub fn diff(&self) -> Self {
        if self.is_empty() {
            return Self {
                columns: self.columns.clone(),
                values: vec![Vec::new(); self.columns.len()],
                index: Vec::new(),
            };
        }

        Self {
            index: self.index[1..].to_vec(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|v| v.windows(2).map(|w| w[1] - w[0]).collect())
                .collect(),
        }
    }

    /// Column sums as whole counts. Negative sums clamp to zero.
    pub fn totals(&self) -> Vec<(Metric, u64)> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(m, v)| (*m, v.iter().sum::<f64>().round().max(0.0) as u64))
            .collect()
    }

    /// Observations as a `rows x columns` matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len(), self.columns.len(), |r, c| self.values[c][r])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_table() -> TimeSeriesTable {
        TimeSeriesTable::new(
            vec![date(2023, 1, 2), date(2023, 1, 9), date(2023, 1, 16)],
            vec![
                (Metric::MergesPerformed, vec![1.0, 4.0, 2.0]),
                (Metric::MergesRequested, vec![0.0, 3.0, 3.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_metric_round_trip_names() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>().unwrap(), metric);
        }
        assert!("merges_reverted".parse::<Metric>().is_err());
    }

    #[test]
    fn test_calendar_interval_parse() {
        assert_eq!("week".parse::<CalendarInterval>().unwrap(), CalendarInterval::Week);
        assert_eq!("1M".parse::<CalendarInterval>().unwrap(), CalendarInterval::Month);
        assert!("fortnight".parse::<CalendarInterval>().is_err());
    }

    #[test]
    fn test_bucket_start() {
        // 2023-01-05 is a Thursday
        let thursday = date(2023, 1, 5);
        assert_eq!(CalendarInterval::Week.bucket_start(thursday), date(2023, 1, 2));
        assert_eq!(CalendarInterval::Month.bucket_start(thursday), date(2023, 1, 1));
        assert_eq!(
            CalendarInterval::Quarter.bucket_start(date(2023, 8, 17)),
            date(2023, 7, 1)
        );
        assert_eq!(CalendarInterval::Year.bucket_start(thursday), date(2023, 1, 1));
    }

    #[test]
    fn test_next_bucket() {
        let thursday = date(2023, 1, 5);
        assert_eq!(CalendarInterval::Day.next_bucket(thursday), Some(date(2023, 1, 6)));
        assert_eq!(CalendarInterval::Week.next_bucket(thursday), Some(date(2023, 1, 9)));
        assert_eq!(
            CalendarInterval::Month.next_bucket(date(2023, 1, 31)),
            Some(date(2023, 2, 1))
        );
        assert_eq!(
            CalendarInterval::Quarter.next_bucket(date(2023, 11, 20)),
            Some(date(2024, 1, 1))
        );
        assert_eq!(CalendarInterval::Year.next_bucket(thursday), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let result = TimeSeriesTable::new(
            vec![date(2023, 1, 2)],
            vec![(Metric::MergesPerformed, vec![1.0, 2.0])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_diff_drops_exactly_one_row() {
        let table = sample_table();
        let diffed = table.diff();

        assert_eq!(diffed.len(), table.len() - 1);
        assert_eq!(diffed.index()[0], date(2023, 1, 9));
        assert_eq!(diffed.column(Metric::MergesPerformed).unwrap(), &[3.0, -2.0]);
        assert_eq!(diffed.column(Metric::MergesRequested).unwrap(), &[3.0, 0.0]);
    }

    #[test]
    fn test_select_reorders_without_mutating_source() {
        let table = sample_table();
        let reordered = table
            .select(&[Metric::MergesRequested, Metric::MergesPerformed])
            .unwrap();

        assert_eq!(
            reordered.columns(),
            &[Metric::MergesRequested, Metric::MergesPerformed]
        );
        assert_eq!(table.columns(), &[Metric::MergesPerformed, Metric::MergesRequested]);
        assert!(table.select(&[Metric::MergesSuccessful]).is_err());
    }

    #[test]
    fn test_split_and_totals() {
        let table = sample_table();
        let (train, test) = table.split_at(2);
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 1);

        let totals = table.totals();
        assert_eq!(totals[0], (Metric::MergesPerformed, 7));
        assert_eq!(totals[1], (Metric::MergesRequested, 6));
    }

    #[test]
    fn test_to_matrix_layout() {
        let m = sample_table().to_matrix();
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(m[(2, 1)], 3.0);
    }
}
