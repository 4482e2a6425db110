use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::error;

use super::{CalendarInterval, DataProvider, Metric, SeriesPoint, TimeSeriesTable};
use crate::error::DataResult;

/// Fetch the requested metrics for `user` and align them into one table.
///
/// Returns an empty table when the user has no merges performed or no pull
/// requests merged by others; the caller treats that as "not analyzable".
pub fn consolidate_series(
    provider: &dyn DataProvider,
    index: &str,
    user: &str,
    variables: &[Metric],
    interval: CalendarInterval,
) -> DataResult<TimeSeriesTable> {
    let mut data = Vec::with_capacity(variables.len());

    for metric in variables {
        let points = provider.fetch(*metric, index, user, interval)?;
        if points.is_empty() {
            match metric {
                Metric::MergesPerformed => {
                    error!(user = %user, "User does not merge PRs for other developers");
                    return Ok(TimeSeriesTable::empty());
                }
                Metric::MergesSuccessful => {
                    error!(user = %user, "User does not have PRs merged by other developers");
                    return Ok(TimeSeriesTable::empty());
                }
                Metric::MergesRequested => {}
            }
        }
        data.push((*metric, points));
    }

    align_series(data, interval)
}

/// Align per-metric series on a regular calendar axis, zero-filling gaps.
///
/// The axis runs from the earliest to the latest bucket of any series at
/// `interval` steps, so idle buckets become zero rows. Points are snapped to
/// their bucket start and repeated buckets within one series are summed.
pub fn align_series(
    series: Vec<(Metric, Vec<SeriesPoint>)>,
    interval: CalendarInterval,
) -> DataResult<TimeSeriesTable> {
    let mut per_metric: Vec<(Metric, BTreeMap<NaiveDate, f64>)> = Vec::with_capacity(series.len());
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;

    for (metric, points) in series {
        let mut counts = BTreeMap::new();
        for point in points {
            let bucket = interval.bucket_start(point.bucket);
            *counts.entry(bucket).or_insert(0.0) += point.count;
            first = Some(first.map_or(bucket, |f| f.min(bucket)));
            last = Some(last.map_or(bucket, |l| l.max(bucket)));
        }
        per_metric.push((metric, counts));
    }

    let mut index = Vec::new();
    if let (Some(first), Some(last)) = (first, last) {
        let mut bucket = first;
        while bucket <= last {
            index.push(bucket);
            match interval.next_bucket(bucket) {
                Some(next) => bucket = next,
                None => break,
            }
        }
    }

    let columns = per_metric
        .into_iter()
        .map(|(metric, counts)| {
            let column = index
                .iter()
                .map(|bucket| counts.get(bucket).copied().unwrap_or(0.0))
                .collect();
            (metric, column)
        })
        .collect();

    TimeSeriesTable::new(index, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, IndexDataset, JsonDatasetProvider, UserSeries};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn provider_with(user: &str, series: UserSeries) -> JsonDatasetProvider {
        let mut users = BTreeMap::new();
        users.insert(user.to_string(), series);
        let mut indices = BTreeMap::new();
        indices.insert(
            "pulls".to_string(),
            IndexDataset {
                documents: 10,
                users,
            },
        );
        JsonDatasetProvider::from_dataset(Dataset { indices })
    }

    fn two_weeks() -> Vec<SeriesPoint> {
        vec![
            SeriesPoint::new(date(2023, 1, 2), 2.0),
            SeriesPoint::new(date(2023, 1, 9), 1.0),
        ]
    }

    #[test]
    fn test_disjoint_buckets_are_unioned_and_zero_filled() {
        let performed = vec![
            SeriesPoint::new(date(2023, 1, 2), 2.0),
            SeriesPoint::new(date(2023, 1, 16), 5.0),
        ];
        let requested = vec![
            SeriesPoint::new(date(2023, 1, 9), 1.0),
            SeriesPoint::new(date(2023, 1, 23), 4.0),
        ];

        let table = align_series(
            vec![
                (Metric::MergesPerformed, performed),
                (Metric::MergesRequested, requested),
            ],
            CalendarInterval::Week,
        )
        .unwrap();

        assert_eq!(
            table.index(),
            &[
                date(2023, 1, 2),
                date(2023, 1, 9),
                date(2023, 1, 16),
                date(2023, 1, 23)
            ]
        );
        assert_eq!(
            table.column(Metric::MergesPerformed).unwrap(),
            &[2.0, 0.0, 5.0, 0.0]
        );
        assert_eq!(
            table.column(Metric::MergesRequested).unwrap(),
            &[0.0, 1.0, 0.0, 4.0]
        );
    }

    #[test]
    fn test_idle_buckets_become_zero_rows() {
        let points = || {
            vec![
                SeriesPoint::new(date(2023, 1, 3), 1.0),
                SeriesPoint::new(date(2023, 1, 17), 2.0),
            ]
        };
        let provider = provider_with(
            "alice",
            UserSeries {
                merges_performed: points(),
                merges_requested: points(),
                merges_successful: points(),
            },
        );

        let table =
            consolidate_series(&provider, "pulls", "alice", &Metric::ALL, CalendarInterval::Week)
                .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.index(),
            &[date(2023, 1, 2), date(2023, 1, 9), date(2023, 1, 16)]
        );
        for metric in Metric::ALL {
            assert_eq!(table.column(metric).unwrap(), &[1.0, 0.0, 2.0]);
        }
    }

    #[test]
    fn test_idle_months_are_filled_across_year_end() {
        let table = align_series(
            vec![(
                Metric::MergesPerformed,
                vec![
                    SeriesPoint::new(date(2022, 11, 14), 3.0),
                    SeriesPoint::new(date(2023, 2, 1), 1.0),
                ],
            )],
            CalendarInterval::Month,
        )
        .unwrap();

        assert_eq!(
            table.index(),
            &[
                date(2022, 11, 1),
                date(2022, 12, 1),
                date(2023, 1, 1),
                date(2023, 2, 1)
            ]
        );
        assert_eq!(
            table.column(Metric::MergesPerformed).unwrap(),
            &[3.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_repeated_buckets_are_summed() {
        let table = align_series(
            vec![(
                Metric::MergesPerformed,
                vec![
                    SeriesPoint::new(date(2023, 1, 2), 2.0),
                    SeriesPoint::new(date(2023, 1, 2), 3.0),
                ],
            )],
            CalendarInterval::Week,
        )
        .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.column(Metric::MergesPerformed).unwrap(), &[5.0]);
    }

    #[test]
    fn test_columns_follow_requested_order() {
        let table = align_series(
            vec![
                (Metric::MergesSuccessful, vec![SeriesPoint::new(date(2023, 1, 2), 1.0)]),
                (Metric::MergesPerformed, vec![SeriesPoint::new(date(2023, 1, 2), 1.0)]),
            ],
            CalendarInterval::Week,
        )
        .unwrap();

        assert_eq!(
            table.columns(),
            &[Metric::MergesSuccessful, Metric::MergesPerformed]
        );
    }

    #[test]
    fn test_missing_merges_successful_yields_empty_table() {
        let provider = provider_with(
            "dave",
            UserSeries {
                merges_performed: two_weeks(),
                merges_requested: two_weeks(),
                merges_successful: Vec::new(),
            },
        );

        let table =
            consolidate_series(&provider, "pulls", "dave", &Metric::ALL, CalendarInterval::Week)
                .unwrap();

        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_merges_requested_is_zero_filled() {
        let provider = provider_with(
            "erin",
            UserSeries {
                merges_performed: two_weeks(),
                merges_requested: Vec::new(),
                merges_successful: two_weeks(),
            },
        );

        let table =
            consolidate_series(&provider, "pulls", "erin", &Metric::ALL, CalendarInterval::Week)
                .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column(Metric::MergesRequested).unwrap(), &[0.0, 0.0]);
        assert_eq!(table.column(Metric::MergesPerformed).unwrap(), &[2.0, 1.0]);
    }
}
