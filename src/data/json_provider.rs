use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CalendarInterval, DataProvider, Metric, SeriesPoint};
use crate::error::{DataError, DataResult};

/// Exported pull-request activity, keyed by index name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Per-index activity.
    pub indices: BTreeMap<String, IndexDataset>,
}

/// Activity recorded in one pull-request index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDataset {
    /// Number of pull-request documents in the index.
    pub documents: u64,
    /// Per-user series, keyed by login.
    #[serde(default)]
    pub users: BTreeMap<String, UserSeries>,
}

/// Raw series for one user. Buckets may be at any granularity finer than
/// or equal to the interval requested at query time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSeries {
    #[serde(default)]
    pub merges_performed: Vec<SeriesPoint>,
    #[serde(default)]
    pub merges_requested: Vec<SeriesPoint>,
    #[serde(default)]
    pub merges_successful: Vec<SeriesPoint>,
}

impl UserSeries {
    fn series(&self, metric: Metric) -> &[SeriesPoint] {
        match metric {
            Metric::MergesPerformed => &self.merges_performed,
            Metric::MergesRequested => &self.merges_requested,
            Metric::MergesSuccessful => &self.merges_successful,
        }
    }
}

/// [`DataProvider`] backed by a JSON export of the search index.
#[derive(Debug, Clone)]
pub struct JsonDatasetProvider {
    dataset: Dataset,
}

impl JsonDatasetProvider {
    /// Load a dataset file.
    pub fn from_path(path: impl AsRef<Path>) -> DataResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let dataset: Dataset = serde_json::from_str(&contents)?;
        debug!(
            path = %path.as_ref().display(),
            indices = dataset.indices.len(),
            "Dataset loaded"
        );
        Ok(Self { dataset })
    }

    /// Wrap an in-memory dataset.
    pub fn from_dataset(dataset: Dataset) -> Self {
        Self { dataset }
    }

    fn index(&self, index: &str) -> DataResult<&IndexDataset> {
        self.dataset
            .indices
            .get(index)
            .ok_or_else(|| DataError::IndexNotFound {
                index: index.to_string(),
            })
    }

    /// Re-bucket a user's series to `interval`. Unknown users yield an empty series.
    fn bucketed(
        &self,
        index: &str,
        user: &str,
        metric: Metric,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>> {
        let Some(series) = self.index(index)?.users.get(user) else {
            return Ok(Vec::new());
        };

        let mut buckets: BTreeMap<_, f64> = BTreeMap::new();
        for point in series.series(metric) {
            *buckets.entry(interval.bucket_start(point.bucket)).or_insert(0.0) += point.count;
        }

        Ok(buckets
            .into_iter()
            .map(|(bucket, count)| SeriesPoint::new(bucket, count))
            .collect())
    }
}

impl DataProvider for JsonDatasetProvider {
    fn refresh_index(&self, index: &str) -> DataResult<()> {
        self.index(index).map(|_| ())
    }

    fn document_count(&self, index: &str) -> DataResult<u64> {
        Ok(self.index(index)?.documents)
    }

    fn merges_performed(
        &self,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>> {
        self.bucketed(index, user, Metric::MergesPerformed, interval)
    }

    fn merge_requests(
        &self,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>> {
        self.bucketed(index, user, Metric::MergesRequested, interval)
    }

    fn requests_merged(
        &self,
        index: &str,
        user: &str,
        interval: CalendarInterval,
    ) -> DataResult<Vec<SeriesPoint>> {
        self.bucketed(index, user, Metric::MergesSuccessful, interval)
    }

    fn all_mergers(&self, index: &str) -> DataResult<Vec<String>> {
        Ok(self
            .index(index)?
            .users
            .iter()
            .filter(|(_, series)| series.merges_performed.iter().any(|p| p.count > 0.0))
            .map(|(login, _)| login.clone())
            .collect())
    }
}
