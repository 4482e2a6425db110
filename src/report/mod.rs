//! Output sinks for per-permutation text reports and figure artifacts.

mod plot;

pub use plot::{ArtifactLabels, Figure, JsonFigureSink, PlotSink, RenderConfig, Series};

#[cfg(test)]
pub use plot::MockPlotSink;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, ReportResult};

/// Destination for the plain-text analysis report of one permutation.
#[cfg_attr(test, mockall::automock)]
pub trait ReportSink {
    /// Start a fresh report, discarding anything written earlier.
    fn begin(&self, user: &str, permutation: usize) -> ReportResult<()>;

    /// Append a block of text to the report.
    fn append(&self, user: &str, permutation: usize, text: &str) -> ReportResult<()>;
}

/// Writes reports to `{output}/txt/user_{user}_permutation_{index}_analysis_results.txt`.
#[derive(Debug, Clone)]
pub struct TextReportSink {
    dir: PathBuf,
}

impl TextReportSink {
    /// Create a sink rooted at `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: output_dir.as_ref().join("txt"),
        }
    }

    /// Path of the report for `user` and `permutation`.
    pub fn report_path(&self, user: &str, permutation: usize) -> PathBuf {
        self.dir.join(format!(
            "user_{}_permutation_{}_analysis_results.txt",
            user, permutation
        ))
    }

    fn io_error(path: &Path, source: std::io::Error) -> ReportError {
        ReportError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl ReportSink for TextReportSink {
    fn begin(&self, user: &str, permutation: usize) -> ReportResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        let path = self.report_path(user, permutation);
        fs::File::create(&path)
            .map(|_| ())
            .map_err(|e| Self::io_error(&path, e))
    }

    fn append(&self, user: &str, permutation: usize, text: &str) -> ReportResult<()> {
        let path = self.report_path(user, permutation);
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", text))
            .map_err(|e| Self::io_error(&path, e))
    }
}
