use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Data provider errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Index not found: {index}")]
    IndexNotFound { index: String },

    #[error("Invalid dataset: {message}")]
    InvalidDataset { message: String },

    #[error("Dataset I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset parse failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Numerical and estimation errors raised by the statistics backend
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Singular matrix in {context}")]
    SingularMatrix { context: String },

    #[error("Matrix is not positive definite in {context}")]
    NotPositiveDefinite { context: String },

    #[error("Insufficient observations: {observations} available, {required} required ({context})")]
    InsufficientObservations {
        observations: usize,
        required: usize,
        context: String,
    },

    #[error("Invalid distribution parameter: {message}")]
    Distribution { message: String },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },
}

/// Figure construction or persistence errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot build figure {title}: {message}")]
    InvalidFigure { title: String, message: String },

    #[error("Figure I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Figure serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text report sink errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for application errors
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type alias for data provider operations
pub type DataResult<T> = Result<T, DataError>;

/// Result type alias for statistics backend operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type alias for plot sink operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type alias for report sink operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Render an error followed by every error in its `source()` chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
