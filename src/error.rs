use thiserror::Error;

#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Failure to obtain tabular project data from the source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Source {url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed project data: {0}")]
    Malformed(String),

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PipelineError> for PyErr {
    fn from(err: PipelineError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}
