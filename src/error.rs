use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a dashboard refresh.  None of these are retried.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Configuration(Vec<&'static str>),

    #[error("No SQL Server ODBC driver found. Available: {}", .0.join(", "))]
    DriverUnavailable(Vec<String>),

    /// Network, login or database-side failure, message kept verbatim.
    #[error("{0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    QueryExecution(String),

    #[error("Failed writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ExtractError {
    pub fn write(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        ExtractError::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}
