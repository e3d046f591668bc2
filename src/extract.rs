use std::path::Path;

use log::{error, info};

use crate::config::Credentials;
use crate::db::mass_portfolio::gains_archive::{fetch_rows, write_csv_file, GainsRow, Summary};
use crate::db::mssql::connection::{connect, ConnectionDescriptor};
use crate::db::mssql::driver::{installed_drivers, select_driver};
use crate::error::ExtractError;

/// Result of one refresh.  Errors stop here, the job only needs to know
/// whether to exit with 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { message: String, row_count: usize },
    Failure { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Success { message, .. } | Outcome::Failure { message } => message,
        }
    }

    /// Zero on failure.
    pub fn row_count(&self) -> usize {
        match self {
            Outcome::Success { row_count, .. } => *row_count,
            Outcome::Failure { .. } => 0,
        }
    }
}

/// Query the gains aggregation and save it as CSV at `output_file`.
pub async fn fetch_data_to_csv(output_file: impl AsRef<Path>) -> Outcome {
    let output_file = output_file.as_ref();
    match refresh(output_file).await {
        Ok(rows) => finish(output_file, &rows),
        Err(e) => fail(e),
    }
}

/// Save rows that were already fetched, reporting like [`fetch_data_to_csv`].
pub fn save_rows_to_csv(output_file: impl AsRef<Path>, rows: &[GainsRow]) -> Outcome {
    let output_file = output_file.as_ref();
    match write_csv_file(output_file, rows) {
        Ok(()) => finish(output_file, rows),
        Err(e) => fail(e),
    }
}

async fn refresh(output_file: &Path) -> Result<Vec<GainsRow>, ExtractError> {
    info!("Connecting to database...");
    let credentials = Credentials::from_env()?;
    let driver = select_driver(&installed_drivers())?;
    info!("using driver {}", driver);
    let descriptor = ConnectionDescriptor::new(&credentials, driver)?;
    let mut client = connect(&descriptor).await?;

    info!("Executing query...");
    let rows = fetch_rows(&mut client).await;
    // close on both paths, a failed close does not hide a failed query
    if let Err(e) = client.close().await {
        error!("closing the connection: {}", e);
    }
    let rows = rows?;

    write_csv_file(output_file, &rows)?;
    Ok(rows)
}

fn finish(output_file: &Path, rows: &[GainsRow]) -> Outcome {
    let row_count = rows.len();
    let message = format!(
        "Successfully fetched {} rows and saved to {}",
        row_count,
        output_file.display()
    );
    info!("{}", message);
    if let Some(summary) = Summary::from_rows(rows) {
        summary.log();
    }
    Outcome::Success { message, row_count }
}

fn fail(e: ExtractError) -> Outcome {
    let message = format!("Error fetching data: {}", e);
    error!("{}", message);
    Outcome::Failure { message }
}
