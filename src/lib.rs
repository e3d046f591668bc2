pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod utils;

pub use db::mass_portfolio::gains_archive::{GainsRow, DEFAULT_OUTPUT};
pub use error::ExtractError;
pub use extract::{fetch_data_to_csv, save_rows_to_csv, Outcome};
