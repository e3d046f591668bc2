use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use jiff::Zoned;
use log::{error, info};
use mass_portfolio_gains::{fetch_data_to_csv, DEFAULT_OUTPUT};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Load the DB_* variables from `.env/<ENV>.env`, e.g. test, prod
    #[arg(short, long)]
    env: Option<String>,

    /// Where to save the CSV file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
}

/// Refresh the Mass Portfolio gains dashboard data.  Run this job every day.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Some(env) = &args.env {
        let path = PathBuf::from(format!(".env/{}.env", env));
        if let Err(e) = dotenvy::from_path(&path) {
            error!("cannot load {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let outcome = fetch_data_to_csv(&args.output).await;
    if !outcome.is_success() {
        return ExitCode::FAILURE;
    }

    let now = Zoned::now()
        .in_tz("America/Chicago")
        .unwrap_or_else(|_| Zoned::now());
    info!(
        "Data refresh completed successfully at {}",
        now.strftime("%Y-%m-%d %H:%M:%S CT")
    );
    ExitCode::SUCCESS
}
