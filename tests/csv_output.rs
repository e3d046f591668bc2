use std::{error::Error, fs};

use mass_portfolio_gains::{save_rows_to_csv, GainsRow};
use rust_decimal::Decimal;

fn row(y: &str, m: &str, ch: &str, mt: &str, pg: &str, g: i64, p: i64, l: i64) -> GainsRow {
    GainsRow {
        year: y.into(),
        month: m.into(),
        channel: ch.into(),
        meter_type: mt.into(),
        product_group: pg.into(),
        gains: Some(Decimal::from(g)),
        plan: Some(Decimal::from(p)),
        losses: Some(Decimal::from(l)),
    }
}

fn four_rows() -> Vec<GainsRow> {
    vec![
        row("2024", "01", "Call Center", "RES", "TERM", 100, 90, 10),
        row("2024", "01", "Web Search", "BUS", "MTM", 50, 60, 5),
        row("2024", "02", "Other", "RES", "TERM", 0, 0, 0),
        row("2024", "02", "RAQ", "BUS", "TERM", 20, 15, 2),
    ]
}

#[test]
fn four_rows_in_order() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dashboard_data.csv");
    let outcome = save_rows_to_csv(&path, &four_rows());
    assert!(outcome.is_success());
    assert_eq!(outcome.row_count(), 4);

    let content = fs::read_to_string(&path)?;
    assert_eq!(
        content,
        "year,month,channel,meter_type,product_group,gains,plan,losses\n\
         2024,01,Call Center,RES,TERM,100,90,10\n\
         2024,01,Web Search,BUS,MTM,50,60,5\n\
         2024,02,Other,RES,TERM,0,0,0\n\
         2024,02,RAQ,BUS,TERM,20,15,2\n"
    );
    Ok(())
}

#[test]
fn values_read_back_unchanged() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dashboard_data.csv");
    let rows = vec![
        row("2025", "03", "DM", "RES", "MTM", 1_234_567, 1_000_000, 42),
        row("2025", "02", "SOE", "BUS", "TERM", -5, 7, 0),
        row("2024", "12", "BAAT", "RES", "TERM", 3, 3, 3),
    ];
    save_rows_to_csv(&path, &rows);

    let mut rdr = csv::Reader::from_path(&path)?;
    let back: Vec<GainsRow> = rdr.deserialize().collect::<Result<_, _>>()?;
    assert_eq!(back, rows);
    Ok(())
}

#[test]
fn zero_rows_writes_header_only() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dashboard_data.csv");
    let outcome = save_rows_to_csv(&path, &[]);
    assert!(outcome.is_success());
    assert_eq!(outcome.row_count(), 0);
    assert_eq!(
        fs::read_to_string(&path)?,
        "year,month,channel,meter_type,product_group,gains,plan,losses\n"
    );
    Ok(())
}

#[test]
fn creates_missing_directories() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("data").join("nested").join("dashboard_data.csv");
    assert!(!path.parent().unwrap().exists());
    let outcome = save_rows_to_csv(&path, &four_rows());
    assert!(outcome.is_success(), "{}", outcome.message());
    assert!(path.exists());
    Ok(())
}

#[test]
fn same_rows_same_bytes() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dashboard_data.csv");
    save_rows_to_csv(&path, &four_rows());
    let first = fs::read(&path)?;
    save_rows_to_csv(&path, &four_rows());
    let second = fs::read(&path)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn overwrites_previous_file() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dashboard_data.csv");
    save_rows_to_csv(&path, &four_rows());
    save_rows_to_csv(&path, &four_rows()[..1]);
    let content = fs::read_to_string(&path)?;
    assert_eq!(content.lines().count(), 2);
    assert!(content.ends_with("2024,01,Call Center,RES,TERM,100,90,10\n"));
    Ok(())
}
