// Monthly gains, plan and losses of the Mass Portfolio, aggregated by
// channel, meter type and product group.  Feeds the gains dashboard.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use itertools::{Itertools, MinMaxResult};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tiberius::Row;

use crate::db::mssql::connection::MssqlClient;
use crate::error::ExtractError;
use crate::utils::format::thousands;

pub const DEFAULT_OUTPUT: &str = "data/dashboard_data.csv";

pub const COLUMNS: [&str; 8] = [
    "year",
    "month",
    "channel",
    "meter_type",
    "product_group",
    "gains",
    "plan",
    "losses",
];

/// One row per (yearmonth, channel, meter type, product group), most recent
/// month first.  Starts in Jan 2024 and stops at the current month.
pub const QUERY: &str = r#"
SELECT LEFT(p.YEARMONTH,4) AS year
      ,RIGHT(p.YEARMONTH,2) AS month
      ,CASE WHEN p.CHANNEL IN ('REACTIVE','WEB PHONE REACTIVE','CALL CENTER') THEN 'Call Center'
            WHEN p.CHANNEL IN ('WEB SEARCH','WEB_SEARCH','EMAIL/RAF') THEN 'Web Search'
            WHEN p.CHANNEL IN ('ONLINE PARTNER') THEN 'SOE'
            WHEN p.CHANNEL IN ('RAQ','REQUEST A QUOTE') THEN 'RAQ'
            WHEN p.CHANNEL IN ('BAAT','OBTM','OUTBOUND') THEN 'BAAT'
            WHEN p.CHANNEL IN ('DIRECT MAIL','DM','DOOR TO DOOR') THEN 'DM'
            ELSE 'Other' END AS channel
      ,CASE WHEN p.ESID_PREMISE LIKE '%RES%' THEN 'RES' ELSE 'BUS' END AS meter_type
      ,CASE WHEN p.PRODUCT_GROUP LIKE '%MTM%' THEN 'MTM' ELSE 'TERM' END AS product_group
      ,SUM(CASE WHEN p.CATEGORY = 'MASS_PORTFOLIO_ACTUAL' THEN p.GAIN ELSE 0 END) AS gains
      ,SUM(CASE WHEN p.CATEGORY = 'PORTFOLIO_PLAN' THEN p.GAIN ELSE 0 END) AS [plan]
      ,SUM(CASE WHEN p.CATEGORY = 'MASS_PORTFOLIO_ACTUAL' THEN p.LOSS ELSE 0 END) AS losses
FROM Skywalker.dbo.Mass_Plan_Proj_Actual p
WHERE p.CHANNEL IS NOT NULL
  AND p.YEARMONTH <= FORMAT(GETDATE(),'yyyyMM')
  AND p.YEARMONTH >= '202401'
GROUP BY LEFT(p.YEARMONTH,4)
      ,RIGHT(p.YEARMONTH,2)
      ,p.YEARMONTH
      ,CASE WHEN p.CHANNEL IN ('REACTIVE','WEB PHONE REACTIVE','CALL CENTER') THEN 'Call Center'
            WHEN p.CHANNEL IN ('WEB SEARCH','WEB_SEARCH','EMAIL/RAF') THEN 'Web Search'
            WHEN p.CHANNEL IN ('ONLINE PARTNER') THEN 'SOE'
            WHEN p.CHANNEL IN ('RAQ','REQUEST A QUOTE') THEN 'RAQ'
            WHEN p.CHANNEL IN ('BAAT','OBTM','OUTBOUND') THEN 'BAAT'
            WHEN p.CHANNEL IN ('DIRECT MAIL','DM','DOOR TO DOOR') THEN 'DM'
            ELSE 'Other' END
      ,CASE WHEN p.ESID_PREMISE LIKE '%RES%' THEN 'RES' ELSE 'BUS' END
      ,CASE WHEN p.PRODUCT_GROUP LIKE '%MTM%' THEN 'MTM' ELSE 'TERM' END
ORDER BY p.YEARMONTH DESC
"#;

/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainsRow {
    pub year: String,
    pub month: String,
    pub channel: String,
    pub meter_type: String,
    pub product_group: String,
    pub gains: Option<Decimal>,
    pub plan: Option<Decimal>,
    pub losses: Option<Decimal>,
}

impl GainsRow {
    pub fn from_row(row: &Row) -> Result<GainsRow, ExtractError> {
        Ok(GainsRow {
            year: text(row, "year")?,
            month: text(row, "month")?,
            channel: text(row, "channel")?,
            meter_type: text(row, "meter_type")?,
            product_group: text(row, "product_group")?,
            gains: amount(row, "gains")?,
            plan: amount(row, "plan")?,
            losses: amount(row, "losses")?,
        })
    }
}

fn text(row: &Row, col: &str) -> Result<String, ExtractError> {
    row.try_get::<&str, _>(col)
        .map(|v| v.unwrap_or_default().to_string())
        .map_err(|e| ExtractError::QueryExecution(format!("column {}: {}", col, e)))
}

/// SUM() keeps the type of the summed column, so accept any numeric type the
/// server may hand back.
fn amount(row: &Row, col: &str) -> Result<Option<Decimal>, ExtractError> {
    if let Ok(v) = row.try_get::<Decimal, _>(col) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(col) {
        return Ok(v.map(Decimal::from));
    }
    if let Ok(v) = row.try_get::<i64, _>(col) {
        return Ok(v.map(Decimal::from));
    }
    if let Ok(v) = row.try_get::<i16, _>(col) {
        return Ok(v.map(Decimal::from));
    }
    if let Ok(v) = row.try_get::<u8, _>(col) {
        return Ok(v.map(Decimal::from));
    }
    if let Ok(v) = row.try_get::<f64, _>(col) {
        return v
            .map(|x| {
                Decimal::try_from(x).map_err(|e| {
                    ExtractError::QueryExecution(format!("column {}: {}", col, e))
                })
            })
            .transpose();
    }
    if let Ok(v) = row.try_get::<f32, _>(col) {
        return v
            .map(|x| {
                Decimal::try_from(x).map_err(|e| {
                    ExtractError::QueryExecution(format!("column {}: {}", col, e))
                })
            })
            .transpose();
    }
    Err(ExtractError::QueryExecution(format!(
        "column {} is not numeric",
        col
    )))
}

/// Run the aggregation and load the full result set.
pub async fn fetch_rows(client: &mut MssqlClient) -> Result<Vec<GainsRow>, ExtractError> {
    let rows = client
        .simple_query(QUERY)
        .await
        .map_err(|e| ExtractError::QueryExecution(e.to_string()))?
        .into_first_result()
        .await
        .map_err(|e| ExtractError::QueryExecution(e.to_string()))?;
    rows.iter().map(GainsRow::from_row).collect()
}

/// Header line first, then the rows in the order given.  Nothing else.
pub fn write_csv<W: Write>(writer: W, rows: &[GainsRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Replace the file at `path` with the rows, creating the parent directories
/// if needed.  Not atomic: a crash mid-write leaves a truncated file.
pub fn write_csv_file(path: &Path, rows: &[GainsRow]) -> Result<(), ExtractError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ExtractError::write(path, e))?;
    }
    let file = File::create(path).map_err(|e| ExtractError::write(path, e))?;
    write_csv(file, rows).map_err(|e| ExtractError::write(path, e))
}

/// Diagnostics logged after a successful refresh.  Not written to the CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Earliest (year, month) in the data.
    pub first: (String, String),
    /// Latest (year, month) in the data.
    pub last: (String, String),
    pub total_gains: Decimal,
    pub total_plan: Decimal,
    pub total_losses: Decimal,
}

impl Summary {
    /// None if there are no rows.  NULL amounts count as zero.
    pub fn from_rows(rows: &[GainsRow]) -> Option<Summary> {
        let (first, last) = match rows
            .iter()
            .map(|r| (r.year.clone(), r.month.clone()))
            .minmax()
        {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(x) => (x.clone(), x),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let total = |f: fn(&GainsRow) -> Option<Decimal>| -> Decimal {
            rows.iter().filter_map(f).sum()
        };
        Some(Summary {
            first,
            last,
            total_gains: total(|r| r.gains),
            total_plan: total(|r| r.plan),
            total_losses: total(|r| r.losses),
        })
    }

    pub fn log(&self) {
        info!("Data Summary:");
        info!(
            "  Date Range: {}-{} to {}-{}",
            self.first.0, self.first.1, self.last.0, self.last.1
        );
        info!("  Total Gains: {}", thousands(self.total_gains));
        info!("  Total Plan: {}", thousands(self.total_plan));
        info!("  Total Losses: {}", thousands(self.total_losses));
    }
}
