//! DataFrame views of analysis results.
//!
//! The summary rows produced by [`crate::time_series`] and
//! [`crate::contingency`] convert into polars DataFrames here, so callers
//! can join, filter, or persist them with the same columnar tooling the
//! load profiles come in with. Ids are materialized as `i64` columns and
//! timestamps as `"%Y-%m-%d %H:%M:%S"` strings.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::contingency::AlternativeRow;
use crate::time_series::{LineSummaryRow, VoltageSummaryRow};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// One row per timestamp: extreme voltages and the buses that hit them.
pub fn voltage_summary_frame(rows: &[VoltageSummaryRow]) -> Result<DataFrame> {
    let timestamps: Vec<String> = rows.iter().map(|r| format_timestamp(r.timestamp)).collect();
    let max_u: Vec<f64> = rows.iter().map(|r| r.max_u_pu).collect();
    let max_bus: Vec<i64> = rows.iter().map(|r| r.max_u_pu_bus.value() as i64).collect();
    let min_u: Vec<f64> = rows.iter().map(|r| r.min_u_pu).collect();
    let min_bus: Vec<i64> = rows.iter().map(|r| r.min_u_pu_bus.value() as i64).collect();

    DataFrame::new(vec![
        Series::new("timestamp", timestamps),
        Series::new("max_u_pu", max_u),
        Series::new("max_u_pu_bus", max_bus),
        Series::new("min_u_pu", min_u),
        Series::new("min_u_pu_bus", min_bus),
    ])
    .context("building voltage summary frame")
}

/// One row per line: energy losses plus extreme loadings over the horizon.
pub fn line_summary_frame(rows: &[LineSummaryRow]) -> Result<DataFrame> {
    let lines: Vec<i64> = rows.iter().map(|r| r.line.value() as i64).collect();
    let losses: Vec<f64> = rows.iter().map(|r| r.total_loss_kwh).collect();
    let max_loading: Vec<f64> = rows.iter().map(|r| r.max_loading).collect();
    let max_ts: Vec<String> = rows
        .iter()
        .map(|r| format_timestamp(r.max_loading_timestamp))
        .collect();
    let min_loading: Vec<f64> = rows.iter().map(|r| r.min_loading).collect();
    let min_ts: Vec<String> = rows
        .iter()
        .map(|r| format_timestamp(r.min_loading_timestamp))
        .collect();

    DataFrame::new(vec![
        Series::new("line_id", lines),
        Series::new("total_loss_kwh", losses),
        Series::new("max_loading", max_loading),
        Series::new("max_loading_timestamp", max_ts),
        Series::new("min_loading", min_loading),
        Series::new("min_loading_timestamp", min_ts),
    ])
    .context("building line summary frame")
}

/// One row per N-1 alternative, ranked by the scanner.
pub fn n1_scan_frame(rows: &[AlternativeRow]) -> Result<DataFrame> {
    let alternatives: Vec<i64> = rows.iter().map(|r| r.alternative.value() as i64).collect();
    let max_loading: Vec<f64> = rows.iter().map(|r| r.max_loading).collect();
    let max_line: Vec<i64> = rows
        .iter()
        .map(|r| r.max_loading_line.value() as i64)
        .collect();
    let max_ts: Vec<String> = rows
        .iter()
        .map(|r| format_timestamp(r.max_loading_timestamp))
        .collect();

    DataFrame::new(vec![
        Series::new("alternative_line_id", alternatives),
        Series::new("max_loading", max_loading),
        Series::new("max_loading_line_id", max_line),
        Series::new("max_loading_timestamp", max_ts),
    ])
    .context("building N-1 scan frame")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pss_core::{BusId, LineId};

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_voltage_summary_frame() {
        let rows = vec![VoltageSummaryRow {
            timestamp: ts(0),
            max_u_pu: 1.0,
            max_u_pu_bus: BusId::new(1),
            min_u_pu: 0.97,
            min_u_pu_bus: BusId::new(4),
        }];
        let df = voltage_summary_frame(&rows).unwrap();
        assert_eq!(df.shape(), (1, 5));
        assert_eq!(
            df.get_column_names(),
            &[
                "timestamp",
                "max_u_pu",
                "max_u_pu_bus",
                "min_u_pu",
                "min_u_pu_bus"
            ]
        );
    }

    #[test]
    fn test_line_summary_frame() {
        let rows = vec![LineSummaryRow {
            line: LineId::new(20),
            total_loss_kwh: 12.5,
            max_loading: 0.8,
            max_loading_timestamp: ts(1),
            min_loading: 0.1,
            min_loading_timestamp: ts(0),
        }];
        let df = line_summary_frame(&rows).unwrap();
        assert_eq!(df.shape(), (1, 6));
        let loading = df.column("max_loading").unwrap().f64().unwrap();
        assert_eq!(loading.get(0), Some(0.8));
    }

    #[test]
    fn test_n1_scan_frame() {
        let rows = vec![AlternativeRow {
            alternative: LineId::new(23),
            max_loading: 0.92,
            max_loading_line: LineId::new(22),
            max_loading_timestamp: ts(2),
        }];
        let df = n1_scan_frame(&rows).unwrap();
        assert_eq!(df.shape(), (1, 4));
        let ts_col = df.column("max_loading_timestamp").unwrap().utf8().unwrap();
        assert_eq!(ts_col.get(0), Some("2024-01-01 02:00:00"));
    }
}
