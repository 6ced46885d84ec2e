//! Load profile readers.
//!
//! Profiles arrive as timestamp-indexed tables: one timestamp column plus
//! one numeric column per load id, the way the original data set serializes
//! pandas frames (integer column names become strings, an unnamed datetime
//! index becomes `__index_level_0__`).

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

use pss_core::{LoadId, LoadProfile, ProfilePair};

use crate::export::read_frame;

/// Column names recognized as the timestamp index, in lookup order.
const TIMESTAMP_COLUMNS: [&str; 3] = ["timestamp", "Timestamp", "__index_level_0__"];

/// Read one load profile from a `.parquet` or `.csv` file.
pub fn read_profile(path: impl AsRef<Path>) -> Result<LoadProfile> {
    let path = path.as_ref();
    let df = read_frame(path)?;
    profile_from_frame(&df).with_context(|| format!("reading load profile {}", path.display()))
}

/// Read and pair active/reactive profiles.
///
/// Fails with [`pss_core::ProfileError`] (downcastable) when the two files
/// disagree on load ids or timestamps.
pub fn read_profile_pair(
    active_path: impl AsRef<Path>,
    reactive_path: impl AsRef<Path>,
) -> Result<ProfilePair> {
    let active = read_profile(active_path)?;
    let reactive = read_profile(reactive_path)?;
    Ok(ProfilePair::new(active, reactive)?)
}

/// Convert a timestamp-indexed frame into a [`LoadProfile`].
pub fn profile_from_frame(df: &DataFrame) -> Result<LoadProfile> {
    let ts_name = TIMESTAMP_COLUMNS
        .iter()
        .find(|name| df.get_column_names().contains(name))
        .copied()
        .ok_or_else(|| {
            anyhow!(
                "no timestamp column found; expected one of {:?}",
                TIMESTAMP_COLUMNS
            )
        })?;

    let timestamps = parse_timestamps(df.column(ts_name)?)?;

    let mut load_ids = Vec::new();
    let mut columns = Vec::new();
    for name in df.get_column_names() {
        if name == ts_name {
            continue;
        }
        let id: usize = name
            .parse()
            .map_err(|_| anyhow!("profile column '{name}' is not a numeric load id"))?;
        load_ids.push(LoadId::new(id));
        let series = df
            .column(name)?
            .cast(&DataType::Float64)
            .with_context(|| format!("casting column '{name}' to Float64"))?;
        let values: Vec<f64> = series
            .f64()?
            .into_iter()
            .map(|v| v.ok_or_else(|| anyhow!("profile column '{name}' contains nulls")))
            .collect::<Result<_>>()?;
        columns.push(values);
    }

    // Column-major to row-major
    let values: Vec<Vec<f64>> = (0..timestamps.len())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect();

    Ok(LoadProfile::new(timestamps, load_ids, values)?)
}

/// Decode the timestamp column from whatever the frame carries: a native
/// datetime column, formatted strings, or integer epoch seconds.
fn parse_timestamps(series: &Series) -> Result<Vec<NaiveDateTime>> {
    match series.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let ints = series
                .cast(&DataType::Int64)
                .context("casting timestamp column to Int64")?;
            ints.i64()?
                .into_iter()
                .map(|v| {
                    let raw = v.ok_or_else(|| anyhow!("timestamp column contains nulls"))?;
                    let (secs, nanos) = match unit {
                        TimeUnit::Nanoseconds => (raw.div_euclid(1_000_000_000), raw.rem_euclid(1_000_000_000)),
                        TimeUnit::Microseconds => (raw.div_euclid(1_000_000), raw.rem_euclid(1_000_000) * 1_000),
                        TimeUnit::Milliseconds => (raw.div_euclid(1_000), raw.rem_euclid(1_000) * 1_000_000),
                    };
                    DateTime::from_timestamp(secs, nanos as u32)
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| anyhow!("timestamp {raw} is out of range"))
                })
                .collect()
        }
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|v| {
                let text = v.ok_or_else(|| anyhow!("timestamp column contains nulls"))?;
                parse_timestamp_str(text)
            })
            .collect(),
        DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 => {
            let ints = series.cast(&DataType::Int64)?;
            ints.i64()?
                .into_iter()
                .map(|v| {
                    let secs = v.ok_or_else(|| anyhow!("timestamp column contains nulls"))?;
                    DateTime::from_timestamp(secs, 0)
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| anyhow!("epoch second {secs} is out of range"))
                })
                .collect()
        }
        other => bail!("unsupported timestamp column type {other:?}"),
    }
}

fn parse_timestamp_str(text: &str) -> Result<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    Err(anyhow!("cannot parse timestamp '{text}'"))
}
