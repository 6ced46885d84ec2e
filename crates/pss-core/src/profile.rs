//! Timestamped load profiles.
//!
//! A profile is a dense table: one row per timestamp, one column per load.
//! Active and reactive profiles drive the time-series power flow as a
//! [`ProfilePair`], which refuses mismatched column sets or timestamps up
//! front so the batch runner never has to reconcile them mid-run.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::{LoadId, PssError};

/// Errors raised while building or pairing load profiles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// Active and reactive profiles cover different load ids
    #[error("load ids of active and reactive power profiles do not match")]
    LoadIdsMismatch,

    /// Active and reactive profiles cover different timestamps
    #[error("timestamps of active and reactive power profiles do not match")]
    TimestampsMismatch,

    /// Value matrix does not match the declared timestamps/load ids
    #[error("profile shape mismatch: {rows} rows x {cols} cols for {timestamps} timestamps and {loads} loads")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        timestamps: usize,
        loads: usize,
    },

    /// Profile carries no timestamps or no loads
    #[error("profile is empty")]
    Empty,
}

impl From<ProfileError> for PssError {
    fn from(err: ProfileError) -> Self {
        PssError::Profile(err.to_string())
    }
}

/// One power quantity (active or reactive) over time, per load.
///
/// Values are row-major: `values[step][col]` belongs to
/// `timestamps[step]` and `load_ids[col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    timestamps: Vec<NaiveDateTime>,
    load_ids: Vec<LoadId>,
    values: Vec<Vec<f64>>,
}

impl LoadProfile {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        load_ids: Vec<LoadId>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, ProfileError> {
        if timestamps.is_empty() || load_ids.is_empty() {
            return Err(ProfileError::Empty);
        }
        let cols = values.first().map(Vec::len).unwrap_or(0);
        if values.len() != timestamps.len()
            || cols != load_ids.len()
            || values.iter().any(|row| row.len() != cols)
        {
            return Err(ProfileError::ShapeMismatch {
                rows: values.len(),
                cols,
                timestamps: timestamps.len(),
                loads: load_ids.len(),
            });
        }
        Ok(Self {
            timestamps,
            load_ids,
            values,
        })
    }

    pub fn num_steps(&self) -> usize {
        self.timestamps.len()
    }

    pub fn num_loads(&self) -> usize {
        self.load_ids.len()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn load_ids(&self) -> &[LoadId] {
        &self.load_ids
    }

    /// All values at one timestamp, in `load_ids` order.
    pub fn row(&self, step: usize) -> &[f64] {
        &self.values[step]
    }

    pub fn value(&self, step: usize, col: usize) -> f64 {
        self.values[step][col]
    }
}

/// Paired active and reactive profiles with identical shape.
#[derive(Debug, Clone)]
pub struct ProfilePair {
    active: LoadProfile,
    reactive: LoadProfile,
}

impl ProfilePair {
    /// Pair an active-power and a reactive-power profile.
    ///
    /// Column order must agree element-wise, matching how the original data
    /// files are produced; reordered columns count as a mismatch.
    pub fn new(active: LoadProfile, reactive: LoadProfile) -> Result<Self, ProfileError> {
        if active.load_ids != reactive.load_ids {
            return Err(ProfileError::LoadIdsMismatch);
        }
        if active.timestamps != reactive.timestamps {
            return Err(ProfileError::TimestampsMismatch);
        }
        Ok(Self { active, reactive })
    }

    pub fn active(&self) -> &LoadProfile {
        &self.active
    }

    pub fn reactive(&self) -> &LoadProfile {
        &self.reactive
    }

    pub fn num_steps(&self) -> usize {
        self.active.num_steps()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        self.active.timestamps()
    }

    pub fn load_ids(&self) -> &[LoadId] {
        self.active.load_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn profile(load_ids: &[usize], values: Vec<Vec<f64>>) -> LoadProfile {
        let steps = values.len();
        LoadProfile::new(
            (0..steps as u32).map(ts).collect(),
            load_ids.iter().copied().map(LoadId::new).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_checks() {
        let err = LoadProfile::new(vec![ts(0)], vec![LoadId::new(1)], vec![vec![1.0, 2.0]])
            .unwrap_err();
        assert!(matches!(err, ProfileError::ShapeMismatch { .. }));

        let err = LoadProfile::new(vec![], vec![LoadId::new(1)], vec![]).unwrap_err();
        assert_eq!(err, ProfileError::Empty);
    }

    #[test]
    fn test_pairing_ok() {
        let p = profile(&[7, 8], vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let q = profile(&[7, 8], vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        let pair = ProfilePair::new(p, q).unwrap();
        assert_eq!(pair.num_steps(), 2);
        assert_eq!(pair.active().value(1, 0), 3.0);
        assert_eq!(pair.reactive().value(0, 1), 0.2);
    }

    #[test]
    fn test_pairing_load_ids_mismatch() {
        let p = profile(&[7, 8], vec![vec![1.0, 2.0]]);
        let q = profile(&[7, 9], vec![vec![0.1, 0.2]]);
        assert_eq!(
            ProfilePair::new(p, q).unwrap_err(),
            ProfileError::LoadIdsMismatch
        );
    }

    #[test]
    fn test_pairing_timestamps_mismatch() {
        let p = LoadProfile::new(vec![ts(0)], vec![LoadId::new(7)], vec![vec![1.0]]).unwrap();
        let q = LoadProfile::new(vec![ts(5)], vec![LoadId::new(7)], vec![vec![0.1]]).unwrap();
        assert_eq!(
            ProfilePair::new(p, q).unwrap_err(),
            ProfileError::TimestampsMismatch
        );
    }
}
