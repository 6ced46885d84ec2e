//! # pss-io: Network & Profile Data I/O
//!
//! Input/output support for distribution network datasets: the serialized
//! grid-JSON network format, parquet/CSV load profiles, and columnar export
//! of result tables.
//!
//! ## Design Philosophy
//!
//! **Single Responsibility**: the importer focuses on format-specific
//! parsing; generic validation happens post-import through a shared
//! diagnostics pipeline.
//!
//! **Error Recovery**: partial imports continue when encountering bad
//! records, collecting diagnostics for user visibility rather than failing
//! on the first issue. [`load_network`] is the hard-failing convenience for
//! callers that want a usable network or an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pss_io::{load_network, profiles::read_profile_pair};
//!
//! fn main() -> anyhow::Result<()> {
//!     let network = load_network("input/input_network_data.json")?;
//!     let profiles = read_profile_pair(
//!         "input/active_power_profile.parquet",
//!         "input/reactive_power_profile.parquet",
//!     )?;
//!
//!     println!("buses: {}", network.stats().num_buses);
//!     println!("timestamps: {}", profiles.num_steps());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`importers`] - grid-JSON network importer
//! - [`validate`] - shared id/reference/parameter validity checks
//! - [`profiles`] - parquet/CSV load profile readers
//! - [`export`] - DataFrame read/write by extension
//! - [`diagnostics`] - severity-tagged import diagnostics

use std::path::Path;

use anyhow::Result;

use pss_core::{Network, PssError};

pub mod diagnostics;
pub mod export;
pub mod importers;
pub mod profiles;
pub mod validate;

pub use diagnostics::{ImportDiagnostics, ImportIssue, ImportResult, ImportStats, Severity};
pub use export::{read_frame, write_frame};
pub use importers::{parse_grid_json, parse_grid_json_str};
pub use profiles::{read_profile, read_profile_pair};
pub use validate::{assert_valid, validate_network};

/// Import a grid-JSON network and hard-fail on any error diagnostic.
pub fn load_network(path: impl AsRef<Path>) -> Result<Network> {
    let result = parse_grid_json(path)?;
    if result.diagnostics.has_errors() {
        let first = result
            .diagnostics
            .first_error()
            .unwrap_or("unknown validation error");
        return Err(PssError::Validation(format!(
            "{} ({} errors total)",
            first,
            result.diagnostics.error_count()
        ))
        .into());
    }
    Ok(result.network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_network_rejects_invalid_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let mut file = std::fs::File::create(&path).unwrap();
        // Two sources in service: parses, but fails validation.
        write!(
            file,
            r#"{{"version":"1.0","type":"input","data":{{
                "node":[{{"id":1,"u_rated":10500.0}}],
                "line":[],
                "source":[{{"id":2,"node":1,"status":1}},{{"id":3,"node":1,"status":1}}],
                "sym_load":[]
            }}}}"#
        )
        .unwrap();

        let err = load_network(&path).unwrap_err();
        assert!(err.to_string().contains("expected exactly one"));
    }
}
