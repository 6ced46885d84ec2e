//! Contingency analysis.
//!
//! N-1 analysis answers the operator's question after a line outage: which
//! open tie line restores supply, and how hard does the reconfigured feeder
//! work across the planning horizon?

pub mod n_minus_one;

pub use n_minus_one::{AlternativeRow, ContingencyError, N1Scanner};
