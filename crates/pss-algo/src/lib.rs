//! # pss-algo: Analysis Algorithms for Distribution Networks
//!
//! Algorithms on top of the [`pss_core`] network model:
//!
//! ## Radial Topology Processing
//!
//! [`TopologyProcessor`] validates the switchable-feeder shape (connected
//! counting every edge, acyclic counting the energized ones) and answers
//! downstream-vertex and alternative-edge queries. Every rule violation has
//! its own [`TopologyError`] variant.
//!
//! ## AC Power Flow
//!
//! [`PowerFlowSolver`] runs full Newton-Raphson load flow for a
//! single-source feeder: Y-bus from SI line parameters, dense faer LU
//! solves, per-line flows, currents, and loading. See
//! [`power_flow::ac_pf`] for the mathematical background.
//!
//! ## Time-Series Analysis
//!
//! [`BatchPowerFlow`] drives one power flow per profile timestamp (rayon
//! parallel) and the [`time_series`] aggregations condense the batch into a
//! voltage summary (per timestamp) and a line summary (per line, with
//! trapezoidal kWh losses).
//!
//! ## N-1 Contingency
//!
//! [`N1Scanner`] ranks the tie-line alternatives for a line outage by
//! their worst time-series loading.
//!
//! ## Example
//!
//! ```ignore
//! use pss_algo::{BatchPowerFlow, N1Scanner, time_series};
//!
//! let batch = BatchPowerFlow::new().run(&network, &profiles)?;
//! let voltages = time_series::voltage_summary(&batch);
//! let lines = time_series::line_summary(&batch);
//!
//! let rows = N1Scanner::new(&network, &profiles).scan(line_id)?;
//! ```

pub mod contingency;
pub mod graph;
pub mod power_flow;
pub mod tables;
pub mod time_series;

pub use contingency::{AlternativeRow, ContingencyError, N1Scanner};
pub use graph::{TopologyError, TopologyProcessor};
pub use power_flow::{BusType, BusVoltage, LineFlow, PowerFlowSolution, PowerFlowSolver};
pub use tables::{line_summary_frame, n1_scan_frame, voltage_summary_frame};
pub use time_series::{
    line_summary, voltage_summary, BatchPowerFlow, BatchSolution, LineSummaryRow,
    VoltageSummaryRow,
};
