//! Steady-state power flow solvers.

pub mod ac_pf;

pub use ac_pf::{BusType, BusVoltage, LineFlow, PowerFlowSolution, PowerFlowSolver};
