//! Time-series batch power flow and aggregation.
//!
//! Runs one power flow per profile timestamp and condenses the raw batch
//! into the two report tables the original tooling produced:
//!
//! - a **voltage summary** with one row per timestamp (extreme per-unit
//!   voltages and the buses that hit them), and
//! - a **line summary** with one row per line (energy losses over the whole
//!   horizon plus extreme loadings and when they occurred).
//!
//! Timestamps are independent scenarios, so the batch fans out across
//! threads with rayon.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;

use pss_core::{BusId, LineId, Network, ProfilePair, UpdateSet};

use crate::power_flow::{PowerFlowSolution, PowerFlowSolver};

/// Raw per-timestamp solutions of a batch run.
#[derive(Debug, Clone)]
pub struct BatchSolution {
    timestamps: Vec<NaiveDateTime>,
    steps: Vec<PowerFlowSolution>,
}

impl BatchSolution {
    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn steps(&self) -> &[PowerFlowSolution] {
        &self.steps
    }
}

/// One row of the voltage summary table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageSummaryRow {
    pub timestamp: NaiveDateTime,
    pub max_u_pu: f64,
    pub max_u_pu_bus: BusId,
    pub min_u_pu: f64,
    pub min_u_pu_bus: BusId,
}

/// One row of the line summary table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineSummaryRow {
    pub line: LineId,
    pub total_loss_kwh: f64,
    pub max_loading: f64,
    pub max_loading_timestamp: NaiveDateTime,
    pub min_loading: f64,
    pub min_loading_timestamp: NaiveDateTime,
}

/// Time-series batch power flow runner.
#[derive(Debug, Clone, Default)]
pub struct BatchPowerFlow {
    solver: PowerFlowSolver,
}

impl BatchPowerFlow {
    pub fn new() -> Self {
        Self {
            solver: PowerFlowSolver::new(),
        }
    }

    /// Use a custom-configured solver for every timestamp.
    pub fn with_solver(mut self, solver: PowerFlowSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Solve the power flow for every timestamp of the profile pair.
    ///
    /// Each step overwrites the profiled loads' setpoints and solves on an
    /// otherwise identical network. Loads absent from the profile keep their
    /// base-case setpoints. A non-converging timestamp fails the whole run.
    pub fn run(&self, network: &Network, profiles: &ProfilePair) -> Result<BatchSolution> {
        let known_loads: HashSet<usize> =
            network.loads().iter().map(|l| l.id.value()).collect();
        for load_id in profiles.load_ids() {
            if !known_loads.contains(&load_id.value()) {
                return Err(anyhow!(
                    "profile references unknown load id {}",
                    load_id.value()
                ));
            }
        }

        let timestamps = profiles.timestamps().to_vec();
        let steps: Vec<PowerFlowSolution> = (0..profiles.num_steps())
            .into_par_iter()
            .map(|step| {
                let mut update = UpdateSet::new();
                for (col, &load_id) in profiles.load_ids().iter().enumerate() {
                    update = update.set_load(
                        load_id,
                        pss_core::Watts(profiles.active().value(step, col)),
                        pss_core::Vars(profiles.reactive().value(step, col)),
                    );
                }

                let mut scenario = network.clone();
                scenario
                    .apply_update(&update)
                    .map_err(|e| anyhow!("{e}"))?;
                self.solver
                    .solve(&scenario)
                    .with_context(|| format!("power flow at {}", timestamps[step]))
            })
            .collect::<Result<_>>()?;

        Ok(BatchSolution { timestamps, steps })
    }
}

/// Condense a batch into one row per timestamp with the extreme voltages.
///
/// Ties resolve to the lowest bus id, matching first-hit argmax/argmin on
/// id-sorted arrays.
pub fn voltage_summary(batch: &BatchSolution) -> Vec<VoltageSummaryRow> {
    batch
        .steps
        .iter()
        .zip(&batch.timestamps)
        .map(|(solution, &timestamp)| {
            let mut max_u = f64::NEG_INFINITY;
            let mut max_bus = BusId::new(0);
            let mut min_u = f64::INFINITY;
            let mut min_bus = BusId::new(0);
            for bus in &solution.bus_voltages {
                if bus.u_pu > max_u {
                    max_u = bus.u_pu;
                    max_bus = bus.id;
                }
                if bus.u_pu < min_u {
                    min_u = bus.u_pu;
                    min_bus = bus.id;
                }
            }
            VoltageSummaryRow {
                timestamp,
                max_u_pu: max_u,
                max_u_pu_bus: max_bus,
                min_u_pu: min_u,
                min_u_pu_bus: min_bus,
            }
        })
        .collect()
}

/// Condense a batch into one row per line: trapezoidal energy losses over
/// the horizon plus extreme loadings with their timestamps.
pub fn line_summary(batch: &BatchSolution) -> Vec<LineSummaryRow> {
    let Some(first) = batch.steps.first() else {
        return Vec::new();
    };

    first
        .line_flows
        .iter()
        .map(|reference| {
            let line = reference.id;
            let mut losses_w = Vec::with_capacity(batch.num_steps());
            let mut max_loading = f64::NEG_INFINITY;
            let mut max_ts = batch.timestamps[0];
            let mut min_loading = f64::INFINITY;
            let mut min_ts = batch.timestamps[0];

            for (solution, &timestamp) in batch.steps.iter().zip(&batch.timestamps) {
                let flow = solution
                    .flow(line)
                    .expect("line set is constant across a batch");
                losses_w.push(flow.loss_w());
                if flow.loading > max_loading {
                    max_loading = flow.loading;
                    max_ts = timestamp;
                }
                if flow.loading < min_loading {
                    min_loading = flow.loading;
                    min_ts = timestamp;
                }
            }

            LineSummaryRow {
                line,
                total_loss_kwh: trapezoid_kwh(&losses_w, &batch.timestamps),
                max_loading,
                max_loading_timestamp: max_ts,
                min_loading,
                min_loading_timestamp: min_ts,
            }
        })
        .collect()
}

/// Trapezoidal integration of a watt series over its timestamps, in kWh.
///
/// A single-sample series is treated as one hour of constant loss.
fn trapezoid_kwh(losses_w: &[f64], timestamps: &[NaiveDateTime]) -> f64 {
    match losses_w.len() {
        0 => 0.0,
        1 => losses_w[0] / 1e3,
        _ => {
            let mut energy_wh = 0.0;
            for k in 0..losses_w.len() - 1 {
                let dt_hours =
                    (timestamps[k + 1] - timestamps[k]).num_seconds() as f64 / 3600.0;
                energy_wh += (losses_w[k] + losses_w[k + 1]) / 2.0 * dt_hours;
            }
            energy_wh / 1e3
        }
    }
}
