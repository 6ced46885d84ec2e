//! N-1 line outage scan with time-series evaluation.
//!
//! For a planned or forced outage of one energized line:
//!
//! 1. the radial topology processor lists every open tie line whose closing
//!    restores a connected, acyclic feeder;
//! 2. each alternative is evaluated with a full time-series power flow
//!    (outaged line open, that alternative closed, everything else as in
//!    the base case);
//! 3. the result table reports, per alternative, the worst line loading
//!    seen anywhere in the grid over the whole horizon, which line hit it,
//!    and when.
//!
//! Alternatives are independent and evaluated in parallel with rayon.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use pss_core::{LineId, Network, ProfilePair, UpdateSet};

use crate::graph::{TopologyError, TopologyProcessor};
use crate::power_flow::PowerFlowSolver;
use crate::time_series::{line_summary, BatchPowerFlow};

/// Errors raised by the N-1 scan.
#[derive(Error, Debug)]
pub enum ContingencyError {
    /// The line id to disconnect does not exist in the network
    #[error("line id {0} to disconnect is not a valid line id")]
    InvalidLineId(usize),

    /// The line to disconnect is not energized at both ends
    #[error("line {0} to disconnect is already disconnected")]
    LineNotConnected(usize),

    /// The base topology failed validation
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// A per-alternative time-series run failed
    #[error("evaluating alternative {alternative} failed: {source}")]
    Evaluation {
        alternative: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Anything else (base network without a usable source, etc.)
    #[error("{0}")]
    Setup(String),
}

/// One row of the N-1 result table: an alternative line with the worst
/// loading its reconfiguration produces over the whole time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlternativeRow {
    /// Open tie line whose closing restores the feeder
    pub alternative: LineId,
    /// Worst loading (p.u. of rated current) anywhere, any timestamp
    pub max_loading: f64,
    /// Line that hits the worst loading
    pub max_loading_line: LineId,
    /// Timestamp of the worst loading
    pub max_loading_timestamp: NaiveDateTime,
}

/// N-1 line outage scanner over a network and its load profiles.
#[derive(Debug)]
pub struct N1Scanner<'a> {
    network: &'a Network,
    profiles: &'a ProfilePair,
    solver: PowerFlowSolver,
}

impl<'a> N1Scanner<'a> {
    pub fn new(network: &'a Network, profiles: &'a ProfilePair) -> Self {
        Self {
            network,
            profiles,
            solver: PowerFlowSolver::new(),
        }
    }

    /// Use a custom-configured power flow solver for the evaluations.
    pub fn with_solver(mut self, solver: PowerFlowSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Scan the outage of one energized line.
    ///
    /// Returns one row per viable alternative, sorted ascending by
    /// alternative line id; an empty table means no single tie line can
    /// restore the feeder.
    pub fn scan(&self, line: LineId) -> Result<Vec<AlternativeRow>, ContingencyError> {
        let outaged = self
            .network
            .line(line)
            .ok_or(ContingencyError::InvalidLineId(line.value()))?;
        if !outaged.is_energized() {
            return Err(ContingencyError::LineNotConnected(line.value()));
        }

        let topology = TopologyProcessor::from_network(self.network)
            .map_err(|e| ContingencyError::Setup(e.to_string()))?;
        let alternatives = topology.alternative_edges(line.value())?;
        eprintln!(
            "N-1 scan of line {}: {} alternative(s) {:?}",
            line.value(),
            alternatives.len(),
            alternatives
        );

        let mut rows: Vec<AlternativeRow> = alternatives
            .par_iter()
            .map(|&alternative| self.evaluate_alternative(line, alternative))
            .collect::<Result<_, _>>()?;
        rows.sort_by_key(|row| row.alternative.value());
        Ok(rows)
    }

    /// Run the time-series power flow with the outaged line open and one
    /// alternative closed, and pull out the worst loading.
    fn evaluate_alternative(
        &self,
        outaged: LineId,
        alternative: usize,
    ) -> Result<AlternativeRow, ContingencyError> {
        let mut scenario = self.network.clone();
        scenario
            .apply_update(
                &UpdateSet::new()
                    .switch_line(outaged, false)
                    .switch_line(LineId::new(alternative), true),
            )
            .map_err(|e| ContingencyError::Setup(e.to_string()))?;

        let batch = BatchPowerFlow::new()
            .with_solver(self.solver.clone())
            .run(&scenario, self.profiles)
            .map_err(|source| ContingencyError::Evaluation {
                alternative,
                source,
            })?;

        // Worst loading across all lines and timestamps; ties resolve to the
        // lowest line id via the id-sorted summary rows.
        let summary = line_summary(&batch);
        let worst = summary
            .iter()
            .max_by(|a, b| {
                a.max_loading
                    .partial_cmp(&b.max_loading)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| ContingencyError::Setup("scenario has no lines".into()))?;

        Ok(AlternativeRow {
            alternative: LineId::new(alternative),
            max_loading: worst.max_loading,
            max_loading_line: worst.line,
            max_loading_timestamp: worst.max_loading_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use pss_core::{
        Bus, BusId, Edge, Line, LoadId, LoadProfile, Node, PerUnit, Source, SourceId, SymLoad,
        Vars, Volts, Watts,
    };

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    /// Three buses in a ring: source at bus 1, lines 21 and 22 energized,
    /// tie line 23 open. Losing either energized line leaves the tie as the
    /// only backfill.
    fn ring_network() -> Network {
        let mut network = Network::new();
        let b1 = network
            .graph
            .add_node(Node::Bus(Bus::new(BusId::new(1), Volts(10_000.0))));
        let b2 = network
            .graph
            .add_node(Node::Bus(Bus::new(BusId::new(2), Volts(10_000.0))));
        let b3 = network
            .graph
            .add_node(Node::Bus(Bus::new(BusId::new(3), Volts(10_000.0))));
        network.graph.add_node(Node::Source(Source {
            id: SourceId::new(10),
            bus: BusId::new(1),
            status: true,
            u_ref: PerUnit(1.0),
        }));
        network.graph.add_node(Node::Load(SymLoad {
            id: LoadId::new(11),
            bus: BusId::new(2),
            status: true,
            p_specified: Watts(0.4e6),
            q_specified: Vars(0.1e6),
        }));
        network.graph.add_node(Node::Load(SymLoad {
            id: LoadId::new(12),
            bus: BusId::new(3),
            status: true,
            p_specified: Watts(0.3e6),
            q_specified: Vars(0.05e6),
        }));
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(
                Line::new(LineId::new(21), BusId::new(1), BusId::new(2), 0.5, 0.4)
                    .with_rating(150.0),
            ),
        );
        network.graph.add_edge(
            b2,
            b3,
            Edge::Line(
                Line::new(LineId::new(22), BusId::new(2), BusId::new(3), 0.5, 0.4)
                    .with_rating(150.0),
            ),
        );
        network.graph.add_edge(
            b1,
            b3,
            Edge::Line(
                Line::new(LineId::new(23), BusId::new(1), BusId::new(3), 0.5, 0.4)
                    .with_status(false, false)
                    .with_rating(150.0),
            ),
        );
        network
    }

    fn profiles() -> ProfilePair {
        let timestamps: Vec<NaiveDateTime> = (0..3).map(ts).collect();
        let load_ids = vec![LoadId::new(11), LoadId::new(12)];
        let active = LoadProfile::new(
            timestamps.clone(),
            load_ids.clone(),
            vec![
                vec![0.2e6, 0.1e6],
                vec![0.6e6, 0.4e6],
                vec![0.3e6, 0.2e6],
            ],
        )
        .unwrap();
        let reactive = LoadProfile::new(
            timestamps,
            load_ids,
            vec![
                vec![0.04e6, 0.02e6],
                vec![0.12e6, 0.08e6],
                vec![0.06e6, 0.04e6],
            ],
        )
        .unwrap();
        ProfilePair::new(active, reactive).unwrap()
    }

    #[test]
    fn test_scan_finds_tie_line() {
        let network = ring_network();
        let profiles = profiles();
        let scanner = N1Scanner::new(&network, &profiles);

        let rows = scanner.scan(LineId::new(21)).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.alternative, LineId::new(23));
        assert!(row.max_loading > 0.0);
        // Peak load hour dominates every line's loading.
        assert_eq!(row.max_loading_timestamp, ts(1));
    }

    #[test]
    fn test_scan_invalid_line_id() {
        let network = ring_network();
        let profiles = profiles();
        let scanner = N1Scanner::new(&network, &profiles);

        let err = scanner.scan(LineId::new(999)).unwrap_err();
        assert!(matches!(err, ContingencyError::InvalidLineId(999)));
    }

    #[test]
    fn test_scan_already_disconnected_line() {
        let network = ring_network();
        let profiles = profiles();
        let scanner = N1Scanner::new(&network, &profiles);

        let err = scanner.scan(LineId::new(23)).unwrap_err();
        assert!(matches!(err, ContingencyError::LineNotConnected(23)));
    }

    #[test]
    fn test_scan_without_alternatives() {
        // Drop the tie line entirely: losing line 22 cannot be backfilled.
        let mut network = ring_network();
        let tie_edge = network
            .graph
            .edge_indices()
            .find(|&e| network.graph[e].as_line().id == LineId::new(23))
            .unwrap();
        network.graph.remove_edge(tie_edge);

        let profiles = profiles();
        let scanner = N1Scanner::new(&network, &profiles);
        let rows = scanner.scan(LineId::new(22)).unwrap();
        assert!(rows.is_empty());
    }
}
