//! # pss-core: Distribution Network Modeling Core
//!
//! Fundamental data structures for steady-state simulation of electrical
//! distribution networks.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected graphs** where:
//! - **Nodes**: Buses, Sources (external grid connections), Loads
//! - **Edges**: Lines (switchable cable/overhead-line segments)
//!
//! This graph-based approach enables:
//! - Fast topological queries (connectivity, cycle detection, downstream search)
//! - Efficient parallel time-series analysis using rayon
//! - Type-safe element access with newtype IDs
//!
//! ## Quick Start
//!
//! ```rust
//! use pss_core::*;
//!
//! let mut network = Network::new();
//!
//! let b1 = network.graph.add_node(Node::Bus(Bus::new(BusId::new(1), Volts(10_500.0))));
//! let b2 = network.graph.add_node(Node::Bus(Bus::new(BusId::new(2), Volts(10_500.0))));
//!
//! network.graph.add_node(Node::Source(Source {
//!     id: SourceId::new(10),
//!     bus: BusId::new(1),
//!     status: true,
//!     u_ref: PerUnit(1.0),
//! }));
//!
//! network.graph.add_node(Node::Load(SymLoad {
//!     id: LoadId::new(11),
//!     bus: BusId::new(2),
//!     status: true,
//!     p_specified: Watts(1.0e6),
//!     q_specified: Vars(2.0e5),
//! }));
//!
//! network.graph.add_edge(
//!     b1,
//!     b2,
//!     Edge::Line(Line::new(LineId::new(20), BusId::new(1), BusId::new(2), 0.25, 0.2)),
//! );
//!
//! assert_eq!(network.stats().num_buses, 2);
//! ```
//!
//! ## ID System
//!
//! Every element carries a newtype ID wrapper around `usize`. In the grid
//! input format all elements share a single ID space, so the same raw value
//! never identifies both a bus and a line; the importer enforces this.
//!
//! ## Modules
//!
//! - [`error`] - Unified error type for the workspace
//! - [`units`] - Unit-safe newtypes for electrical quantities
//! - [`profile`] - Timestamped load profiles driving time-series runs
//! - [`update`] - Batched network mutations (switching, load changes)

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod profile;
pub mod units;
pub mod update;

pub use error::{PssError, PssResult};
pub use petgraph::graph::NodeIndex;
pub use profile::{LoadProfile, ProfileError, ProfilePair};
pub use units::{Amperes, KilowattHours, PerUnit, Radians, Vars, Volts, Watts};
pub use update::{LineStatusUpdate, LoadUpdate, UpdateSet};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LineId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LineId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl SourceId {
    #[inline]
    pub fn new(value: usize) -> Self {
        SourceId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LoadId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LoadId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

// Basic component structs
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    /// Rated line-to-line voltage
    pub u_rated: Volts,
}

impl Bus {
    pub fn new(id: BusId, u_rated: Volts) -> Self {
        Self { id, u_rated }
    }
}

/// A switchable line segment between two buses.
///
/// A line conducts only when both of its switches are closed; see
/// [`Line::is_energized`]. Impedance parameters are in SI units (ohm, farad)
/// for the whole segment.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Switch state at the from side
    pub from_status: bool,
    /// Switch state at the to side
    pub to_status: bool,
    /// Series resistance (ohm)
    pub r1: f64,
    /// Series reactance (ohm)
    pub x1: f64,
    /// Total shunt capacitance (farad)
    pub c1: f64,
    /// Shunt loss tangent (dimensionless)
    pub tan1: f64,
    /// Rated current
    pub i_n: Amperes,
}

impl Line {
    /// Construct a closed line from series impedance, filling shunt
    /// parameters and rating with defaults.
    pub fn new(id: LineId, from_bus: BusId, to_bus: BusId, r1: f64, x1: f64) -> Self {
        Self {
            id,
            from_bus,
            to_bus,
            from_status: true,
            to_status: true,
            r1,
            x1,
            c1: 0.0,
            tan1: 0.0,
            i_n: Amperes(f64::INFINITY),
        }
    }

    /// Attach shunt parameters (total capacitance in farad, loss tangent).
    pub fn with_shunt(mut self, c1: f64, tan1: f64) -> Self {
        self.c1 = c1;
        self.tan1 = tan1;
        self
    }

    /// Attach a rated current in amperes.
    pub fn with_rating(mut self, i_n: f64) -> Self {
        self.i_n = Amperes(i_n);
        self
    }

    /// Set both switch states.
    pub fn with_status(mut self, from_status: bool, to_status: bool) -> Self {
        self.from_status = from_status;
        self.to_status = to_status;
        self
    }

    /// A line conducts only when closed at both ends.
    #[inline]
    pub fn is_energized(&self) -> bool {
        self.from_status && self.to_status
    }
}

/// External grid connection. Its bus is the slack bus of the feeder.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    pub bus: BusId,
    pub status: bool,
    /// Voltage setpoint at the connection bus (per-unit)
    pub u_ref: PerUnit,
}

/// Symmetric (balanced three-phase) load.
#[derive(Debug, Clone)]
pub struct SymLoad {
    pub id: LoadId,
    pub bus: BusId,
    pub status: bool,
    /// Active power demand (watt, total over three phases)
    pub p_specified: Watts,
    /// Reactive power demand (var, total over three phases)
    pub q_specified: Vars,
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Source(Source),
    Load(SymLoad),
}

impl Node {
    /// Short human-readable label for graph exports and diagnostics.
    pub fn label(&self) -> String {
        match self {
            Node::Bus(b) => format!("bus {}", b.id.value()),
            Node::Source(s) => format!("source {}", s.id.value()),
            Node::Load(l) => format!("load {}", l.id.value()),
        }
    }
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone)]
pub enum Edge {
    Line(Line),
}

impl Edge {
    pub fn as_line(&self) -> &Line {
        match self {
            Edge::Line(line) => line,
        }
    }

    pub fn as_line_mut(&mut self) -> &mut Line {
        match self {
            Edge::Line(line) => line,
        }
    }
}

/// Aggregate component counts and load totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_energized_lines: usize,
    pub num_sources: usize,
    pub num_loads: usize,
    pub total_load_w: f64,
    pub total_load_var: f64,
}

/// The core distribution network graph
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
}

// Buses, sources, and loads are graph nodes while lines are edges. This keeps
// topology explicit for algorithms such as downstream tracing and N-1
// alternative search, and mirrors how the grid data format groups elements.

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
        }
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Source(_) => stats.num_sources += 1,
                Node::Load(l) => {
                    stats.num_loads += 1;
                    if l.status {
                        stats.total_load_w += l.p_specified.value();
                        stats.total_load_var += l.q_specified.value();
                    }
                }
            }
        }

        for edge in self.graph.edge_weights() {
            let line = edge.as_line();
            stats.num_lines += 1;
            if line.is_energized() {
                stats.num_energized_lines += 1;
            }
        }

        stats
    }

    /// Get all buses, in graph insertion order
    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Get all sources
    pub fn sources(&self) -> Vec<&Source> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Source(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Get all loads
    pub fn loads(&self) -> Vec<&SymLoad> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Get all lines
    pub fn lines(&self) -> Vec<&Line> {
        self.graph.edge_weights().map(|e| e.as_line()).collect()
    }

    /// Look up a bus by id
    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses().into_iter().find(|b| b.id == id)
    }

    /// Look up a line by id
    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.graph
            .edge_weights()
            .map(|e| e.as_line())
            .find(|l| l.id == id)
    }

    /// Graph index of the node carrying a given bus
    pub fn bus_index(&self, id: BusId) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&idx| match &self.graph[idx] {
            Node::Bus(b) => b.id == id,
            _ => false,
        })
    }

    /// Find loads connected to a specific bus
    pub fn loads_at_bus(&self, bus_id: BusId) -> Vec<&SymLoad> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) if l.bus == bus_id => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Find sources connected to a specific bus
    pub fn sources_at_bus(&self, bus_id: BusId) -> Vec<&Source> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Source(s) if s.bus == bus_id => Some(s),
                _ => None,
            })
            .collect()
    }

    /// The slack bus of the feeder: the bus of the single in-service source.
    pub fn slack_bus(&self) -> PssResult<BusId> {
        let sources: Vec<&Source> = self
            .sources()
            .into_iter()
            .filter(|s| s.status)
            .collect();
        match sources.as_slice() {
            [single] => Ok(single.bus),
            [] => Err(PssError::Validation("network has no in-service source".into())),
            _ => Err(PssError::Validation(format!(
                "network has {} in-service sources, expected exactly one",
                sources.len()
            ))),
        }
    }

    /// Apply a batched update set. Fails on the first unknown id without
    /// rolling back earlier changes, so validate ids up front when atomicity
    /// matters.
    pub fn apply_update(&mut self, update: &UpdateSet) -> PssResult<()> {
        for line_update in &update.lines {
            let edge = self
                .graph
                .edge_weights_mut()
                .map(|e| e.as_line_mut())
                .find(|l| l.id == line_update.line)
                .ok_or_else(|| {
                    PssError::Validation(format!(
                        "update references unknown line id {}",
                        line_update.line.value()
                    ))
                })?;
            edge.from_status = line_update.from_status;
            edge.to_status = line_update.to_status;
        }

        for load_update in &update.loads {
            let load = self
                .graph
                .node_weights_mut()
                .filter_map(|n| match n {
                    Node::Load(l) if l.id == load_update.load => Some(l),
                    _ => None,
                })
                .next()
                .ok_or_else(|| {
                    PssError::Validation(format!(
                        "update references unknown load id {}",
                        load_update.load.value()
                    ))
                })?;
            if let Some(p) = load_update.p_specified {
                load.p_specified = p;
            }
            if let Some(q) = load_update.q_specified {
                load.q_specified = q;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        let b1 = network
            .graph
            .add_node(Node::Bus(Bus::new(BusId::new(1), Volts(10_500.0))));
        let b2 = network
            .graph
            .add_node(Node::Bus(Bus::new(BusId::new(2), Volts(10_500.0))));
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
            p_specified: Watts(1.0e6),
            q_specified: Vars(2.0e5),
        }));
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(
                Line::new(LineId::new(20), BusId::new(1), BusId::new(2), 0.25, 0.2)
                    .with_rating(200.0),
            ),
        );
        network
    }

    #[test]
    fn test_stats() {
        let network = two_bus_network();
        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_lines, 1);
        assert_eq!(stats.num_energized_lines, 1);
        assert_eq!(stats.num_sources, 1);
        assert_eq!(stats.num_loads, 1);
        assert_eq!(stats.total_load_w, 1.0e6);
    }

    #[test]
    fn test_lookups() {
        let network = two_bus_network();
        assert!(network.bus(BusId::new(2)).is_some());
        assert!(network.bus(BusId::new(99)).is_none());
        assert_eq!(network.line(LineId::new(20)).unwrap().i_n.value(), 200.0);
        assert_eq!(network.slack_bus().unwrap(), BusId::new(1));
        assert_eq!(network.loads_at_bus(BusId::new(2)).len(), 1);
        assert!(network.loads_at_bus(BusId::new(1)).is_empty());
    }

    #[test]
    fn test_apply_line_update() {
        let mut network = two_bus_network();
        let update = UpdateSet::new().switch_line(LineId::new(20), false);
        network.apply_update(&update).unwrap();
        assert!(!network.line(LineId::new(20)).unwrap().is_energized());
        assert_eq!(network.stats().num_energized_lines, 0);
    }

    #[test]
    fn test_apply_load_update() {
        let mut network = two_bus_network();
        let update = UpdateSet::new().set_load(LoadId::new(11), Watts(2.5e6), Vars(1.0e5));
        network.apply_update(&update).unwrap();
        let load = network.loads()[0].clone();
        assert_eq!(load.p_specified.value(), 2.5e6);
        assert_eq!(load.q_specified.value(), 1.0e5);
    }

    #[test]
    fn test_apply_update_unknown_id() {
        let mut network = two_bus_network();
        let update = UpdateSet::new().switch_line(LineId::new(999), false);
        let err = network.apply_update(&update).unwrap_err();
        assert!(matches!(err, PssError::Validation(_)));
    }

    #[test]
    fn test_ids_serde_transparent() {
        let id = LineId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: LineId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
