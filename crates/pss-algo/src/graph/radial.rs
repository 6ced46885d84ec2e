//! Radial topology processor for switchable distribution grids.
//!
//! Distribution feeders are operated radially: the energized lines form a
//! tree rooted at the source bus, while open tie lines stand by as
//! alternatives. This module validates that shape and answers the two
//! topological questions the rest of the workspace is built on:
//!
//! - which vertices are fed *through* a given edge (downstream search), and
//! - which open edge can be closed to restore supply when an energized edge
//!   is taken out (alternative search).
//!
//! The processor works on plain id arrays so it can be fed either from a
//! [`Network`] or directly from test fixtures.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use thiserror::Error;

use pss_core::{Network, PssError};

/// Errors raised during topology construction and queries.
///
/// One variant per validation rule, so callers can match on the exact
/// failure instead of parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// An id was referenced that is not a known vertex or edge id
    #[error("id {0} not found")]
    IdNotFound(usize),

    /// Vertex ids, edge ids, or the union of both contain duplicates
    #[error("id {0} is not unique")]
    IdNotUnique(usize),

    /// Two parallel input arrays have different lengths
    #[error("input length mismatch: {name} has {got} entries, expected {expected}")]
    InputLengthMismatch {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    /// The graph (counting every edge, enabled or not) is not connected
    #[error("graph is not fully connected")]
    NotFullyConnected,

    /// The enabled subgraph contains a cycle
    #[error("enabled subgraph contains a cycle")]
    CycleDetected,

    /// An alternative search was asked for an edge that is already disabled
    #[error("edge {0} is already disabled")]
    EdgeAlreadyDisabled(usize),
}

impl From<TopologyError> for PssError {
    fn from(err: TopologyError) -> Self {
        PssError::Topology(err.to_string())
    }
}

/// Validated undirected graph with switchable edges and a source vertex.
///
/// Construction enforces the structural rules a radial feeder must satisfy;
/// afterwards queries never re-validate.
#[derive(Debug, Clone)]
pub struct TopologyProcessor {
    vertex_ids: Vec<usize>,
    edge_ids: Vec<usize>,
    edge_pairs: Vec<(usize, usize)>,
    edge_enabled: Vec<bool>,
    source_vertex_id: usize,
    /// vertex id -> dense index
    vertex_pos: HashMap<usize, usize>,
    /// edge id -> position in the edge arrays
    edge_pos: HashMap<usize, usize>,
    /// dense adjacency over enabled edges: vertex index -> (neighbor index, edge position)
    enabled_adjacency: Vec<Vec<(usize, usize)>>,
}

impl TopologyProcessor {
    /// Build and validate a topology from parallel id arrays.
    ///
    /// Checks, in order:
    /// 1. vertex ids and edge ids are unique and the two spaces are disjoint;
    /// 2. `edge_pairs` has one pair per edge id;
    /// 3. every pair endpoint is a known vertex id;
    /// 4. `edge_enabled` has one flag per edge id;
    /// 5. the source vertex id is known;
    /// 6. the graph is connected counting every edge, enabled or not;
    /// 7. the enabled subgraph is acyclic.
    pub fn new(
        vertex_ids: Vec<usize>,
        edge_ids: Vec<usize>,
        edge_pairs: Vec<(usize, usize)>,
        edge_enabled: Vec<bool>,
        source_vertex_id: usize,
    ) -> Result<Self, TopologyError> {
        let mut vertex_pos = HashMap::with_capacity(vertex_ids.len());
        for (pos, &id) in vertex_ids.iter().enumerate() {
            if vertex_pos.insert(id, pos).is_some() {
                return Err(TopologyError::IdNotUnique(id));
            }
        }

        let mut edge_pos = HashMap::with_capacity(edge_ids.len());
        for (pos, &id) in edge_ids.iter().enumerate() {
            if edge_pos.insert(id, pos).is_some() {
                return Err(TopologyError::IdNotUnique(id));
            }
            if vertex_pos.contains_key(&id) {
                // Vertex and edge ids share one id space in the input format.
                return Err(TopologyError::IdNotUnique(id));
            }
        }

        if edge_pairs.len() != edge_ids.len() {
            return Err(TopologyError::InputLengthMismatch {
                name: "edge_vertex_id_pairs",
                got: edge_pairs.len(),
                expected: edge_ids.len(),
            });
        }

        for &(u, v) in &edge_pairs {
            if !vertex_pos.contains_key(&u) {
                return Err(TopologyError::IdNotFound(u));
            }
            if !vertex_pos.contains_key(&v) {
                return Err(TopologyError::IdNotFound(v));
            }
        }

        if edge_enabled.len() != edge_ids.len() {
            return Err(TopologyError::InputLengthMismatch {
                name: "edge_enabled",
                got: edge_enabled.len(),
                expected: edge_ids.len(),
            });
        }

        if !vertex_pos.contains_key(&source_vertex_id) {
            return Err(TopologyError::IdNotFound(source_vertex_id));
        }

        let n = vertex_ids.len();

        // Connectivity counts every edge: an open tie line still ties its
        // island to the feeder. Isolated vertices count as disconnection.
        let mut full_graph: UnGraph<usize, usize> = UnGraph::with_capacity(n, edge_pairs.len());
        let node_indices: Vec<_> = vertex_ids.iter().map(|&id| full_graph.add_node(id)).collect();
        for (pos, &(u, v)) in edge_pairs.iter().enumerate() {
            full_graph.add_edge(node_indices[vertex_pos[&u]], node_indices[vertex_pos[&v]], pos);
        }
        if n > 0 && connected_components(&full_graph) != 1 {
            return Err(TopologyError::NotFullyConnected);
        }

        // Cycles are checked on the enabled subgraph only: a forest has
        // exactly (vertices - components) edges.
        let mut enabled_graph: UnGraph<usize, usize> = UnGraph::with_capacity(n, edge_pairs.len());
        let enabled_indices: Vec<_> =
            vertex_ids.iter().map(|&id| enabled_graph.add_node(id)).collect();
        let mut enabled_adjacency = vec![Vec::new(); n];
        let mut enabled_count = 0;
        for (pos, &(u, v)) in edge_pairs.iter().enumerate() {
            if edge_enabled[pos] {
                let ui = vertex_pos[&u];
                let vi = vertex_pos[&v];
                enabled_graph.add_edge(enabled_indices[ui], enabled_indices[vi], pos);
                enabled_adjacency[ui].push((vi, pos));
                enabled_adjacency[vi].push((ui, pos));
                enabled_count += 1;
            }
        }
        if enabled_count != n - connected_components(&enabled_graph) {
            return Err(TopologyError::CycleDetected);
        }

        Ok(Self {
            vertex_ids,
            edge_ids,
            edge_pairs,
            edge_enabled,
            source_vertex_id,
            vertex_pos,
            edge_pos,
            enabled_adjacency,
        })
    }

    /// Build a topology from a network: buses become vertices, lines become
    /// edges, and energized lines are the enabled ones. The source bus of
    /// the single in-service source is the root.
    pub fn from_network(network: &Network) -> Result<Self, PssError> {
        let vertex_ids: Vec<usize> = network.buses().iter().map(|b| b.id.value()).collect();
        let lines = network.lines();
        let edge_ids: Vec<usize> = lines.iter().map(|l| l.id.value()).collect();
        let edge_pairs: Vec<(usize, usize)> = lines
            .iter()
            .map(|l| (l.from_bus.value(), l.to_bus.value()))
            .collect();
        let edge_enabled: Vec<bool> = lines.iter().map(|l| l.is_energized()).collect();
        let source_vertex_id = network.slack_bus()?.value();

        Ok(Self::new(
            vertex_ids,
            edge_ids,
            edge_pairs,
            edge_enabled,
            source_vertex_id,
        )?)
    }

    pub fn vertex_ids(&self) -> &[usize] {
        &self.vertex_ids
    }

    pub fn edge_ids(&self) -> &[usize] {
        &self.edge_ids
    }

    pub fn source_vertex_id(&self) -> usize {
        self.source_vertex_id
    }

    /// Whether the given edge is currently enabled.
    pub fn is_enabled(&self, edge_id: usize) -> Result<bool, TopologyError> {
        let pos = *self
            .edge_pos
            .get(&edge_id)
            .ok_or(TopologyError::IdNotFound(edge_id))?;
        Ok(self.edge_enabled[pos])
    }

    /// All vertices fed through the given edge, walking away from the
    /// source over enabled edges, including the edge's own far endpoint.
    ///
    /// A disabled edge feeds nothing and yields an empty list. The result
    /// is sorted ascending by vertex id.
    pub fn downstream_vertices(&self, edge_id: usize) -> Result<Vec<usize>, TopologyError> {
        let pos = *self
            .edge_pos
            .get(&edge_id)
            .ok_or(TopologyError::IdNotFound(edge_id))?;
        if !self.edge_enabled[pos] {
            return Ok(Vec::new());
        }

        // Vertices still reachable from the source once the edge is cut;
        // whichever endpoint drops out roots the downstream subtree.
        let source_pos = self.vertex_pos[&self.source_vertex_id];
        let upstream = reachable_set(&self.enabled_adjacency, source_pos, Some(pos));

        let (u, v) = self.edge_pairs[pos];
        let ui = self.vertex_pos[&u];
        let vi = self.vertex_pos[&v];
        let root = match (upstream.contains(&ui), upstream.contains(&vi)) {
            (true, false) => vi,
            (false, true) => ui,
            // Both reachable cannot happen in a validated forest; neither
            // reachable means the edge hangs off an unenergized island.
            _ => return Ok(Vec::new()),
        };

        let mut downstream: Vec<usize> = reachable_set(&self.enabled_adjacency, root, Some(pos))
            .into_iter()
            .map(|idx| self.vertex_ids[idx])
            .collect();
        downstream.sort_unstable();
        Ok(downstream)
    }

    /// All currently-disabled edges whose activation restores a connected,
    /// acyclic grid once the given (currently enabled) edge is disabled.
    ///
    /// Returns ids sorted ascending; an empty list means the outage cannot
    /// be backfilled by any single tie line.
    pub fn alternative_edges(&self, disabled_edge_id: usize) -> Result<Vec<usize>, TopologyError> {
        let target = *self
            .edge_pos
            .get(&disabled_edge_id)
            .ok_or(TopologyError::IdNotFound(disabled_edge_id))?;
        if !self.edge_enabled[target] {
            return Err(TopologyError::EdgeAlreadyDisabled(disabled_edge_id));
        }

        let n = self.vertex_ids.len();

        // Component labels of the enabled forest with the target cut.
        let mut label = vec![usize::MAX; n];
        let mut components = 0;
        for start in 0..n {
            if label[start] != usize::MAX {
                continue;
            }
            for idx in reachable_set(&self.enabled_adjacency, start, Some(target)) {
                label[idx] = components;
            }
            components += 1;
        }

        // Closing a tie between two different components merges them without
        // creating a cycle; full connectivity needs exactly two components.
        let mut alternatives = Vec::new();
        if components == 2 {
            for (pos, &(u, v)) in self.edge_pairs.iter().enumerate() {
                if pos == target || self.edge_enabled[pos] {
                    continue;
                }
                let ui = self.vertex_pos[&u];
                let vi = self.vertex_pos[&v];
                if label[ui] != label[vi] {
                    alternatives.push(self.edge_ids[pos]);
                }
            }
        }
        alternatives.sort_unstable();
        Ok(alternatives)
    }
}

/// Breadth-first reachable set over a dense adjacency list, optionally
/// treating one edge position as removed.
fn reachable_set(
    adjacency: &[Vec<(usize, usize)>],
    start: usize,
    skip_edge: Option<usize>,
) -> HashSet<usize> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        for &(neighbor, edge) in &adjacency[node] {
            if Some(edge) == skip_edge {
                continue;
            }
            if !visited.contains(&neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    visited
}
