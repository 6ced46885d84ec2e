//! Serialized grid-JSON network importer.
//!
//! The input format wraps component record arrays in a versioned envelope:
//!
//! ```json
//! {"version": "1.0", "type": "input", "is_batch": false, "attributes": {},
//!  "data": {"node":     [{"id": 1, "u_rated": 10500.0}],
//!           "line":     [{"id": 9, "from_node": 1, "to_node": 2,
//!                         "from_status": 1, "to_status": 1,
//!                         "r1": 0.25, "x1": 0.2, "c1": 1e-6,
//!                         "tan1": 0.0, "i_n": 200.0}],
//!           "source":   [{"id": 16, "node": 1, "status": 1, "u_ref": 1.0}],
//!           "sym_load": [{"id": 17, "node": 2, "status": 1, "type": 0,
//!                         "p_specified": 1.0e6, "q_specified": 2.0e5}]}}
//! ```
//!
//! Statuses are encoded 0/1; unknown keys are ignored. Records referencing
//! unknown buses are skipped with an error diagnostic so a partial import
//! stays inspectable; hard failure is up to [`crate::load_network`].

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use pss_core::{
    Bus, BusId, Edge, Line, LineId, LoadId, Network, Node, PerUnit, Source, SourceId, SymLoad,
    Vars, Volts, Watts,
};

use crate::diagnostics::{ImportDiagnostics, ImportResult};
use crate::validate::validate_network;

/// Top-level envelope of the grid-JSON format
#[derive(Debug, Deserialize)]
struct GridJson {
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    data: GridData,
}

/// Component record arrays
#[derive(Debug, Default, Deserialize)]
struct GridData {
    #[serde(default)]
    node: Vec<NodeRecord>,
    #[serde(default)]
    line: Vec<LineRecord>,
    #[serde(default)]
    source: Vec<SourceRecord>,
    #[serde(default)]
    sym_load: Vec<SymLoadRecord>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: usize,
    u_rated: f64,
}

#[derive(Debug, Deserialize)]
struct LineRecord {
    id: usize,
    from_node: usize,
    to_node: usize,
    from_status: u8,
    to_status: u8,
    r1: f64,
    x1: f64,
    #[serde(default)]
    c1: f64,
    #[serde(default)]
    tan1: f64,
    #[serde(default = "default_i_n")]
    i_n: f64,
}

fn default_i_n() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    id: usize,
    node: usize,
    status: u8,
    #[serde(default = "default_u_ref")]
    u_ref: f64,
}

fn default_u_ref() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct SymLoadRecord {
    id: usize,
    node: usize,
    status: u8,
    #[serde(default)]
    p_specified: f64,
    #[serde(default)]
    q_specified: f64,
}

/// Parse a grid-JSON file into a network plus diagnostics.
pub fn parse_grid_json(path: impl AsRef<Path>) -> Result<ImportResult> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_grid_json_str(&content)
}

/// Parse grid-JSON content into a network plus diagnostics.
pub fn parse_grid_json_str(content: &str) -> Result<ImportResult> {
    let parsed: GridJson =
        serde_json::from_str(content).context("parsing grid JSON envelope")?;

    let mut diagnostics = ImportDiagnostics::new();
    if let Some(kind) = &parsed.kind {
        if kind != "input" {
            diagnostics.add_warning("parse", &format!("dataset type is '{kind}', expected 'input'"));
        }
    }
    if parsed.version.is_none() {
        diagnostics.add_warning("parse", "dataset carries no version field");
    }

    let mut network = Network::new();
    let mut bus_indices = HashMap::with_capacity(parsed.data.node.len());

    for record in &parsed.data.node {
        let idx = network.graph.add_node(Node::Bus(Bus::new(
            BusId::new(record.id),
            Volts(record.u_rated),
        )));
        bus_indices.insert(record.id, idx);
        diagnostics.stats.buses += 1;
    }

    for record in &parsed.data.line {
        let (Some(&from), Some(&to)) = (
            bus_indices.get(&record.from_node),
            bus_indices.get(&record.to_node),
        ) else {
            diagnostics.add_error_with_entity(
                "reference",
                &format!(
                    "line endpoints ({}, {}) are not known buses",
                    record.from_node, record.to_node
                ),
                &format!("line {}", record.id),
            );
            diagnostics.stats.skipped += 1;
            continue;
        };
        network.graph.add_edge(
            from,
            to,
            Edge::Line(
                Line::new(
                    LineId::new(record.id),
                    BusId::new(record.from_node),
                    BusId::new(record.to_node),
                    record.r1,
                    record.x1,
                )
                .with_shunt(record.c1, record.tan1)
                .with_rating(record.i_n)
                .with_status(record.from_status != 0, record.to_status != 0),
            ),
        );
        diagnostics.stats.lines += 1;
    }

    for record in &parsed.data.source {
        if !bus_indices.contains_key(&record.node) {
            diagnostics.add_error_with_entity(
                "reference",
                &format!("bus {} is not known", record.node),
                &format!("source {}", record.id),
            );
            diagnostics.stats.skipped += 1;
            continue;
        }
        network.graph.add_node(Node::Source(Source {
            id: SourceId::new(record.id),
            bus: BusId::new(record.node),
            status: record.status != 0,
            u_ref: PerUnit(record.u_ref),
        }));
        diagnostics.stats.sources += 1;
    }

    for record in &parsed.data.sym_load {
        if !bus_indices.contains_key(&record.node) {
            diagnostics.add_error_with_entity(
                "reference",
                &format!("bus {} is not known", record.node),
                &format!("load {}", record.id),
            );
            diagnostics.stats.skipped += 1;
            continue;
        }
        network.graph.add_node(Node::Load(SymLoad {
            id: LoadId::new(record.id),
            bus: BusId::new(record.node),
            status: record.status != 0,
            p_specified: Watts(record.p_specified),
            q_specified: Vars(record.q_specified),
        }));
        diagnostics.stats.loads += 1;
    }

    validate_network(&network, &mut diagnostics);

    Ok(ImportResult {
        network,
        diagnostics,
    })
}
