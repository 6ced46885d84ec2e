//! Input data validity checks.
//!
//! The grid format shares one id space across every component type and the
//! solvers assume a single-source feeder with sane line parameters. These
//! checks run after every import and can be applied to hand-built networks
//! before analysis via [`assert_valid`].

use std::collections::HashSet;

use pss_core::{Network, Node, PssError, PssResult};

use crate::diagnostics::ImportDiagnostics;

/// Validate a network into the given diagnostics.
///
/// Error-severity issues mean the dataset is unusable for power flow;
/// warnings flag unusual but workable data.
pub fn validate_network(network: &Network, diag: &mut ImportDiagnostics) {
    let mut seen_ids = HashSet::new();
    let mut duplicate = |id: usize, entity: &str, diag: &mut ImportDiagnostics| {
        if !seen_ids.insert(id) {
            diag.add_error_with_entity(
                "validation",
                &format!("id {id} is used by more than one component"),
                entity,
            );
        }
    };

    let mut bus_ids = HashSet::new();
    for node in network.graph.node_weights() {
        if let Node::Bus(bus) = node {
            duplicate(bus.id.value(), &format!("bus {}", bus.id.value()), diag);
            bus_ids.insert(bus.id.value());
            if bus.u_rated.value() <= 0.0 {
                diag.add_error_with_entity(
                    "validation",
                    &format!("rated voltage {} V is not positive", bus.u_rated.value()),
                    &format!("bus {}", bus.id.value()),
                );
            }
        }
    }

    if bus_ids.is_empty() {
        diag.add_error("validation", "network has no buses");
        return;
    }

    for node in network.graph.node_weights() {
        match node {
            Node::Bus(_) => {}
            Node::Source(source) => {
                duplicate(
                    source.id.value(),
                    &format!("source {}", source.id.value()),
                    diag,
                );
                if !bus_ids.contains(&source.bus.value()) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("bus {} is not known", source.bus.value()),
                        &format!("source {}", source.id.value()),
                    );
                }
            }
            Node::Load(load) => {
                duplicate(load.id.value(), &format!("load {}", load.id.value()), diag);
                if !bus_ids.contains(&load.bus.value()) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("bus {} is not known", load.bus.value()),
                        &format!("load {}", load.id.value()),
                    );
                }
            }
        }
    }

    for line in network.lines() {
        let entity = format!("line {}", line.id.value());
        duplicate(line.id.value(), &entity, diag);
        if !bus_ids.contains(&line.from_bus.value()) || !bus_ids.contains(&line.to_bus.value()) {
            diag.add_error_with_entity(
                "reference",
                &format!(
                    "line endpoints ({}, {}) are not known buses",
                    line.from_bus.value(),
                    line.to_bus.value()
                ),
                &entity,
            );
        }
        if line.from_bus == line.to_bus {
            diag.add_error_with_entity("validation", "line connects a bus to itself", &entity);
        }
        if line.r1 == 0.0 && line.x1 == 0.0 {
            diag.add_error_with_entity("validation", "series impedance is zero", &entity);
        }
        if line.i_n.value() <= 0.0 {
            diag.add_error_with_entity(
                "validation",
                &format!("rated current {} A is not positive", line.i_n.value()),
                &entity,
            );
        } else if line.i_n.value().is_infinite() {
            diag.add_warning(
                "validation",
                &format!("line {} has no current rating; loading stays 0", line.id.value()),
            );
        }
    }

    let in_service_sources = network.sources().iter().filter(|s| s.status).count();
    if in_service_sources != 1 {
        diag.add_error(
            "validation",
            &format!("network has {in_service_sources} in-service sources, expected exactly one"),
        );
    }
}

/// Hard-fail wrapper: run [`validate_network`] and turn any error-severity
/// issue into a [`PssError::Validation`].
pub fn assert_valid(network: &Network) -> PssResult<()> {
    let mut diag = ImportDiagnostics::new();
    validate_network(network, &mut diag);
    if diag.has_errors() {
        let messages: Vec<&str> = diag
            .issues
            .iter()
            .filter(|i| i.severity == crate::diagnostics::Severity::Error)
            .map(|i| i.message.as_str())
            .collect();
        return Err(PssError::Validation(messages.join("; ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pss_core::{Bus, BusId, Edge, Line, LineId, PerUnit, Source, SourceId, Volts};

    fn valid_network() -> Network {
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
    fn test_valid_network_passes() {
        assert!(assert_valid(&valid_network()).is_ok());
    }

    #[test]
    fn test_duplicate_id_across_types() {
        let mut network = valid_network();
        // A source reusing the bus id 2 violates the shared id space.
        network.graph.add_node(Node::Source(Source {
            id: SourceId::new(2),
            bus: BusId::new(1),
            status: false,
            u_ref: PerUnit(1.0),
        }));
        let err = assert_valid(&network).unwrap_err();
        assert!(err.to_string().contains("more than one component"));
    }

    #[test]
    fn test_zero_impedance_line() {
        let mut network = valid_network();
        let (b1, b2) = (
            network.bus_index(BusId::new(1)).unwrap(),
            network.bus_index(BusId::new(2)).unwrap(),
        );
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(
                Line::new(LineId::new(30), BusId::new(1), BusId::new(2), 0.0, 0.0)
                    .with_rating(100.0),
            ),
        );
        let err = assert_valid(&network).unwrap_err();
        assert!(err.to_string().contains("series impedance is zero"));
    }

    #[test]
    fn test_source_count_enforced() {
        let mut network = valid_network();
        network.graph.add_node(Node::Source(Source {
            id: SourceId::new(11),
            bus: BusId::new(2),
            status: true,
            u_ref: PerUnit(1.0),
        }));
        let err = assert_valid(&network).unwrap_err();
        assert!(err.to_string().contains("expected exactly one"));
    }

    #[test]
    fn test_missing_rating_is_a_warning() {
        let mut network = valid_network();
        let (b1, b2) = (
            network.bus_index(BusId::new(1)).unwrap(),
            network.bus_index(BusId::new(2)).unwrap(),
        );
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(
                Line::new(LineId::new(31), BusId::new(1), BusId::new(2), 0.1, 0.1)
                    .with_status(false, false),
            ),
        );
        let mut diag = ImportDiagnostics::new();
        validate_network(&network, &mut diag);
        assert!(!diag.has_errors());
        assert_eq!(diag.warning_count(), 1);
    }
}
