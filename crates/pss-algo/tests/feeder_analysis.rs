//! End-to-end feeder analysis: grid JSON + parquet profiles in, summary
//! tables and an N-1 ranking out.

use polars::prelude::*;
use pss_algo::{
    line_summary, n1_scan_frame, voltage_summary, voltage_summary_frame, BatchPowerFlow,
    N1Scanner,
};
use pss_core::{BusId, LineId};
use pss_io::{load_network, read_frame, read_profile_pair, write_frame};

const RING_GRID: &str = r#"{
    "version": "1.0",
    "type": "input",
    "is_batch": false,
    "attributes": {},
    "data": {
        "node": [
            {"id": 1, "u_rated": 10500.0},
            {"id": 2, "u_rated": 10500.0},
            {"id": 3, "u_rated": 10500.0}
        ],
        "line": [
            {"id": 21, "from_node": 1, "to_node": 2, "from_status": 1, "to_status": 1,
             "r1": 0.5, "x1": 0.4, "c1": 1e-7, "tan1": 0.0, "i_n": 150.0},
            {"id": 22, "from_node": 2, "to_node": 3, "from_status": 1, "to_status": 1,
             "r1": 0.5, "x1": 0.4, "c1": 1e-7, "tan1": 0.0, "i_n": 150.0},
            {"id": 23, "from_node": 1, "to_node": 3, "from_status": 0, "to_status": 0,
             "r1": 0.5, "x1": 0.4, "c1": 1e-7, "tan1": 0.0, "i_n": 150.0}
        ],
        "source": [
            {"id": 16, "node": 1, "status": 1, "u_ref": 1.0}
        ],
        "sym_load": [
            {"id": 17, "node": 2, "status": 1, "type": 0,
             "p_specified": 0.4e6, "q_specified": 0.1e6},
            {"id": 18, "node": 3, "status": 1, "type": 0,
             "p_specified": 0.3e6, "q_specified": 0.05e6}
        ]
    }
}"#;

fn timestamps(hours: usize) -> Vec<String> {
    (0..hours)
        .map(|h| format!("2024-01-01 {h:02}:00:00"))
        .collect()
}

fn profile_frame(values_17: &[f64], values_18: &[f64]) -> DataFrame {
    DataFrame::new(vec![
        Series::new("timestamp", timestamps(values_17.len())),
        Series::new("17", values_17.to_vec()),
        Series::new("18", values_18.to_vec()),
    ])
    .unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    network: pss_core::Network,
    profiles: pss_core::ProfilePair,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();

    let grid_path = dir.path().join("input_network_data.json");
    std::fs::write(&grid_path, RING_GRID).unwrap();
    let network = load_network(&grid_path).unwrap();

    let active_path = dir.path().join("active_power_profile.parquet");
    let reactive_path = dir.path().join("reactive_power_profile.parquet");
    write_frame(
        &mut profile_frame(&[0.2e6, 0.6e6, 0.3e6], &[0.1e6, 0.4e6, 0.2e6]),
        &active_path,
    )
    .unwrap();
    write_frame(
        &mut profile_frame(&[0.04e6, 0.12e6, 0.06e6], &[0.02e6, 0.08e6, 0.04e6]),
        &reactive_path,
    )
    .unwrap();
    let profiles = read_profile_pair(&active_path, &reactive_path).unwrap();

    Fixture {
        _dir: dir,
        network,
        profiles,
    }
}

#[test]
fn imported_network_matches_dataset() {
    let fx = fixture();
    let stats = fx.network.stats();
    assert_eq!(stats.num_buses, 3);
    assert_eq!(stats.num_lines, 3);
    assert_eq!(stats.num_energized_lines, 2);
    assert_eq!(fx.network.slack_bus().unwrap(), BusId::new(1));
    assert_eq!(fx.profiles.num_steps(), 3);
}

#[test]
fn time_series_summaries() {
    let fx = fixture();
    let batch = BatchPowerFlow::new().run(&fx.network, &fx.profiles).unwrap();
    assert_eq!(batch.num_steps(), 3);
    assert!(batch.steps().iter().all(|s| s.converged));

    let voltages = voltage_summary(&batch);
    assert_eq!(voltages.len(), 3);
    for row in &voltages {
        // The source holds the head of the feeder at its setpoint; the far
        // end of the radial path dips the deepest.
        assert_eq!(row.max_u_pu_bus, BusId::new(1));
        assert_eq!(row.min_u_pu_bus, BusId::new(3));
        assert!(row.min_u_pu < row.max_u_pu);
        assert!(row.min_u_pu > 0.9);
    }

    let lines = line_summary(&batch);
    // Only the two energized lines carry flow records.
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].line, LineId::new(21));
    assert_eq!(lines[1].line, LineId::new(22));
    for row in &lines {
        assert!(row.total_loss_kwh > 0.0);
        assert!(row.max_loading >= row.min_loading);
        // Peak hour is 01:00 for every load.
        assert_eq!(
            row.max_loading_timestamp.format("%H:%M").to_string(),
            "01:00"
        );
    }
    // The head line feeds both loads and is the more loaded of the two.
    assert!(lines[0].max_loading > lines[1].max_loading);
}

#[test]
fn n1_scan_ranks_tie_line() {
    let fx = fixture();
    let scanner = N1Scanner::new(&fx.network, &fx.profiles);

    let rows = scanner.scan(LineId::new(21)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].alternative, LineId::new(23));
    assert!(rows[0].max_loading > 0.0);

    let df = n1_scan_frame(&rows).unwrap();
    assert_eq!(df.shape(), (1, 4));
    assert_eq!(
        df.column("alternative_line_id").unwrap().i64().unwrap().get(0),
        Some(23)
    );
}

#[test]
fn summary_tables_roundtrip_to_parquet() {
    let fx = fixture();
    let batch = BatchPowerFlow::new().run(&fx.network, &fx.profiles).unwrap();
    let mut df = voltage_summary_frame(&voltage_summary(&batch)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output_table_row_per_timestamp.parquet");
    write_frame(&mut df, &path).unwrap();

    let back = read_frame(&path).unwrap();
    assert_eq!(back.shape(), (3, 5));
    assert_eq!(
        back.get_column_names(),
        &[
            "timestamp",
            "max_u_pu",
            "max_u_pu_bus",
            "min_u_pu",
            "min_u_pu_bus"
        ]
    );
}
