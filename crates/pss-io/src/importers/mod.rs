//! Network importers.

pub mod grid_json;

pub use grid_json::{parse_grid_json, parse_grid_json_str};
