//! Topological analysis of switchable distribution grids.

pub mod radial;

pub use radial::{TopologyError, TopologyProcessor};
