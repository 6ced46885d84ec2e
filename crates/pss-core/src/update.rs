//! Batched network mutations.
//!
//! Time-series and contingency analysis repeatedly adjust the same model:
//! switch a line in or out, overwrite load setpoints for the next timestamp.
//! An [`UpdateSet`] collects such changes so they can be applied in one call
//! to [`Network::apply_update`](crate::Network::apply_update) and validated
//! against the model by id.

use crate::{LineId, LoadId, Vars, Watts};

/// Switch-state change for one line. Both ends are set together; a line
/// conducts only when closed at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStatusUpdate {
    pub line: LineId,
    pub from_status: bool,
    pub to_status: bool,
}

/// Setpoint change for one load. `None` leaves the current value untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadUpdate {
    pub load: LoadId,
    pub p_specified: Option<Watts>,
    pub q_specified: Option<Vars>,
}

/// A batch of line and load changes.
#[derive(Debug, Clone, Default)]
pub struct UpdateSet {
    pub lines: Vec<LineStatusUpdate>,
    pub loads: Vec<LoadUpdate>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close (`true`) or open (`false`) a line at both ends.
    pub fn switch_line(mut self, line: LineId, closed: bool) -> Self {
        self.lines.push(LineStatusUpdate {
            line,
            from_status: closed,
            to_status: closed,
        });
        self
    }

    /// Overwrite both setpoints of a load.
    pub fn set_load(mut self, load: LoadId, p: Watts, q: Vars) -> Self {
        self.loads.push(LoadUpdate {
            load,
            p_specified: Some(p),
            q_specified: Some(q),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.loads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let update = UpdateSet::new()
            .switch_line(LineId::new(3), false)
            .set_load(LoadId::new(7), Watts(1.0), Vars(0.5));
        assert_eq!(update.lines.len(), 1);
        assert_eq!(update.loads.len(), 1);
        assert!(!update.is_empty());
        assert!(!update.lines[0].from_status);
        assert!(!update.lines[0].to_status);
    }

    #[test]
    fn test_empty() {
        assert!(UpdateSet::new().is_empty());
    }
}
