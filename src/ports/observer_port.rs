//! Simulation observer port.
//!
//! The simulator reports what it does through this trait instead of
//! printing. Every hook defaults to a no-op.

use crate::domain::execution::SkipReason;
use crate::domain::position::Position;

pub trait SimulationObserver {
    fn position_opened(&mut self, _position: &Position) {}

    fn position_closed(&mut self, _position: &Position) {}

    /// A buy signal was dropped.
    fn entry_skipped(&mut self, _pair: &str, _time: i64, _reason: SkipReason) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SimulationObserver for NullObserver {}
