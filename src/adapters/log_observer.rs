//! Observer that forwards simulation events to the `log` facade.

use crate::domain::execution::SkipReason;
use crate::domain::metrics::format_time;
use crate::domain::position::Position;
use crate::ports::observer_port::SimulationObserver;
use log::{debug, log, Level};

#[derive(Debug, Default)]
pub struct LogObserver {
    pub opened: usize,
    pub closed: usize,
    pub skipped: usize,
}

fn skip_level(reason: SkipReason) -> Level {
    match reason {
        SkipReason::NoBudget => Level::Info,
        SkipReason::NoFreeSlot => Level::Debug,
    }
}

impl SimulationObserver for LogObserver {
    fn position_opened(&mut self, position: &Position) {
        self.opened += 1;
        debug!(
            "SIM: Opened {} at {} price {:.8} with {:.2} ({} stoploss)",
            position.pair,
            format_time(position.opened_at),
            position.entry_price,
            position.allocated_capital,
            position.stoploss.kind()
        );
    }

    fn position_closed(&mut self, position: &Position) {
        self.closed += 1;
        debug!(
            "SIM: Closed {} at {} price {:.8}, reason {}, profit {:.2}",
            position.pair,
            position.closed_at.map(format_time).unwrap_or_default(),
            position.exit_price.unwrap_or(f64::NAN),
            position.close_reason,
            position.profit_dollar
        );
    }

    /// `NoBudget` logs at info, `NoFreeSlot` at debug.
    fn entry_skipped(&mut self, pair: &str, time: i64, reason: SkipReason) {
        self.skipped += 1;
        let level = skip_level(reason);
        log!(
            level,
            "SIM: Skipped buy signal for {} at {}: {}",
            pair,
            format_time(time),
            reason
        );
    }
}
