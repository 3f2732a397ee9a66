//! Candle data access port.

use crate::domain::candle::Candle;
use crate::domain::error::SimError;

/// Optional inclusive time window, epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataWindow {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl DataWindow {
    pub fn contains(&self, time: i64) -> bool {
        self.start.is_none_or(|s| time >= s) && self.end.is_none_or(|e| time <= e)
    }
}

pub trait DataPort {
    /// Candles for `pair` inside `window`, sorted by time, with signals.
    fn fetch_candles(&self, pair: &str, window: DataWindow) -> Result<Vec<Candle>, SimError>;

    fn list_pairs(&self) -> Result<Vec<String>, SimError>;
}
