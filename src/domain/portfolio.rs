//! Portfolio ledger: budget, realized profit, fees, positions and the
//! per-timestamp series recorded during a run.

use std::collections::HashMap;

use super::position::Position;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub time: i64,
    pub value: f64,
}

/// Series keyed by timestamp. Points are appended in time order; writing to
/// the latest timestamp again updates that point instead of adding one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `time`, replacing the latest point if it has the
    /// same timestamp.
    pub fn set(&mut self, time: i64, value: f64) {
        match self.points.last_mut() {
            Some(last) if last.time == time => last.value = value,
            _ => self.points.push(SeriesPoint { time, value }),
        }
    }

    /// Add `delta` to the value at `time`, starting from zero.
    pub fn add(&mut self, time: i64, delta: f64) {
        match self.points.last_mut() {
            Some(last) if last.time == time => last.value += delta,
            _ => self.points.push(SeriesPoint { time, value: delta }),
        }
    }

    pub fn get(&self, time: i64) -> Option<f64> {
        self.points
            .binary_search_by_key(&time, |p| p.time)
            .ok()
            .map(|i| self.points[i].value)
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub starting_capital: f64,
    /// Capital not committed to an open position.
    pub budget: f64,
    /// Starting capital plus every closed position's profit. Sizing basis.
    pub realized_profit: f64,
    pub total_fee_paid: f64,
    /// Open positions keyed by pair; at most one per pair.
    pub positions: HashMap<String, Position>,
    /// Closed positions in close order.
    pub closed_positions: Vec<Position>,
    pub budget_series: TimeSeries,
    pub open_valuation_series: TimeSeries,
    /// Open positions valued at each candle's low (never above the close
    /// valuation). Entries count at their allocation.
    pub open_low_series: TimeSeries,
    /// Open positions valued at each candle's open. Entries count at their
    /// allocation.
    pub open_high_series: TimeSeries,
    pub capital_series: TimeSeries,
    pub realized_profit_series: TimeSeries,
}

impl Portfolio {
    pub fn new(starting_capital: f64) -> Self {
        Portfolio {
            starting_capital,
            budget: starting_capital,
            realized_profit: starting_capital,
            total_fee_paid: 0.0,
            positions: HashMap::new(),
            closed_positions: Vec::new(),
            budget_series: TimeSeries::new(),
            open_valuation_series: TimeSeries::new(),
            open_low_series: TimeSeries::new(),
            open_high_series: TimeSeries::new(),
            capital_series: TimeSeries::new(),
            realized_profit_series: TimeSeries::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.pair.clone(), position);
    }

    pub fn get_position(&self, pair: &str) -> Option<&Position> {
        self.positions.get(pair)
    }

    pub fn get_position_mut(&mut self, pair: &str) -> Option<&mut Position> {
        self.positions.get_mut(pair)
    }

    pub fn has_position(&self, pair: &str) -> bool {
        self.positions.contains_key(pair)
    }

    pub fn remove_position(&mut self, pair: &str) -> Option<Position> {
        self.positions.remove(pair)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_closed(&mut self, position: Position) {
        self.closed_positions.push(position);
    }

    /// Capital currently tied up in open positions, entry fees included.
    pub fn committed_capital(&self) -> f64 {
        self.positions.values().map(|p| p.allocated_capital).sum()
    }

    /// Entry fees of the positions still open.
    pub fn open_entry_fees(&self) -> f64 {
        self.positions.values().map(|p| p.entry_fee).sum()
    }

    /// Count a position's valuation towards the open total at `time`.
    pub fn add_open_valuation(&mut self, time: i64, valuation: f64) {
        self.open_valuation_series.add(time, valuation);
    }

    /// Count a position's intra-candle low and high valuations at `time`.
    pub fn add_open_range(&mut self, time: i64, low: f64, high: f64) {
        self.open_low_series.add(time, low);
        self.open_high_series.add(time, high);
    }

    /// Record budget and aggregate capital for `time`.
    pub fn record_tick(&mut self, time: i64) {
        self.open_valuation_series.add(time, 0.0);
        self.open_low_series.add(time, 0.0);
        self.open_high_series.add(time, 0.0);
        let open = self.open_valuation_series.get(time).unwrap_or(0.0);
        self.budget_series.set(time, self.budget);
        self.capital_series.set(time, self.budget + open);
    }

    pub fn record_realized(&mut self, time: i64) {
        self.realized_profit_series.set(time, self.realized_profit);
    }

    /// Open positions ordered by entry time, then pair.
    pub fn open_positions_sorted(&self) -> Vec<Position> {
        let mut open: Vec<Position> = self.positions.values().cloned().collect();
        open.sort_by(|a, b| {
            a.opened_at
                .cmp(&b.opened_at)
                .then_with(|| a.pair.cmp(&b.pair))
        });
        open
    }
}
