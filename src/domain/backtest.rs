//! Tick-driven simulation loop.
//!
//! [`Backtest`] consumes candles one at a time in global time order and
//! drives every position through its lifecycle. [`run_backtest`] checks
//! the input streams and feeds them through a fresh [`Backtest`].

use super::candle::Candle;
use super::error::SimError;
use super::execution::{self, EntryResult, ExecutionConfig};
use super::pair_data::{ticks, validate_pairs, PairData};
use super::portfolio::{Portfolio, TimeSeries};
use super::position::Position;
use super::roi::RoiSchedule;
use super::stoploss::StoplossConfig;
use crate::ports::observer_port::SimulationObserver;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub starting_capital: f64,
    pub max_open_trades: usize,
    /// Fraction, e.g. `0.0025`.
    pub fee_rate: f64,
    pub stoploss: StoplossConfig,
    pub roi: RoiSchedule,
    pub pairs: Vec<String>,
    /// Candle spacing; `None` skips the spacing check.
    pub interval_ms: Option<i64>,
}

impl SimulationConfig {
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            max_open_trades: self.max_open_trades,
            tradable_pairs: self.pairs.len(),
            fee_rate: self.fee_rate,
            stoploss: self.stoploss,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub starting_capital: f64,
    /// In close order.
    pub closed_positions: Vec<Position>,
    /// Still open at the end of the data, by entry time.
    pub open_positions: Vec<Position>,
    pub budget_series: TimeSeries,
    pub open_valuation_series: TimeSeries,
    pub open_low_series: TimeSeries,
    pub open_high_series: TimeSeries,
    pub capital_series: TimeSeries,
    pub realized_profit_series: TimeSeries,
    pub total_fee_paid: f64,
    pub budget: f64,
    pub realized_profit: f64,
}

impl BacktestResult {
    /// Aggregate capital at the last tick.
    pub fn final_capital(&self) -> f64 {
        self.capital_series
            .last()
            .map(|p| p.value)
            .unwrap_or(self.starting_capital)
    }
}

pub struct Backtest<'a> {
    config: &'a SimulationConfig,
    execution: ExecutionConfig,
    portfolio: Portfolio,
    observer: &'a mut dyn SimulationObserver,
}

impl<'a> Backtest<'a> {
    pub fn new(config: &'a SimulationConfig, observer: &'a mut dyn SimulationObserver) -> Self {
        Backtest {
            config,
            execution: config.execution(),
            portfolio: Portfolio::new(config.starting_capital),
            observer,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Process one candle. `forward` is the candle's pair from this candle
    /// onwards.
    pub fn tick(&mut self, candle: &Candle, forward: &[Candle]) {
        if candle.is_missing() {
            if let Some(valuation) = self
                .portfolio
                .get_position(&candle.pair)
                .map(|p| p.valuation)
            {
                self.portfolio.add_open_valuation(candle.time, valuation);
                self.portfolio
                    .add_open_range(candle.time, valuation, valuation);
            }
        } else if let Some(position) = self.portfolio.get_position_mut(&candle.pair) {
            position.update(candle);
            let valuation = position.valuation;
            let (low, high) = position.valuation_range(candle);
            match execution::check_exit(position, candle, &self.config.roi) {
                Some((reason, price)) => {
                    execution::close_position(
                        &mut self.portfolio,
                        &candle.pair,
                        reason,
                        candle.time,
                        price,
                    );
                    if let Some(closed) = self.portfolio.closed_positions.last() {
                        self.observer.position_closed(closed);
                    }
                }
                None => {
                    self.portfolio.add_open_valuation(candle.time, valuation);
                    self.portfolio.add_open_range(candle.time, low, high);
                }
            }
        } else if candle.buy {
            match execution::open_position(&mut self.portfolio, candle, forward, &self.execution)
            {
                EntryResult::Entered { .. } => {
                    if let Some(opened) = self.portfolio.get_position(&candle.pair) {
                        self.observer.position_opened(opened);
                        let (valuation, allocated) = (opened.valuation, opened.allocated_capital);
                        self.portfolio.add_open_valuation(candle.time, valuation);
                        self.portfolio
                            .add_open_range(candle.time, allocated, allocated);
                    }
                }
                EntryResult::Skipped(reason) => {
                    self.observer
                        .entry_skipped(&candle.pair, candle.time, reason);
                }
            }
        }

        self.portfolio.record_tick(candle.time);
    }

    pub fn finish(self) -> BacktestResult {
        let open_positions = self.portfolio.open_positions_sorted();
        let p = self.portfolio;
        BacktestResult {
            starting_capital: p.starting_capital,
            closed_positions: p.closed_positions,
            open_positions,
            budget_series: p.budget_series,
            open_valuation_series: p.open_valuation_series,
            open_low_series: p.open_low_series,
            open_high_series: p.open_high_series,
            capital_series: p.capital_series,
            realized_profit_series: p.realized_profit_series,
            total_fee_paid: p.total_fee_paid,
            budget: p.budget,
            realized_profit: p.realized_profit,
        }
    }
}

/// Run a full simulation over `pairs`.
///
/// Every configured pair must have data and no unconfigured pair may be
/// present. The streams are checked for alignment before any tick runs.
pub fn run_backtest(
    pairs: &[PairData],
    config: &SimulationConfig,
    observer: &mut dyn SimulationObserver,
) -> Result<BacktestResult, SimError> {
    for pair in &config.pairs {
        if !pairs.iter().any(|pd| &pd.pair == pair) {
            return Err(SimError::NoData { pair: pair.clone() });
        }
    }
    if let Some(extra) = pairs.iter().find(|pd| !config.pairs.contains(&pd.pair)) {
        return Err(SimError::Data {
            reason: format!("candles supplied for unconfigured pair {}", extra.pair),
        });
    }
    validate_pairs(pairs, config.interval_ms)?;

    let mut backtest = Backtest::new(config, observer);
    for tick in ticks(pairs) {
        backtest.tick(tick.candle, tick.forward);
    }
    Ok(backtest.finish())
}
