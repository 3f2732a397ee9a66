//! Trade execution against the portfolio ledger.
//!
//! Sizes and opens positions, decides exits in precedence order and books
//! the result of a close into budget, realized profit and the fee ledger.

use std::fmt;

use super::candle::Candle;
use super::portfolio::Portfolio;
use super::position::{CloseReason, Position};
use super::roi::RoiSchedule;
use super::stoploss::StoplossConfig;

/// Per-run execution parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    pub max_open_trades: usize,
    pub tradable_pairs: usize,
    /// Fraction, e.g. `0.0025`.
    pub fee_rate: f64,
    pub stoploss: StoplossConfig,
}

impl ExecutionConfig {
    /// Number of equal slices realized profit is divided into.
    pub fn slot_divisor(&self) -> usize {
        self.max_open_trades.min(self.tradable_pairs).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoBudget,
    NoFreeSlot,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoBudget => f.write_str("no budget left"),
            SkipReason::NoFreeSlot => f.write_str("all trade slots in use"),
        }
    }
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered { allocation: f64, fee: f64 },
    Skipped(SkipReason),
}

/// Capital a new position would receive: an equal share of realized
/// profit, never more than the remaining budget.
pub fn allocation(portfolio: &Portfolio, config: &ExecutionConfig) -> f64 {
    let share = portfolio.realized_profit / config.slot_divisor() as f64;
    share.min(portfolio.budget)
}

/// Open a position on `candle`'s pair at its close.
///
/// The whole allocation leaves the budget; the entry fee taken out of it is
/// booked in the fee ledger.
pub fn open_position(
    portfolio: &mut Portfolio,
    candle: &Candle,
    forward: &[Candle],
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.position_count() >= config.max_open_trades {
        return EntryResult::Skipped(SkipReason::NoFreeSlot);
    }
    if portfolio.budget <= 0.0 {
        return EntryResult::Skipped(SkipReason::NoBudget);
    }
    let allocated = allocation(portfolio, config);
    if allocated <= 0.0 {
        return EntryResult::Skipped(SkipReason::NoBudget);
    }

    let position = Position::open(candle, forward, allocated, config.fee_rate, &config.stoploss);
    let fee = position.entry_fee;

    portfolio.budget -= allocated;
    portfolio.total_fee_paid += fee;
    portfolio.add_position(position);

    EntryResult::Entered {
        allocation: allocated,
        fee,
    }
}

/// Exit decision for an open position on `candle`, with its fill price.
///
/// Stoploss and ROI are evaluated independently. Both firing on the same
/// candle voids the trade; otherwise stoploss beats ROI, and ROI beats the
/// sell signal, which fills at the close.
pub fn check_exit(
    position: &Position,
    candle: &Candle,
    roi: &RoiSchedule,
) -> Option<(CloseReason, f64)> {
    let stoploss = position.stoploss_exit(candle);
    let roi_price = position.roi_exit(candle, roi);

    match (stoploss, roi_price) {
        (Some(_), Some(price)) => Some((CloseReason::StoplossAndRoi, price)),
        (Some(price), None) => Some((CloseReason::Stoploss, price)),
        (None, Some(price)) => Some((CloseReason::Roi, price)),
        (None, None) if candle.sell => Some((CloseReason::SellSignal, candle.close)),
        (None, None) => None,
    }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub reason: CloseReason,
    pub exit_price: f64,
    /// Capital returned to the budget.
    pub returned: f64,
    pub exit_fee: f64,
    pub profit_dollar: f64,
}

/// Close the open position on `pair` and book it.
///
/// A void close refunds the entry fee; any other close pays the exit fee.
/// Returns `None` if the pair has no open position.
pub fn close_position(
    portfolio: &mut Portfolio,
    pair: &str,
    reason: CloseReason,
    time: i64,
    exit_price: f64,
) -> Option<ExitResult> {
    let mut position = portfolio.remove_position(pair)?;
    position.close(reason, time, exit_price);

    if reason.is_void() {
        portfolio.total_fee_paid -= position.entry_fee;
    } else {
        portfolio.total_fee_paid += position.exit_fee;
    }
    portfolio.budget += position.valuation;
    portfolio.realized_profit += position.profit_dollar;
    portfolio.record_realized(time);

    let result = ExitResult {
        reason,
        exit_price,
        returned: position.valuation,
        exit_fee: position.exit_fee,
        profit_dollar: position.profit_dollar,
    };
    portfolio.record_closed(position);
    Some(result)
}
