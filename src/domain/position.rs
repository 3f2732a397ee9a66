//! Position state machine: entry, per-tick revaluation, exit checks and
//! close accounting.

use std::fmt;

use super::candle::Candle;
use super::drawdown::RunningDrawdown;
use super::roi::{elapsed_minutes, RoiSchedule};
use super::stoploss::{Exposure, Stoploss, StoplossConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    SellSignal,
    Stoploss,
    Roi,
    StoplossAndRoi,
    None,
}

impl CloseReason {
    pub const ALL: [CloseReason; 5] = [
        CloseReason::SellSignal,
        CloseReason::Stoploss,
        CloseReason::Roi,
        CloseReason::StoplossAndRoi,
        CloseReason::None,
    ];

    /// Both exits fired on the same candle; the trade has no economic effect.
    pub fn is_void(&self) -> bool {
        matches!(self, CloseReason::StoplossAndRoi)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::SellSignal => "Sell Signal",
            CloseReason::Stoploss => "Stoploss",
            CloseReason::Roi => "ROI",
            CloseReason::StoplossAndRoi => "Stoploss and ROI",
            CloseReason::None => "None",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub pair: String,
    pub opened_at: i64,
    pub entry_price: f64,
    /// Capital taken from the budget, entry fee included.
    pub allocated_capital: f64,
    pub fee_rate: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    /// Units held; fixed at open.
    pub currency_amount: f64,
    /// Market value while open; capital returned to the budget once closed.
    pub valuation: f64,
    pub profit_ratio: f64,
    pub profit_dollar: f64,
    pub drawdown: RunningDrawdown,
    pub stoploss: Stoploss,
    pub status: PositionStatus,
    pub close_reason: CloseReason,
    pub closed_at: Option<i64>,
    pub exit_price: Option<f64>,
}

impl Position {
    /// Open a position at the close of `entry`.
    ///
    /// `forward` is the pair's candle sequence from `entry` onwards and is
    /// only read to resolve trailing/dynamic stoplosses.
    pub fn open(
        entry: &Candle,
        forward: &[Candle],
        allocated_capital: f64,
        fee_rate: f64,
        stoploss: &StoplossConfig,
    ) -> Self {
        let entry_fee = allocated_capital * fee_rate;
        let currency_amount = (allocated_capital - entry_fee) / entry.close;
        let exposure = Exposure {
            currency_amount,
            allocated_capital,
        };

        let mut position = Position {
            pair: entry.pair.clone(),
            opened_at: entry.time,
            entry_price: entry.close,
            allocated_capital,
            fee_rate,
            entry_fee,
            exit_fee: 0.0,
            currency_amount,
            valuation: allocated_capital,
            profit_ratio: 1.0,
            profit_dollar: 0.0,
            drawdown: RunningDrawdown::new(allocated_capital),
            stoploss: Stoploss::resolve(stoploss, entry, forward, exposure),
            status: PositionStatus::Open,
            close_reason: CloseReason::None,
            closed_at: None,
            exit_price: None,
        };
        position.revalue(currency_amount * entry.close);
        position
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn exposure(&self) -> Exposure {
        Exposure {
            currency_amount: self.currency_amount,
            allocated_capital: self.allocated_capital,
        }
    }

    pub fn max_seen_drawdown(&self) -> f64 {
        self.drawdown.max_seen_ratio
    }

    fn revalue(&mut self, valuation: f64) {
        self.valuation = valuation;
        self.profit_ratio = valuation / self.allocated_capital;
        self.profit_dollar = valuation - self.allocated_capital;
    }

    /// Mark to the candle close and advance the running drawdown.
    pub fn update(&mut self, candle: &Candle) {
        if !self.is_open() {
            return;
        }
        self.revalue(self.currency_amount * candle.close);
        self.drawdown.update(self.valuation);
    }

    /// Lowest and highest valuation seen on `candle`: the low, capped by
    /// the close valuation, and the open.
    pub fn valuation_range(&self, candle: &Candle) -> (f64, f64) {
        let low = (candle.low * self.currency_amount).min(self.valuation);
        let high = candle.open * self.currency_amount;
        (low, high)
    }

    /// Exit price if the stoploss fires on `candle`.
    pub fn stoploss_exit(&self, candle: &Candle) -> Option<f64> {
        self.stoploss.check(candle, self.exposure())
    }

    /// Exit price if the ROI schedule is reached on `candle`.
    pub fn roi_exit(&self, candle: &Candle, roi: &RoiSchedule) -> Option<f64> {
        roi.exit_price(
            self.entry_price,
            candle.high,
            elapsed_minutes(self.opened_at, candle.time),
        )
    }

    /// Close the position at `exit_price`.
    ///
    /// A void close restores the starting allocation and charges no exit
    /// fee. Closing an already closed position does nothing.
    pub fn close(&mut self, reason: CloseReason, time: i64, exit_price: f64) {
        if !self.is_open() {
            return;
        }
        self.status = PositionStatus::Closed;
        self.close_reason = reason;
        self.closed_at = Some(time);
        self.exit_price = Some(exit_price);

        if reason.is_void() {
            self.exit_fee = 0.0;
            self.revalue(self.allocated_capital);
            self.drawdown.reset();
        } else {
            let gross = self.currency_amount * exit_price;
            self.exit_fee = gross * self.fee_rate;
            self.revalue(gross - self.exit_fee);
        }
    }

    /// Milliseconds between open and close, if closed.
    pub fn duration_ms(&self) -> Option<i64> {
        self.closed_at.map(|closed| closed - self.opened_at)
    }
}
