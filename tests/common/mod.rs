#![allow(dead_code)]

use candlesim::domain::backtest::SimulationConfig;
pub use candlesim::domain::candle::Candle;
use candlesim::domain::error::SimError;
use candlesim::domain::pair_data::PairData;
use candlesim::domain::roi::RoiSchedule;
use candlesim::domain::stoploss::{StoplossConfig, StoplossKind};
use candlesim::ports::data_port::{DataPort, DataWindow};
use std::collections::HashMap;

pub const MINUTE: i64 = 60_000;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, pair: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(pair.to_string(), candles);
        self
    }

    pub fn with_error(mut self, pair: &str, reason: &str) -> Self {
        self.errors.insert(pair.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(&self, pair: &str, window: DataWindow) -> Result<Vec<Candle>, SimError> {
        if let Some(reason) = self.errors.get(pair) {
            return Err(SimError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(pair)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| window.contains(c.time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_pairs(&self) -> Result<Vec<String>, SimError> {
        let mut pairs: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }
}

/// Candle at minute `minute` with explicit high/low/close; open equals close.
pub fn make_candle(pair: &str, minute: i64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        pair: pair.to_string(),
        time: minute * MINUTE,
        open: close,
        high,
        low,
        close,
        volume: 1000.0,
        buy: false,
        sell: false,
        stoploss: None,
    }
}

/// Flat candle: high, low and close all at `close`.
pub fn flat(pair: &str, minute: i64, close: f64) -> Candle {
    make_candle(pair, minute, close, close, close)
}

pub fn buy(mut candle: Candle) -> Candle {
    candle.buy = true;
    candle
}

pub fn sell(mut candle: Candle) -> Candle {
    candle.sell = true;
    candle
}

pub fn with_stop(mut candle: Candle, price: f64) -> Candle {
    candle.stoploss = Some(price);
    candle
}

/// Candles from a list of closes, one per minute, no signals.
pub fn generate_candles(pair: &str, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| flat(pair, i as i64, c))
        .collect()
}

pub fn make_pair(pair: &str, candles: Vec<Candle>) -> PairData {
    PairData::new(pair.to_string(), candles)
}

pub fn sample_config(pairs: &[&str]) -> SimulationConfig {
    SimulationConfig {
        starting_capital: 1000.0,
        max_open_trades: pairs.len().max(1),
        fee_rate: 0.0,
        stoploss: StoplossConfig {
            kind: StoplossKind::Standard,
            percent: 10.0,
        },
        roi: RoiSchedule::new([(0, 100.0)]).unwrap(),
        pairs: pairs.iter().map(|p| p.to_string()).collect(),
        interval_ms: Some(MINUTE),
    }
}

pub fn roi(entries: &[(u64, f64)]) -> RoiSchedule {
    RoiSchedule::new(entries.iter().copied()).unwrap()
}

pub fn stoploss(kind: StoplossKind, percent: f64) -> StoplossConfig {
    StoplossConfig { kind, percent }
}
