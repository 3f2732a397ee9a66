//! Candle record with strategy signals attached.

/// One OHLCV interval for a pair, together with the signals the strategy
/// produced for it.
///
/// `time` is epoch milliseconds. A candle whose close is NaN marks a gap
/// that was filled upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub pair: String,
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub buy: bool,
    pub sell: bool,
    /// Strategy-supplied stoploss price, used by the dynamic stoploss.
    pub stoploss: Option<f64>,
}

impl Candle {
    /// A missing-data marker for `pair` at `time`.
    pub fn missing(pair: &str, time: i64) -> Self {
        Candle {
            pair: pair.to_string(),
            time,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
            buy: false,
            sell: false,
            stoploss: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.close.is_nan()
    }

    /// Open, high, low and close are all finite and positive.
    pub fn has_valid_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }

    /// Stoploss price if the strategy supplied a usable one for this candle.
    pub fn stoploss_price(&self) -> Option<f64> {
        self.stoploss.filter(|p| p.is_finite())
    }
}
