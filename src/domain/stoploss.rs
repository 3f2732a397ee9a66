//! Stoploss strategies, resolved once when a position opens.
//!
//! Standard stoplosses are a fixed ratio checked on every tick. Trailing and
//! dynamic stoplosses need the pair's future candles: they are resolved at
//! open time by a forward scan into the exact tick (if any) where they fire.

use std::fmt;
use std::str::FromStr;

use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoplossKind {
    Standard,
    Trailing,
    Dynamic,
}

impl fmt::Display for StoplossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoplossKind::Standard => "standard",
            StoplossKind::Trailing => "trailing",
            StoplossKind::Dynamic => "dynamic",
        };
        f.write_str(s)
    }
}

impl FromStr for StoplossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(StoplossKind::Standard),
            "trailing" => Ok(StoplossKind::Trailing),
            "dynamic" => Ok(StoplossKind::Dynamic),
            other => Err(format!(
                "unknown stoploss type '{other}', expected standard, trailing or dynamic"
            )),
        }
    }
}

/// Stoploss settings shared by every position of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoplossConfig {
    pub kind: StoplossKind,
    /// Percent below entry, e.g. `10.0`. The sign is ignored.
    pub percent: f64,
}

impl StoplossConfig {
    fn fraction(&self) -> f64 {
        self.percent.abs() / 100.0
    }

    /// Fixed exit ratio of the standard stoploss.
    pub fn standard_ratio(&self) -> f64 {
        1.0 - self.fraction()
    }
}

/// Capital figures the stoploss ratios are expressed against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    pub currency_amount: f64,
    pub allocated_capital: f64,
}

impl Exposure {
    /// Valuation of the position at `price`, relative to its allocation.
    pub fn ratio_at(&self, price: f64) -> f64 {
        price * self.currency_amount / self.allocated_capital
    }

    /// Price at which the position is worth `ratio` of its allocation.
    pub fn price_at(&self, ratio: f64) -> f64 {
        ratio * self.allocated_capital / self.currency_amount
    }
}

/// A precomputed stoploss exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoplossExit {
    pub time: i64,
    pub ratio: f64,
}

/// A stoploss resolved for one position.
#[derive(Debug, Clone, PartialEq)]
pub enum Stoploss {
    Standard { ratio: f64 },
    Trailing { exit: Option<StoplossExit> },
    Dynamic { exit: Option<StoplossExit> },
}

impl Stoploss {
    /// Resolve the stoploss for a position opened on `entry`.
    ///
    /// `forward` is the pair's candle sequence from the entry onwards; only
    /// candles strictly after the entry are scanned. A dynamic stoploss
    /// with no supplied prices anywhere in the window falls back to the
    /// standard one.
    pub fn resolve(
        config: &StoplossConfig,
        entry: &Candle,
        forward: &[Candle],
        exposure: Exposure,
    ) -> Self {
        match config.kind {
            StoplossKind::Standard => Stoploss::Standard {
                ratio: config.standard_ratio(),
            },
            StoplossKind::Trailing => Stoploss::Trailing {
                exit: trailing_scan(config.percent, entry.time, forward, exposure)
                    .find(TrailStep::is_hit)
                    .map(|step| StoplossExit {
                        time: step.time,
                        ratio: step.trail_ratio,
                    }),
            },
            StoplossKind::Dynamic => {
                let supplied = entry.stoploss_price().is_some()
                    || forward.iter().any(|c| c.stoploss_price().is_some());
                if supplied {
                    Stoploss::Dynamic {
                        exit: dynamic_exit(entry.time, forward, exposure),
                    }
                } else {
                    Stoploss::Standard {
                        ratio: config.standard_ratio(),
                    }
                }
            }
        }
    }

    /// The strategy that ended up in effect after any fallback.
    pub fn kind(&self) -> StoplossKind {
        match self {
            Stoploss::Standard { .. } => StoplossKind::Standard,
            Stoploss::Trailing { .. } => StoplossKind::Trailing,
            Stoploss::Dynamic { .. } => StoplossKind::Dynamic,
        }
    }

    /// Exit price if the stoploss fires on `candle`.
    pub fn check(&self, candle: &Candle, exposure: Exposure) -> Option<f64> {
        match self {
            Stoploss::Standard { ratio } => {
                if exposure.ratio_at(candle.low) <= *ratio {
                    Some(exposure.price_at(*ratio))
                } else {
                    None
                }
            }
            Stoploss::Trailing { exit } | Stoploss::Dynamic { exit } => exit
                .as_ref()
                .filter(|e| e.time == candle.time)
                .map(|e| exposure.price_at(e.ratio)),
        }
    }
}

/// One step of a trailing stoploss simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailStep {
    pub time: i64,
    /// Trail ratio after this candle's high was taken into account.
    pub trail_ratio: f64,
    pub low_ratio: f64,
}

impl TrailStep {
    pub fn is_hit(&self) -> bool {
        self.low_ratio <= self.trail_ratio
    }
}

/// Lazily walks the candles after `entry_time`, ratcheting the trail ratio.
#[derive(Debug, Clone)]
pub struct TrailingScan<'a> {
    candles: std::slice::Iter<'a, Candle>,
    entry_time: i64,
    fraction: f64,
    exposure: Exposure,
    trail_ratio: f64,
}

impl Iterator for TrailingScan<'_> {
    type Item = TrailStep;

    fn next(&mut self) -> Option<TrailStep> {
        for candle in self.candles.by_ref() {
            if candle.time <= self.entry_time || candle.is_missing() {
                continue;
            }
            let high_ratio = self.exposure.ratio_at(candle.high) * (1.0 - self.fraction);
            if high_ratio > self.trail_ratio {
                self.trail_ratio = high_ratio;
            }
            let low_ratio = self.exposure.ratio_at(candle.low) * self.fraction;
            return Some(TrailStep {
                time: candle.time,
                trail_ratio: self.trail_ratio,
                low_ratio,
            });
        }
        None
    }
}

pub fn trailing_scan(
    percent: f64,
    entry_time: i64,
    forward: &[Candle],
    exposure: Exposure,
) -> TrailingScan<'_> {
    let fraction = percent.abs() / 100.0;
    TrailingScan {
        candles: forward.iter(),
        entry_time,
        fraction,
        exposure,
        trail_ratio: 1.0 - fraction,
    }
}

/// First candle after `entry_time` whose low touches its supplied stoploss.
/// The fill is at the stoploss price, or at the open on a gap down.
pub fn dynamic_exit(entry_time: i64, forward: &[Candle], exposure: Exposure) -> Option<StoplossExit> {
    forward
        .iter()
        .filter(|c| c.time > entry_time && !c.is_missing())
        .find_map(|c| {
            let stop = c.stoploss_price()?;
            if c.low <= stop {
                Some(StoplossExit {
                    time: c.time,
                    ratio: exposure.ratio_at(stop.min(c.open)),
                })
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candle(time: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            pair: "BTC/USDT".into(),
            time,
            open,
            high,
            low,
            close,
            volume: 1.0,
            buy: false,
            sell: false,
            stoploss: None,
        }
    }

    fn with_stop(mut c: Candle, stop: f64) -> Candle {
        c.stoploss = Some(stop);
        c
    }

    // Entry at 100 without fees: one unit held for 100 of capital.
    fn flat_exposure() -> Exposure {
        Exposure {
            currency_amount: 1.0,
            allocated_capital: 100.0,
        }
    }

    fn config(kind: StoplossKind, percent: f64) -> StoplossConfig {
        StoplossConfig { kind, percent }
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Trailing".parse::<StoplossKind>(), Ok(StoplossKind::Trailing));
        assert_eq!(" dynamic ".parse::<StoplossKind>(), Ok(StoplossKind::Dynamic));
        assert!("fixed".parse::<StoplossKind>().is_err());
    }

    #[test]
    fn kind_display_round_trips() {
        for kind in [StoplossKind::Standard, StoplossKind::Trailing, StoplossKind::Dynamic] {
            assert_eq!(kind.to_string().parse::<StoplossKind>(), Ok(kind));
        }
    }

    #[test]
    fn standard_ratio_ignores_sign() {
        assert_relative_eq!(config(StoplossKind::Standard, 10.0).standard_ratio(), 0.9);
        assert_relative_eq!(config(StoplossKind::Standard, -10.0).standard_ratio(), 0.9);
    }

    #[test]
    fn standard_triggers_below_ratio_and_fills_at_ratio() {
        let entry = candle(0, 100.0, 100.0, 100.0, 100.0);
        let sl = Stoploss::resolve(
            &config(StoplossKind::Standard, 10.0),
            &entry,
            &[],
            flat_exposure(),
        );
        assert_eq!(sl, Stoploss::Standard { ratio: 0.9 });

        let dip = candle(1, 95.0, 96.0, 89.0, 94.0);
        let price = sl.check(&dip, flat_exposure()).unwrap();
        assert_relative_eq!(price, 90.0);

        let shallow = candle(2, 95.0, 96.0, 91.0, 94.0);
        assert!(sl.check(&shallow, flat_exposure()).is_none());
    }

    #[test]
    fn trailing_ratio_ratchets_up() {
        let forward = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 100.0, 120.0, 100.0, 110.0),
            candle(2, 110.0, 105.0, 100.0, 100.0),
        ];
        let steps: Vec<TrailStep> =
            trailing_scan(10.0, 0, &forward, flat_exposure()).collect();
        assert_eq!(steps.len(), 2);
        assert_relative_eq!(steps[0].trail_ratio, 1.08);
        // A lower high does not pull the trail back down.
        assert_relative_eq!(steps[1].trail_ratio, 1.08);
    }

    #[test]
    fn trailing_scan_skips_entry_and_earlier() {
        let forward = vec![
            candle(5, 100.0, 500.0, 100.0, 100.0),
            candle(6, 100.0, 100.0, 100.0, 100.0),
        ];
        let steps: Vec<TrailStep> =
            trailing_scan(10.0, 5, &forward, flat_exposure()).collect();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].time, 6);
        assert_relative_eq!(steps[0].trail_ratio, 0.9);
    }

    #[test]
    fn trailing_fires_on_first_hit() {
        let entry = candle(0, 100.0, 100.0, 100.0, 100.0);
        // low ratio = low * 0.1 / 100; hits once low <= 900 under a 0.9 trail.
        let forward = vec![entry.clone(), candle(1, 100.0, 100.0, 95.0, 98.0)];
        let sl = Stoploss::resolve(
            &config(StoplossKind::Trailing, 10.0),
            &entry,
            &forward,
            flat_exposure(),
        );
        let exit = match sl {
            Stoploss::Trailing { exit } => exit.unwrap(),
            other => panic!("expected trailing, got {other:?}"),
        };
        assert_eq!(exit.time, 1);
        assert_relative_eq!(exit.ratio, 0.9);

        let price = sl.check(&forward[1], flat_exposure()).unwrap();
        assert_relative_eq!(price, 90.0);
        assert!(sl.check(&forward[0], flat_exposure()).is_none());
    }

    #[test]
    fn trailing_without_hit_never_fires() {
        let entry = candle(0, 100.0, 100.0, 100.0, 100.0);
        // With a 60% trail the low ratio (0.6) stays above the trail (0.4).
        let forward = vec![
            entry.clone(),
            candle(1, 100.0, 100.0, 100.0, 100.0),
            candle(2, 100.0, 100.0, 100.0, 100.0),
        ];
        let steps: Vec<TrailStep> =
            trailing_scan(60.0, 0, &forward, flat_exposure()).collect();
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| !s.is_hit()));

        let sl = Stoploss::resolve(
            &config(StoplossKind::Trailing, 60.0),
            &entry,
            &forward,
            flat_exposure(),
        );
        assert_eq!(sl, Stoploss::Trailing { exit: None });
        assert!(sl.check(&forward[1], flat_exposure()).is_none());
    }

    #[test]
    fn dynamic_fills_at_stop_price() {
        let entry = with_stop(candle(0, 100.0, 100.0, 100.0, 100.0), 90.0);
        let forward = vec![
            entry.clone(),
            with_stop(candle(1, 100.0, 101.0, 95.0, 97.0), 90.0),
            with_stop(candle(2, 97.0, 98.0, 88.0, 89.0), 92.0),
        ];
        let sl = Stoploss::resolve(
            &config(StoplossKind::Dynamic, 10.0),
            &entry,
            &forward,
            flat_exposure(),
        );
        assert_eq!(sl.kind(), StoplossKind::Dynamic);
        assert!(sl.check(&forward[1], flat_exposure()).is_none());
        let price = sl.check(&forward[2], flat_exposure()).unwrap();
        assert_relative_eq!(price, 92.0);
    }

    #[test]
    fn dynamic_gap_down_fills_at_open() {
        let entry = with_stop(candle(0, 100.0, 100.0, 100.0, 100.0), 90.0);
        let forward = vec![entry.clone(), with_stop(candle(1, 80.0, 82.0, 78.0, 79.0), 90.0)];
        let exit = dynamic_exit(0, &forward, flat_exposure()).unwrap();
        assert_eq!(exit.time, 1);
        assert_relative_eq!(flat_exposure().price_at(exit.ratio), 80.0);
    }

    #[test]
    fn dynamic_skips_candles_without_price() {
        let entry = with_stop(candle(0, 100.0, 100.0, 100.0, 100.0), 90.0);
        let forward = vec![
            entry.clone(),
            candle(1, 100.0, 100.0, 50.0, 60.0),
            with_stop(candle(2, 60.0, 61.0, 55.0, 58.0), 57.0),
        ];
        let exit = dynamic_exit(0, &forward, flat_exposure()).unwrap();
        assert_eq!(exit.time, 2);
    }

    #[test]
    fn dynamic_without_prices_falls_back_to_standard() {
        let entry = candle(0, 100.0, 100.0, 100.0, 100.0);
        let forward = vec![entry.clone(), candle(1, 100.0, 100.0, 80.0, 85.0)];
        let sl = Stoploss::resolve(
            &config(StoplossKind::Dynamic, 10.0),
            &entry,
            &forward,
            flat_exposure(),
        );
        assert_eq!(sl, Stoploss::Standard { ratio: 0.9 });
        assert_relative_eq!(sl.check(&forward[1], flat_exposure()).unwrap(), 90.0);
    }

    #[test]
    fn exposure_round_trip() {
        let e = Exposure {
            currency_amount: 0.5,
            allocated_capital: 200.0,
        };
        assert_relative_eq!(e.ratio_at(400.0), 1.0);
        assert_relative_eq!(e.price_at(0.9), 360.0);
    }
}
