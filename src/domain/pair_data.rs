//! Per-pair candle storage, stream preconditions and the global tick order.

use crate::domain::candle::Candle;
use crate::domain::error::SimError;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct PairData {
    pub pair: String,
    pub candles: Vec<Candle>,
}

impl PairData {
    pub fn new(pair: String, candles: Vec<Candle>) -> Self {
        Self { pair, candles }
    }

    pub fn candle_count(&self) -> usize {
        self.candles.len()
    }

    /// Close prices, NaN for missing candles.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Last close over first close, ignoring missing candles.
    pub fn market_change(&self) -> Option<f64> {
        let mut present = self.candles.iter().filter(|c| !c.is_missing());
        let first = present.next()?.close;
        let last = present.last().map(|c| c.close).unwrap_or(first);
        Some(last / first)
    }
}

/// One unit of simulation work: a candle plus the pair's candles from it
/// onwards.
#[derive(Debug, Clone, Copy)]
pub struct Tick<'a> {
    pub candle: &'a Candle,
    pub forward: &'a [Candle],
}

/// Check the stream preconditions for a run.
///
/// Each pair must be non-empty, carry only its own candles, be strictly
/// increasing in time and, when `interval_ms` is given, spaced exactly one
/// interval apart. All pairs must cover the same timestamps.
pub fn validate_pairs(pairs: &[PairData], interval_ms: Option<i64>) -> Result<(), SimError> {
    for pd in pairs {
        if pd.candles.is_empty() {
            return Err(SimError::NoData {
                pair: pd.pair.clone(),
            });
        }
        if let Some(stray) = pd.candles.iter().find(|c| c.pair != pd.pair) {
            return Err(SimError::Data {
                reason: format!(
                    "candle for {} at {} found in {} series",
                    stray.pair, stray.time, pd.pair
                ),
            });
        }
        if let Some(bad) = pd
            .candles
            .iter()
            .find(|c| !c.is_missing() && !c.has_valid_prices())
        {
            return Err(SimError::Data {
                reason: format!(
                    "{} at {}: prices must be positive, got open {} high {} low {} close {}",
                    bad.pair, bad.time, bad.open, bad.high, bad.low, bad.close
                ),
            });
        }
        for (i, window) in pd.candles.windows(2).enumerate() {
            let step = window[1].time - window[0].time;
            if step <= 0 {
                return Err(SimError::NonMonotonic {
                    pair: pd.pair.clone(),
                    index: i + 1,
                });
            }
            if let Some(interval) = interval_ms {
                if step != interval {
                    return Err(SimError::MisalignedData {
                        pair: pd.pair.clone(),
                        reason: format!(
                            "gap of {step} ms at row {}, expected {interval} ms",
                            i + 1
                        ),
                    });
                }
            }
        }
    }

    let Some(reference) = pairs.first() else {
        return Ok(());
    };
    for pd in &pairs[1..] {
        if pd.candles.len() != reference.candles.len() {
            return Err(SimError::MisalignedData {
                pair: pd.pair.clone(),
                reason: format!(
                    "{} candles, {} has {}",
                    pd.candles.len(),
                    reference.pair,
                    reference.candles.len()
                ),
            });
        }
        let same_times = pd
            .candles
            .iter()
            .zip(&reference.candles)
            .all(|(a, b)| a.time == b.time);
        if !same_times {
            return Err(SimError::MisalignedData {
                pair: pd.pair.clone(),
                reason: format!("timestamps differ from {}", reference.pair),
            });
        }
    }

    Ok(())
}

pub fn build_timeline(pairs: &[PairData]) -> Vec<i64> {
    let unique: BTreeSet<i64> = pairs
        .iter()
        .flat_map(|pd| pd.candles.iter().map(|c| c.time))
        .collect();
    unique.into_iter().collect()
}

/// Every candle of every pair in processing order: by time, then by pair.
pub fn ticks(pairs: &[PairData]) -> Vec<Tick<'_>> {
    let mut order: Vec<(i64, &str, usize, usize)> = pairs
        .iter()
        .enumerate()
        .flat_map(|(p, pd)| {
            pd.candles
                .iter()
                .enumerate()
                .map(move |(i, c)| (c.time, pd.pair.as_str(), p, i))
        })
        .collect();
    order.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    order
        .into_iter()
        .map(|(_, _, p, i)| Tick {
            candle: &pairs[p].candles[i],
            forward: &pairs[p].candles[i..],
        })
        .collect()
}
