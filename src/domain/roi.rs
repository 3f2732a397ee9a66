//! Time-decayed ROI exit schedule.

use std::collections::BTreeMap;

use super::error::SimError;

/// Required return per elapsed-minutes threshold.
///
/// Thresholds are integers so they order numerically; a threshold of `0`
/// is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiSchedule {
    thresholds: BTreeMap<u64, f64>,
}

impl RoiSchedule {
    pub fn new<I>(entries: I) -> Result<Self, SimError>
    where
        I: IntoIterator<Item = (u64, f64)>,
    {
        let thresholds: BTreeMap<u64, f64> = entries.into_iter().collect();
        if !thresholds.contains_key(&0) {
            return Err(SimError::missing("roi", "0"));
        }
        if let Some((minutes, _)) = thresholds.iter().find(|(_, pct)| !pct.is_finite()) {
            return Err(SimError::invalid(
                "roi",
                &minutes.to_string(),
                "roi percentage must be a finite number",
            ));
        }
        Ok(RoiSchedule { thresholds })
    }

    /// Required percent return after `elapsed_minutes`: the value of the
    /// greatest threshold not exceeding the elapsed time.
    pub fn required_percent(&self, elapsed_minutes: f64) -> f64 {
        self.thresholds
            .iter()
            .take_while(|(minutes, _)| **minutes as f64 <= elapsed_minutes)
            .last()
            .or_else(|| self.thresholds.iter().next())
            .map(|(_, pct)| *pct)
            .unwrap_or(0.0)
    }

    /// Exit price if a candle with `high` reaches the ROI boundary, else `None`.
    ///
    /// The fill is modeled exactly at the boundary, never at the extreme.
    pub fn exit_price(&self, entry_price: f64, high: f64, elapsed_minutes: f64) -> Option<f64> {
        let required = self.required_percent(elapsed_minutes);
        let profit_pct = (high / entry_price - 1.0) * 100.0;
        if profit_pct > required {
            Some(entry_price * (1.0 + required / 100.0))
        } else {
            None
        }
    }

    /// Thresholds in ascending minutes.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.thresholds.iter().map(|(m, p)| (*m, *p))
    }
}

/// Minutes elapsed between two epoch-millisecond timestamps.
pub fn elapsed_minutes(from_ms: i64, to_ms: i64) -> f64 {
    (to_ms - from_ms) as f64 / 60_000.0
}
