//! Drawdown primitives.
//!
//! Two distinct measures live here. [`max_drawdown_ratio`] is a single
//! global pass over a finished series and is used for benchmarks and
//! portfolio curves. [`RunningDrawdown`] is the leg-based streaming tracker
//! a position updates tick by tick.

/// Worst peak-to-trough ratio over an ordered, positive-valued series.
///
/// For each point `ratio = 1 + (value - running_max) / running_max`; the
/// minimum over the series is returned. An empty series yields `1.0`.
/// NaN points (missing data) are skipped.
pub fn max_drawdown_ratio(values: &[f64]) -> f64 {
    let mut running_max = f64::NEG_INFINITY;
    let mut worst = 1.0_f64;

    for &value in values.iter().filter(|v| !v.is_nan()) {
        if value > running_max {
            running_max = value;
        }
        let ratio = 1.0 + (value - running_max) / running_max;
        if ratio < worst {
            worst = ratio;
        }
    }

    worst
}

/// Where the worst drawdown of a timed series happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownSpan {
    pub ratio: f64,
    /// Time of the peak the decline started from.
    pub from: i64,
    /// Time of the trough.
    pub at: i64,
    /// First time after the trough the peak value was reached again.
    pub to: Option<i64>,
}

/// Worst drawdown of `(time, value)` points, same ratio as
/// [`max_drawdown_ratio`]. `None` when the series never declines.
pub fn max_drawdown_span(points: &[(i64, f64)]) -> Option<DrawdownSpan> {
    let mut peak: Option<(i64, f64)> = None;
    let mut worst: Option<(f64, i64, i64, f64)> = None;

    for &(time, value) in points.iter().filter(|(_, v)| !v.is_nan()) {
        let (peak_time, peak_value) = match peak {
            Some(p) if p.1 >= value => p,
            _ => {
                peak = Some((time, value));
                continue;
            }
        };
        let ratio = 1.0 + (value - peak_value) / peak_value;
        if worst.is_none_or(|(r, ..)| ratio < r) {
            worst = Some((ratio, peak_time, time, peak_value));
        }
    }

    let (ratio, from, at, peak_value) = worst.filter(|(r, ..)| *r < 1.0)?;
    let to = points
        .iter()
        .find(|(t, v)| *t > at && *v >= peak_value)
        .map(|(t, _)| *t);
    Some(DrawdownSpan { ratio, from, at, to })
}

/// Streaming max-adverse-excursion tracker.
///
/// A drawdown leg starts at a peak and ends when a new peak is set. The
/// worst `trough / peak` over all legs is kept in `max_seen_ratio`; the
/// still-open final leg is accounted for as soon as a new trough appears.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningDrawdown {
    pub peak: f64,
    pub trough: f64,
    pub max_seen_ratio: f64,
}

impl RunningDrawdown {
    pub fn new(starting_value: f64) -> Self {
        RunningDrawdown {
            peak: starting_value,
            trough: starting_value,
            max_seen_ratio: 1.0,
        }
    }

    pub fn update(&mut self, value: f64) {
        if value > self.peak {
            self.close_leg();
            self.peak = value;
            self.trough = value;
        } else if value < self.trough {
            self.trough = value;
            self.close_leg();
        }
    }

    fn close_leg(&mut self) {
        let ratio = self.trough / self.peak;
        if ratio < self.max_seen_ratio {
            self.max_seen_ratio = ratio;
        }
    }

    pub fn reset(&mut self) {
        self.max_seen_ratio = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn peak_then_dip() {
        assert_relative_eq!(max_drawdown_ratio(&[100.0, 150.0, 120.0]), 0.8);
    }

    #[test]
    fn strictly_increasing_series() {
        assert_relative_eq!(max_drawdown_ratio(&[1.0, 2.0, 3.0, 4.0]), 1.0);
    }

    #[test]
    fn empty_series() {
        assert_relative_eq!(max_drawdown_ratio(&[]), 1.0);
    }

    #[test]
    fn worst_of_several_dips() {
        // 100 -> 90 (0.9), 200 -> 120 (0.6), 210 -> 200
        let series = [100.0, 90.0, 200.0, 120.0, 210.0, 200.0];
        assert_relative_eq!(max_drawdown_ratio(&series), 0.6);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let series = [10.0, 12.0, 7.0, 15.0, 3.0];
        let first = max_drawdown_ratio(&series);
        let second = max_drawdown_ratio(&series);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn nan_points_skipped() {
        let series = [100.0, f64::NAN, 150.0, 120.0];
        assert_relative_eq!(max_drawdown_ratio(&series), 0.8);
    }

    #[test]
    fn span_locates_peak_trough_and_recovery() {
        let points = [(0, 100.0), (1, 150.0), (2, 120.0), (3, 90.0), (4, 140.0), (5, 160.0)];
        let span = max_drawdown_span(&points).unwrap();
        assert_relative_eq!(span.ratio, 0.6, epsilon = 1e-12);
        assert_eq!(span.from, 1);
        assert_eq!(span.at, 3);
        assert_eq!(span.to, Some(5));
    }

    #[test]
    fn span_without_recovery() {
        let points = [(0, 100.0), (1, 80.0), (2, 90.0)];
        let span = max_drawdown_span(&points).unwrap();
        assert_relative_eq!(span.ratio, 0.8, epsilon = 1e-12);
        assert_eq!((span.from, span.at, span.to), (0, 1, None));
    }

    #[test]
    fn span_none_for_rising_series() {
        assert!(max_drawdown_span(&[(0, 1.0), (1, 1.0), (2, 3.0)]).is_none());
        assert!(max_drawdown_span(&[]).is_none());
    }

    #[test]
    fn span_ratio_matches_global_measure() {
        let values = [10.0, 12.0, 7.0, 15.0, 3.0, 4.0];
        let points: Vec<(i64, f64)> = values.iter().enumerate().map(|(i, v)| (i as i64, *v)).collect();
        let span = max_drawdown_span(&points).unwrap();
        assert_relative_eq!(span.ratio, max_drawdown_ratio(&values));
        assert_eq!((span.from, span.at), (3, 4));
    }

    #[test]
    fn running_starts_flat() {
        let dd = RunningDrawdown::new(100.0);
        assert_relative_eq!(dd.peak, 100.0);
        assert_relative_eq!(dd.trough, 100.0);
        assert_relative_eq!(dd.max_seen_ratio, 1.0);
    }

    #[test]
    fn running_open_leg_counts_immediately() {
        let mut dd = RunningDrawdown::new(100.0);
        dd.update(80.0);
        assert_relative_eq!(dd.max_seen_ratio, 0.8);
        dd.update(90.0);
        assert_relative_eq!(dd.max_seen_ratio, 0.8);
    }

    #[test]
    fn running_new_peak_starts_new_leg() {
        let mut dd = RunningDrawdown::new(100.0);
        dd.update(90.0);
        dd.update(200.0);
        assert_relative_eq!(dd.peak, 200.0);
        assert_relative_eq!(dd.trough, 200.0);
        dd.update(150.0);
        assert_relative_eq!(dd.max_seen_ratio, 0.75);
    }

    #[test]
    fn running_differs_from_global_on_recovery() {
        // Global measure sees 150 -> 120; the streaming tracker only
        // measures from the first valuation it was seeded with.
        let mut dd = RunningDrawdown::new(100.0);
        for v in [150.0, 120.0] {
            dd.update(v);
        }
        assert_relative_eq!(dd.max_seen_ratio, 0.8);

        let mut seeded = RunningDrawdown::new(200.0);
        for v in [150.0, 120.0] {
            seeded.update(v);
        }
        assert_relative_eq!(seeded.max_seen_ratio, 0.6);
        assert_relative_eq!(max_drawdown_ratio(&[150.0, 120.0]), 0.8);
    }

    #[test]
    fn running_reset() {
        let mut dd = RunningDrawdown::new(100.0);
        dd.update(50.0);
        dd.reset();
        assert_relative_eq!(dd.max_seen_ratio, 1.0);
    }
}
