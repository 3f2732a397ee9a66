//! Run statistics computed from a finished backtest.

use chrono::{DateTime, TimeDelta};

use super::backtest::{BacktestResult, SimulationConfig};
use super::drawdown::{max_drawdown_ratio, max_drawdown_span, DrawdownSpan};
use super::pair_data::PairData;
use super::portfolio::SeriesPoint;
use super::position::{CloseReason, Position};

const WEEK_MS: i64 = 7 * 86_400_000;

/// Weeks whose closing capital rose, held or fell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekTally {
    pub win: usize,
    pub draw: usize,
    pub loss: usize,
}

/// Tally 7-day buckets anchored at the first point. Each bucket's last
/// value is compared with the previous bucket's, the first bucket with
/// `opening`. Buckets without points are skipped.
pub fn weekly_results(points: &[SeriesPoint], opening: f64) -> WeekTally {
    let Some(start) = points.first().map(|p| p.time) else {
        return WeekTally::default();
    };
    let week = |p: &SeriesPoint| (p.time - start).div_euclid(WEEK_MS);

    let mut tally = WeekTally::default();
    let mut previous = opening;
    for bucket in points.chunk_by(|a, b| week(a) == week(b)) {
        let Some(close) = bucket.last().map(|p| p.value) else {
            continue;
        };
        if close > previous {
            tally.win += 1;
        } else if close < previous {
            tally.loss += 1;
        } else {
            tally.draw += 1;
        }
        previous = close;
    }
    tally
}

/// Reference pair figures over the tested window.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkStats {
    pub pair: String,
    /// Last close / first close.
    pub change: f64,
    pub drawdown: f64,
}

impl BenchmarkStats {
    pub fn compute(data: &PairData) -> Option<Self> {
        Some(BenchmarkStats {
            pair: data.pair.clone(),
            change: data.market_change()?,
            drawdown: max_drawdown_ratio(&data.closes()),
        })
    }
}

/// A single trade singled out in the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeExtreme {
    pub pair: String,
    pub profit_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingStats {
    pub tested_from: Option<i64>,
    pub tested_to: Option<i64>,
    pub starting_capital: f64,
    pub end_capital: f64,
    pub overall_profit_pct: f64,
    pub closed_trades: usize,
    pub avg_trades_per_pair: f64,
    pub trades_left_open: usize,
    pub trades_with_loss: usize,
    pub longest_losing_streak: usize,
    pub worst_trade: Option<TradeExtreme>,
    pub best_trade: Option<TradeExtreme>,
    pub avg_trade_duration: Option<TimeDelta>,
    pub longest_trade_duration: Option<TimeDelta>,
    pub shortest_trade_duration: Option<TimeDelta>,
    /// Worst drawdown ratio of the realized profit curve.
    pub max_realized_drawdown: f64,
    /// Worst drawdown ratio of the aggregate capital curve, starting
    /// capital included.
    pub max_seen_drawdown: f64,
    /// Peak, trough and recovery times of `max_seen_drawdown`.
    pub drawdown_span: Option<DrawdownSpan>,
    pub weeks: WeekTally,
    /// Mean over pairs of last close / first close.
    pub market_change: f64,
    /// Mean over pairs of the close price drawdown ratio.
    pub market_drawdown: f64,
    pub benchmark: Option<BenchmarkStats>,
    pub close_reasons: Vec<(CloseReason, usize)>,
    pub total_fee_paid: f64,
}

/// Profit of a closed position in percent of its allocation.
pub fn profit_pct(position: &Position) -> f64 {
    (position.profit_ratio - 1.0) * 100.0
}

impl TradingStats {
    pub fn compute(
        result: &BacktestResult,
        config: &SimulationConfig,
        pairs: &[PairData],
        benchmark: Option<&PairData>,
    ) -> Self {
        let closed = &result.closed_positions;
        let starting_capital = result.starting_capital;
        let end_capital = result.final_capital();

        let overall_profit_pct = if starting_capital > 0.0 {
            (end_capital / starting_capital - 1.0) * 100.0
        } else {
            0.0
        };

        let avg_trades_per_pair = if config.pairs.is_empty() {
            0.0
        } else {
            closed.len() as f64 / config.pairs.len() as f64
        };

        let mut trades_with_loss = 0usize;
        let mut streak = 0usize;
        let mut longest_losing_streak = 0usize;
        for position in closed {
            if position.profit_dollar < 0.0 {
                trades_with_loss += 1;
                streak += 1;
                longest_losing_streak = longest_losing_streak.max(streak);
            } else {
                streak = 0;
            }
        }

        let extreme = |best: bool| {
            closed
                .iter()
                .map(|p| (p, profit_pct(p)))
                .reduce(|a, b| {
                    let better = if best { b.1 > a.1 } else { b.1 < a.1 };
                    if better { b } else { a }
                })
                .map(|(p, pct)| TradeExtreme {
                    pair: p.pair.clone(),
                    profit_pct: pct,
                })
        };

        let durations: Vec<i64> = closed.iter().filter_map(Position::duration_ms).collect();
        let avg_trade_duration = if durations.is_empty() {
            None
        } else {
            let total: i64 = durations.iter().sum();
            Some(TimeDelta::milliseconds(total / durations.len() as i64))
        };

        let mut realized = vec![starting_capital];
        realized.extend(result.realized_profit_series.values());

        let capital = result.capital_series.points();
        let mut seen: Vec<(i64, f64)> = capital
            .first()
            .map(|p| (p.time, starting_capital))
            .into_iter()
            .collect();
        seen.extend(capital.iter().map(|p| (p.time, p.value)));
        let seen_values: Vec<f64> = seen.iter().map(|(_, v)| *v).collect();

        let close_reasons = CloseReason::ALL
            .iter()
            .map(|reason| {
                let count = closed.iter().filter(|p| p.close_reason == *reason).count();
                (*reason, count)
            })
            .collect();

        TradingStats {
            tested_from: result.capital_series.first().map(|p| p.time),
            tested_to: result.capital_series.last().map(|p| p.time),
            starting_capital,
            end_capital,
            overall_profit_pct,
            closed_trades: closed.len(),
            avg_trades_per_pair,
            trades_left_open: result.open_positions.len(),
            trades_with_loss,
            longest_losing_streak,
            worst_trade: extreme(false),
            best_trade: extreme(true),
            avg_trade_duration,
            longest_trade_duration: durations.iter().max().map(|ms| TimeDelta::milliseconds(*ms)),
            shortest_trade_duration: durations.iter().min().map(|ms| TimeDelta::milliseconds(*ms)),
            max_realized_drawdown: max_drawdown_ratio(&realized),
            max_seen_drawdown: max_drawdown_ratio(&seen_values),
            drawdown_span: max_drawdown_span(&seen),
            weeks: weekly_results(capital, starting_capital),
            market_change: mean(pairs.iter().filter_map(PairData::market_change)),
            market_drawdown: mean(pairs.iter().map(|pd| max_drawdown_ratio(&pd.closes()))),
            benchmark: benchmark.and_then(BenchmarkStats::compute),
            close_reasons,
            total_fee_paid: result.total_fee_paid,
        }
    }
}

/// Per-pair trade summary.
#[derive(Debug, Clone, PartialEq)]
pub struct PairStats {
    pub pair: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub cumulative_profit_pct: f64,
    pub total_profit: f64,
    pub avg_duration: Option<TimeDelta>,
}

impl PairStats {
    /// One entry per pair in `pairs` order, including pairs without trades.
    pub fn compute_per_pair(closed: &[Position], pairs: &[String]) -> Vec<PairStats> {
        pairs
            .iter()
            .map(|pair| {
                let trades: Vec<&Position> = closed.iter().filter(|p| &p.pair == pair).collect();
                let durations: Vec<i64> =
                    trades.iter().filter_map(|p| p.duration_ms()).collect();
                let avg_duration = if durations.is_empty() {
                    None
                } else {
                    let total: i64 = durations.iter().sum();
                    Some(TimeDelta::milliseconds(total / durations.len() as i64))
                };

                PairStats {
                    pair: pair.clone(),
                    trades: trades.len(),
                    wins: trades.iter().filter(|p| p.profit_dollar > 0.0).count(),
                    losses: trades.iter().filter(|p| p.profit_dollar < 0.0).count(),
                    cumulative_profit_pct: trades.iter().map(|p| profit_pct(p)).sum(),
                    total_profit: trades.iter().map(|p| p.profit_dollar).sum(),
                    avg_duration,
                }
            })
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC for an epoch-millisecond timestamp.
pub fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// `[Nd ]HH:MM:SS`.
pub fn format_duration(duration: TimeDelta) -> String {
    let days = duration.num_days();
    let secs = duration.num_seconds() - days * 86_400;
    let clock = format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60);
    if days != 0 {
        format!("{days}d {clock}")
    } else {
        clock
    }
}
