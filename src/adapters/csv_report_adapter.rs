//! CSV report writer.
//!
//! Writes `trades.csv` (closed positions in close order, then positions
//! still open) and `series.csv` (one row per timestamp) into the output
//! directory.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SimError;
use crate::domain::metrics::{format_time, TradingStats};
use crate::domain::position::Position;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

pub const TRADES_FILE: &str = "trades.csv";
pub const SERIES_FILE: &str = "series.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

fn csv_err(e: csv::Error) -> SimError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => SimError::Io(io),
        other => SimError::Data {
            reason: format!("CSV write error: {:?}", other),
        },
    }
}

fn opt_num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_time(value: Option<i64>) -> String {
    value.map(|t| t.to_string()).unwrap_or_default()
}

fn trade_row(position: &Position) -> Vec<String> {
    vec![
        position.pair.clone(),
        format!("{:?}", position.status),
        position.close_reason.to_string(),
        position.opened_at.to_string(),
        position.closed_at.map(|t| t.to_string()).unwrap_or_default(),
        position.entry_price.to_string(),
        opt_num(position.exit_price),
        position.allocated_capital.to_string(),
        position.currency_amount.to_string(),
        position.valuation.to_string(),
        position.profit_ratio.to_string(),
        position.profit_dollar.to_string(),
        position.max_seen_drawdown().to_string(),
        position.entry_fee.to_string(),
        position.exit_fee.to_string(),
        position.stoploss.kind().to_string(),
    ]
}

impl CsvReportAdapter {
    fn write_trades(&self, result: &BacktestResult, path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
        wtr.write_record([
            "pair",
            "status",
            "close_reason",
            "opened_at",
            "closed_at",
            "entry_price",
            "exit_price",
            "allocated_capital",
            "currency_amount",
            "valuation",
            "profit_ratio",
            "profit_dollar",
            "max_seen_drawdown",
            "entry_fee",
            "exit_fee",
            "stoploss",
        ])
        .map_err(csv_err)?;
        for position in result.closed_positions.iter().chain(&result.open_positions) {
            wtr.write_record(trade_row(position)).map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_series(&self, result: &BacktestResult, path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
        wtr.write_record([
            "time",
            "date",
            "budget",
            "open_valuation",
            "open_low",
            "open_high",
            "capital",
            "realized_profit",
        ])
        .map_err(csv_err)?;

        let mut realized = result.starting_capital;
        for point in result.capital_series.points() {
            if let Some(value) = result.realized_profit_series.get(point.time) {
                realized = value;
            }
            wtr.write_record([
                point.time.to_string(),
                format_time(point.time),
                opt_num(result.budget_series.get(point.time)),
                opt_num(result.open_valuation_series.get(point.time)),
                opt_num(result.open_low_series.get(point.time)),
                opt_num(result.open_high_series.get(point.time)),
                point.value.to_string(),
                realized.to_string(),
            ])
            .map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_summary(&self, stats: &TradingStats, path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
        wtr.write_record(["metric", "value"]).map_err(csv_err)?;

        let mut rows: Vec<(String, String)> = vec![
            ("starting_capital".into(), stats.starting_capital.to_string()),
            ("end_capital".into(), stats.end_capital.to_string()),
            ("overall_profit_pct".into(), stats.overall_profit_pct.to_string()),
            ("closed_trades".into(), stats.closed_trades.to_string()),
            ("trades_left_open".into(), stats.trades_left_open.to_string()),
            ("trades_with_loss".into(), stats.trades_with_loss.to_string()),
            ("longest_losing_streak".into(), stats.longest_losing_streak.to_string()),
            ("max_realized_drawdown".into(), stats.max_realized_drawdown.to_string()),
            ("max_seen_drawdown".into(), stats.max_seen_drawdown.to_string()),
            (
                "drawdown_from".into(),
                opt_time(stats.drawdown_span.map(|s| s.from)),
            ),
            ("drawdown_at".into(), opt_time(stats.drawdown_span.map(|s| s.at))),
            (
                "drawdown_to".into(),
                opt_time(stats.drawdown_span.and_then(|s| s.to)),
            ),
            ("win_weeks".into(), stats.weeks.win.to_string()),
            ("draw_weeks".into(), stats.weeks.draw.to_string()),
            ("loss_weeks".into(), stats.weeks.loss.to_string()),
            ("market_change".into(), stats.market_change.to_string()),
            ("market_drawdown".into(), stats.market_drawdown.to_string()),
            ("total_fee_paid".into(), stats.total_fee_paid.to_string()),
        ];
        if let Some(benchmark) = &stats.benchmark {
            rows.push(("benchmark".into(), benchmark.pair.clone()));
            rows.push(("benchmark_change".into(), benchmark.change.to_string()));
            rows.push(("benchmark_drawdown".into(), benchmark.drawdown.to_string()));
        }
        for (reason, count) in &stats.close_reasons {
            rows.push((format!("closed_by {reason}"), count.to_string()));
        }
        for (metric, value) in rows {
            wtr.write_record([metric, value]).map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        stats: &TradingStats,
        output: &Path,
    ) -> Result<(), SimError> {
        fs::create_dir_all(output)?;
        self.write_trades(result, &output.join(TRADES_FILE))?;
        self.write_series(result, &output.join(SERIES_FILE))?;
        self.write_summary(stats, &output.join(SUMMARY_FILE))?;
        Ok(())
    }
}
