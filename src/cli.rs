//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_observer::LogObserver;
use crate::domain::backtest::{run_backtest, BacktestResult, SimulationConfig};
use crate::domain::config_validation::{
    benchmark_pair, build_simulation_config, data_dir, data_window,
};
use crate::domain::error::SimError;
use crate::domain::metrics::{format_duration, format_time, PairStats, TradingStats};
use crate::domain::pair_data::{build_timeline, validate_pairs, PairData};
use crate::domain::universe::load_universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, DataWindow};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "candlesim", about = "Candle-driven trading strategy simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one `<BASE><QUOTE>.csv` per pair; overrides [data] dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Directory to write trades.csv, series.csv and summary.csv into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
        } => run_backtest_command(&config, data_dir.as_deref(), output.as_deref()).map(|_| ()),
        Command::Validate { config } => run_validate(&config).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(&e)
        }
    }
}

/// Load and validate `path`, returning the simulation parameters.
pub fn run_validate(path: &Path) -> Result<SimulationConfig, SimError> {
    info!("Validating config {}", path.display());
    let config = FileConfigAdapter::from_file(path)?;
    let sim = build_simulation_config(&config)?;
    let window = data_window(&config)?;
    let benchmark = benchmark_pair(&config)?;
    warn_on_slots(&sim);

    info!("  pairs: {}", sim.pairs.join(", "));
    info!(
        "  capital {}, max open trades {}, fee {}%",
        sim.starting_capital,
        sim.max_open_trades,
        sim.fee_rate * 100.0
    );
    info!("  stoploss: {} {}%", sim.stoploss.kind, sim.stoploss.percent);
    let roi: Vec<String> = sim.roi.iter().map(|(m, p)| format!("{m}m: {p}%")).collect();
    info!("  roi: {}", roi.join(", "));
    info!("  window: {}", describe_window(window));
    if let Some(pair) = &benchmark {
        info!("  benchmark: {pair}");
    }
    info!("Config validated successfully");
    Ok(sim)
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub config: SimulationConfig,
    pub result: BacktestResult,
    pub stats: TradingStats,
    pub pair_stats: Vec<PairStats>,
}

pub fn run_backtest_command(
    config_path: &Path,
    data_dir_override: Option<&Path>,
    output: Option<&Path>,
) -> Result<RunOutcome, SimError> {
    info!("Loading config from {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;
    let sim = build_simulation_config(&config)?;
    let window = data_window(&config)?;
    let benchmark = benchmark_pair(&config)?;
    warn_on_slots(&sim);

    let dir = data_dir_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(data_dir(&config)));
    let currency = config.get_string("backtest", "currency").unwrap_or_default();
    info!("Reading candles from {}", dir.display());
    let data_port = CsvAdapter::new(dir, &currency);

    run_backtest_pipeline(&data_port, sim, window, benchmark.as_deref(), output)
}

/// Load candles, simulate, summarise and optionally write the report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    sim: SimulationConfig,
    window: DataWindow,
    benchmark: Option<&str>,
    output: Option<&Path>,
) -> Result<RunOutcome, SimError> {
    info!("Loading {} pairs...", sim.pairs.len());
    let pairs = load_universe(data_port, &sim.pairs, window)?;
    let benchmark_data = benchmark.and_then(|pair| load_benchmark(data_port, &pairs, pair, window));

    let timeline = build_timeline(&pairs);
    if let (Some(first), Some(last)) = (timeline.first(), timeline.last()) {
        info!(
            "Running backtest: {} pairs, {} to {}",
            pairs.len(),
            format_time(*first),
            format_time(*last)
        );
    }
    info!("  Processing: {} timestamps", timeline.len());

    let mut observer = LogObserver::default();
    let result = run_backtest(&pairs, &sim, &mut observer)?;
    info!(
        "Simulation finished: {} opened, {} closed, {} entries skipped",
        observer.opened, observer.closed, observer.skipped
    );

    let stats = TradingStats::compute(&result, &sim, &pairs, benchmark_data.as_ref());
    let pair_stats = PairStats::compute_per_pair(&result.closed_positions, &sim.pairs);
    print_summary(&stats, &pair_stats);

    if let Some(dir) = output {
        CsvReportAdapter::new().write(&result, &stats, dir)?;
        info!("Report written to: {}", dir.display());
    }

    Ok(RunOutcome {
        config: sim,
        result,
        stats,
        pair_stats,
    })
}

/// Benchmark candles, taken from the traded pairs when possible. A
/// benchmark that cannot be loaded only drops its figures from the summary.
fn load_benchmark(
    data_port: &dyn DataPort,
    pairs: &[PairData],
    pair: &str,
    window: DataWindow,
) -> Option<PairData> {
    if let Some(traded) = pairs.iter().find(|pd| pd.pair == pair) {
        return Some(traded.clone());
    }
    match data_port.fetch_candles(pair, window) {
        Ok(candles) if !candles.is_empty() => {
            let data = PairData::new(pair.to_string(), candles);
            if let Err(e) = validate_pairs(std::slice::from_ref(&data), None) {
                warn!("benchmark pair '{pair}' skipped: {e}");
                return None;
            }
            info!("  benchmark {}: {} candles [OK]", pair, data.candle_count());
            Some(data)
        }
        Ok(_) => {
            warn!("benchmark pair '{pair}' has no candles; skipping benchmark figures");
            None
        }
        Err(e) => {
            warn!("benchmark pair '{pair}' could not be loaded: {e}");
            None
        }
    }
}

fn warn_on_slots(sim: &SimulationConfig) {
    if sim.max_open_trades > sim.pairs.len() {
        warn!(
            "max_open_trades ({}) exceeds the number of pairs ({}); sizing uses {} slots",
            sim.max_open_trades,
            sim.pairs.len(),
            sim.pairs.len()
        );
    }
}

fn describe_window(window: DataWindow) -> String {
    let bound = |t: Option<i64>| t.map(format_time).unwrap_or_else(|| "open".to_string());
    format!("{} to {}", bound(window.start), bound(window.end))
}

fn print_summary(stats: &TradingStats, pair_stats: &[PairStats]) {
    let duration = |d: Option<chrono::TimeDelta>| d.map(format_duration).unwrap_or_else(|| "-".into());

    eprintln!("\n=== Aggregate Results ===");
    if let (Some(from), Some(to)) = (stats.tested_from, stats.tested_to) {
        eprintln!("Tested:           {} to {}", format_time(from), format_time(to));
    }
    eprintln!("Starting Capital: {:.2}", stats.starting_capital);
    eprintln!("End Capital:      {:.2}", stats.end_capital);
    eprintln!("Overall Profit:   {:.2}%", stats.overall_profit_pct);
    eprintln!("Closed Trades:    {}", stats.closed_trades);
    eprintln!("Trades Per Pair:  {:.2}", stats.avg_trades_per_pair);
    eprintln!("Left Open:        {}", stats.trades_left_open);
    eprintln!("Losing Trades:    {}", stats.trades_with_loss);
    eprintln!("Losing Streak:    {}", stats.longest_losing_streak);
    if let Some(best) = &stats.best_trade {
        eprintln!("Best Trade:       {:.2}% ({})", best.profit_pct, best.pair);
    }
    if let Some(worst) = &stats.worst_trade {
        eprintln!("Worst Trade:      {:.2}% ({})", worst.profit_pct, worst.pair);
    }
    eprintln!("Avg Duration:     {}", duration(stats.avg_trade_duration));
    eprintln!("Longest Trade:    {}", duration(stats.longest_trade_duration));
    eprintln!("Shortest Trade:   {}", duration(stats.shortest_trade_duration));
    eprintln!(
        "Realized DD:      -{:.1}%",
        (1.0 - stats.max_realized_drawdown) * 100.0
    );
    eprintln!("Max Seen DD:      -{:.1}%", (1.0 - stats.max_seen_drawdown) * 100.0);
    if let Some(span) = stats.drawdown_span {
        let recovered = span.to.map(format_time).unwrap_or_else(|| "not recovered".into());
        eprintln!(
            "  DD Span:        {} to {} (low {})",
            format_time(span.from),
            recovered,
            format_time(span.at)
        );
    }
    eprintln!(
        "Weeks W/D/L:      {}/{}/{}",
        stats.weeks.win, stats.weeks.draw, stats.weeks.loss
    );
    eprintln!("Market Change:    {:.2}%", (stats.market_change - 1.0) * 100.0);
    eprintln!("Market DD:        -{:.1}%", (1.0 - stats.market_drawdown) * 100.0);
    if let Some(benchmark) = &stats.benchmark {
        eprintln!(
            "{} Change:    {:.2}%",
            benchmark.pair,
            (benchmark.change - 1.0) * 100.0
        );
        eprintln!("{} DD:        -{:.1}%", benchmark.pair, (1.0 - benchmark.drawdown) * 100.0);
    }
    eprintln!("Fees Paid:        {:.4}", stats.total_fee_paid);

    eprintln!("\n=== Close Reasons ===");
    for (reason, count) in &stats.close_reasons {
        eprintln!("  {:<18}{}", reason.to_string(), count);
    }

    if pair_stats.iter().any(|ps| ps.trades > 0) {
        eprintln!("\n=== Per-Pair Summary ===");
        for ps in pair_stats {
            let sign = if ps.total_profit >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {} wins, {} losses, {:.2}% cumulative, {}{:.2}, avg {}",
                ps.pair,
                ps.trades,
                ps.wins,
                ps.losses,
                ps.cumulative_profit_pct,
                sign,
                ps.total_profit,
                duration(ps.avg_duration),
            );
        }
    }
}
