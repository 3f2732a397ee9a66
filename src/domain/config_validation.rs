//! Configuration validation.
//!
//! Checks every `[backtest]` and `[roi]` field before a run and turns a
//! valid configuration into a [`SimulationConfig`].

use crate::domain::backtest::SimulationConfig;
use crate::domain::error::SimError;
use crate::domain::roi::RoiSchedule;
use crate::domain::stoploss::{StoplossConfig, StoplossKind};
use crate::domain::universe::{check_quote_currency, parse_pairs, parse_timeframe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataWindow;
use chrono::{NaiveDate, NaiveTime};

const BACKTEST: &str = "backtest";
const ROI: &str = "roi";
const DEFAULT_DATA_DIR: &str = "data";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    build_simulation_config(config)?;
    data_window(config)?;
    benchmark_pair(config)?;
    Ok(())
}

/// Parse and validate the simulation parameters.
pub fn build_simulation_config(config: &dyn ConfigPort) -> Result<SimulationConfig, SimError> {
    let starting_capital = validate_starting_capital(config)?;
    let max_open_trades = validate_max_open_trades(config)?;
    let fee_rate = validate_fee(config)?;
    let stoploss = validate_stoploss(config)?;
    let roi = validate_roi(config)?;
    let pairs = validate_pair_list(config)?;
    let interval_ms = validate_timeframe(config)?;

    Ok(SimulationConfig {
        starting_capital,
        max_open_trades,
        fee_rate,
        stoploss,
        roi,
        pairs,
        interval_ms,
    })
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SimError::missing(section, key)),
    }
}

fn parse_number(section: &str, key: &str, raw: &str) -> Result<f64, SimError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SimError::invalid(section, key, format!("'{raw}' is not a number")))
}

fn validate_starting_capital(config: &dyn ConfigPort) -> Result<f64, SimError> {
    let raw = required(config, BACKTEST, "starting_capital")?;
    let value = parse_number(BACKTEST, "starting_capital", &raw)?;
    if value <= 0.0 {
        return Err(SimError::invalid(
            BACKTEST,
            "starting_capital",
            "starting_capital must be positive",
        ));
    }
    Ok(value)
}

fn validate_max_open_trades(config: &dyn ConfigPort) -> Result<usize, SimError> {
    let raw = required(config, BACKTEST, "max_open_trades")?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(SimError::invalid(
            BACKTEST,
            "max_open_trades",
            "max_open_trades must be an integer of at least 1",
        )),
    }
}

/// Fee in percent, returned as a fraction.
fn validate_fee(config: &dyn ConfigPort) -> Result<f64, SimError> {
    let Some(raw) = config.get_string(BACKTEST, "fee") else {
        return Ok(0.0);
    };
    let value = parse_number(BACKTEST, "fee", raw.trim())?;
    if !(0.0..100.0).contains(&value) {
        return Err(SimError::invalid(
            BACKTEST,
            "fee",
            "fee must be at least 0 and below 100 percent",
        ));
    }
    Ok(value / 100.0)
}

fn validate_stoploss(config: &dyn ConfigPort) -> Result<StoplossConfig, SimError> {
    let kind = match config.get_string(BACKTEST, "stoploss_type") {
        Some(raw) => raw
            .parse::<StoplossKind>()
            .map_err(|reason| SimError::invalid(BACKTEST, "stoploss_type", reason))?,
        None => StoplossKind::Standard,
    };
    let raw = required(config, BACKTEST, "stoploss")?;
    let percent = parse_number(BACKTEST, "stoploss", &raw)?;
    Ok(StoplossConfig { kind, percent })
}

fn validate_roi(config: &dyn ConfigPort) -> Result<RoiSchedule, SimError> {
    let keys = config.section_keys(ROI);
    if keys.is_empty() {
        return Err(SimError::missing(ROI, "0"));
    }

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let minutes = key.trim().parse::<u64>().map_err(|_| {
            SimError::invalid(ROI, &key, "roi keys must be whole minutes")
        })?;
        let raw = required(config, ROI, &key)?;
        entries.push((minutes, parse_number(ROI, &key, &raw)?));
    }

    RoiSchedule::new(entries)
}

fn validate_pair_list(config: &dyn ConfigPort) -> Result<Vec<String>, SimError> {
    let raw = required(config, BACKTEST, "pairs")?;
    let pairs = parse_pairs(&raw).map_err(|e| SimError::invalid(BACKTEST, "pairs", e.to_string()))?;
    let currency = required(config, BACKTEST, "currency")?;
    check_quote_currency(&pairs, &currency)
        .map_err(|e| SimError::invalid(BACKTEST, "pairs", e.to_string()))?;
    Ok(pairs)
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<Option<i64>, SimError> {
    let Some(raw) = config.get_string(BACKTEST, "timeframe") else {
        return Ok(None);
    };
    parse_timeframe(&raw).map(Some).ok_or_else(|| {
        SimError::invalid(
            BACKTEST,
            "timeframe",
            format!("'{}' is not a timeframe such as 5m, 1h or 1d", raw.trim()),
        )
    })
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, SimError> {
    match value {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                SimError::invalid(
                    BACKTEST,
                    field,
                    format!("invalid {} format, expected YYYY-MM-DD", field),
                )
            }),
    }
}

fn midnight_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Optional date window, inclusive at both ends from midnight UTC.
pub fn data_window(config: &dyn ConfigPort) -> Result<DataWindow, SimError> {
    let start_str = config.get_string(BACKTEST, "start_date");
    let end_str = config.get_string(BACKTEST, "end_date");
    let start = parse_date(start_str.as_deref(), "start_date")?;
    let end = parse_date(end_str.as_deref(), "end_date")?;

    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Err(SimError::invalid(
                BACKTEST,
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }

    Ok(DataWindow {
        start: start.map(midnight_ms),
        end: end.map(midnight_ms),
    })
}

/// Optional `[backtest] benchmark`: a single `BASE/QUOTE` reference pair.
/// It need not be traded or quoted in the run's currency.
pub fn benchmark_pair(config: &dyn ConfigPort) -> Result<Option<String>, SimError> {
    let Some(raw) = config
        .get_string(BACKTEST, "benchmark")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };
    let mut pairs =
        parse_pairs(&raw).map_err(|e| SimError::invalid(BACKTEST, "benchmark", e.to_string()))?;
    if pairs.len() != 1 {
        return Err(SimError::invalid(
            BACKTEST,
            "benchmark",
            "benchmark must name a single pair",
        ));
    }
    Ok(pairs.pop())
}

pub fn data_dir(config: &dyn ConfigPort) -> String {
    config
        .get_string("data", "dir")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use approx::assert_relative_eq;

    const VALID: &str = r#"
[backtest]
starting_capital = 1000
max_open_trades = 3
fee = 0.25
stoploss_type = trailing
stoploss = 10
currency = USDT
pairs = BTC/USDT, eth/usdt
timeframe = 1h
start_date = 2021-01-01
end_date = 2021-06-01

[roi]
0 = 10
30 = 5
60 = 0

[data]
dir = candles
"#;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_line(key: &str, line: &str) -> FileConfigAdapter {
        let content: String = VALID
            .lines()
            .map(|l| {
                if l.starts_with(&format!("{key} =")) {
                    line.to_string()
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        make_config(&content)
    }

    fn invalid_key(config: &FileConfigAdapter) -> String {
        match validate_backtest_config(config).unwrap_err() {
            SimError::ConfigInvalid { key, .. } => key,
            SimError::ConfigMissing { key, .. } => format!("missing:{key}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn valid_config_builds() {
        let config = make_config(VALID);
        assert!(validate_backtest_config(&config).is_ok());

        let sim = build_simulation_config(&config).unwrap();
        assert_relative_eq!(sim.starting_capital, 1000.0);
        assert_eq!(sim.max_open_trades, 3);
        assert_relative_eq!(sim.fee_rate, 0.0025);
        assert_eq!(sim.stoploss.kind, StoplossKind::Trailing);
        assert_relative_eq!(sim.stoploss.percent, 10.0);
        assert_eq!(sim.pairs, vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(sim.interval_ms, Some(3_600_000));
        assert_relative_eq!(sim.roi.required_percent(45.0), 5.0);
        assert_eq!(data_dir(&config), "candles");
    }

    #[test]
    fn window_from_dates() {
        let window = data_window(&make_config(VALID)).unwrap();
        assert_eq!(window.start, Some(1_609_459_200_000));
        assert_eq!(window.end, Some(1_622_505_600_000));
    }

    #[test]
    fn optional_fields_default() {
        let config = make_config(
            "[backtest]\nstarting_capital = 10\nmax_open_trades = 1\nstoploss = 5\ncurrency = USDT\npairs = BTC/USDT\n[roi]\n0 = 1\n",
        );
        let sim = build_simulation_config(&config).unwrap();
        assert_relative_eq!(sim.fee_rate, 0.0);
        assert_eq!(sim.stoploss.kind, StoplossKind::Standard);
        assert_eq!(sim.interval_ms, None);
        assert_eq!(data_window(&config).unwrap(), DataWindow::default());
        assert_eq!(data_dir(&config), "data");
        assert_eq!(benchmark_pair(&config).unwrap(), None);
    }

    #[test]
    fn benchmark_pair_parsed() {
        let config = make_config(&VALID.replace("timeframe = 1h", "timeframe = 1h\nbenchmark = btc/eur"));
        assert_eq!(benchmark_pair(&config).unwrap(), Some("BTC/EUR".to_string()));

        let config = make_config(&VALID.replace("timeframe = 1h", "timeframe = 1h\nbenchmark = BTC/USDT, ETH/USDT"));
        assert_eq!(invalid_key(&config), "benchmark");

        let config = make_config(&VALID.replace("timeframe = 1h", "timeframe = 1h\nbenchmark = BTCUSDT"));
        assert_eq!(invalid_key(&config), "benchmark");
    }

    #[test]
    fn starting_capital_must_be_positive() {
        assert_eq!(invalid_key(&with_line("starting_capital", "starting_capital = 0")), "starting_capital");
        assert_eq!(invalid_key(&with_line("starting_capital", "starting_capital = -5")), "starting_capital");
        assert_eq!(invalid_key(&with_line("starting_capital", "starting_capital = abc")), "starting_capital");
    }

    #[test]
    fn max_open_trades_at_least_one() {
        assert_eq!(invalid_key(&with_line("max_open_trades", "max_open_trades = 0")), "max_open_trades");
        assert_eq!(invalid_key(&with_line("max_open_trades", "max_open_trades = 1.5")), "max_open_trades");
    }

    #[test]
    fn fee_range() {
        assert_eq!(invalid_key(&with_line("fee", "fee = -0.1")), "fee");
        assert_eq!(invalid_key(&with_line("fee", "fee = 100")), "fee");
        assert!(validate_backtest_config(&with_line("fee", "fee = 0")).is_ok());
    }

    #[test]
    fn unknown_stoploss_type() {
        assert_eq!(invalid_key(&with_line("stoploss_type", "stoploss_type = fixed")), "stoploss_type");
    }

    #[test]
    fn stoploss_required() {
        assert_eq!(invalid_key(&with_line("stoploss", "")), "missing:stoploss");
        assert_eq!(invalid_key(&with_line("stoploss", "stoploss = inf")), "stoploss");
    }

    #[test]
    fn roi_needs_zero_key() {
        let config = make_config(&VALID.replace("0 = 10\n", ""));
        assert!(matches!(
            validate_backtest_config(&config),
            Err(SimError::ConfigMissing { section, key }) if section == "roi" && key == "0"
        ));
    }

    #[test]
    fn roi_section_required() {
        let content = VALID.replace("[roi]\n0 = 10\n30 = 5\n60 = 0\n", "");
        assert_eq!(invalid_key(&make_config(&content)), "missing:0");
    }

    #[test]
    fn roi_keys_must_be_minutes() {
        let config = make_config(&VALID.replace("30 = 5", "half = 5"));
        assert_eq!(invalid_key(&config), "half");
    }

    #[test]
    fn roi_values_must_be_numbers() {
        let config = make_config(&VALID.replace("30 = 5", "30 = lots"));
        assert_eq!(invalid_key(&config), "30");
    }

    #[test]
    fn pairs_validated() {
        assert_eq!(invalid_key(&with_line("pairs", "pairs = BTC/USDT, BTC/USDT")), "pairs");
        assert_eq!(invalid_key(&with_line("pairs", "pairs = BTC/EUR")), "pairs");
        assert_eq!(invalid_key(&with_line("pairs", "pairs = BTCUSDT")), "pairs");
        assert_eq!(invalid_key(&with_line("pairs", "")), "missing:pairs");
    }

    #[test]
    fn timeframe_validated() {
        assert_eq!(invalid_key(&with_line("timeframe", "timeframe = 1y")), "timeframe");
    }

    #[test]
    fn dates_validated() {
        assert_eq!(invalid_key(&with_line("start_date", "start_date = 01/01/2021")), "start_date");
        assert_eq!(invalid_key(&with_line("start_date", "start_date = 2021-07-01")), "start_date");
        assert!(validate_backtest_config(&with_line("end_date", "")).is_ok());
    }
}
