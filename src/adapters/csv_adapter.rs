//! CSV candle data adapter.
//!
//! One file per pair in `base_path`, named after the pair without its
//! slash (`BTC/USDT` -> `BTCUSDT.csv`), with the header
//! `time,open,high,low,close,volume,buy,sell[,stoploss]`.

use crate::domain::candle::Candle;
use crate::domain::error::SimError;
use crate::ports::data_port::{DataPort, DataWindow};
use std::fs;
use std::path::PathBuf;

const REQUIRED_COLUMNS: [&str; 8] = ["time", "open", "high", "low", "close", "volume", "buy", "sell"];

pub struct CsvAdapter {
    base_path: PathBuf,
    quote_currency: String,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf, quote_currency: &str) -> Self {
        Self {
            base_path,
            quote_currency: quote_currency.trim().to_uppercase(),
        }
    }

    pub fn csv_path(&self, pair: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", pair.replace('/', "")))
    }
}

struct Columns {
    index: [usize; 8],
    stoploss: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, file: &str) -> Result<Self, SimError> {
        let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let mut index = [0usize; 8];
        for (slot, name) in index.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(name).ok_or_else(|| SimError::Data {
                reason: format!("{file}: missing {name} column"),
            })?;
        }
        Ok(Columns {
            index,
            stoploss: find("stoploss"),
        })
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize) -> &'r str {
    record.get(idx).map(str::trim).unwrap_or("")
}

/// Empty fields are missing data and read as NaN.
fn parse_price(raw: &str, name: &str, row: usize) -> Result<f64, SimError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse().map_err(|e| SimError::Data {
        reason: format!("row {row}: invalid {name} value '{raw}': {e}"),
    })
}

fn parse_flag(raw: &str, name: &str, row: usize) -> Result<bool, SimError> {
    match raw.to_lowercase().as_str() {
        "" | "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        _ => Err(SimError::Data {
            reason: format!("row {row}: invalid {name} flag '{raw}'"),
        }),
    }
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self, pair: &str, window: DataWindow) -> Result<Vec<Candle>, SimError> {
        let path = self.csv_path(pair);
        let content = fs::read_to_string(&path).map_err(|e| SimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| SimError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;
        let columns = Columns::from_headers(headers, &path.display().to_string())?;
        let [time_i, open_i, high_i, low_i, close_i, volume_i, buy_i, sell_i] = columns.index;

        let mut candles = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let row = i + 1;
            let record = result.map_err(|e| SimError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let time_str = field(&record, time_i);
            let time: i64 = time_str.parse().map_err(|_| SimError::Data {
                reason: format!("row {row}: invalid time '{time_str}'"),
            })?;
            if !window.contains(time) {
                continue;
            }

            let stoploss = match columns.stoploss.map(|idx| field(&record, idx)) {
                None | Some("") => None,
                Some(raw) => Some(parse_price(raw, "stoploss", row)?),
            };

            candles.push(Candle {
                pair: pair.to_string(),
                time,
                open: parse_price(field(&record, open_i), "open", row)?,
                high: parse_price(field(&record, high_i), "high", row)?,
                low: parse_price(field(&record, low_i), "low", row)?,
                close: parse_price(field(&record, close_i), "close", row)?,
                volume: parse_price(field(&record, volume_i), "volume", row)?,
                buy: parse_flag(field(&record, buy_i), "buy", row)?,
                sell: parse_flag(field(&record, sell_i), "sell", row)?,
                stoploss,
            });
        }

        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }

    fn list_pairs(&self) -> Result<Vec<String>, SimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SimError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("{}.csv", self.quote_currency);
        let mut pairs = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| SimError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if name_str.len() > suffix.len() && name_str.ends_with(&suffix) {
                let base = &name_str[..name_str.len() - suffix.len()];
                pairs.push(format!("{}/{}", base, self.quote_currency));
            }
        }

        pairs.sort();
        Ok(pairs)
    }
}
