//! Tradable pair universe: parsing the pair list from configuration,
//! timeframe parsing and loading every pair's candles through a data port.

use crate::domain::error::SimError;
use crate::domain::pair_data::PairData;
use crate::ports::data_port::{DataPort, DataWindow};
use log::{info, warn};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in pair list")]
    EmptyToken,

    #[error("duplicate pair: {0}")]
    DuplicatePair(String),

    #[error("pair '{0}' must have the form BASE/QUOTE")]
    MalformedPair(String),

    #[error("pair '{pair}' is not quoted in {currency}")]
    WrongQuote { pair: String, currency: String },
}

/// Parse a comma separated `BASE/QUOTE` list, upper-cased, order kept.
pub fn parse_pairs(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut pairs = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let pair = trimmed.to_uppercase();
        match pair.split_once('/') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('/') => {}
            _ => return Err(UniverseError::MalformedPair(pair)),
        }
        if !seen.insert(pair.clone()) {
            return Err(UniverseError::DuplicatePair(pair));
        }
        pairs.push(pair);
    }

    Ok(pairs)
}

/// Every pair must be quoted in the run's currency.
pub fn check_quote_currency(pairs: &[String], currency: &str) -> Result<(), UniverseError> {
    let currency = currency.trim().to_uppercase();
    for pair in pairs {
        let quote = pair.split_once('/').map(|(_, q)| q).unwrap_or_default();
        if quote != currency {
            return Err(UniverseError::WrongQuote {
                pair: pair.clone(),
                currency,
            });
        }
    }
    Ok(())
}

/// Parse a timeframe such as `5m`, `1h`, `1d` or `1w` into milliseconds.
pub fn parse_timeframe(input: &str) -> Option<i64> {
    let input = input.trim();
    let (split, _) = input.char_indices().last()?;
    let (amount, unit) = input.split_at(split);
    let amount: i64 = amount.parse().ok().filter(|n| *n > 0)?;
    let unit_ms = match unit {
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return None,
    };
    amount.checked_mul(unit_ms)
}

/// Fetch every pair's candles. Any pair without data aborts the run, since
/// sizing and alignment both depend on the full universe.
pub fn load_universe(
    data_port: &dyn DataPort,
    pairs: &[String],
    window: DataWindow,
) -> Result<Vec<PairData>, SimError> {
    let available: HashSet<String> = data_port.list_pairs()?.into_iter().collect();
    let mut loaded = Vec::with_capacity(pairs.len());

    for pair in pairs {
        if !available.contains(pair) {
            return Err(SimError::NoData { pair: pair.clone() });
        }
        let candles = data_port.fetch_candles(pair, window)?;
        if candles.is_empty() {
            return Err(SimError::NoData { pair: pair.clone() });
        }

        let missing = candles.iter().filter(|c| c.is_missing()).count();
        if missing > 0 {
            warn!("pair '{}' is missing {} ticks", pair, missing);
        }
        info!("  {}: {} candles [OK]", pair, candles.len());
        loaded.push(PairData::new(pair.clone(), candles));
    }

    Ok(loaded)
}
