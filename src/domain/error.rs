//! Domain error types.

/// Top-level error type for candlesim.
///
/// Everything here is fatal and raised before the first tick; conditions
/// the simulator resolves on its own (no budget, no free slot, void trades)
/// never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {pair}")]
    NoData { pair: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("misaligned data for {pair}: {reason}")]
    MisalignedData { pair: String, reason: String },

    #[error("non-monotonic candles for {pair} at row {index}")]
    NonMonotonic { pair: String, index: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        SimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. } => 2,
            SimError::NoData { .. } | SimError::Data { .. } => 5,
            SimError::MisalignedData { .. } | SimError::NonMonotonic { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_message() {
        let err = SimError::invalid("backtest", "fee", "fee must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid config value [backtest] fee: fee must be non-negative"
        );
    }

    #[test]
    fn config_missing_message() {
        let err = SimError::missing("roi", "0");
        assert_eq!(err.to_string(), "missing config key [roi] 0");
    }

    #[test]
    fn non_monotonic_message() {
        let err = SimError::NonMonotonic {
            pair: "BTC/USDT".into(),
            index: 4,
        };
        assert_eq!(
            err.to_string(),
            "non-monotonic candles for BTC/USDT at row 4"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SimError = io.into();
        assert!(matches!(err, SimError::Io(_)));
    }
}
