//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SimError;
use crate::domain::metrics::TradingStats;
use std::path::Path;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        stats: &TradingStats,
        output: &Path,
    ) -> Result<(), SimError>;
}
