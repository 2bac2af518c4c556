//! Backtest results history port.

use crate::domain::analysis::BacktestRecord;
use crate::domain::error::SigtraderError;

pub trait HistoryPort {
    /// Appends records in order; an empty slice is a no-op.
    fn append(&self, records: &[BacktestRecord]) -> Result<(), SigtraderError>;

    /// Every stored record, oldest first.
    fn load(&self) -> Result<Vec<BacktestRecord>, SigtraderError>;
}
