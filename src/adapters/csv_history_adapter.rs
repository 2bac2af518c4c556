//! CSV backtest results history, one row per record.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use crate::domain::analysis::BacktestRecord;
use crate::domain::error::SigtraderError;
use crate::ports::history_port::HistoryPort;

pub struct CsvHistoryAdapter {
    path: PathBuf,
}

fn csv_error(e: csv::Error) -> SigtraderError {
    SigtraderError::History {
        reason: e.to_string(),
    }
}

impl CsvHistoryAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HistoryPort for CsvHistoryAdapter {
    fn append(&self, records: &[BacktestRecord]) -> Result<(), SigtraderError> {
        if records.is_empty() {
            return Ok(());
        }
        let write_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        for record in records {
            writer.serialize(record).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// A missing file is an empty history.
    fn load(&self) -> Result<Vec<BacktestRecord>, SigtraderError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(csv_error)?;
        reader
            .deserialize()
            .map(|row| row.map_err(csv_error))
            .collect()
    }
}
