//! CSV candle files.
//!
//! One file per symbol and interval, `<SYMBOL>_<interval>.csv`, with a
//! header row and columns `timestamp,open,high,low,close,volume`. The
//! timestamp is epoch milliseconds or RFC 3339.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::candle::{Candle, CandleSeries};
use crate::domain::error::SigtraderError;

pub struct CsvCandleAdapter {
    base_path: PathBuf,
}

impl CsvCandleAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }

    /// Every bar in the symbol's file, oldest first.
    pub fn load(&self, symbol: &str, interval: &str) -> Result<CandleSeries, SigtraderError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("failed to read {}: {}", path.display(), e))
        })?;
        parse_candles(&content)
    }

    /// Symbols that have a file for `interval`, sorted.
    pub fn list_symbols(&self, interval: &str) -> Result<Vec<String>, SigtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to read directory {}: {}", self.base_path.display(), e),
            )
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

/// Parses CSV text into a validated series, sorting rows by timestamp.
pub fn parse_candles(content: &str) -> Result<CandleSeries, SigtraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut candles = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record =
            result.map_err(|e| SigtraderError::data(format!("CSV parse error: {}", e)))?;
        let row = row + 1;

        candles.push(Candle {
            open_time: parse_timestamp(field(&record, row, 0, "timestamp")?)?,
            open: number(&record, row, 1, "open")?,
            high: number(&record, row, 2, "high")?,
            low: number(&record, row, 3, "low")?,
            close: number(&record, row, 4, "close")?,
            volume: number(&record, row, 5, "volume")?,
        });
    }

    candles.sort_by_key(|c| c.open_time);
    CandleSeries::new(candles)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    row: usize,
    idx: usize,
    name: &str,
) -> Result<&'r str, SigtraderError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| SigtraderError::data(format!("row {}: missing {} column", row, name)))
}

fn number(record: &csv::StringRecord, row: usize, idx: usize, name: &str) -> Result<f64, SigtraderError> {
    field(record, row, idx, name)?
        .parse()
        .map_err(|e| SigtraderError::data(format!("row {}: invalid {} value: {}", row, name, e)))
}

/// Epoch milliseconds or an RFC 3339 string.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SigtraderError> {
    if let Ok(millis) = value.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| SigtraderError::data(format!("timestamp out of range: {}", value)));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SigtraderError::data(format!("invalid timestamp '{}': {}", value, e)))
}
