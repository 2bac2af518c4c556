//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_history_adapter;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod paper_exchange;
#[cfg(feature = "sqlite")]
pub mod sqlite_history_adapter;
pub mod throttled_exchange;

use crate::domain::config::{HistoryBackend, HistorySettings};
use crate::domain::error::SigtraderError;
use crate::ports::history_port::HistoryPort;

/// Opens the configured history store; `None` when recording is disabled.
pub fn open_history(settings: &HistorySettings) -> Result<Option<Box<dyn HistoryPort>>, SigtraderError> {
    let store: Box<dyn HistoryPort> = match settings.backend {
        #[cfg(feature = "sqlite")]
        HistoryBackend::Sqlite => Box::new(sqlite_history_adapter::SqliteHistoryAdapter::open(
            &settings.path,
            settings.pool_size,
        )?),
        HistoryBackend::Csv => Box::new(csv_history_adapter::CsvHistoryAdapter::new(
            settings.path.clone(),
        )),
        HistoryBackend::Disabled => return Ok(None),
    };
    Ok(Some(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disabled_history_opens_nothing() {
        let settings = HistorySettings {
            backend: HistoryBackend::Disabled,
            ..HistorySettings::default()
        };
        assert!(open_history(&settings).unwrap().is_none());
    }

    #[test]
    fn csv_history_opens_lazily() {
        let dir = TempDir::new().unwrap();
        let settings = HistorySettings {
            backend: HistoryBackend::Csv,
            path: dir.path().join("h.csv"),
            pool_size: 1,
        };
        let store = open_history(&settings).unwrap().unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
