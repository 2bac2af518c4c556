//! SQLite backtest results history.

use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::analysis::BacktestRecord;
use crate::domain::error::SigtraderError;
use crate::ports::history_port::HistoryPort;

pub struct SqliteHistoryAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> SigtraderError {
    SigtraderError::History {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> SigtraderError {
    SigtraderError::History {
        reason: e.to_string(),
    }
}

impl SqliteHistoryAdapter {
    /// Opens (creating if needed) the database at `path` and its schema.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, SigtraderError> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, SigtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_error)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn initialize_schema(&self) -> Result<(), SigtraderError> {
        let conn = self.pool.get().map_err(pool_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS backtest_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                strategy TEXT NOT NULL,
                total_trades INTEGER NOT NULL,
                winning_trades INTEGER NOT NULL,
                losing_trades INTEGER NOT NULL,
                win_rate REAL NOT NULL,
                total_pnl_pct REAL NOT NULL,
                max_drawdown_pct REAL NOT NULL,
                sharpe_ratio REAL NOT NULL,
                composite_score REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_backtest_results_strategy ON backtest_results(strategy);
            CREATE INDEX IF NOT EXISTS idx_backtest_results_timestamp ON backtest_results(timestamp);",
        )
        .map_err(query_error)
    }
}

impl HistoryPort for SqliteHistoryAdapter {
    fn append(&self, records: &[BacktestRecord]) -> Result<(), SigtraderError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for r in records {
            tx.execute(
                "INSERT INTO backtest_results (timestamp, symbol, strategy, total_trades,
                    winning_trades, losing_trades, win_rate, total_pnl_pct, max_drawdown_pct,
                    sharpe_ratio, composite_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    r.timestamp.to_rfc3339(),
                    r.symbol,
                    r.strategy_name,
                    r.total_trades as i64,
                    r.winning_trades as i64,
                    r.losing_trades as i64,
                    r.win_rate,
                    r.total_pnl_pct,
                    r.max_drawdown_pct,
                    r.sharpe_ratio,
                    r.composite_score
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }

    fn load(&self) -> Result<Vec<BacktestRecord>, SigtraderError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, symbol, strategy, total_trades, winning_trades, losing_trades,
                        win_rate, total_pnl_pct, max_drawdown_pct, sharpe_ratio, composite_score
                 FROM backtest_results
                 ORDER BY id",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    BacktestRecord {
                        timestamp: DateTime::<Utc>::MIN_UTC,
                        symbol: row.get(1)?,
                        strategy_name: row.get(2)?,
                        total_trades: row.get::<_, i64>(3)? as usize,
                        winning_trades: row.get::<_, i64>(4)? as usize,
                        losing_trades: row.get::<_, i64>(5)? as usize,
                        win_rate: row.get(6)?,
                        total_pnl_pct: row.get(7)?,
                        max_drawdown_pct: row.get(8)?,
                        sharpe_ratio: row.get(9)?,
                        composite_score: row.get(10)?,
                    },
                ))
            })
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, mut record) = row.map_err(query_error)?;
            record.timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| SigtraderError::History {
                    reason: format!("invalid timestamp '{}': {}", timestamp, e),
                })?
                .with_timezone(&Utc);
            records.push(record);
        }
        Ok(records)
    }
}
