use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::PathBuf;

use crate::error::AppError;
use crate::model::HistoryRecord;

/// Append-only price history backed by sqlite.
///
/// Follows the open-per-operation pattern: each call opens the database file,
/// ensures the schema, and closes on drop, leaving cross-thread coordination
/// to sqlite itself.
pub struct HistoryLog {
    db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryStats {
    pub total_records: u64,
    pub unique_symbols: u64,
    pub oldest_timestamp_ms: Option<i64>,
    pub newest_timestamp_ms: Option<i64>,
}

impl HistoryLog {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Result<Connection, AppError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                timestamp_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_price_history_symbol_ts
                ON price_history(symbol, timestamp_ms DESC);
            "#,
        )?;
        Ok(conn)
    }

    /// Append one observation stamped with the current time.
    pub fn append(&self, symbol: &str, price: f64) -> Result<(), AppError> {
        let conn = self.open()?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO price_history (symbol, price, timestamp_ms) VALUES (?1, ?2, ?3)",
            params![symbol, price, now_ms],
        )?;
        Ok(())
    }

    /// Up to `limit` most recent records for `symbol`, newest first.
    pub fn recent_by_symbol(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, AppError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT symbol, price, timestamp_ms
            FROM price_history
            WHERE symbol = ?1
            ORDER BY timestamp_ms DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![symbol, limit as i64], row_to_record)?;
        collect_records(rows)
    }

    /// Every record for `symbol`, newest first. Feeds the analytics read path.
    pub fn all_by_symbol(&self, symbol: &str) -> Result<Vec<HistoryRecord>, AppError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT symbol, price, timestamp_ms
            FROM price_history
            WHERE symbol = ?1
            ORDER BY timestamp_ms DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map([symbol], row_to_record)?;
        collect_records(rows)
    }

    pub fn stats(&self) -> Result<HistoryStats, AppError> {
        let conn = self.open()?;
        let (total, unique, oldest, newest) = conn.query_row(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT symbol), MIN(timestamp_ms), MAX(timestamp_ms)
            FROM price_history
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )?;
        Ok(HistoryStats {
            total_records: total as u64,
            unique_symbols: unique as u64,
            oldest_timestamp_ms: oldest,
            newest_timestamp_ms: newest,
        })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        symbol: row.get(0)?,
        price: row.get(1)?,
        timestamp_ms: row.get(2)?,
    })
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<HistoryRecord>>,
) -> Result<Vec<HistoryRecord>, AppError> {
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
