//! SQLite trade store.

use crate::domain::error::LedgerError;
use crate::domain::trade::{NewTrade, Trade, TradeId};
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store::TradeStore;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::{Path, PathBuf};

const TRADE_COLUMNS: &str = "id, item, bid, ask, spread, buy_fee, sell_fee, buy_units, sell_units,
     buy_trade_value, trade_value, total_fees, profit, inherited_fees, cumulative_fees,
     real_profit, parent_trade_id, note, created_at";

pub const DEFAULT_DB_PATH: &str = "tradeledger.db";
pub const DEFAULT_POOL_SIZE: i64 = 4;

/// `--db` first, then `[sqlite] path`, then the default file name.
pub fn resolve_db_path(path_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    if let Some(path) = path_override {
        return path.to_path_buf();
    }
    config
        .get_string("sqlite", "path")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    /// Opens the database named by `path_override`, else `[sqlite] path`,
    /// else [`DEFAULT_DB_PATH`].
    pub fn from_config(
        config: &dyn ConfigPort,
        path_override: Option<&Path>,
    ) -> Result<Self, LedgerError> {
        let db_path = resolve_db_path(path_override, config);
        let pool_size = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE) as u32;
        tracing::debug!(path = %db_path.display(), pool_size, "opening ledger database");
        Self::open(db_path, pool_size)
    }

    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| LedgerError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| LedgerError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item TEXT NOT NULL,
                bid REAL NOT NULL,
                ask REAL NOT NULL,
                spread REAL NOT NULL,
                buy_fee REAL NOT NULL,
                sell_fee REAL NOT NULL,
                buy_units INTEGER NOT NULL,
                sell_units INTEGER NOT NULL,
                buy_trade_value REAL NOT NULL,
                trade_value REAL NOT NULL,
                total_fees REAL NOT NULL,
                profit REAL NOT NULL,
                inherited_fees REAL NOT NULL DEFAULT 0,
                cumulative_fees REAL NOT NULL,
                real_profit REAL NOT NULL,
                parent_trade_id INTEGER REFERENCES trades(id) ON DELETE SET NULL,
                note TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_parent ON trades(parent_trade_id);
            CREATE INDEX IF NOT EXISTS idx_trades_item ON trades(item);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| LedgerError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_error(e: rusqlite::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn map_row_to_trade(row: &rusqlite::Row) -> rusqlite::Result<Trade> {
    let created_str: String = row.get(18)?;
    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                created_str.len(),
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?
        .with_timezone(&Utc);

    Ok(Trade {
        id: row.get(0)?,
        item: row.get(1)?,
        bid: row.get(2)?,
        ask: row.get(3)?,
        spread: row.get(4)?,
        buy_fee: row.get(5)?,
        sell_fee: row.get(6)?,
        buy_units: row.get(7)?,
        sell_units: row.get(8)?,
        buy_trade_value: row.get(9)?,
        trade_value: row.get(10)?,
        total_fees: row.get(11)?,
        profit: row.get(12)?,
        inherited_fees: row.get(13)?,
        cumulative_fees: row.get(14)?,
        real_profit: row.get(15)?,
        parent_trade_id: row.get(16)?,
        note: row.get(17)?,
        created_at,
    })
}

fn insert_row(conn: &rusqlite::Connection, trade: &NewTrade) -> rusqlite::Result<TradeId> {
    let v = &trade.valuation;
    conn.execute(
        "INSERT INTO trades (item, bid, ask, spread, buy_fee, sell_fee, buy_units, sell_units,
             buy_trade_value, trade_value, total_fees, profit, inherited_fees,
             cumulative_fees, real_profit, parent_trade_id, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            trade.item,
            trade.bid,
            trade.ask,
            v.spread,
            trade.fees.buy_pct,
            trade.fees.sell_pct,
            trade.buy_units,
            trade.sell_units,
            v.buy_trade_value,
            v.trade_value,
            v.total_fees,
            v.profit,
            v.inherited_fees,
            v.cumulative_fees,
            v.real_profit,
            trade.parent_trade_id,
            trade.note,
            trade.created_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl TradeStore for SqliteAdapter {
    fn insert_trade(&self, trade: &NewTrade) -> Result<Trade, LedgerError> {
        let conn = self.conn()?;
        let id = insert_row(&conn, trade).map_err(query_error)?;
        Ok(trade.clone().into_trade(id))
    }

    fn insert_trades(&self, trades: &[NewTrade]) -> Result<Vec<Trade>, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        let mut inserted = Vec::with_capacity(trades.len());
        for trade in trades {
            let id = insert_row(&tx, trade).map_err(query_error)?;
            inserted.push(trade.clone().into_trade(id));
        }
        tx.commit().map_err(query_error)?;

        Ok(inserted)
    }

    fn update_trade(&self, trade: &Trade) -> Result<(), LedgerError> {
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "UPDATE trades SET item = ?1, bid = ?2, ask = ?3, spread = ?4, buy_fee = ?5,
                     sell_fee = ?6, buy_units = ?7, sell_units = ?8, buy_trade_value = ?9,
                     trade_value = ?10, total_fees = ?11, profit = ?12, inherited_fees = ?13,
                     cumulative_fees = ?14, real_profit = ?15, parent_trade_id = ?16, note = ?17
                 WHERE id = ?18",
                params![
                    trade.item,
                    trade.bid,
                    trade.ask,
                    trade.spread,
                    trade.buy_fee,
                    trade.sell_fee,
                    trade.buy_units,
                    trade.sell_units,
                    trade.buy_trade_value,
                    trade.trade_value,
                    trade.total_fees,
                    trade.profit,
                    trade.inherited_fees,
                    trade.cumulative_fees,
                    trade.real_profit,
                    trade.parent_trade_id,
                    trade.note,
                    trade.id,
                ],
            )
            .map_err(query_error)?;

        if changed == 0 {
            return Err(LedgerError::TradeNotFound { id: trade.id });
        }
        Ok(())
    }

    fn delete_trade(&self, id: TradeId) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM trades WHERE id = ?1", params![id])
            .map_err(query_error)?;
        Ok(changed > 0)
    }

    fn get_trade(&self, id: TradeId) -> Result<Option<Trade>, LedgerError> {
        let conn = self.conn()?;
        let query = format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?1");

        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let mut rows = stmt
            .query_map(params![id], map_row_to_trade)
            .map_err(query_error)?;

        rows.next().transpose().map_err(query_error)
    }

    fn list_trades(&self) -> Result<Vec<Trade>, LedgerError> {
        let conn = self.conn()?;
        let query = format!("SELECT {TRADE_COLUMNS} FROM trades ORDER BY id ASC");

        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt.query_map([], map_row_to_trade).map_err(query_error)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_error)?);
        }
        Ok(trades)
    }

    fn clear_parent_references(&self, parent_id: TradeId) -> Result<Vec<TradeId>, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        let children = {
            let mut stmt = tx
                .prepare("SELECT id FROM trades WHERE parent_trade_id = ?1 ORDER BY id")
                .map_err(query_error)?;
            let rows = stmt
                .query_map(params![parent_id], |row| row.get(0))
                .map_err(query_error)?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row.map_err(query_error)?);
            }
            ids
        };

        tx.execute(
            "UPDATE trades SET parent_trade_id = NULL WHERE parent_trade_id = ?1",
            params![parent_id],
        )
        .map_err(query_error)?;
        tx.commit().map_err(query_error)?;

        Ok(children)
    }

    fn list_registered_items(&self) -> Result<Vec<String>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM items ORDER BY name")
            .map_err(query_error)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(query_error)?);
        }
        Ok(names)
    }

    fn register_item(&self, name: &str) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO items (name, created_at) VALUES (?1, ?2)",
                params![name, Utc::now().to_rfc3339()],
            )
            .map_err(query_error)?;
        Ok(changed > 0)
    }

    fn reset(&self) -> Result<(), LedgerError> {
        let conn = self.conn()?;
        conn.execute_batch("DELETE FROM trades; DELETE FROM items;")
            .map_err(query_error)?;
        Ok(())
    }
}
