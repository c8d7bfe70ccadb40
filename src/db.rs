use crate::error::{PipelineError, PipelineResult};
use crate::record::{BatchCommit, PriceStats, Record, DATE_FORMAT};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;

const INSERT_PRICE: &str = "INSERT INTO prices (id, name, category, price_cents, create_date)
     VALUES (?1, ?2, ?3, ?4, ?5)";

const AGGREGATE_PRICES: &str = "SELECT
        COUNT(*),
        COUNT(DISTINCT category),
        COALESCE(SUM(price_cents), 0)
     FROM prices";

const SELECT_ORDERED: &str =
    "SELECT id, name, category, price_cents, create_date FROM prices ORDER BY id ASC";

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// PriceStore - the only durable state the pipeline depends on
///
/// Implementations must be shareable between request workers. Each method
/// is a complete unit of work; no transaction outlives a call.
pub trait PriceStore: Send + Sync {
    /// Insert every record in order and read the grand-total statistics in
    /// one transaction. Either all rows become visible together with the
    /// statistics, or the store is left untouched and `InsertFailed` returned.
    fn commit_batch(&self, records: &[Record]) -> PipelineResult<BatchCommit>;

    /// Stream all records ordered by identifier ascending.
    /// Any read fault, or an error returned by `visit`, stops the scan.
    fn scan_ordered(
        &self,
        visit: &mut dyn FnMut(Record) -> PipelineResult<()>,
    ) -> PipelineResult<()>;

    /// Statistics over the current store contents, outside any ingest.
    fn current_stats(&self) -> PipelineResult<PriceStats>;
}

// ============================================================================
// SQLITE
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS prices (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            create_date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prices_category ON prices(category)",
        [],
    )?;

    Ok(())
}

/// SqliteStore - store client handed to every pipeline entry point
///
/// Cloning is cheap; clones share one connection behind a mutex.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a file-backed store with WAL journaling.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Enable WAL mode for crash recovery
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        setup_database(&conn)?;

        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already set up.
    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Run `f` against the raw connection. Intended for maintenance and tests.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        f(&conn)
    }
}

fn read_stats(conn: &Connection) -> rusqlite::Result<PriceStats> {
    conn.query_row(AGGREGATE_PRICES, [], |row| {
        Ok(PriceStats::from_cents(row.get(0)?, row.get(1)?, row.get(2)?))
    })
}

impl PriceStore for SqliteStore {
    fn commit_batch(&self, records: &[Record]) -> PipelineResult<BatchCommit> {
        let insert_failed = |e: rusqlite::Error| PipelineError::InsertFailed(e.to_string());

        let mut conn = self.conn.lock();
        // Write lock held from the first insert through the aggregate read
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(insert_failed)?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_PRICE).map_err(insert_failed)?;
            for record in records {
                stmt.execute(params![
                    record.id,
                    record.name,
                    record.category,
                    record.price_cents,
                    record.created_at.format(DATE_FORMAT).to_string(),
                ])
                .map_err(|e| {
                    PipelineError::InsertFailed(format!("record id {}: {}", record.id, e))
                })?;
                inserted += 1;
            }
        }

        let stats = read_stats(&tx).map_err(insert_failed)?;
        tx.commit().map_err(insert_failed)?;

        Ok(BatchCommit { inserted, stats })
    }

    fn scan_ordered(
        &self,
        visit: &mut dyn FnMut(Record) -> PipelineResult<()>,
    ) -> PipelineResult<()> {
        let export_failed = |e: rusqlite::Error| PipelineError::ExportFailed(e.to_string());

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_ORDERED).map_err(export_failed)?;
        let mut rows = stmt.query([]).map_err(export_failed)?;

        while let Some(row) = rows.next().map_err(export_failed)? {
            let id: i64 = row.get(0).map_err(export_failed)?;
            let date_text: String = row.get(4).map_err(export_failed)?;
            let created_at = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|e| {
                PipelineError::ExportFailed(format!(
                    "record id {}: bad create_date {:?}: {}",
                    id, date_text, e
                ))
            })?;

            visit(Record {
                id,
                name: row.get(1).map_err(export_failed)?,
                category: row.get(2).map_err(export_failed)?,
                price_cents: row.get(3).map_err(export_failed)?,
                created_at,
            })?;
        }

        Ok(())
    }

    fn current_stats(&self) -> PipelineResult<PriceStats> {
        let conn = self.conn.lock();
        read_stats(&conn).map_err(|e| PipelineError::ExportFailed(e.to_string()))
    }
}
