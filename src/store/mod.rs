mod schema;
mod session;

pub use session::Session;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::Result;
use schema::SCHEMA;

/// SqliteStore owns the database connection and hands out scoped
/// sessions. Mutating operations only run inside [`SqliteStore::with_txn`],
/// so a rebuild either commits whole or rolls back whole; readers never
/// observe a half-replaced access table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` with a read session. No transaction is opened; use this
    /// for lookups and permission checks.
    pub fn with_read<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn();
        f(&Session::new(&conn))
    }

    /// Runs `f` inside a single transaction, committing on `Ok` and
    /// rolling back on `Err`. Every mutating entry point of the crate
    /// goes through here; callers thread the [`Session`] into the core
    /// functions instead of reaching for a shared handle.
    pub fn with_txn<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = f(&Session::new(&tx))?;
        tx.commit()?;
        Ok(result)
    }
}
