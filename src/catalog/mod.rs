//! Relational record of datasets, versions, assets, labels and training jobs.
//!
//! The catalog is a SQLite database. Every mutating engine operation runs
//! inside one IMMEDIATE transaction obtained from [`Catalog::transaction`];
//! the query helpers in the submodules take a plain `&Connection` so they
//! work the same on a transaction (which derefs to a connection) or on a
//! read-only handle.

pub mod assets;
pub mod datasets;
pub mod jobs;
pub mod labels;
mod schema;

pub use schema::init_schema;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::LabelforgeError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// An open catalog connection.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (and create if needed) the catalog database at `path`.
    pub fn open(path: &Path) -> Result<Self, LabelforgeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory catalog.
    pub fn open_in_memory() -> Result<Self, LabelforgeError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, LabelforgeError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Begin a write transaction. Dropping it without commit rolls back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, LabelforgeError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Read-only access outside a transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
