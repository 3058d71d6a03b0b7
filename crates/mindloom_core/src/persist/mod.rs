//! Persistence collaborator contract and SQLite delta sink.
//!
//! # Responsibility
//! - Define the sink interface fed with already-computed mutation deltas.
//! - Provide a SQLite implementation with idempotent replay semantics.
//!
//! # Invariants
//! - `persist` is idempotent: replaying the same delta leaves the stored
//!   state unchanged.
//! - One delta is applied in one transaction; a failed delta writes
//!   nothing.
//! - Connections are migrated before any application data is touched.

use crate::engine::MutationDelta;
use crate::model::{Lexeme, Thought, ThoughtId};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, Instant};

pub mod migrations;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors from persistence sinks.
#[derive(Debug)]
pub enum SinkError {
    /// Underlying SQLite failure.
    Sqlite(rusqlite::Error),
    /// Stored schema is newer than this binary supports.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Record could not be encoded for storage.
    Encode(serde_json::Error),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Encode(err) => write!(f, "failed to encode record: {err}"),
        }
    }
}

impl Error for SinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for SinkError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Receiver of mutation deltas.
///
/// Implementations must be idempotent under replay; the caller may resend
/// a delta after a crash between the in-memory transition and the
/// persisted acknowledgement.
pub trait PersistenceSink {
    fn persist(&mut self, delta: &MutationDelta) -> SinkResult<()>;
}

/// Sink that discards every delta. Used by tests and headless tooling.
#[derive(Debug, Default)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn persist(&mut self, _delta: &MutationDelta) -> SinkResult<()> {
        Ok(())
    }
}

/// SQLite-backed delta sink.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens a database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> SinkResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=persist status=start mode=file");
        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=persist status=error mode=file duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };
        Self::bootstrap(conn, "file", started_at)
    }

    /// Opens an in-memory database and applies pending migrations.
    pub fn open_in_memory() -> SinkResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=persist status=start mode=memory");
        let conn = match Connection::open_in_memory() {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=persist status=error mode=memory duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };
        Self::bootstrap(conn, "memory", started_at)
    }

    fn bootstrap(mut conn: Connection, mode: &str, started_at: Instant) -> SinkResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        match migrations::apply_migrations(&mut conn) {
            Ok(()) => {
                info!(
                    "event=db_open module=persist status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Self { conn })
            }
            Err(err) => {
                error!(
                    "event=db_open module=persist status=error mode={mode} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Number of stored thought rows.
    pub fn thought_count(&self) -> SinkResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM thoughts;", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of stored lexeme rows.
    pub fn lexeme_count(&self) -> SinkResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM lexemes;", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Stored raw value of one thought, when present.
    pub fn stored_value(&self, id: ThoughtId) -> SinkResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM thoughts WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl PersistenceSink for SqliteSink {
    fn persist(&mut self, delta: &MutationDelta) -> SinkResult<()> {
        let tx = self.conn.transaction()?;
        for (id, record) in &delta.thoughts {
            match record {
                Some(thought) => upsert_thought(&tx, thought)?,
                None => {
                    tx.execute("DELETE FROM thoughts WHERE id = ?1;", [id.to_string()])?;
                }
            }
        }
        for (key, record) in &delta.lexemes {
            match record {
                Some(lexeme) => upsert_lexeme(&tx, lexeme)?,
                None => {
                    // Keys are stored as the i64 bit pattern of the u64 digest.
                    tx.execute("DELETE FROM lexemes WHERE key = ?1;", [*key as i64])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_thought(tx: &rusqlite::Transaction<'_>, thought: &Thought) -> SinkResult<()> {
    let children = serde_json::to_string(&thought.children)?;
    let context = serde_json::to_string(&thought.context)?;
    tx.execute(
        "INSERT INTO thoughts (id, value, rank, parent_id, children, context, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             value = excluded.value,
             rank = excluded.rank,
             parent_id = excluded.parent_id,
             children = excluded.children,
             context = excluded.context,
             last_updated = excluded.last_updated;",
        params![
            thought.id.to_string(),
            thought.value,
            thought.rank,
            thought.parent_id.map(|parent| parent.to_string()),
            children,
            context,
            thought.last_updated,
        ],
    )?;
    Ok(())
}

fn upsert_lexeme(tx: &rusqlite::Transaction<'_>, lexeme: &Lexeme) -> SinkResult<()> {
    let contexts = serde_json::to_string(&lexeme.contexts)?;
    tx.execute(
        "INSERT INTO lexemes (key, canonical, contexts)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
             canonical = excluded.canonical,
             contexts = excluded.contexts;",
        params![lexeme.key as i64, lexeme.canonical, contexts],
    )?;
    Ok(())
}
