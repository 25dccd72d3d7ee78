//! SQLite-backed session store.
//!
//! Each singleton session is one row holding its JSON body and a revision
//! counter. Commits made through this handle are pushed to subscribers
//! immediately; commits made by other processes sharing the file are picked
//! up by a revision poller that runs while anyone is subscribed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{
    merge_patch, provisioned_documents, SessionStore, SessionUpdate, Subscribers, Subscription,
};
use crate::error::StoreError;

const DEFAULT_POLL: Duration = Duration::from_millis(500);

struct Shared {
    conn: Mutex<Connection>,
    subscribers: Mutex<Subscribers>,
}

impl Shared {
    // Lock order: conn, then subscribers.
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Closed)
    }

    fn subscribers(&self) -> Result<MutexGuard<'_, Subscribers>, StoreError> {
        self.subscribers.lock().map_err(|_| StoreError::Closed)
    }

    fn poll_once(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let mut subscribers = self.subscribers()?;
        for (id, last) in subscribers.watched_ids() {
            if let Some((revision, document)) = read_row(&conn, &id)? {
                if revision > last {
                    tracing::debug!(id = %id, revision, "picked up external session update");
                    subscribers.publish(SessionUpdate {
                        id,
                        revision,
                        document,
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct SqliteStore {
    shared: Arc<Shared>,
    poller: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and provision idle sessions.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(2))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (no cross-process visibility).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// How often to look for commits made by other processes.
    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        self.poll_interval = every.max(Duration::from_millis(10));
        self
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrate(&conn)?;
        provision(&conn)?;
        Ok(Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(conn),
                subscribers: Mutex::new(Subscribers::default()),
            }),
            poller: Mutex::new(None),
            poll_interval: DEFAULT_POLL,
        })
    }

    /// Current revision of `id`, 0 when absent.
    pub fn revision(&self, id: &str) -> Result<u64, StoreError> {
        let conn = self.shared.conn()?;
        Ok(read_row(&conn, id)?.map(|(rev, _)| rev).unwrap_or(0))
    }

    fn ensure_poller(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // Outside a runtime only same-handle commits are delivered.
            return;
        };
        let Ok(mut poller) = self.poller.lock() else {
            return;
        };
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let shared = Arc::downgrade(&self.shared);
        *poller = Some(handle.spawn(poll_loop(shared, self.poll_interval)));
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(task) = poller.take() {
                task.abort();
            }
        }
    }
}

impl SessionStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.shared.conn()?;
        Ok(read_row(&conn, id)?.map(|(_, doc)| doc))
    }

    fn subscribe(&self, id: &str) -> Result<Subscription, StoreError> {
        let subscription = {
            let conn = self.shared.conn()?;
            let revision = read_row(&conn, id)?.map(|(rev, _)| rev).unwrap_or(0);
            self.shared.subscribers()?.add(id, revision)
        };
        self.ensure_poller();
        Ok(subscription)
    }

    fn update(&self, id: &str, patch: &Value) -> Result<u64, StoreError> {
        let conn = self.shared.conn()?;
        let tx = conn.unchecked_transaction()?;
        let (current_revision, mut document) =
            read_row(&tx, id)?.unwrap_or((0, Value::Object(Map::new())));
        merge_patch(&mut document, patch);
        let revision = current_revision + 1;
        let body = serde_json::to_string(&document).map_err(|e| StoreError::Malformed {
            id: id.to_string(),
            message: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO session_records (id, revision, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                revision = excluded.revision,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![id, revision, body, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        self.shared.subscribers()?.publish(SessionUpdate {
            id: id.to_string(),
            revision,
            document,
        });
        tracing::debug!(id, revision, "sqlite store committed update");
        Ok(revision)
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS session_records (
            id         TEXT PRIMARY KEY,
            revision   INTEGER NOT NULL DEFAULT 0,
            body       TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn provision(conn: &Connection) -> Result<(), StoreError> {
    let now = Utc::now().to_rfc3339();
    for (id, doc) in provisioned_documents()? {
        conn.execute(
            "INSERT OR IGNORE INTO session_records (id, revision, body, updated_at)
             VALUES (?1, 0, ?2, ?3)",
            params![id, doc.to_string(), now],
        )?;
    }
    Ok(())
}

fn read_row(conn: &Connection, id: &str) -> Result<Option<(u64, Value)>, StoreError> {
    let row = conn
        .query_row(
            "SELECT revision, body FROM session_records WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    match row {
        None => Ok(None),
        Some((revision, body)) => match serde_json::from_str(&body) {
            Ok(doc) => Ok(Some((revision, doc))),
            Err(e) => {
                tracing::warn!(id, error = %e, "unparseable session body");
                Ok(Some((revision, Value::Null)))
            }
        },
    }
}

async fn poll_loop(shared: Weak<Shared>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if let Err(e) = shared.poll_once() {
            tracing::warn!(error = %e, "session store poll failed");
        }
    }
}
