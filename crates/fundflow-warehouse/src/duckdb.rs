//! Pooled `DuckDB` connections.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::Connection;

/// How a pooled connection will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Default)]
struct IdleConnections {
    readers: Vec<Connection>,
    writers: Vec<Connection>,
}

impl IdleConnections {
    fn slot(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.readers,
            AccessMode::ReadWrite => &mut self.writers,
        }
    }
}

struct PoolShared {
    db_path: PathBuf,
    max_idle: usize,
    // Every pooled connection is cloned from this one so the process holds a
    // single database instance per file.
    root: Mutex<Connection>,
    idle: Mutex<IdleConnections>,
}

/// Hands out connections to one database file and keeps up to `max_idle`
/// of each access mode around for reuse.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Open the database file and build a pool around it.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn open(db_path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = db_path.into();
        let root = Connection::open(&db_path)?;
        Ok(Self::from_root(db_path, root, max_idle))
    }

    /// In-memory pool, used by tests.
    ///
    /// # Errors
    /// Returns an error if `DuckDB` cannot allocate the database.
    pub fn in_memory(max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let root = Connection::open_in_memory()?;
        Ok(Self::from_root(PathBuf::from(":memory:"), root, max_idle))
    }

    fn from_root(db_path: PathBuf, root: Connection, max_idle: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                db_path,
                max_idle: max_idle.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(IdleConnections::default()),
            }),
        }
    }

    /// Take an idle connection or open a new one.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be opened or configured.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slot(mode)
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => self.open_connection()?,
        };

        Ok(PooledConnection {
            mode,
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.shared.db_path
    }

    fn open_connection(&self) -> Result<Connection, ::duckdb::Error> {
        let connection = self
            .shared
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_clone()?;
        connection.execute_batch("PRAGMA disable_progress_bar;")?;
        Ok(connection)
    }
}

/// Connection checked out of a [`ConnectionPool`]; returned on drop.
pub struct PooledConnection {
    mode: AccessMode,
    shared: Arc<PoolShared>,
    connection: Option<Connection>,
}

impl PooledConnection {
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        match self.connection.as_ref() {
            Some(connection) => connection,
            // `connection` is only taken in `drop`.
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = idle.slot(self.mode);
        if slot.len() < self.shared.max_idle {
            slot.push(connection);
        }
    }
}
