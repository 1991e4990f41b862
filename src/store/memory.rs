//! In-process backing store.
//!
//! All connections opened from one [`MemoryBackend`] see the same data, the
//! way clients of one server would. Each [`MemoryConnection`] still belongs
//! to a single thread.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Backend, Connection, StoreError};

/// DSN scheme accepted by [`MemoryBackend::from_dsn`].
pub const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Default)]
struct Keyspace {
    strings: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// Connection factory for the in-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<Keyspace>>,
    refuse_connections: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `memory://` DSN. `memory://fail` refuses every connection.
    pub fn from_dsn(dsn: &str) -> Result<Self, StoreError> {
        let rest = dsn
            .strip_prefix(MEMORY_SCHEME)
            .ok_or_else(|| StoreError::from(format!("unsupported DSN '{}', expected memory://", dsn)))?;

        match rest {
            "" => Ok(Self::new()),
            "fail" => Ok(Self::refusing()),
            other => Err(format!("unknown memory store option '{}'", other).into()),
        }
    }

    /// Backend whose connect attempts always fail.
    pub fn refusing() -> Self {
        Self {
            data: Arc::default(),
            refuse_connections: true,
        }
    }
}

impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection, StoreError> {
        if self.refuse_connections {
            return Err("connection refused".into());
        }
        Ok(MemoryConnection {
            data: Arc::clone(&self.data),
            open: true,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Connection to a [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryConnection {
    data: Arc<Mutex<Keyspace>>,
    open: bool,
}

impl MemoryConnection {
    fn keyspace(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        if !self.open {
            return Err("connection closed".into());
        }
        // Every operation leaves the keyspace consistent, so a poisoned lock is still usable
        Ok(self.data.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.keyspace()?.strings.get(key).cloned())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        self.keyspace()?.strings.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Remove a key of any type. Returns whether it existed.
    pub fn del(&mut self, key: &str) -> Result<bool, StoreError> {
        let mut ks = self.keyspace()?;
        let had_string = ks.strings.remove(key).is_some();
        let had_set = ks.sets.remove(key).is_some();
        Ok(had_string || had_set)
    }

    /// Add `by` to an integer value (missing keys count as 0).
    pub fn incr_by(&mut self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut ks = self.keyspace()?;
        let current = match ks.strings.get(key) {
            Some(v) => v
                .parse::<i64>()
                .map_err(|_| StoreError::from(format!("value at '{}' is not an integer", key)))?,
            None => 0,
        };
        let next = current
            .checked_add(by)
            .ok_or_else(|| StoreError::from(format!("increment would overflow '{}'", key)))?;
        ks.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    /// Add a member to a set. Returns true if it was not already present.
    pub fn sadd(&mut self, key: &str, member: impl Into<String>) -> Result<bool, StoreError> {
        Ok(self
            .keyspace()?
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.into()))
    }

    /// Members of a set in sorted order (empty for a missing key).
    pub fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keyspace()?
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Connection for MemoryConnection {
    fn close(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Err("connection already closed".into());
        }
        self.open = false;
        Ok(())
    }
}
