//! Per-run cache from node identifier to resolved UID.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, UpsertError};
use crate::node::Uid;

/// Shared identifier → UID map guarded by a single lock.
///
/// Cloning yields another handle to the same map, one per worker. A cache
/// belongs to one run: create it at the start, read the final contents from
/// the run's report.
#[derive(Clone, Default)]
pub struct UidCache {
    entries: Arc<Mutex<HashMap<String, Uid>>>,
}

impl UidCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Result<Option<Uid>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| UpsertError::CachePoisoned)?;
        Ok(entries.get(identifier).cloned())
    }

    /// Record `uid` for `identifier` unless another worker got there first.
    /// Returns the UID the cache holds afterwards.
    pub fn insert(&self, identifier: &str, uid: Uid) -> Result<Uid> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| UpsertError::CachePoisoned)?;
        Ok(entries
            .entry(identifier.to_string())
            .or_insert(uid)
            .clone())
    }

    pub fn len(&self) -> Result<usize> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| UpsertError::CachePoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Result<HashMap<String, Uid>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| UpsertError::CachePoisoned)?;
        Ok(entries.clone())
    }
}

impl From<HashMap<String, Uid>> for UidCache {
    fn from(entries: HashMap<String, Uid>) -> Self {
        UidCache {
            entries: Arc::new(Mutex::new(entries)),
        }
    }
}
