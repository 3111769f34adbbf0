use crate::error::ClientError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Get-or-create map keyed by channel id.
///
/// Lookups take the shared lock. On a miss the exclusive lock is taken, the entry
/// is looked up again and only constructed if still absent, so concurrent callers
/// for the same key observe exactly one constructed value.
pub struct MemoMap<V> {
    entries: RwLock<HashMap<String, Arc<V>>>,
}

impl<V> MemoMap<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Arc<V>>, ClientError> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    pub fn get_or_try_init<F>(&self, key: &str, init: F) -> Result<Arc<V>, ClientError>
    where
        F: FnOnce() -> Result<V, ClientError>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let mut entries = self.entries.write()?;
        if let Some(value) = entries.get(key) {
            return Ok(value.clone());
        }

        // A failed construction publishes nothing.
        let value = Arc::new(init()?);
        entries.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn len(&self) -> Result<usize, ClientError> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ClientError> {
        Ok(self.len()? == 0)
    }

    /// Drops every published value.
    pub fn clear(&self) -> Result<(), ClientError> {
        self.entries.write()?.clear();
        Ok(())
    }
}

impl<V> Default for MemoMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
