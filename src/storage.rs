//! Key-value backing store for the incremental Merkle tree.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::field::Field;

/// Mapping from node keys to field elements.
///
/// This is an implementation seam: the tree relies only on this contract,
/// so a store may be backed by memory, disk or a remote service.
pub trait Storage {
    /// Read a value; `None` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Field>>;

    /// Read a value, substituting `default` for absent keys.
    fn get_or(&self, key: &str, default: Field) -> Result<Field> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    fn put(&mut self, key: String, value: Field) -> Result<()>;

    /// Write a batch so that either every entry becomes visible or none.
    fn put_batch(&mut self, entries: Vec<(String, Field)>) -> Result<()>;

    fn delete(&mut self, key: &str) -> Result<()>;
}

/// In-process store backed by a hash map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    db: HashMap<String, Field>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("empty storage key".to_owned()));
    }
    Ok(())
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Field>> {
        check_key(key)?;
        Ok(self.db.get(key).copied())
    }

    fn put(&mut self, key: String, value: Field) -> Result<()> {
        check_key(&key)?;
        self.db.insert(key, value);
        Ok(())
    }

    fn put_batch(&mut self, entries: Vec<(String, Field)>) -> Result<()> {
        // Validate every entry before the first write, keeping the batch
        // all-or-nothing.
        for (key, _) in &entries {
            check_key(key)?;
        }
        for (key, value) in entries {
            self.db.insert(key, value);
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        check_key(key)?;
        self.db.remove(key);
        Ok(())
    }
}
