use std::sync::Mutex;

use anyhow::{anyhow, Result};

use super::{Storage, StorageMap};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<StorageMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.entries.lock().map_err(|_| anyhow!("memory storage poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.entries.lock().map_err(|_| anyhow!("memory storage poisoned"))?;
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.entries.lock().map_err(|_| anyhow!("memory storage poisoned"))?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}
