use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use keyring::Entry;

use super::{Storage, StorageMap};

const SERVICE_NAME: &str = "folio";
const ACCOUNT_NAME: &str = "admin-session";

/// Stores the whole key/value map as one JSON secret in the OS keychain.
pub struct KeyringStorage {
    entry: Mutex<Entry>,
}

impl KeyringStorage {
    pub fn new() -> Result<Self> {
        Self::for_account(ACCOUNT_NAME)
    }

    pub fn for_account(account: &str) -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, account).context("Failed to create keyring entry")?;
        Ok(Self {
            entry: Mutex::new(entry),
        })
    }

    fn read_map(entry: &Entry) -> Result<StorageMap> {
        match entry.get_password() {
            Ok(secret) => serde_json::from_str(&secret).context("Failed to parse keychain entry"),
            Err(keyring::Error::NoEntry) => Ok(StorageMap::new()),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn write_map(entry: &Entry, map: &StorageMap) -> Result<()> {
        if map.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(e).context("Failed to delete session from keychain"),
            };
        }
        let secret = serde_json::to_string(map)?;
        entry
            .set_password(&secret)
            .context("Failed to store session in keychain")
    }
}

impl Storage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entry.lock().map_err(|_| anyhow!("keyring lock poisoned"))?;
        Ok(Self::read_map(&entry)?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let entry = self.entry.lock().map_err(|_| anyhow!("keyring lock poisoned"))?;
        let mut map = Self::read_map(&entry)?;
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Self::write_map(&entry, &map)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let entry = self.entry.lock().map_err(|_| anyhow!("keyring lock poisoned"))?;
        let mut map = Self::read_map(&entry)?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        Self::write_map(&entry, &map)
    }
}
