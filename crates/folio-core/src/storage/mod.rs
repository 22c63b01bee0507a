//! String-keyed persistent storage backends.
//!
//! The credential store only needs get/set/remove on string keys, the way a
//! browser's local storage works. Backends:
//! - `FileStorage`: a JSON object file in the user data directory
//! - `KeyringStorage`: the same JSON object in a single OS keychain entry
//! - `MemoryStorage`: in-process map for tests and ephemeral sessions

pub mod file;
pub mod keyring;
pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;

pub use file::FileStorage;
pub use keyring::KeyringStorage;
pub use memory::MemoryStorage;

/// Key/value map persisted by the JSON-backed stores.
pub(crate) type StorageMap = BTreeMap<String, String>;

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    /// Write several keys in one backend write.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove keys. Removing a missing key is not an error.
    fn remove_many(&self, keys: &[&str]) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }
}

/// Which backend the CLI should persist credentials in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}
