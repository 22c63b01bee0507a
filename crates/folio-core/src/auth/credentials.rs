use std::sync::Arc;

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::models::{Credentials, UserProfile};
use crate::storage::Storage;

pub const ACCESS_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";
pub const DEVICE_ID_KEY: &str = "deviceId";

/// Keys removed by `clear`. The device id outlives sessions.
const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Length of generated device identifiers.
/// 26 base-36 characters is ~134 bits, collisions are not a concern.
const DEVICE_ID_LENGTH: usize = 26;

/// Generate a fresh random device identifier (lowercase alphanumeric).
pub fn generate_device_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DEVICE_ID_LENGTH)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Persists access token, refresh token, user profile and device id.
/// Clone is cheap and every clone writes to the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Write a full set of credentials in one backend write.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let user_json = match credentials.user {
            Some(ref user) => Some(serde_json::to_string(user)?),
            None => None,
        };

        let mut entries: Vec<(&str, &str)> = vec![(ACCESS_TOKEN_KEY, credentials.access_token.as_str())];
        if let Some(ref refresh) = credentials.refresh_token {
            entries.push((REFRESH_TOKEN_KEY, refresh.as_str()));
        }
        if let Some(ref user) = user_json {
            entries.push((USER_KEY, user.as_str()));
        }
        if !credentials.device_id.is_empty() {
            entries.push((DEVICE_ID_KEY, credentials.device_id.as_str()));
        }
        self.storage
            .set_many(&entries)
            .context("Failed to save credentials")?;

        let mut stale = Vec::new();
        if credentials.refresh_token.is_none() {
            stale.push(REFRESH_TOKEN_KEY);
        }
        if credentials.user.is_none() {
            stale.push(USER_KEY);
        }
        if !stale.is_empty() {
            self.storage.remove_many(&stale)?;
        }
        debug!("Credentials saved");
        Ok(())
    }

    /// Save the tokens and profile returned by a login.
    pub fn save_login(&self, access: &str, refresh: &str, user: &UserProfile) -> Result<()> {
        let credentials = Credentials {
            access_token: access.to_string(),
            refresh_token: Some(refresh.to_string()),
            user: Some(user.clone()),
            device_id: self.device_id()?,
        };
        self.save(&credentials)
    }

    /// Replace only the access token (after a refresh).
    pub fn save_access_token(&self, access: &str) -> Result<()> {
        self.storage
            .set(ACCESS_TOKEN_KEY, access)
            .context("Failed to save access token")
    }

    /// Load stored credentials. `None` when there is no access token.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let access_token = match self.storage.get(ACCESS_TOKEN_KEY)? {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };

        let refresh_token = self
            .storage
            .get(REFRESH_TOKEN_KEY)?
            .filter(|t| !t.is_empty());

        let user = match self.storage.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<UserProfile>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Stored user profile is unreadable, ignoring it");
                    None
                }
            },
            None => None,
        };

        Ok(Some(Credentials {
            access_token,
            refresh_token,
            user,
            device_id: self.device_id()?,
        }))
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.storage.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    /// Remove the session keys. Safe to call when already empty.
    pub fn clear(&self) -> Result<()> {
        self.storage
            .remove_many(&SESSION_KEYS)
            .context("Failed to clear credentials")?;
        debug!("Credentials cleared");
        Ok(())
    }

    /// Stable per-device identifier, generated and persisted on first use.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.storage.get(DEVICE_ID_KEY)?.filter(|id| !id.is_empty()) {
            return Ok(id);
        }
        let id = generate_device_id();
        self.storage
            .set(DEVICE_ID_KEY, &id)
            .context("Failed to persist device id")?;
        debug!("Generated new device id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn memory_store() -> (Arc<MemoryStorage>, CredentialStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), CredentialStore::new(storage))
    }

    #[test]
    fn test_generate_device_id_shape() {
        let id = generate_device_id();
        assert_eq!(id.len(), DEVICE_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(id, generate_device_id());
    }

    #[test]
    fn test_save_and_load_login() {
        let (_, store) = memory_store();
        let user = UserProfile::administrator(1, "admin");
        store.save_login("acc", "ref", &user).unwrap();

        let creds = store.load().unwrap().unwrap();
        assert_eq!(creds.access_token, "acc");
        assert_eq!(creds.refresh_token.as_deref(), Some("ref"));
        assert_eq!(creds.user, Some(user));
        assert_eq!(creds.device_id, store.device_id().unwrap());
    }

    #[test]
    fn test_load_empty_is_none() {
        let (_, store) = memory_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_access_token_keeps_refresh() {
        let (_, store) = memory_store();
        store
            .save_login("old", "ref", &UserProfile::administrator(1, "admin"))
            .unwrap();
        store.save_access_token("new").unwrap();

        let creds = store.load().unwrap().unwrap();
        assert_eq!(creds.access_token, "new");
        assert_eq!(creds.refresh_token.as_deref(), Some("ref"));
    }

    #[test]
    fn test_clear_is_idempotent_and_keeps_device_id() {
        let (storage, store) = memory_store();
        store
            .save_login("acc", "ref", &UserProfile::administrator(1, "admin"))
            .unwrap();
        let device = store.device_id().unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert!(store.load().unwrap().is_none());
        assert_eq!(storage.len(), 1);
        assert_eq!(store.device_id().unwrap(), device);
    }

    #[test]
    fn test_corrupt_user_is_ignored() {
        let (storage, store) = memory_store();
        storage
            .set_many(&[(ACCESS_TOKEN_KEY, "acc"), (USER_KEY, "{broken")])
            .unwrap();
        let creds = store.load().unwrap().unwrap();
        assert!(creds.user.is_none());
        assert!(creds.refresh_token.is_none());
    }

    #[test]
    fn test_device_id_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = CredentialStore::new(Arc::new(FileStorage::in_dir(dir.path())));
        let id = first.device_id().unwrap();

        let second = CredentialStore::new(Arc::new(FileStorage::in_dir(dir.path())));
        assert_eq!(second.device_id().unwrap(), id);

        std::fs::remove_file(dir.path().join("session.json")).unwrap();
        assert_ne!(second.device_id().unwrap(), id);
    }
}
