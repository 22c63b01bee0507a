//! Account operations that end or inspect sessions: logout, logout
//! everywhere, password change and the active session list.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{ActiveSession, Credentials};

use super::credentials::CredentialStore;
use super::registry::VerificationRegistry;
use super::session::{Navigator, SessionPolicy};

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Not logged in. Run 'folio login' first.")]
    NotLoggedIn,

    #[error("Current and new password are both required")]
    MissingPasswords,

    #[error("{0}")]
    Rejected(String),

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error(transparent)]
    Api(ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<ApiError> for AccountError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => AccountError::SessionExpired,
            ApiError::BadRequest(ref m) | ApiError::AccessDenied(ref m) | ApiError::NotFound(ref m)
                if !m.is_empty() =>
            {
                AccountError::Rejected(m.clone())
            }
            other => AccountError::Api(other),
        }
    }
}

pub struct AccountService {
    api: ApiClient,
    store: CredentialStore,
    registry: Arc<VerificationRegistry>,
    navigator: Arc<dyn Navigator>,
    policy: SessionPolicy,
}

impl AccountService {
    pub fn new(
        api: ApiClient,
        store: CredentialStore,
        registry: Arc<VerificationRegistry>,
        navigator: Arc<dyn Navigator>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            api,
            store,
            registry,
            navigator,
            policy,
        }
    }

    fn credentials(&self) -> Result<Credentials, AccountError> {
        self.store.load()?.ok_or(AccountError::NotLoggedIn)
    }

    /// Clear local credentials and go to the login screen.
    fn end_local_session(&self, access_token: &str) -> Result<(), AccountError> {
        self.registry.forget(access_token);
        self.store.clear()?;
        self.navigator.to_login();
        Ok(())
    }

    /// Sign out this device. The server call is best effort; local
    /// credentials are always cleared.
    pub async fn logout(&self) -> Result<(), AccountError> {
        let creds = self.credentials()?;
        match creds.refresh_token {
            Some(ref refresh) => {
                if let Err(e) = self.api.logout(&creds.access_token, refresh).await {
                    warn!(error = %e, "Server logout failed, clearing local session anyway");
                }
            }
            None => debug!("No refresh token stored, skipping server logout"),
        }
        self.end_local_session(&creds.access_token)?;
        info!("Logged out");
        Ok(())
    }

    /// Blacklist every refresh token of the account, then sign out here.
    pub async fn logout_all(&self) -> Result<(), AccountError> {
        let creds = self.credentials()?;
        self.api.logout_all(&creds.access_token).await?;
        info!("Logged out from all devices");
        self.forced_logout(&creds.access_token).await
    }

    /// Change the password. Every session ends on success, this one included.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), AccountError> {
        if current.is_empty() || new.is_empty() {
            return Err(AccountError::MissingPasswords);
        }
        let creds = self.credentials()?;
        self.api
            .change_password(&creds.access_token, current, new)
            .await?;
        info!("Password changed");
        self.forced_logout(&creds.access_token).await
    }

    pub async fn sessions(&self) -> Result<Vec<ActiveSession>, AccountError> {
        let creds = self.credentials()?;
        Ok(self.api.list_sessions(&creds.access_token).await?)
    }

    pub async fn revoke_session(&self, token_id: i64) -> Result<(), AccountError> {
        let creds = self.credentials()?;
        self.api.revoke_session(&creds.access_token, token_id).await?;
        info!(token_id, "Session revoked");
        Ok(())
    }

    async fn forced_logout(&self, access_token: &str) -> Result<(), AccountError> {
        tokio::time::sleep(self.policy.forced_logout_delay).await;
        self.end_local_session(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::RecordingNavigator;
    use crate::models::UserProfile;
    use crate::storage::MemoryStorage;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        service: AccountService,
        store: CredentialStore,
        registry: Arc<VerificationRegistry>,
        navigator: Arc<RecordingNavigator>,
    }

    fn fixture(server: &MockServer) -> Fixture {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        store
            .save_login("acc", "ref", &UserProfile::administrator(1, "admin"))
            .unwrap();
        let registry = Arc::new(VerificationRegistry::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let policy = SessionPolicy {
            forced_logout_delay: Duration::from_millis(10),
            ..SessionPolicy::default()
        };
        let service = AccountService::new(
            ApiClient::new(server.uri()).unwrap(),
            store.clone(),
            registry.clone(),
            navigator.clone(),
            policy,
        );
        Fixture {
            service,
            store,
            registry,
            navigator,
        }
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout/"))
            .and(header("authorization", "Bearer acc"))
            .and(body_json(serde_json::json!({"refresh": "ref"})))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server);
        f.registry.mark_verified("acc");

        f.service.logout().await.unwrap();
        assert!(f.store.load().unwrap().is_none());
        assert!(f.registry.state("acc").is_none());
        assert_eq!(f.navigator.logins(), 1);
    }

    #[tokio::test]
    async fn test_logout_all_forces_logout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout-all/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"detail": "Successfully logged out from all devices."}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server);

        f.service.logout_all().await.unwrap();
        assert!(f.store.load().unwrap().is_none());
        assert_eq!(f.navigator.logins(), 1);
    }

    #[tokio::test]
    async fn test_logout_all_failure_keeps_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout-all/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                serde_json::json!({"detail": "Given token not valid for any token type"}),
            ))
            .mount(&server)
            .await;
        let f = fixture(&server);

        let err = f.service.logout_all().await.unwrap_err();
        assert!(matches!(err, AccountError::SessionExpired));
        assert!(f.store.load().unwrap().is_some());
        assert_eq!(f.navigator.logins(), 0);
    }

    #[tokio::test]
    async fn test_change_password_rejected_returns_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/change-password/"))
            .and(body_json(serde_json::json!({
                "current_password": "old", "new_password": "short"
            })))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                serde_json::json!({"detail": ["This password is too short."]}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server);

        match f.service.change_password("old", "short").await {
            Err(AccountError::Rejected(msg)) => assert_eq!(msg, "This password is too short."),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(f.store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_change_password_success_logs_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/change-password/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server);

        f.service.change_password("old", "n3w-Passw0rd").await.unwrap();
        assert!(f.store.load().unwrap().is_none());
        assert_eq!(f.navigator.logins(), 1);
    }

    #[tokio::test]
    async fn test_change_password_requires_both_fields() {
        let server = MockServer::start().await;
        let f = fixture(&server);
        assert!(matches!(
            f.service.change_password("", "new").await,
            Err(AccountError::MissingPasswords)
        ));
    }

    #[tokio::test]
    async fn test_sessions_and_revoke() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 4, "created_at": null, "expires_at": null, "jti": "abc", "current": true}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/sessions/"))
            .and(body_json(serde_json::json!({"token_id": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server);

        let sessions = f.service.sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].current);
        f.service.revoke_session(4).await.unwrap();
    }

    #[tokio::test]
    async fn test_requires_login() {
        let server = MockServer::start().await;
        let f = fixture(&server);
        f.store.clear().unwrap();
        assert!(matches!(
            f.service.sessions().await,
            Err(AccountError::NotLoggedIn)
        ));
    }
}
