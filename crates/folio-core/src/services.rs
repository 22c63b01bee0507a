//! Wiring for the shared service instances.
//!
//! Everything that holds state (credential store, verification registry,
//! login throttle) is created once here and handed to the pieces that need
//! it, so two `Services` never share state.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::auth::{
    AccountService, CredentialStore, InFlightPolicy, LoginGate, Navigator, SessionManager,
    SessionPolicy, TokenRefresher, TokenVerifier, VerificationRegistry,
};
use crate::content::ContentService;
use crate::storage::Storage;

/// How often stale verification entries are swept in long-running processes.
const SWEEP_INTERVAL_SECS: u64 = 10 * 60;

pub struct Services {
    pub api: ApiClient,
    pub store: CredentialStore,
    pub registry: Arc<VerificationRegistry>,
    pub sessions: Arc<SessionManager>,
    pub login: LoginGate,
    pub account: AccountService,
    pub content: ContentService,
}

impl Services {
    /// Periodically drop verification entries nobody has touched for an hour.
    /// Needs a running tokio runtime; stops when the services are dropped.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        self.registry
            .spawn_sweeper(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS))
    }
}

pub struct ServicesBuilder {
    api_url: String,
    storage: Arc<dyn Storage>,
    navigator: Arc<dyn Navigator>,
    in_flight_policy: InFlightPolicy,
    policy: SessionPolicy,
}

impl ServicesBuilder {
    pub fn new(
        api_url: impl Into<String>,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            storage,
            navigator,
            in_flight_policy: InFlightPolicy::default(),
            policy: SessionPolicy::default(),
        }
    }

    pub fn in_flight_policy(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight_policy = policy;
        self
    }

    pub fn session_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<Services> {
        let api = ApiClient::new(self.api_url)?;
        let store = CredentialStore::new(self.storage);
        let registry = Arc::new(VerificationRegistry::new());

        let verifier = TokenVerifier::new(api.clone(), registry.clone(), self.in_flight_policy);
        let refresher = TokenRefresher::new(api.clone(), registry.clone());
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            verifier,
            refresher,
            self.navigator.clone(),
            self.policy.clone(),
        ));
        let login = LoginGate::new(api.clone(), store.clone(), self.navigator.clone());
        let content = ContentService::new(api.clone(), store.clone());
        let account = AccountService::new(
            api.clone(),
            store.clone(),
            registry.clone(),
            self.navigator,
            self.policy,
        );

        Ok(Services {
            api,
            store,
            registry,
            sessions,
            login,
            account,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::RecordingNavigator;
    use crate::auth::AuthOutcome;
    use crate::storage::MemoryStorage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_then_session_shares_registry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access": "acc", "refresh": "ref", "user_id": 2
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token/verify/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let navigator = Arc::new(RecordingNavigator::default());
        let services = ServicesBuilder::new(server.uri(), Arc::new(MemoryStorage::new()), navigator.clone())
            .build()
            .unwrap();

        services.login.submit("admin", "admin123").await.unwrap();
        for _ in 0..2 {
            match services.sessions.ensure_authenticated().await {
                AuthOutcome::Authenticated(creds) => assert_eq!(creds.username(), Some("admin")),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert!(services.registry.is_recently_verified("acc"));
        assert_eq!(navigator.dashboards(), 1);
    }

    #[tokio::test]
    async fn test_content_uses_refreshed_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token/verify/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                serde_json::json!({"detail": "Token is invalid or expired"}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "acc2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/settings/"))
            .and(header("authorization", "Bearer acc2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "site_title": "DesignSpace", "site_description": "", "contact_email": ""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let services = ServicesBuilder::new(server.uri(), storage, Arc::new(RecordingNavigator::default()))
            .build()
            .unwrap();
        services
            .store
            .save_login("acc", "ref", &crate::models::UserProfile::administrator(1, "admin"))
            .unwrap();

        assert!(matches!(
            services.sessions.ensure_authenticated().await,
            AuthOutcome::Authenticated(_)
        ));
        assert_eq!(services.content.settings().await.unwrap().site_title, "DesignSpace");
    }
}
