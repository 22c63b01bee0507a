use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::UserProfile;

use super::credentials::CredentialStore;
use super::session::Navigator;
use super::throttle::{LoginAttemptState, LoginThrottle};

/// Profile id used when the login response carries no `user_id`.
const FALLBACK_USER_ID: i64 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("Username and password required")]
    MissingCredentials,

    #[error("Too many failed attempts. Please try again in {remaining_secs} seconds.")]
    LockedOut { remaining_secs: i64 },

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Server returned an invalid response. Please try again later.")]
    MalformedResponse,

    #[error("Server error: {0}. Please try again later.")]
    ServerError(String),

    #[error("Unable to connect to server. Check your internet connection. ({0})")]
    Network(String),

    #[error("Signed in but could not save the session: {0}")]
    Storage(String),
}

impl LoginError {
    /// Whether this failure counts toward the lockout.
    fn counts_as_failure(err: &ApiError) -> bool {
        matches!(
            err,
            ApiError::BadRequest(_)
                | ApiError::Unauthorized(_)
                | ApiError::AccessDenied(_)
                | ApiError::NotFound(_)
                | ApiError::InvalidResponse(_)
        )
    }
}

/// Username/password login with a client-side lockout.
pub struct LoginGate {
    api: ApiClient,
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    throttle: Mutex<LoginThrottle>,
}

impl LoginGate {
    pub fn new(api: ApiClient, store: CredentialStore, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_throttle(api, store, navigator, LoginThrottle::default())
    }

    pub fn with_throttle(
        api: ApiClient,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
        throttle: LoginThrottle,
    ) -> Self {
        Self {
            api,
            store,
            navigator,
            throttle: Mutex::new(throttle),
        }
    }

    fn throttle(&self) -> MutexGuard<'_, LoginThrottle> {
        self.throttle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn attempt_state(&self) -> LoginAttemptState {
        self.throttle().state().clone()
    }

    /// Seconds until the form unlocks, if it is locked.
    pub fn remaining_lock(&self) -> Option<i64> {
        self.throttle().remaining_lock()
    }

    pub async fn submit(&self, username: &str, password: &str) -> Result<UserProfile, LoginError> {
        if let Some(remaining_secs) = self.remaining_lock() {
            debug!(remaining_secs, "Login attempt while locked out");
            return Err(LoginError::LockedOut { remaining_secs });
        }
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let pair = match self.api.authenticate(username, password).await {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(e)),
        };
        if pair.access.is_empty() || pair.refresh.is_empty() {
            warn!("Login response is missing tokens");
            return Err(LoginError::MalformedResponse);
        }

        self.throttle().record_success();
        let user = UserProfile::administrator(pair.user_id.unwrap_or(FALLBACK_USER_ID), username);
        self.store
            .save_login(&pair.access, &pair.refresh, &user)
            .map_err(|e| LoginError::Storage(e.to_string()))?;

        info!(username, "Signed in");
        self.navigator.to_dashboard();
        Ok(user)
    }

    fn fail(&self, err: ApiError) -> LoginError {
        if LoginError::counts_as_failure(&err) {
            let mut throttle = self.throttle();
            if let Some(remaining_secs) = throttle.record_failure() {
                warn!(
                    attempts = throttle.state().failed_attempts,
                    "Too many failed logins, locking"
                );
                return LoginError::LockedOut { remaining_secs };
            }
            debug!(attempts = throttle.state().failed_attempts, "Login rejected");
            let message = err.detail().unwrap_or("Invalid credentials").to_string();
            return LoginError::InvalidCredentials(message);
        }

        match err {
            ApiError::MalformedBody(e) => {
                warn!(error = %e, "Login response was not valid JSON");
                LoginError::MalformedResponse
            }
            ApiError::NetworkError(e) => {
                warn!(error = %e, "Login request failed");
                LoginError::Network(e.to_string())
            }
            ApiError::RateLimited => LoginError::ServerError("rate limited".to_string()),
            other => {
                warn!(error = %other, "Login failed on the server side");
                let message = other.detail().map(str::to_string).unwrap_or_else(|| other.to_string());
                LoginError::ServerError(message)
            }
        }
    }
}
