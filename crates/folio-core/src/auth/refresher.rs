use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};

use super::registry::VerificationRegistry;

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(String),
    /// The server turned the refresh token down. The session is over.
    Rejected,
    /// The server could not be reached or answered with a fault of its own.
    /// Says nothing about the refresh token.
    Unavailable,
}

impl RefreshOutcome {
    pub fn into_token(self) -> Option<String> {
        match self {
            RefreshOutcome::Refreshed(token) => Some(token),
            RefreshOutcome::Rejected | RefreshOutcome::Unavailable => None,
        }
    }
}

/// Exchanges a refresh token for a new access token.
///
/// Never writes to the credential store; persisting the new token is the
/// caller's job.
#[derive(Clone)]
pub struct TokenRefresher {
    api: ApiClient,
    registry: Arc<VerificationRegistry>,
}

impl TokenRefresher {
    pub fn new(api: ApiClient, registry: Arc<VerificationRegistry>) -> Self {
        Self { api, registry }
    }

    /// The new access token, or `None` on any failure.
    pub async fn refresh(&self, refresh_token: &str) -> Option<String> {
        self.try_refresh(refresh_token).await.into_token()
    }

    /// Like `refresh`, but tells a rejected token apart from an outage.
    pub async fn try_refresh(&self, refresh_token: &str) -> RefreshOutcome {
        match self.api.refresh_token(refresh_token).await {
            Ok(access) if !access.is_empty() => {
                // A token the server just issued counts as verified
                self.registry.mark_verified(&access);
                debug!("Access token refreshed");
                RefreshOutcome::Refreshed(access)
            }
            Ok(_) => {
                warn!("Refresh response carried an empty access token");
                RefreshOutcome::Unavailable
            }
            Err(ApiError::NetworkError(e)) => {
                warn!(error = %e, "Token refresh request failed");
                RefreshOutcome::Unavailable
            }
            Err(e @ (ApiError::ServerError(_) | ApiError::RateLimited | ApiError::MalformedBody(_))) => {
                warn!(error = %e, "Token refresh failed on the server side");
                RefreshOutcome::Unavailable
            }
            Err(e) => {
                debug!(error = %e, "Token refresh rejected");
                RefreshOutcome::Rejected
            }
        }
    }
}
